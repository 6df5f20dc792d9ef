//! Text scanning primitives shared by every translation stage.
//!
//! - [`lexer`]: C tokenizer
//! - [`delimiter`]: bracket matching and comment stripping
//! - [`pattern`]: token-window patterns with captures
//! - [`switch`]: `switch`/`case` and parameter-list extraction
//! - [`format`]: idempotent pretty-printer

pub mod delimiter;
pub mod format;
pub mod lexer;
pub mod pattern;
pub mod switch;

pub use delimiter::{extract_block, find_in_code, match_delimiter, remove_comments};
pub use format::format;
pub use lexer::{is_identifier, parse_c_number, tokenize, tokenize_code, Lexer, Token, TokenKind};
pub use pattern::{is_member_access, replace_all, replace_identifier, squash, Match, Pattern, Tokens};
pub use switch::{extract_method_parameters, extract_switch_cases};
