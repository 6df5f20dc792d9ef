//! Indenting, line-wrapping text writer for the generated classes.

/// One indentation level.
pub const INDENT: &str = "    ";

/// Default column at which lines are wrapped.
pub const DEFAULT_WRAP_COLUMN: usize = 120;

/// Places where a long line may be broken, with the side the break goes on.
const BREAKS: [(&str, Side); 9] = [
    (", ", Side::After),
    (" + ", Side::Before),
    (" - ", Side::Before),
    (" * ", Side::Before),
    (" / ", Side::Before),
    (" && ", Side::Before),
    (" || ", Side::Before),
    (" ? ", Side::Before),
    (" : ", Side::Before),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    /// Keep the separator on the first line
    After,
    /// Move the separator to the continuation line
    Before,
}

/// Writes lines with an indentation that follows the braces.
///
/// Inserted blocks lose their own indentation; every physical line is
/// re-indented from the running brace depth.
#[derive(Debug, Clone)]
pub struct CodeWriter {
    output: String,
    level: usize,
    wrap_column: usize,
}

impl CodeWriter {
    pub fn new(wrap_column: usize) -> Self {
        Self {
            output: String::new(),
            level: 0,
            wrap_column,
        }
    }

    /// Write every line of `code`.
    pub fn write(&mut self, code: &str) -> &mut Self {
        for line in code.lines() {
            self.line(line);
        }
        self
    }

    /// Write each item as a block of lines.
    pub fn write_all<I, S>(&mut self, blocks: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for block in blocks {
            self.write(block.as_ref());
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.output.push('\n');
        self
    }

    /// Write one physical line.
    pub fn line(&mut self, line: &str) -> &mut Self {
        let line = line.trim();
        if line.is_empty() {
            return self.blank();
        }

        let (opens, closes, leading) = count_braces(line);
        self.level = self.level.saturating_sub(leading);

        let indent = INDENT.repeat(self.level);
        let continuation = INDENT.repeat(self.level + 1);
        let mut rest = line;
        let mut prefix = indent.as_str();
        loop {
            let room = self.wrap_column.saturating_sub(prefix.len());
            if rest.len() < room {
                break;
            }
            let Some((end, start)) = break_point(rest, room) else {
                break;
            };
            self.output.push_str(prefix);
            self.output.push_str(rest[..end].trim_end());
            self.output.push('\n');
            rest = rest[start..].trim_start();
            prefix = continuation.as_str();
        }
        self.output.push_str(prefix);
        self.output.push_str(rest);
        self.output.push('\n');

        self.level = (self.level + opens).saturating_sub(closes - leading);
        self
    }

    pub fn finish(self) -> String {
        self.output
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new(DEFAULT_WRAP_COLUMN)
    }
}

/// Braces of a line outside literals and comments: opening, closing, and how
/// many of the closing ones lead the line.
fn count_braces(line: &str) -> (usize, usize, usize) {
    let mut opens = 0;
    let mut closes = 0;
    let mut leading = 0;
    let mut leading_run = true;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '/' if line[i..].starts_with("//") => break,
            '"' | '\'' => quote = Some(c),
            '{' => opens += 1,
            '}' => {
                closes += 1;
                if leading_run {
                    leading += 1;
                }
            }
            _ => {}
        }
        if c != '}' && !c.is_whitespace() {
            leading_run = false;
        }
    }
    (opens, closes, leading)
}

/// The rightmost allowed break of `line` whose first part is shorter than `room`.
/// Returns where the first part ends and where the rest starts.
fn break_point(line: &str, room: usize) -> Option<(usize, usize)> {
    let literal = literal_spans(line);
    let inside = |i: usize| literal.iter().any(|&(s, e)| i > s && i < e);

    BREAKS
        .iter()
        .flat_map(|(separator, side)| {
            line.match_indices(separator).map(move |(i, _)| match side {
                Side::After => (i + 1, i + separator.len()),
                Side::Before => (i, i + 1),
            })
        })
        .filter(|&(end, start)| end > 0 && end < room && start < line.len() && !inside(end))
        .max_by_key(|&(end, _)| end)
}

/// Byte spans of the string and character literals of a line.
fn literal_spans(line: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Option<(usize, char)> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match open {
            Some((start, q)) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    spans.push((start, i));
                    open = None;
                }
            }
            None if c == '"' || c == '\'' => open = Some((i, c)),
            None => {}
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent_follows_braces() {
        let mut writer = CodeWriter::default();
        writer.write("namespace A\n{\n        class B\n  {\nif (x)\n{\ny();\n} else {\nz();\n}\n}\n}");
        assert_eq!(
            writer.finish(),
            "namespace A\n{\n    class B\n    {\n        if (x)\n        {\n            y();\n        } else {\n            z();\n        }\n    }\n}\n"
        );
    }

    #[test]
    fn test_braces_in_literals_and_one_liners() {
        let mut writer = CodeWriter::default();
        writer
            .line("{")
            .line("public double X { get; private set; }")
            .line("var s = \"}\";")
            .line("y(); // {")
            .line("y();")
            .line("}");
        assert_eq!(
            writer.finish(),
            "{\n    public double X { get; private set; }\n    var s = \"}\";\n    y(); // {\n    y();\n}\n"
        );
    }

    #[test]
    fn test_wrap_long_lines() {
        let mut writer = CodeWriter::new(30);
        writer.line("value = alpha + beta + gamma + delta;");
        assert_eq!(writer.finish(), "value = alpha + beta + gamma\n    + delta;\n");

        let mut writer = CodeWriter::new(20);
        writer.line("f(aaaaaa, bbbbbb, cccccc);");
        assert_eq!(writer.finish(), "f(aaaaaa, bbbbbb,\n    cccccc);\n");
    }

    #[test]
    fn test_wrap_stays_below_column() {
        let mut writer = CodeWriter::new(20);
        writer.line("aaaaaaaaaaaaaaaaaaaa + bbbb;");
        assert_eq!(writer.finish(), "aaaaaaaaaaaaaaaaaaaa + bbbb;\n");

        let mut writer = CodeWriter::new(21);
        writer.line("aaaaaaaaaaaaaaaaaaaa + bbbb;");
        assert_eq!(writer.finish(), "aaaaaaaaaaaaaaaaaaaa\n    + bbbb;\n");
    }

    #[test]
    fn test_unbreakable_line_is_kept() {
        let mut writer = CodeWriter::new(10);
        writer.line("averyveryverylongidentifier;");
        assert_eq!(writer.finish(), "averyveryverylongidentifier;\n");
    }
}
