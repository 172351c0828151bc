//! Comment stripping.
//!
//! A `%` starts a comment unless it is escaped by an odd number of
//! backslashes (`\%` is a literal percent sign, `\\%` is a line break followed
//! by a comment). A line that already ends in `%` is layout and is kept as
//! it is; otherwise the comment is removed together with the space before it.

use crate::domain::SanitizedLine;
use std::borrow::Cow;

use super::commands::contains_end_document;

/// Result of stripping one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrippedLine<'a> {
    /// Text that remains (possibly unchanged, possibly ending in a bare `%`).
    Text(Cow<'a, str>),
    /// The line held nothing but a comment.
    CommentOnly,
}

impl<'a> StrippedLine<'a> {
    /// Text for scanning purposes; empty for comment-only lines.
    pub fn as_str(&self) -> &str {
        match self {
            StrippedLine::Text(text) => text,
            StrippedLine::CommentOnly => "",
        }
    }
}

/// Byte offset of the first `%` that starts a comment.
pub fn find_comment(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut backslashes = 0usize;
    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'\\' => backslashes += 1,
            b'%' if backslashes % 2 == 0 => return Some(idx),
            _ => backslashes = 0,
        }
    }
    None
}

/// Strip the comment from a single line (without its newline).
pub fn strip_line(line: &str) -> StrippedLine<'_> {
    let Some(idx) = find_comment(line) else {
        return StrippedLine::Text(Cow::Borrowed(line));
    };
    let before = &line[..idx];
    if before.trim().is_empty() {
        return StrippedLine::CommentOnly;
    }
    if line[idx + 1..].trim().is_empty() {
        // a trailing `%` suppresses the end-of-line space
        StrippedLine::Text(Cow::Borrowed(line.trim_end()))
    } else {
        StrippedLine::Text(Cow::Borrowed(before.trim_end()))
    }
}

/// Strip a whole document, keeping the source line number of every output line.
///
/// Comment-only lines collapse to a single `%` (so no paragraph break appears
/// where the comment was); a run of them, or one following a blank line, is
/// dropped entirely. Output ends with the line containing `\end{document}`.
pub fn strip_numbered<'a, I>(lines: I) -> Vec<SanitizedLine>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out: Vec<SanitizedLine> = Vec::new();
    for (idx, raw) in lines.into_iter().enumerate() {
        let line = idx + 1;
        match strip_line(raw) {
            StrippedLine::CommentOnly => {
                let after_gap = out.last().map(|l| l.text == "%" || l.text.trim().is_empty());
                if after_gap != Some(true) {
                    out.push(SanitizedLine { line, text: "%".to_string() });
                }
            }
            StrippedLine::Text(text) => {
                let stop = contains_end_document(&text);
                out.push(SanitizedLine { line, text: text.into_owned() });
                if stop {
                    break;
                }
            }
        }
    }
    out
}

/// Strip a list of lines, dropping line numbers.
pub fn strip_document<'a, I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    strip_numbered(lines).into_iter().map(|l| l.text).collect()
}

/// Strip a full text; the result is newline-terminated.
pub fn strip_text(text: &str) -> String {
    let mut out = strip_document(text.lines()).join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripped(line: &str) -> String {
        strip_line(line).as_str().to_string()
    }

    #[test]
    fn lines_without_comments_are_untouched() {
        assert_eq!(strip_line("asdf"), StrippedLine::Text(Cow::Borrowed("asdf")));
        assert_eq!(stripped("  indented text  "), "  indented text  ");
    }

    #[test]
    fn inline_comment_and_preceding_space_removed() {
        assert_eq!(
            stripped("\\includegraphics{fig1.png} % not used"),
            "\\includegraphics{fig1.png}"
        );
        assert_eq!(stripped("inline comment % starts here % oh another"), "inline comment");
    }

    #[test]
    fn escaped_percent_is_preserved() {
        assert_eq!(
            stripped("percent \\% but then comment % starts here % oh another"),
            "percent \\% but then comment"
        );
        assert_eq!(
            stripped("percent \\% \\% but then comment % starts here"),
            "percent \\% \\% but then comment"
        );
        assert_eq!(stripped("50\\%"), "50\\%");
    }

    #[test]
    fn even_backslash_run_does_not_escape() {
        // `\\` is a line break, so the `%` after it starts a comment.
        assert_eq!(stripped("a \\\\% comment"), "a \\\\");
        assert_eq!(stripped("a \\\\\\% literal"), "a \\\\\\% literal");
    }

    #[test]
    fn comment_glued_to_text_is_removed() {
        assert_eq!(stripped("a%cc"), "a");
        assert_eq!(stripped("\\begin{figure}%note"), "\\begin{figure}");
    }

    #[test]
    fn trailing_percent_is_kept_for_layout() {
        assert_eq!(stripped("layout{%  "), "layout{%");
        assert_eq!(stripped("\\begin{figure}%"), "\\begin{figure}%");
        assert_eq!(stripped("a %"), "a %");
    }

    #[test]
    fn comment_only_lines() {
        assert_eq!(strip_line("%asdf"), StrippedLine::CommentOnly);
        assert_eq!(strip_line("   % indented"), StrippedLine::CommentOnly);
        assert_eq!(strip_line("%"), StrippedLine::CommentOnly);
    }

    #[test]
    fn comment_runs_collapse() {
        let doc = ["Text", "% one", "% two", "", "% three", "More"];
        assert_eq!(strip_document(doc), vec!["Text", "%", "", "More"]);
    }

    #[test]
    fn leading_comment_becomes_marker() {
        let doc = ["% header", "\\section{A}"];
        assert_eq!(strip_document(doc), vec!["%", "\\section{A}"]);
    }

    #[test]
    fn stops_after_end_document() {
        let doc = ["\\begin{document}", "Hi", "\\end{document}", "junk after"];
        let out = strip_numbered(doc);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2], SanitizedLine { line: 3, text: "\\end{document}".to_string() });
    }

    #[test]
    fn commented_end_document_does_not_stop() {
        let doc = ["% \\end{document}", "still here"];
        assert_eq!(strip_document(doc), vec!["%", "still here"]);
    }

    #[test]
    fn line_numbers_follow_source() {
        let doc = ["a", "% c", "% d", "b"];
        let out = strip_numbered(doc);
        let numbers: Vec<usize> = out.iter().map(|l| l.line).collect();
        assert_eq!(numbers, vec![1, 2, 4]);
    }

    #[test]
    fn strip_text_is_newline_terminated() {
        assert_eq!(strip_text("a % x\nb"), "a\nb\n");
    }

    #[test]
    fn non_ascii_text_before_comment() {
        assert_eq!(stripped("Gödel % note"), "Gödel");
    }
}
