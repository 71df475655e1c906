//! Comment range scanning.
//!
//! Comments are not part of the AST; passes that need to inspect or preserve
//! them (`@internal` marker propagation, leading JSDoc retention) work from
//! the ranges collected here. The scanner is string- and template-aware so
//! `//` inside a literal is not mistaken for a comment.

use serde::{Deserialize, Serialize};

/// A range representing a comment in the source text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommentRange {
    /// Start position (byte offset), including the `//` or `/*`.
    pub pos: u32,
    /// End position (byte offset), exclusive.
    pub end: u32,
    pub is_multi_line: bool,
    pub has_trailing_new_line: bool,
}

impl CommentRange {
    pub fn span(&self) -> crate::Span {
        crate::Span::new(self.pos, self.end)
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.pos as usize..self.end as usize]
    }

    pub fn is_jsdoc(&self, source: &str) -> bool {
        let text = self.text(source);
        text.starts_with("/**") && !text.starts_with("/***")
    }
}

/// Extract all comment ranges from source text.
pub fn get_comment_ranges(source: &str) -> Vec<CommentRange> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut comments = Vec::new();
    let mut pos = 0;

    while pos < len {
        match bytes[pos] {
            b'"' | b'\'' => {
                pos = skip_string(bytes, pos);
            }
            b'`' => {
                pos = skip_template(bytes, pos);
            }
            b'/' if pos + 1 < len && bytes[pos + 1] == b'/' => {
                let start = pos as u32;
                pos += 2;
                while pos < len && bytes[pos] != b'\n' && bytes[pos] != b'\r' {
                    pos += 1;
                }
                comments.push(CommentRange {
                    pos: start,
                    end: pos as u32,
                    is_multi_line: false,
                    has_trailing_new_line: pos < len,
                });
            }
            b'/' if pos + 1 < len && bytes[pos + 1] == b'*' => {
                let start = pos as u32;
                pos += 2;
                let mut closed = false;
                while pos + 1 < len {
                    if bytes[pos] == b'*' && bytes[pos + 1] == b'/' {
                        pos += 2;
                        closed = true;
                        break;
                    }
                    pos += 1;
                }
                if !closed {
                    pos = len;
                }
                let has_trailing_new_line =
                    pos < len && (bytes[pos] == b'\n' || bytes[pos] == b'\r');
                comments.push(CommentRange {
                    pos: start,
                    end: pos as u32,
                    is_multi_line: true,
                    has_trailing_new_line,
                });
            }
            _ => pos += 1,
        }
    }

    comments
}

fn skip_string(bytes: &[u8], mut pos: usize) -> usize {
    let quote = bytes[pos];
    pos += 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'\n' => return pos, // unterminated, bail at line end
            b if b == quote => return pos + 1,
            _ => pos += 1,
        }
    }
    pos
}

fn skip_template(bytes: &[u8], mut pos: usize) -> usize {
    // Treats the whole backtick literal as opaque, including `${...}` holes;
    // comments inside template substitutions are rare enough to ignore here.
    pos += 1;
    let mut depth = 0usize;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'$' if pos + 1 < bytes.len() && bytes[pos + 1] == b'{' => {
                depth += 1;
                pos += 2;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                pos += 1;
            }
            b'`' if depth == 0 => return pos + 1,
            _ => pos += 1,
        }
    }
    pos
}

/// Comments immediately preceding `pos`: the run of comments separated from
/// `pos` (and from each other) by at most one blank line.
pub fn leading_comments(comments: &[CommentRange], pos: u32, source: &str) -> Vec<CommentRange> {
    let idx = comments.partition_point(|c| c.end <= pos);
    let mut result: Vec<CommentRange> = Vec::new();
    for i in (0..idx).rev() {
        let comment = &comments[i];
        let check_pos = result.last().map_or(pos, |c: &CommentRange| c.pos);
        let between = &source[comment.end as usize..check_pos as usize];
        if !between.chars().all(char::is_whitespace) {
            break;
        }
        if between.bytes().filter(|&b| b == b'\n').count() > 2 {
            break;
        }
        result.push(comment.clone());
    }
    result.reverse();
    result
}

/// True if any comment immediately preceding `pos` contains an `@internal`
/// marker, the convention used to exclude declarations from public API output.
pub fn has_internal_marker(comments: &[CommentRange], pos: u32, source: &str) -> bool {
    leading_comments(comments, pos, source)
        .iter()
        .any(|c| c.text(source).contains("@internal"))
}

/// The leading JSDoc block (`/** ... */`) closest to `pos`, if any.
pub fn leading_jsdoc(comments: &[CommentRange], pos: u32, source: &str) -> Option<CommentRange> {
    leading_comments(comments, pos, source)
        .into_iter()
        .rev()
        .find(|c| c.is_jsdoc(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_line_and_block_comments() {
        let src = "// one\nlet x = 1; /* two */\n";
        let ranges = get_comment_ranges(src);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].text(src), "// one");
        assert_eq!(ranges[1].text(src), "/* two */");
        assert!(ranges[1].is_multi_line);
    }

    #[test]
    fn ignores_comment_lookalikes_in_strings() {
        let src = "let url = \"http://example.com\"; let t = `a ${b} // c`;\n// real\n";
        let ranges = get_comment_ranges(src);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].text(src), "// real");
    }

    #[test]
    fn internal_marker_detection() {
        let src = "/* @internal */\nexport function f() {}\n";
        let ranges = get_comment_ranges(src);
        let pos = src.find("export").unwrap() as u32;
        assert!(has_internal_marker(&ranges, pos, src));
        assert!(!has_internal_marker(&ranges, 0, src));
    }

    #[test]
    fn finds_leading_jsdoc() {
        let src = "/** docs */\n// extra\nnamespace ts {}\n";
        let ranges = get_comment_ranges(src);
        let pos = src.find("namespace").unwrap() as u32;
        let jsdoc = leading_jsdoc(&ranges, pos, src).unwrap();
        assert_eq!(jsdoc.text(src), "/** docs */");
    }
}
