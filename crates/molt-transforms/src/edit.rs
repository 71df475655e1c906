//! Span-based text edits.
//!
//! Passes never mutate syntax trees in place: they accumulate `TextEdit`s
//! against a file's current text, apply them in one shot, and the file is
//! reparsed. Overlapping edits indicate a pass bug and abort the run.

use molt_common::Span;

use crate::PipelineError;

#[derive(Debug, Clone)]
pub struct TextEdit {
    pub span: Span,
    pub text: String,
}

/// Outcome of visiting one node in a rewrite traversal. Tree-walk callbacks
/// cannot delete the node they are visiting; removals are queued and applied
/// once the walk completes.
#[derive(Debug)]
pub enum Rewrite {
    Keep,
    Replace(String),
    RemoveAfterTraversal,
}

#[derive(Debug, Default)]
pub struct EditBuffer {
    edits: Vec<TextEdit>,
}

impl EditBuffer {
    pub fn new() -> EditBuffer {
        EditBuffer::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        self.edits.push(TextEdit { span, text: text.into() });
    }

    pub fn insert(&mut self, pos: u32, text: impl Into<String>) {
        self.edits.push(TextEdit { span: Span::empty(pos), text: text.into() });
    }

    pub fn delete(&mut self, span: Span) {
        self.edits.push(TextEdit { span, text: String::new() });
    }

    /// Apply all edits to `source`. Edits are sorted by position; same-point
    /// insertions keep their accumulation order.
    pub fn apply(mut self, source: &str, file_name: &str) -> Result<String, PipelineError> {
        self.edits.sort_by_key(|e| (e.span.start, e.span.end));
        let mut out = String::with_capacity(source.len());
        let mut cursor = 0usize;
        for edit in &self.edits {
            let start = edit.span.start as usize;
            let end = edit.span.end as usize;
            if start < cursor {
                return Err(PipelineError::ShapeAssumption {
                    file: file_name.to_string(),
                    message: format!(
                        "overlapping text edits at offset {start} (cursor already at {cursor})"
                    ),
                });
            }
            out.push_str(&source[cursor..start]);
            out.push_str(&edit.text);
            cursor = end;
        }
        out.push_str(&source[cursor..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_in_order() {
        let mut edits = EditBuffer::new();
        edits.replace(Span::new(4, 7), "XYZ");
        edits.insert(0, ">");
        edits.delete(Span::new(8, 9));
        assert_eq!(edits.apply("abcdefg hi", "t.ts").unwrap(), ">abcdXYZ i");
    }

    #[test]
    fn rejects_overlap() {
        let mut edits = EditBuffer::new();
        edits.replace(Span::new(0, 5), "a");
        edits.replace(Span::new(3, 8), "b");
        let err = edits.apply("0123456789", "t.ts").unwrap_err();
        assert!(matches!(err, PipelineError::ShapeAssumption { .. }));
    }

    #[test]
    fn same_point_insertions_keep_order() {
        let mut edits = EditBuffer::new();
        edits.insert(2, "a");
        edits.insert(2, "b");
        assert_eq!(edits.apply("xyz", "t.ts").unwrap(), "xyabz");
    }
}
