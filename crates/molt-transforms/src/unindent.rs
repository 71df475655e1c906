//! Unindent pass: strip one indentation level from top-level namespace
//! bodies. Purely textual; the later passes produce much more readable diffs
//! when the namespace contents already sit at column zero.

use molt_parser::{ModuleKind, NodeKind};
use molt_project::Project;
use tracing::debug;

use crate::edit::EditBuffer;
use crate::shape::namespace_shape;
use crate::PipelineError;

pub fn unindent(project: &mut Project) -> Result<(), PipelineError> {
    for id in project.file_ids().collect::<Vec<_>>() {
        let file = project.file(id);
        let mut edits = EditBuffer::new();
        for &stmt in file.top_level_statements() {
            let NodeKind::ModuleDecl { module_kind, .. } = file.arena.kind(stmt) else {
                continue;
            };
            if *module_kind != ModuleKind::Namespace {
                continue;
            }
            let Some(shape) = namespace_shape(file, stmt) else {
                continue;
            };
            let Some(block) = shape.block else {
                continue; // namespace has no body
            };
            unindent_block(&file.text, file.arena.span(block), &mut edits);
        }
        if !edits.is_empty() {
            let file = project.file(id);
            let new_text = edits.apply(&file.text, &file.file_name)?;
            debug!(file = %file.file_name, "unindented namespace bodies");
            project.set_file_text(id, new_text);
        }
    }
    Ok(())
}

/// Remove one indent level (a tab or four spaces) from every line strictly
/// between the block's braces. Skips blocks whose contents are already at
/// column zero, which makes the pass idempotent.
fn unindent_block(text: &str, block_span: molt_common::Span, edits: &mut EditBuffer) {
    let open = block_span.start as usize;
    let close = block_span.end as usize - 1; // the `}`
    let Some(newline) = text[open..close].find('\n') else {
        return; // single-line body
    };
    let first_line = open + newline + 1;
    let close_line_start = text[..close].rfind('\n').map_or(close, |idx| idx + 1);
    if first_line >= close_line_start {
        return;
    }

    // Collect inner line starts.
    let mut line_starts = vec![first_line];
    for (offset, byte) in text[first_line..close_line_start].bytes().enumerate() {
        if byte == b'\n' {
            let next = first_line + offset + 1;
            if next < close_line_start {
                line_starts.push(next);
            }
        }
    }

    // Every non-blank line must carry at least one indent level.
    let indent_of = |start: usize| -> Option<usize> {
        let line_end = text[start..].find('\n').map_or(text.len(), |idx| start + idx);
        let line = &text[start..line_end];
        if line.trim().is_empty() {
            return None;
        }
        if line.starts_with('\t') {
            Some(1)
        } else {
            Some(line.bytes().take_while(|&b| b == b' ').count().min(4))
        }
    };
    let min_indent = line_starts.iter().filter_map(|&s| indent_of(s)).min();
    if min_indent.unwrap_or(0) == 0 {
        return; // already unindented
    }

    for &start in &line_starts {
        let line_end = text[start..].find('\n').map_or(text.len(), |idx| start + idx);
        let line = &text[start..line_end];
        if line.trim().is_empty() {
            continue;
        }
        let remove = if line.starts_with('\t') {
            1
        } else {
            line.bytes().take_while(|&b| b == b' ').count().min(4)
        };
        if remove > 0 {
            edits.delete(molt_common::Span::new(start as u32, (start + remove) as u32));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> String {
        let mut project = Project::from_sources(&[("src/a.ts", source)], &[]);
        unindent(&mut project).unwrap();
        project.files()[0].text.clone()
    }

    #[test]
    fn strips_one_level() {
        let source = "namespace ts {\n    export function f(): void {\n        f();\n    }\n}\n";
        let expected = "namespace ts {\nexport function f(): void {\n    f();\n}\n}\n";
        assert_eq!(run(source), expected);
    }

    #[test]
    fn unindent_is_idempotent() {
        let source = "namespace ts {\n    export const x = 1;\n}\n";
        let once = run(source);
        let twice = run(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn leaves_non_namespace_files_alone() {
        let source = "function f(): void {\n    return;\n}\n";
        assert_eq!(run(source), source);
    }

    #[test]
    fn namespace_without_body_is_skipped() {
        let source = "declare namespace missing;\n";
        assert_eq!(run(source), source);
    }
}
