//! The pipeline driver: passes run in a fixed order against one loaded
//! project, with a diagnostics gate between passes in batch mode and a
//! single flush to disk at the very end.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use molt_common::{Diagnostic, DiagnosticCategory, LineMap};
use molt_project::{project_root_from_arg, Project};
use molt_transforms::{find_pass, Pass, PipelineError, PASSES};
use tracing::{info, info_span};

/// Diagnostic sets larger than this are reported as a bare count; printing
/// thousands of errors helps nobody.
const MAX_DIAGNOSTICS_TO_DISPLAY: usize = 100;

/// Run one named pass, or the full ordered batch when `pass_name` is `None`.
/// Returns the process exit code.
pub fn run(pass_name: Option<&str>, project_arg: &Path) -> Result<i32> {
    let (passes, batch): (Vec<&'static Pass>, bool) = match pass_name {
        Some(name) => match find_pass(name) {
            Some(pass) => (vec![pass], false),
            None => {
                let error = PipelineError::UnknownPass(name.to_string());
                println!("{error}");
                return Ok(2);
            }
        },
        None => (PASSES.iter().filter(|pass| pass.batch).collect(), true),
    };

    let root = project_root_from_arg(project_arg);
    info!("loading project");
    let mut project = Project::load(&root)?;

    for pass in passes {
        let span = info_span!("pass", name = pass.name);
        let _guard = span.enter();
        info!("running");
        (pass.run)(&mut project)?;

        let diagnostics = project.check();
        if diagnostics.is_empty() {
            continue;
        }
        if diagnostics.len() > MAX_DIAGNOSTICS_TO_DISPLAY {
            let error = PipelineError::ExcessiveDiagnosticCount {
                pass: pass.name.to_string(),
                count: diagnostics.len(),
            };
            println!("{error}");
        } else {
            print_diagnostics(&project, &diagnostics);
        }
        if batch {
            // A broken pass is a logic error, not something to recover from;
            // the failed batch discards its in-memory work. Durability at
            // pass granularity comes from committing between runs.
            let error = PipelineError::PostPassDiagnostics {
                pass: pass.name.to_string(),
                count: diagnostics.len(),
            };
            println!("{error}");
            return Ok(1);
        }
        // Single-pass runs print the diagnostics and continue, so a pass can
        // be iterated on manually.
    }

    info!("saving");
    project.save()?;
    Ok(0)
}

fn print_diagnostics(project: &Project, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let (line, column) = project
            .file_by_path(&diagnostic.file)
            .map(|id| LineMap::new(&project.file(id).text).position(diagnostic.span.start))
            .unwrap_or((1, 1));
        let tag = match diagnostic.category {
            DiagnosticCategory::Error => "error".red().bold(),
            DiagnosticCategory::Warning => "warning".yellow().bold(),
            DiagnosticCategory::Message => "message".cyan().bold(),
        };
        println!(
            "{}:{}:{} - {} {}",
            diagnostic.file, line, column, tag, diagnostic.message_text
        );
    }
}
