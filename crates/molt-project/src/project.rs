//! Project loading, mutation, and persistence.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::Glob;
use molt_binder::ProjectBinder;
use molt_common::{Diagnostic, FileId};
use molt_parser::SourceFile;
use rustc_hash::FxHashMap;
use tracing::info;
use walkdir::WalkDir;

use crate::config::ConfigUnit;
use crate::{DECLARATION_GLOB, SOURCE_GLOB, TSCONFIG_GLOB};

pub struct Project {
    /// On-disk directory all project-relative paths hang off.
    pub root_dir: PathBuf,
    files: Vec<SourceFile>,
    by_path: FxHashMap<String, FileId>,
    pub configs: Vec<ConfigUnit>,
}

impl Project {
    /// Load every in-scope source file and configuration unit under `root`.
    pub fn load(root: &Path) -> Result<Project> {
        let source_glob = Glob::new(SOURCE_GLOB)?.compile_matcher();
        let declaration_glob = Glob::new(DECLARATION_GLOB)?.compile_matcher();
        let config_glob = Glob::new(TSCONFIG_GLOB)?.compile_matcher();

        let mut project = Project {
            root_dir: root.to_path_buf(),
            files: Vec::new(),
            by_path: FxHashMap::default(),
            configs: Vec::new(),
        };

        let mut source_paths = Vec::new();
        let mut config_paths = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = normalize_slashes(relative);
            if source_glob.is_match(&relative) && !declaration_glob.is_match(&relative) {
                source_paths.push(relative);
            } else if config_glob.is_match(&relative) {
                config_paths.push(relative);
            }
        }

        for relative in source_paths {
            let text = std::fs::read_to_string(root.join(&relative))
                .with_context(|| format!("failed to read {relative}"))?;
            project.insert_file(SourceFile::parse(relative, text));
        }
        for relative in config_paths {
            let text = std::fs::read_to_string(root.join(&relative))
                .with_context(|| format!("failed to read {relative}"))?;
            project.configs.push(ConfigUnit::parse(relative, &text)?);
        }

        info!(
            files = project.files.len(),
            configs = project.configs.len(),
            "loaded project"
        );
        Ok(project)
    }

    /// Build a project from in-memory sources (fixture tests).
    pub fn from_sources(sources: &[(&str, &str)], configs: &[(&str, &str)]) -> Project {
        let mut project = Project {
            root_dir: PathBuf::new(),
            files: Vec::new(),
            by_path: FxHashMap::default(),
            configs: Vec::new(),
        };
        for (name, text) in sources {
            project.insert_file(SourceFile::parse(*name, (*text).to_string()));
        }
        for (name, text) in configs {
            let config = ConfigUnit::parse(*name, text)
                .unwrap_or_else(|_| ConfigUnit { path: (*name).to_string(), json: serde_json::Value::Null, dirty: false });
            project.configs.push(config);
        }
        project
    }

    fn insert_file(&mut self, file: SourceFile) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.by_path.insert(file.file_name.clone(), id);
        self.files.push(file);
        id
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }

    pub fn file_ids(&self) -> impl Iterator<Item = FileId> + use<> {
        (0..self.files.len() as u32).map(FileId)
    }

    pub fn file_by_path(&self, path: &str) -> Option<FileId> {
        self.by_path.get(path).copied()
    }

    /// Replace a file's text and reparse it in place.
    pub fn set_file_text(&mut self, id: FileId, text: String) {
        self.files[id.index()].set_text(text);
    }

    /// Register a synthesized source file (barrel generation).
    pub fn create_source_file(&mut self, path: String, text: String) -> FileId {
        let mut file = SourceFile::parse(path, text);
        file.dirty = true;
        file.created = true;
        self.insert_file(file)
    }

    /// Bind the current state of every file. Passes call this at their
    /// barriers; the binder is a snapshot, not a live index.
    pub fn bind(&self) -> ProjectBinder {
        ProjectBinder::bind(&self.files)
    }

    /// Post-pass health check: parse diagnostics plus binder diagnostics.
    pub fn check(&self) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> = self
            .files
            .iter()
            .flat_map(|f| f.parse_diagnostics.iter().cloned())
            .collect();
        diagnostics.extend(self.bind().diagnostics);
        diagnostics
    }

    /// The config unit owning a file: the one whose directory is the longest
    /// prefix of the file's path, preferring a plain `tsconfig.json` on ties.
    pub fn config_for_file(&self, file_name: &str) -> Option<usize> {
        let mut best: Option<(usize, usize, bool)> = None;
        for (index, config) in self.configs.iter().enumerate() {
            let dir = config.root_dir();
            let matches = dir.is_empty()
                || (file_name.starts_with(dir) && file_name.as_bytes().get(dir.len()) == Some(&b'/'));
            if !matches {
                continue;
            }
            let is_plain = config.path.ends_with("/tsconfig.json");
            let candidate = (index, dir.len(), is_plain);
            best = match best {
                None => Some(candidate),
                Some((_, best_len, best_plain)) => {
                    if dir.len() > best_len || (dir.len() == best_len && is_plain && !best_plain) {
                        Some(candidate)
                    } else {
                        best
                    }
                }
            };
        }
        best.map(|(index, _, _)| index)
    }

    /// Flush every dirty source file and config unit to disk.
    pub fn save(&mut self) -> Result<()> {
        let mut written = 0usize;
        for file in &mut self.files {
            if !file.dirty {
                continue;
            }
            let path = self.root_dir.join(&file.file_name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, &file.text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            file.dirty = false;
            file.created = false;
            written += 1;
        }
        for config in &mut self.configs {
            if !config.dirty {
                continue;
            }
            let path = self.root_dir.join(&config.path);
            std::fs::write(&path, config.to_text())
                .with_context(|| format!("failed to write {}", path.display()))?;
            config.dirty = false;
            written += 1;
        }
        info!(written, "saved project");
        Ok(())
    }
}

/// `--project` accepts either the project root directory or the root config
/// file inside `src/` (the original tool was pointed at
/// `src/tsconfig-base.json`).
pub fn project_root_from_arg(path: &Path) -> PathBuf {
    if path.is_file() {
        let dir = path.parent().unwrap_or(Path::new("."));
        if dir.file_name().is_some_and(|n| n == "src") {
            return dir.parent().unwrap_or(Path::new(".")).to_path_buf();
        }
        return dir.to_path_buf();
    }
    path.to_path_buf()
}

pub(crate) fn normalize_slashes(path: &Path) -> String {
    let text = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Join two project-relative paths, collapsing `.` and `..`.
pub fn join_paths(base: &str, relative: &str) -> String {
    if !relative.starts_with('.') {
        // Non-relative segments still resolve against the base directory in
        // tsconfig references.
        if base.is_empty() {
            return relative.to_string();
        }
        return normalize_dots(&format!("{base}/{relative}"));
    }
    if base.is_empty() {
        return normalize_dots(relative);
    }
    normalize_dots(&format!("{base}/{relative}"))
}

fn normalize_dots(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            _ => parts.push(segment),
        }
    }
    parts.join("/")
}

/// Relative module specifier from `from` (a file) to `to` (a file), in the
/// TypeScript import style: always starting with `./` or `../`.
pub fn ts_style_relative_path(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = match from.rfind('/') {
        Some(idx) => from[..idx].split('/').collect(),
        None => Vec::new(),
    };
    let to_parts: Vec<&str> = to.split('/').collect();
    let mut common = 0;
    while common < from_dir.len()
        && common < to_parts.len().saturating_sub(1)
        && from_dir[common] == to_parts[common]
    {
        common += 1;
    }
    let mut result = String::new();
    for _ in common..from_dir.len() {
        result.push_str("../");
    }
    if result.is_empty() {
        result.push_str("./");
    }
    result.push_str(&to_parts[common..].join("/"));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_are_ts_style() {
        assert_eq!(
            ts_style_relative_path("src/compiler/checker.ts", "src/compiler/_namespaces/ts.ts"),
            "./_namespaces/ts.ts"
        );
        assert_eq!(
            ts_style_relative_path("src/server/session.ts", "src/compiler/core.ts"),
            "../compiler/core.ts"
        );
        assert_eq!(
            ts_style_relative_path("src/a.ts", "src/b.ts"),
            "./b.ts"
        );
    }

    #[test]
    fn config_lookup_prefers_longest_prefix() {
        let project = Project::from_sources(
            &[("src/compiler/core.ts", "namespace ts {}\n")],
            &[
                ("src/tsconfig-base.json", "{}"),
                ("src/compiler/tsconfig.json", "{ \"files\": [] }"),
            ],
        );
        let config = project.config_for_file("src/compiler/core.ts").unwrap();
        assert_eq!(project.configs[config].path, "src/compiler/tsconfig.json");
    }

    #[test]
    fn load_and_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src").join("compiler");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("core.ts"), "namespace ts { export const x = 1; }\n").unwrap();
        std::fs::write(src.join("types.d.ts"), "declare const ambient: number;\n").unwrap();
        std::fs::write(src.join("tsconfig.json"), "{ \"files\": [\"core.ts\"] }\n").unwrap();

        let mut project = Project::load(dir.path()).unwrap();
        assert_eq!(project.files().len(), 1, "declaration files are excluded");
        assert_eq!(project.configs.len(), 1);

        let id = project.file_ids().next().unwrap();
        project.set_file_text(id, "export const x = 1;\n".to_string());
        project.save().unwrap();
        let written = std::fs::read_to_string(src.join("core.ts")).unwrap();
        assert_eq!(written, "export const x = 1;\n");
    }

    #[test]
    fn project_root_arg_accepts_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let config = src.join("tsconfig-base.json");
        std::fs::write(&config, "{}").unwrap();
        assert_eq!(project_root_from_arg(&config), dir.path());
        assert_eq!(project_root_from_arg(dir.path()), dir.path());
    }
}
