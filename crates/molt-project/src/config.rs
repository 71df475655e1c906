//! Configuration units (tsconfig files) as order-preserving JSON values.

use anyhow::{Context, Result};
use serde_json::Value;

/// One project/build configuration scope: its file list, references to other
/// config units, and build-output settings. Mutated by the hoist pass.
#[derive(Debug)]
pub struct ConfigUnit {
    /// Project-relative path with forward slashes.
    pub path: String,
    pub json: Value,
    pub dirty: bool,
}

impl ConfigUnit {
    pub fn parse(path: impl Into<String>, text: &str) -> Result<ConfigUnit> {
        let path = path.into();
        let json = serde_json::from_str(text)
            .with_context(|| format!("failed to parse config file {path}"))?;
        Ok(ConfigUnit { path, json, dirty: false })
    }

    /// The directory containing this config, project-relative.
    pub fn root_dir(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }

    /// Paths of referenced config units, resolved project-relative. A
    /// reference may point at a directory (implying its `tsconfig.json`) or
    /// at a config file directly.
    pub fn reference_dirs(&self) -> Vec<String> {
        let Some(refs) = self.json.get("references").and_then(Value::as_array) else {
            return Vec::new();
        };
        refs.iter()
            .filter_map(|r| r.get("path").and_then(Value::as_str))
            .map(|p| {
                let joined = crate::project::join_paths(self.root_dir(), p);
                if joined.ends_with(".json") {
                    match joined.rfind('/') {
                        Some(idx) => joined[..idx].to_string(),
                        None => String::new(),
                    }
                } else {
                    joined
                }
            })
            .collect()
    }

    /// Append entries to the `files` array, if present.
    pub fn add_files(&mut self, relative_paths: &[String]) {
        let Some(files) = self
            .json
            .get_mut("files")
            .and_then(Value::as_array_mut)
        else {
            return;
        };
        for path in relative_paths {
            let entry = Value::String(path.clone());
            if !files.contains(&entry) {
                files.push(entry);
            }
        }
        self.dirty = true;
    }

    /// Remove every `prepend` field under `references`. Prepending build
    /// output is meaningless once the project stops emitting a single outFile.
    pub fn remove_prepend(&mut self) {
        let mut changed = false;
        if let Some(refs) = self.json.get_mut("references").and_then(Value::as_array_mut) {
            for reference in refs {
                if let Some(obj) = reference.as_object_mut() {
                    if obj.remove("prepend").is_some() {
                        changed = true;
                    }
                }
            }
        }
        if changed {
            self.dirty = true;
        }
    }

    /// Convert `outFile: "<dir>/<name>.js"` into `outDir: "<dir>"`, keeping
    /// the member position stable.
    pub fn convert_out_file_to_out_dir(&mut self) {
        let Some(options) = self
            .json
            .get_mut("compilerOptions")
            .and_then(Value::as_object_mut)
        else {
            return;
        };
        let Some(out_file) = options.get("outFile").and_then(Value::as_str) else {
            return;
        };
        let out_dir = match out_file.rfind('/') {
            Some(idx) => out_file[..idx].to_string(),
            None => ".".to_string(),
        };
        // Rebuild the map so outDir occupies outFile's slot.
        let entries: Vec<(String, Value)> = options
            .iter()
            .map(|(k, v)| {
                if k == "outFile" {
                    ("outDir".to_string(), Value::String(out_dir.clone()))
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();
        options.clear();
        for (k, v) in entries {
            options.insert(k, v);
        }
        self.dirty = true;
    }

    pub fn to_text(&self) -> String {
        let mut text = serde_json::to_string_pretty(&self.json).unwrap_or_default();
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_file_becomes_out_dir_in_place() {
        let mut config = ConfigUnit::parse(
            "src/compiler/tsconfig.json",
            r#"{ "compilerOptions": { "strict": true, "outFile": "../../built/local/tsc.js", "target": "es2020" }, "files": [] }"#,
        )
        .unwrap();
        config.convert_out_file_to_out_dir();
        let options = config.json.get("compilerOptions").unwrap();
        assert!(options.get("outFile").is_none());
        assert_eq!(
            options.get("outDir").and_then(Value::as_str),
            Some("../../built/local")
        );
        // Order preserved: strict, outDir, target.
        let keys: Vec<&String> = options.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["strict", "outDir", "target"]);
    }

    #[test]
    fn prepend_removed_from_references() {
        let mut config = ConfigUnit::parse(
            "src/tsc/tsconfig.json",
            r#"{ "references": [ { "path": "../compiler", "prepend": true } ] }"#,
        )
        .unwrap();
        config.remove_prepend();
        assert!(config.dirty);
        let reference = &config.json["references"][0];
        assert!(reference.get("prepend").is_none());
        assert_eq!(reference.get("path").and_then(Value::as_str), Some("../compiler"));
    }

    #[test]
    fn reference_dirs_resolve_relative() {
        let config = ConfigUnit::parse(
            "src/tsserver/tsconfig.json",
            r#"{ "references": [ { "path": "../compiler" }, { "path": "../services/tsconfig.json" } ] }"#,
        )
        .unwrap();
        assert_eq!(config.reference_dirs(), ["src/compiler", "src/services"]);
    }

    #[test]
    fn add_files_dedupes(){
        let mut config = ConfigUnit::parse(
            "src/compiler/tsconfig.json",
            r#"{ "files": ["core.ts"] }"#,
        )
        .unwrap();
        config.add_files(&["./_namespaces/ts.ts".to_string(), "core.ts".to_string()]);
        let files = config.json["files"].as_array().unwrap();
        assert_eq!(files.len(), 2);
    }
}
