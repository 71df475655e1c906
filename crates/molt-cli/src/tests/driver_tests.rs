//! End-to-end driver tests over fixture projects on disk.

use std::path::Path;

use tempfile::TempDir;

use crate::driver;

fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read_file(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative)).unwrap()
}

#[test]
fn full_batch_migrates_a_two_file_namespace() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "src/compiler/a.ts",
        "namespace ts {\n    export function f(): void {}\n}\n",
    );
    write_file(
        dir.path(),
        "src/compiler/b.ts",
        "namespace ts {\n    export function g(): void {\n        f();\n    }\n}\n",
    );

    let code = driver::run(None, dir.path()).unwrap();
    assert_eq!(code, 0);

    let a = read_file(dir.path(), "src/compiler/a.ts");
    assert!(!a.contains("namespace"), "got: {a}");
    assert!(a.contains("export function f(): void {}"), "got: {a}");

    let b = read_file(dir.path(), "src/compiler/b.ts");
    assert!(b.contains("import { f } from \"../_namespaces/ts\";"), "got: {b}");
    assert!(b.contains("f();"), "got: {b}");
    assert!(!b.contains("ts.f"), "explicit form inlined away: {b}");

    let barrel = read_file(dir.path(), "src/_namespaces/ts.ts");
    assert!(barrel.contains("export * from \"../compiler/a\";"), "got: {barrel}");
    assert!(barrel.contains("export * from \"../compiler/b\";"), "got: {barrel}");
}

#[test]
fn single_pass_runs_and_saves() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "src/compiler/a.ts",
        "namespace ts {\n    export const x = 1;\n}\n",
    );

    let code = driver::run(Some("unindent"), dir.path()).unwrap();
    assert_eq!(code, 0);
    let a = read_file(dir.path(), "src/compiler/a.ts");
    assert!(a.contains("\nexport const x = 1;\n"), "got: {a}");
    assert!(a.contains("namespace ts"), "only unindent ran: {a}");
}

#[test]
fn noop_checks_a_healthy_project_without_transforming() {
    let dir = TempDir::new().unwrap();
    let source = "namespace ts {\n    export const x = 1;\n}\n";
    write_file(dir.path(), "src/compiler/a.ts", source);

    let code = driver::run(Some("noop"), dir.path()).unwrap();
    assert_eq!(code, 0);
    assert_eq!(read_file(dir.path(), "src/compiler/a.ts"), source);
}

#[test]
fn unknown_pass_is_rejected_before_any_mutation() {
    let dir = TempDir::new().unwrap();
    let source = "namespace ts {\n    export const x = 1;\n}\n";
    write_file(dir.path(), "src/compiler/a.ts", source);

    let code = driver::run(Some("minify"), dir.path()).unwrap();
    assert_ne!(code, 0);
    assert_eq!(read_file(dir.path(), "src/compiler/a.ts"), source);
}

#[test]
fn batch_aborts_on_diagnostics_and_discards_work() {
    let dir = TempDir::new().unwrap();
    let broken = "import { x } from \"./missing\";\nnamespace ts {\n    export const y = 1;\n}\n";
    write_file(dir.path(), "src/compiler/a.ts", broken);

    let code = driver::run(None, dir.path()).unwrap();
    assert_eq!(code, 1);
    // The failed batch must not have flushed anything.
    assert_eq!(read_file(dir.path(), "src/compiler/a.ts"), broken);

    // Single-pass mode reports the same diagnostics but is not fatal.
    let code = driver::run(Some("noop"), dir.path()).unwrap();
    assert_eq!(code, 0);
}

#[test]
fn batch_rewrites_config_units() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "src/compiler/a.ts",
        "namespace ts {\n    export const x = 1;\n}\n",
    );
    write_file(
        dir.path(),
        "src/compiler/tsconfig.json",
        "{ \"compilerOptions\": { \"outFile\": \"../../built/local/tsc.js\" }, \"files\": [\"a.ts\"] }\n",
    );

    let code = driver::run(None, dir.path()).unwrap();
    assert_eq!(code, 0);

    let config = read_file(dir.path(), "src/compiler/tsconfig.json");
    assert!(!config.contains("outFile"), "got: {config}");
    assert!(config.contains("\"outDir\": \"../../built/local\""), "got: {config}");
    assert!(config.contains("./_namespaces/ts.ts"), "barrel registered: {config}");

    let barrel = read_file(dir.path(), "src/compiler/_namespaces/ts.ts");
    assert!(barrel.contains("export * from \"../a\";"), "got: {barrel}");
}

#[test]
fn project_argument_accepts_the_root_config_file() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "src/compiler/a.ts",
        "namespace ts {\n    export const x = 1;\n}\n",
    );
    write_file(dir.path(), "src/tsconfig-base.json", "{ \"files\": [] }\n");

    let code = driver::run(Some("noop"), &dir.path().join("src/tsconfig-base.json")).unwrap();
    assert_eq!(code, 0);
}
