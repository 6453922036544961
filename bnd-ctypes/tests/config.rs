//! Configuration parsing and argument assembly.

use std::path::{Path, PathBuf};

use bnd_ctypes::Error;
use bnd_ctypes::config::{load_config, parse_config};

const FULL: &str = r#"
project = "lib"
files = ["include/header.h", "source.c"]
include_paths = ["include", "third_party"]
preprocessor = ["-DFOO=1", "-UBAR"]
clang_args = ["-std=c11"]
hidden_types = ["HANDLE"]

[output]
file = "out/bindings.py"
library = "./libfoo.so"

[functions]
skip_prefixes = ["internal_"]
skip_suffixes = []
"#;

#[test]
fn full_config() {
    let cfg = parse_config(FULL, Path::new("bnd-ctypes.toml")).unwrap();
    assert_eq!(cfg.project, PathBuf::from("lib"));
    assert_eq!(cfg.hidden_types, ["HANDLE"]);
    assert_eq!(cfg.output.file, PathBuf::from("out/bindings.py"));
    assert_eq!(cfg.output.library, "./libfoo.so");
    assert!(cfg.functions.excludes("internal_reset"));
    assert!(!cfg.functions.excludes("ColorToString"));

    let base = Path::new("/work");
    assert_eq!(
        cfg.source_files(base),
        [
            PathBuf::from("/work/lib/include/header.h"),
            PathBuf::from("/work/lib/source.c"),
        ]
    );
    assert_eq!(
        cfg.clang_arguments(base),
        [
            "-DFOO=1",
            "-UBAR",
            "-I/work/lib/include",
            "-I/work/lib/third_party",
            "-std=c11",
        ]
    );
}

#[test]
fn defaults() {
    let cfg = parse_config("files = [\"a.h\"]\n[output]\n", Path::new("x.toml")).unwrap();
    assert_eq!(cfg.project, PathBuf::from("."));
    assert_eq!(cfg.output.file, PathBuf::from("bindings.py"));
    assert_eq!(cfg.output.library, "./library.so");
    assert!(cfg.include_paths.is_empty());
    assert!(cfg.hidden_types.is_empty());
    for name in ["ENUMCount", "SDK_init", "ModeToString"] {
        assert!(cfg.functions.excludes(name), "{name} should be excluded by default");
    }
    assert!(!cfg.functions.excludes("reset"));
}

#[test]
fn absolute_project_is_kept() {
    let cfg = parse_config(
        "project = \"/abs\"\nfiles = [\"a.h\"]\n[output]\n",
        Path::new("x.toml"),
    )
    .unwrap();
    assert_eq!(cfg.project_dir(Path::new("/elsewhere")), PathBuf::from("/abs"));
}

#[test]
fn empty_file_list_is_malformed() {
    let err = parse_config("files = []\n[output]\n", Path::new("x.toml")).unwrap_err();
    assert!(matches!(err, Error::MalformedConfig { .. }), "got {err:?}");
}

#[test]
fn missing_required_fields_are_malformed() {
    let err = parse_config("[output]\n", Path::new("x.toml")).unwrap_err();
    assert!(matches!(err, Error::MalformedConfig { .. }), "got {err:?}");
    let err = parse_config("files = [\"a.h\"]\n", Path::new("x.toml")).unwrap_err();
    assert!(matches!(err, Error::MalformedConfig { .. }), "got {err:?}");
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = load_config(&path).unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::MissingConfig { path: path.clone() })
    );
}

#[test]
fn load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bnd-ctypes.toml");
    std::fs::write(&path, FULL).unwrap();
    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.files.len(), 2);
}
