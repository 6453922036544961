//! bnd-ctypes: C header → Python ctypes binding generator.
//!
//! Parses C sources via libclang, resolves every C type spelling to its
//! ctypes equivalent and emits one Python module with the typedefs, macros,
//! enums, structs, unions and a loader class for the functions.
//!
//! # Quick start
//!
//! Generate the module from a config and write it to disk:
//!
//! ```no_run
//! use std::path::Path;
//!
//! bnd_ctypes::run(Path::new("bnd-ctypes.toml"), None).unwrap();
//! ```
//!
//! Or get the text without writing to disk:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let module = bnd_ctypes::generate(Path::new("bnd-ctypes.toml")).unwrap();
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub mod config;
pub mod emit;
pub mod error;
pub mod extract;
pub mod generate;
pub mod handlers;
pub mod model;
pub mod registry;
pub mod resolve;
pub mod spelling;

pub use error::Error;

/// Run the full pipeline: load config, parse the sources, emit the module,
/// and write the output file.
///
/// `config_path` is the path to a `bnd-ctypes.toml` configuration file.
/// `output` optionally overrides the output file path from the config.
///
/// Returns the path the module was written to.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let module = generate_from_config(&cfg, base_dir)?;

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => base_dir.join(&cfg.output.file),
    };
    std::fs::write(&output_path, &module)
        .with_context(|| format!("writing output to {}", output_path.display()))?;

    info!(
        path = %output_path.display(),
        size = module.len(),
        "wrote bindings"
    );

    Ok(output_path)
}

/// Parse a `bnd-ctypes.toml` config file, extract declarations from the
/// referenced sources, and return the generated module text without writing
/// to disk.
pub fn generate(config_path: &Path) -> Result<String> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    generate_from_config(&cfg, base_dir)
}

/// Generate the module text from an already-loaded [`config::Config`].
///
/// `base_dir` is the directory relative to which the project root in the
/// config is resolved (typically the parent directory of the TOML file).
pub fn generate_from_config(cfg: &config::Config, base_dir: &Path) -> Result<String> {
    let files = extract::existing_sources(&cfg.source_files(base_dir))?;
    info!(
        files = files.len(),
        hidden = cfg.hidden_types.len(),
        "loaded configuration"
    );

    let clang =
        clang::Clang::new().map_err(|e| anyhow::anyhow!("failed to initialize libclang: {e}"))?;
    let index = clang::Index::new(&clang, false, false);

    let args = cfg.clang_arguments(base_dir);
    let mut units = Vec::new();
    for file in &files {
        units.push(extract::extract_unit(&index, file, &args)?);
    }

    let ctx = registry::TypeContext::with_hidden_types(cfg.hidden_types.iter().cloned());
    let bindings = generate::Generator::run(ctx, cfg.functions.clone(), &units);

    let project = cfg.project_dir(base_dir);
    let module = emit::emit_module(
        &bindings,
        &emit::EmitOptions {
            project: &project,
            library: &cfg.output.library,
        },
    );

    info!(
        typedefs = bindings.typedefs.len(),
        macros = bindings.macros.len(),
        enums = bindings.enums.len(),
        aggregates = bindings.aggregates.len(),
        functions = bindings.functions.len(),
        "generated bindings"
    );

    Ok(module)
}
