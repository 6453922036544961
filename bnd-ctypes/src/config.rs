//! Configuration types for `bnd-ctypes.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Root configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Project root. Relative to the TOML file's directory.
    #[serde(default = "default_project")]
    pub project: PathBuf,
    /// Source files to process, relative to `project`. The order is the
    /// emission order.
    pub files: Vec<PathBuf>,
    /// Include search paths, relative to `project`. Injected as `-I` flags.
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    /// Preprocessor definitions and undefinitions in order, passed to clang
    /// as written (e.g. `-DFOO=1`, `-UBAR`).
    #[serde(default)]
    pub preprocessor: Vec<String>,
    /// Extra clang arguments appended after everything else.
    #[serde(default)]
    pub clang_args: Vec<String>,
    /// Types only ever used through a pointer; resolved to `c_void_p`.
    #[serde(default)]
    pub hidden_types: Vec<String>,
    pub output: OutputConfig,
    #[serde(default)]
    pub functions: FunctionFilter,
}

fn default_project() -> PathBuf {
    PathBuf::from(".")
}

/// Output file settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output file path, relative to the TOML file's directory.
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
    /// Library path the generated loader falls back to.
    #[serde(default = "default_library")]
    pub library: String,
}

fn default_output_file() -> PathBuf {
    PathBuf::from("bindings.py")
}

fn default_library() -> String {
    "./library.so".to_string()
}

/// Name patterns of functions that are never bound.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionFilter {
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,
    #[serde(default = "default_skip_suffixes")]
    pub skip_suffixes: Vec<String>,
}

fn default_skip_prefixes() -> Vec<String> {
    vec!["ENUM".to_string(), "SDK_".to_string()]
}

fn default_skip_suffixes() -> Vec<String> {
    vec!["ToString".to_string()]
}

impl Default for FunctionFilter {
    fn default() -> Self {
        Self {
            skip_prefixes: default_skip_prefixes(),
            skip_suffixes: default_skip_suffixes(),
        }
    }
}

impl FunctionFilter {
    pub fn excludes(&self, name: &str) -> bool {
        self.skip_prefixes.iter().any(|p| name.starts_with(p.as_str()))
            || self.skip_suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }
}

impl Config {
    /// Project root resolved against `base_dir`.
    pub fn project_dir(&self, base_dir: &Path) -> PathBuf {
        if self.project.is_absolute() {
            self.project.clone()
        } else {
            base_dir.join(&self.project)
        }
    }

    /// Source files resolved against the project root, in configured order.
    pub fn source_files(&self, base_dir: &Path) -> Vec<PathBuf> {
        let project = self.project_dir(base_dir);
        self.files.iter().map(|f| project.join(f)).collect()
    }

    /// clang arguments: preprocessor flags, `-I` flags, then extra args.
    pub fn clang_arguments(&self, base_dir: &Path) -> Vec<String> {
        let project = self.project_dir(base_dir);
        let mut args = self.preprocessor.clone();
        for inc in &self.include_paths {
            let flag = format!("-I{}", project.join(inc).display());
            if !args.contains(&flag) {
                args.push(flag);
            }
        }
        args.extend(self.clang_args.iter().cloned());
        args
    }
}

/// Parse configuration from TOML text. `path` is only used in errors.
pub fn parse_config(content: &str, path: &Path) -> Result<Config, Error> {
    let config: Config = toml::from_str(content).map_err(|e| Error::MalformedConfig {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if config.files.is_empty() {
        return Err(Error::MalformedConfig {
            path: path.to_path_buf(),
            reason: "`files` must list at least one source file".to_string(),
        });
    }
    Ok(config)
}

/// Load and parse a `bnd-ctypes.toml` configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Err(Error::MissingConfig {
            path: path.to_path_buf(),
        }
        .into());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    Ok(parse_config(&content, path)?)
}
