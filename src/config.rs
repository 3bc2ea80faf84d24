use std::path::{Component, Path, PathBuf};

pub const SETTINGS_FILE: &str = "allure-world.toml";
pub const DEFAULT_FORMATTER_PATH: &str = "support/allure-formatter.ts";
pub const DEFAULT_FORMATTER_OUT_PATH: &str = "../out/allure-results";
pub const DEFAULT_MODULE_LOADER: &str = "ts-node/register";
/// The formatter's own output file; nothing reads it back.
pub const THROWAWAY_FORMAT_TARGET: &str = ".dummy.txt";

/// Derived per-run configuration. Built fresh by every `run()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub cwd: PathBuf,
    pub formatter: PathBuf,
    pub results_dir: PathBuf,
    pub argv: Vec<String>,
}

impl RunConfig {
    pub fn new(
        tmp_dir: &Path,
        formatter_path: &str,
        formatter_out_path: &str,
        module_loader: &str,
        extra_args: &[String],
    ) -> Self {
        let formatter = tmp_dir.join(formatter_path);
        let results_dir = normalize_lexically(&tmp_dir.join(formatter_out_path));
        // leading slots mirror the interpreter/script entries of a process argv
        let mut argv = vec![
            String::new(),
            String::new(),
            "--backtrace".to_owned(),
            format!("--require-module={module_loader}"),
            format!(
                "--format={}:{THROWAWAY_FORMAT_TARGET}",
                formatter.display()
            ),
        ];
        argv.extend(extra_args.iter().cloned());
        Self {
            cwd: tmp_dir.to_path_buf(),
            formatter,
            results_dir,
            argv,
        }
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Optional overrides read from `allure-world.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessSettings {
    #[serde(default)]
    pub formatter_path: Option<String>,
    #[serde(default)]
    pub formatter_out_path: Option<String>,
    #[serde(default)]
    pub module_loader: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug)]
pub enum SettingsError {
    Read {
        path: PathBuf,
        error: std::io::Error,
    },
    Parse {
        path: PathBuf,
        error: toml::de::Error,
    },
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Read { path, error } => {
                write!(f, "failed to read {}: {error}", path.display())
            }
            SettingsError::Parse { path, error } => {
                write!(f, "failed to parse {}: {error}", path.display())
            }
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Read { error, .. } => Some(error),
            SettingsError::Parse { error, .. } => Some(error),
        }
    }
}

impl HarnessSettings {
    pub fn parse(raw: &str, path: &Path) -> Result<Self, SettingsError> {
        toml::from_str(raw).map_err(|error| SettingsError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|error| SettingsError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        Self::parse(&raw, path)
    }

    /// Reads `allure-world.toml` from `dir`, falling back to defaults when absent.
    pub fn discover(dir: &Path) -> Result<Self, SettingsError> {
        let path = dir.join(SETTINGS_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
