//! Configuration loading.
//!
//! Values are layered, later layers winning: built-in defaults, a config
//! file (`arxiv-pack.toml` / `.arxiv-pack.yml` in the project directory, or
//! the file passed with `--config`), `ARXIV_PACK_*` environment variables,
//! and finally command-line flags (see [`merge_cli_with_config`]).

mod merge;

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Toml, Yaml};
use figment::Figment;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::Config;

pub use merge::{merge_cli_with_config, CliOverrides};

/// File names searched for in the project directory, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    "arxiv-pack.toml",
    ".arxiv-pack.toml",
    "arxiv-pack.yml",
    ".arxiv-pack.yml",
    ".arxiv-pack.yaml",
];

pub const ENV_PREFIX: &str = "ARXIV_PACK_";

/// First config file present in `dir`.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES.iter().map(|name| dir.join(name)).find(|p| p.is_file())
}

/// Load the configuration for a project rooted at `anchor`.
///
/// An explicit file must exist; an implicit one is optional.
pub fn load_config(anchor: &Path, explicit: Option<&Path>) -> Result<Config> {
    let file = match explicit {
        Some(path) => {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            Some(path.to_path_buf())
        }
        None => find_config_file(anchor),
    };

    let mut figment = Figment::new();
    if let Some(path) = &file {
        debug!("Loading config from {}", path.display());
        figment = merge_file(figment, path)?;
    }
    figment = figment.merge(Env::prefixed(ENV_PREFIX));

    let config: Config = figment.extract().with_context(|| match &file {
        Some(path) => format!("Invalid configuration in {}", path.display()),
        None => "Invalid configuration in environment".to_string(),
    })?;
    Ok(config)
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "toml" => Ok(figment.merge(Toml::file(path))),
        "yml" | "yaml" => Ok(figment.merge(Yaml::file(path))),
        other => {
            bail!("Unsupported config format '{other}' for {} (use .toml or .yml)", path.display())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArchiveFormat, CompilerKind};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let dir = TempDir::new().expect("tmp");
        let config = load_config(dir.path(), None).expect("load");
        assert_eq!(config.encodings, vec!["utf-8"]);
        assert!(config.compile);
        assert_eq!(config.archive_format, ArchiveFormat::TarGz);
        assert_eq!(config.max_delete_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn toml_file_in_project_dir() {
        let dir = TempDir::new().expect("tmp");
        fs::write(
            dir.path().join("arxiv-pack.toml"),
            concat!(
                "encodings = \"utf-8, latin1\"\n",
                "compiler = \"pdflatex\"\n",
                "archive_format = \"tar\"\n",
                "always_include = [\"00README.json\"]\n",
                "image_extensions = [\"PNG\", \"pdf\"]\n",
            ),
        )
        .expect("write");
        let config = load_config(dir.path(), None).expect("load");
        assert_eq!(config.encodings, vec!["utf-8", "latin1"]);
        assert_eq!(config.compiler, CompilerKind::Pdflatex);
        assert_eq!(config.archive_format, ArchiveFormat::Tar);
        assert_eq!(config.always_include, vec!["00README.json"]);
        assert_eq!(config.image_extensions, vec![".png", ".pdf"]);
    }

    #[test]
    fn explicit_yaml_file() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("custom.yml");
        fs::write(&path, "git_hash: true\ncompile: false\nrename: final\n").expect("write");
        let config = load_config(dir.path(), Some(&path)).expect("load");
        assert!(config.store_git_hash);
        assert!(!config.compile);
        assert_eq!(config.rename.as_deref(), Some("final"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().expect("tmp");
        let err =
            load_config(dir.path(), Some(&dir.path().join("nope.toml"))).expect_err("missing");
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn invalid_value_names_the_file() {
        let dir = TempDir::new().expect("tmp");
        fs::write(dir.path().join("arxiv-pack.toml"), "compiler = \"xelatex\"\n").expect("write");
        let err = load_config(dir.path(), None).expect_err("invalid");
        assert!(format!("{err:#}").contains("arxiv-pack.toml"));
    }
}
