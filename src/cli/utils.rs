//! Shared argument parsing helpers

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::{load_config, merge_cli_with_config, CliOverrides};
use crate::domain::{ArchiveFormat, CompilerKind, Config};

/// Split a comma-separated flag value, dropping empty items.
pub fn parse_csv(value: &Option<String>) -> Option<Vec<String>> {
    value
        .as_ref()
        .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
}

pub fn parse_compiler(value: &str) -> Result<CompilerKind> {
    match value.to_ascii_lowercase().as_str() {
        "latexmk" => Ok(CompilerKind::Latexmk),
        "pdflatex" => Ok(CompilerKind::Pdflatex),
        invalid => anyhow::bail!("Invalid compiler '{invalid}'. Use: latexmk|pdflatex"),
    }
}

pub fn parse_archive_format(value: &str) -> Result<ArchiveFormat> {
    match value.to_ascii_lowercase().as_str() {
        "tar" => Ok(ArchiveFormat::Tar),
        "tar.gz" | "tgz" | "targz" => Ok(ArchiveFormat::TarGz),
        invalid => anyhow::bail!("Invalid archive format '{invalid}'. Use: tar|tar.gz"),
    }
}

/// Check that `main_tex` names an existing `.tex` file.
pub fn check_main_tex(main_tex: &Path) -> Result<()> {
    if !main_tex.is_file() {
        anyhow::bail!("Main file not found: {}", main_tex.display());
    }
    if main_tex.extension().and_then(|e| e.to_str()) != Some("tex") {
        anyhow::bail!("Expected a .tex file, got {}", main_tex.display());
    }
    Ok(())
}

/// Project directory used to look up the config file.
pub fn config_anchor(main_tex: &Path) -> Result<PathBuf> {
    let absolute = main_tex.canonicalize()?;
    Ok(absolute.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(".")))
}

/// Config file and environment merged with command-line overrides.
pub fn resolve_config(
    main_tex: &Path,
    config: Option<&Path>,
    overrides: CliOverrides,
) -> Result<Config> {
    let file_config = load_config(&config_anchor(main_tex)?, config)?;
    Ok(merge_cli_with_config(file_config, overrides))
}
