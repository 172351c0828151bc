//! Strip command implementation

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;

use super::utils::parse_csv;
use crate::latex::strip_text;
use crate::utils::read_with_encodings;

#[derive(Args)]
pub struct StripArgs {
    /// LaTeX file to sanitize
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Write to this file instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Encodings tried when reading the file (comma-separated)
    #[arg(long, value_name = "LIST", default_value = "utf-8")]
    pub encodings: Option<String>,
}

pub fn run(args: StripArgs) -> Result<()> {
    let encodings = parse_csv(&args.encodings).unwrap_or_default();
    let (text, _) = read_with_encodings(&args.file, &encodings)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let stripped = strip_text(&text);

    match &args.output {
        Some(path) => {
            fs::write(path, stripped)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => print!("{stripped}"),
    }
    Ok(())
}
