//! List command implementation

use anyhow::{Context, Result};
use clap::Args;
use console::Style;
use serde_json::json;
use std::path::PathBuf;

use super::utils::{check_main_tex, parse_csv, resolve_config};
use crate::config::CliOverrides;
use crate::domain::BundleSource;
use crate::latex::parse_project;
use crate::package::assemble_bundle;
use crate::resolve::resolve_assets;
use crate::utils::to_slash;

#[derive(Args)]
pub struct ListArgs {
    /// Root LaTeX file of the project
    #[arg(value_name = "MAIN_TEX")]
    pub main_tex: PathBuf,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,

    /// Encodings tried when reading sources (comma-separated)
    #[arg(long, value_name = "LIST")]
    pub encodings: Option<String>,

    /// Path to config file (arxiv-pack.toml or .arxiv-pack.yml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

pub fn run(args: ListArgs) -> Result<()> {
    check_main_tex(&args.main_tex)?;
    let overrides =
        CliOverrides { encodings: parse_csv(&args.encodings), ..CliOverrides::default() };
    let config = resolve_config(&args.main_tex, args.config.as_deref(), overrides)?;

    let project = parse_project(&args.main_tex, &config.encodings)
        .with_context(|| format!("Failed to parse {}", args.main_tex.display()))?;
    let resolution = resolve_assets(&project, &config.image_extensions);
    let bundle = assemble_bundle(&project, &resolution, &config, None)?;

    if args.json {
        let files: Vec<_> = bundle
            .entries
            .iter()
            .map(|(path, source)| {
                let kind = match source {
                    BundleSource::Sanitized(_) => "sanitized",
                    BundleSource::Copy(_) => "copy",
                    BundleSource::Generated => "generated",
                };
                json!({ "path": to_slash(path), "source": kind })
            })
            .collect();
        let unresolved: Vec<_> = resolution
            .unresolved
            .iter()
            .map(|u| {
                json!({
                    "path": u.reference.tex_path,
                    "command": u.reference.command,
                    "document": to_slash(&u.reference.document),
                    "line": u.reference.line,
                    "reason": u.reason,
                })
            })
            .collect();
        let report = json!({
            "root_dir": project.root_dir,
            "main_file": to_slash(&bundle.main_file),
            "documents": project.documents.iter().map(|d| json!({
                "path": to_slash(&d.path),
                "kind": d.kind,
                "encoding": d.encoding,
            })).collect::<Vec<_>>(),
            "files": files,
            "unresolved": unresolved,
            "has_bibliography": project.has_bibliography,
            "bibliography_tool": project.bibliography_tool(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let bold = Style::new().bold();
    let warn = Style::new().yellow();
    println!("{}", bold.apply_to(format!("Files to pack ({}):", bundle.entries.len())));
    for (path, source) in &bundle.entries {
        let marker = if matches!(source, BundleSource::Sanitized(_)) { " (stripped)" } else { "" };
        println!("  {}{marker}", to_slash(path));
    }
    if !resolution.unresolved.is_empty() {
        println!();
        let title = format!("Unresolved references ({}):", resolution.unresolved.len());
        println!("{}", warn.apply_to(title));
        for u in &resolution.unresolved {
            println!(
                "  \\{}{{{}}} ({}:{})",
                u.reference.command,
                u.reference.tex_path,
                to_slash(&u.reference.document),
                u.reference.line
            );
        }
    }
    Ok(())
}
