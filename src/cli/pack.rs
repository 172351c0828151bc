//! Pack command implementation

use anyhow::{Context, Result};
use clap::Args;
use console::Style;
use std::path::PathBuf;

use super::utils::{check_main_tex, parse_archive_format, parse_compiler, parse_csv, resolve_config};
use crate::config::CliOverrides;
use crate::package::{pack_project, PackReport};
use crate::utils::{format_kb, to_slash};

#[derive(Args)]
pub struct PackArgs {
    /// Root LaTeX file of the project
    #[arg(value_name = "MAIN_TEX")]
    pub main_tex: PathBuf,

    /// Staging directory (default: <project dir>_arXiv next to the project)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Rename the root file inside the archive (.tex is appended if missing)
    #[arg(long, value_name = "NEW_NAME")]
    pub rename: Option<String>,

    /// Delete and re-create an existing staging directory
    #[arg(short, long)]
    pub force: bool,

    /// Write the git commit of the project as a comment on the first line
    #[arg(long)]
    pub git_hash: bool,

    /// Skip the LaTeX build (no .bbl is generated and no PDF is written)
    #[arg(long)]
    pub no_compile: bool,

    /// LaTeX toolchain: latexmk|pdflatex (pdflatex runs bibtex, or biber for biblatex)
    #[arg(long, value_name = "COMPILER")]
    pub compiler: Option<String>,

    /// Archive format: tar|tar.gz
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Encodings tried when reading sources (comma-separated, e.g. 'utf-8,latin1')
    #[arg(long, value_name = "LIST")]
    pub encodings: Option<String>,

    /// Extra files to ship verbatim (comma-separated globs, e.g. '00README.json,*.cls')
    #[arg(long, value_name = "GLOBS")]
    pub include: Option<String>,

    /// Path to config file (arxiv-pack.toml or .arxiv-pack.yml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

pub fn run(args: PackArgs) -> Result<()> {
    check_main_tex(&args.main_tex)?;

    let compiler = args.compiler.as_deref().map(parse_compiler).transpose()?;
    let archive_format = args.format.as_deref().map(parse_archive_format).transpose()?;

    let cli_overrides = CliOverrides {
        out_dir: args.out_dir.clone(),
        rename: args.rename.clone(),
        encodings: parse_csv(&args.encodings),
        compile: if args.no_compile { Some(false) } else { None },
        compiler,
        archive_format,
        store_git_hash: if args.git_hash { Some(true) } else { None },
        force: if args.force { Some(true) } else { None },
        always_include: parse_csv(&args.include),
    };
    let config = resolve_config(&args.main_tex, args.config.as_deref(), cli_overrides)?;

    let report = pack_project(&args.main_tex, &config)
        .with_context(|| format!("Failed to pack {}", args.main_tex.display()))?;
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &PackReport) {
    let header = Style::new().green().bold();
    let dim = Style::new().dim();
    let warn = Style::new().yellow();
    let stats = &report.stats;

    println!();
    println!("{}", header.apply_to("Packing complete!"));
    println!();
    println!("Statistics:");
    println!("  Main file:       {}", to_slash(&report.main_file));
    println!("  Documents:       {}", stats.documents);
    println!("  Support files:   {}", stats.support_files);
    println!("  Assets:          {}", stats.assets);
    if stats.extra_files > 0 {
        println!("  Extra files:     {}", stats.extra_files);
    }
    println!("  Pruned files:    {}", stats.pruned_files);
    println!("  Total size:      {}", format_kb(stats.total_bytes));
    if let Some(hash) = &report.git_hash {
        println!("  Git commit:      {hash}");
    }
    println!("  Processing time: {:.2}s", stats.processing_time_seconds);

    if !stats.largest_files.is_empty() {
        println!();
        println!("Largest files:");
        for (bytes, path) in &stats.largest_files {
            println!("  {:>10}  {path}", format_kb(*bytes));
        }
    }

    if !report.unresolved.is_empty() {
        println!();
        let title = format!("Unresolved references ({}):", report.unresolved.len());
        println!("{}", warn.apply_to(title));
        for missing in &report.unresolved {
            let r = &missing.reference;
            println!(
                "  \\{}{{{}}} {} {}",
                r.command,
                r.tex_path,
                dim.apply_to(format!("({}:{})", to_slash(&r.document), r.line)),
                missing.reason
            );
        }
    }

    println!();
    println!("Output files:");
    println!("  {}", report.archive.display());
    println!("  {}", dim.apply_to(format!("sha256 {}", report.archive_sha256)));
    if let Some(pdf) = &report.pdf {
        println!("  {}", pdf.display());
    }
    println!("  {} {}", report.staging_dir.display(), dim.apply_to("(staging)"));
    if report.has_bibliography && report.bbl.is_none() {
        println!();
        println!("{}", warn.apply_to("No .bbl in the archive; arXiv will not run BibTeX."));
    }
}
