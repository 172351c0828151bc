//! LaTeX toolchain invocation.
//!
//! The build runs inside the staging directory. Afterwards every file the
//! build created is classified: the `.bbl` stays (arXiv does not run BibTeX),
//! the PDF is moved out for review, everything else is deleted.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::{BibliographyTool, CompilerKind};
use crate::error::{PackError, Result};
use crate::utils::to_slash;

/// Lines of compiler output kept in a `CompileFailed` error.
const OUTPUT_TAIL_LINES: usize = 40;

/// One external command of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub program: String,
    pub args: Vec<String>,
}

impl BuildStep {
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// What a successful build left behind.
#[derive(Debug, Clone, Default)]
pub struct CompileOutcome {
    /// `.bbl` inside the staging directory (relative), if one exists
    pub bbl: Option<PathBuf>,
    /// Where the PDF was moved to
    pub pdf: Option<PathBuf>,
    /// Build by-products deleted from the staging directory
    pub removed: Vec<PathBuf>,
}

/// Commands needed to build `main_file` (relative to the staging directory).
///
/// The bibliography program only runs when the document has a bibliography,
/// since BibTeX exits with an error on documents without `\citation`s.
pub fn build_steps(
    compiler: CompilerKind,
    main_file: &Path,
    bibliography: BibliographyTool,
) -> Vec<BuildStep> {
    let main = to_slash(main_file);
    let latex_args = || {
        vec!["-interaction=nonstopmode".to_string(), "-halt-on-error".to_string(), main.clone()]
    };
    match compiler {
        CompilerKind::Latexmk => {
            let mut args = vec!["-pdf".to_string()];
            args.extend(latex_args());
            vec![BuildStep { program: "latexmk".to_string(), args }]
        }
        CompilerKind::Pdflatex => {
            let mut steps = vec![BuildStep { program: "pdflatex".to_string(), args: latex_args() }];
            if let Some(program) = bibliography.program() {
                let stem = main_file.with_extension("");
                steps.push(BuildStep { program: program.to_string(), args: vec![to_slash(&stem)] });
            }
            steps.push(BuildStep { program: "pdflatex".to_string(), args: latex_args() });
            steps.push(BuildStep { program: "pdflatex".to_string(), args: latex_args() });
            steps
        }
    }
}

/// Build the document in `staging`, keep its `.bbl`, move the PDF to
/// `pdf_dest` and delete every other file the build created.
pub fn compile_and_keep_bbl(
    staging: &Path,
    main_file: &Path,
    compiler: CompilerKind,
    pdf_dest: &Path,
    bibliography: BibliographyTool,
) -> Result<CompileOutcome> {
    info!("Compiling {} with {}", to_slash(main_file), compiler.as_str());
    let steps = build_steps(compiler, main_file, bibliography);
    run_build(staging, &steps, main_file, pdf_dest, bibliography != BibliographyTool::None)
}

/// Run `steps` in `staging` and sort out what they created.
fn run_build(
    staging: &Path,
    steps: &[BuildStep],
    main_file: &Path,
    pdf_dest: &Path,
    require_bbl: bool,
) -> Result<CompileOutcome> {
    let before = snapshot(staging)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix("Compiling");
    spinner.enable_steady_tick(Duration::from_millis(80));

    for step in steps {
        spinner.set_message(step.command_line());
        let result = run_step(staging, step);
        if result.is_err() {
            spinner.finish_and_clear();
        }
        result?;
    }
    spinner.finish_and_clear();

    let after = snapshot(staging)?;
    let bbl = main_file.with_extension("bbl");
    let pdf = main_file.with_extension("pdf");

    let mut outcome = CompileOutcome::default();
    for created in after.difference(&before) {
        let path = staging.join(created);
        if *created == bbl {
            debug!("Keeping {}", to_slash(created));
        } else if *created == pdf {
            move_file(&path, pdf_dest)?;
            info!("PDF written to {}", pdf_dest.display());
            outcome.pdf = Some(pdf_dest.to_path_buf());
        } else {
            debug!("Removing build file {}", to_slash(created));
            fs::remove_file(&path).map_err(|e| PackError::io(&path, e))?;
            outcome.removed.push(created.clone());
        }
    }

    if staging.join(&bbl).is_file() {
        outcome.bbl = Some(bbl);
    } else if require_bbl {
        return Err(PackError::MissingBbl { dir: staging.to_path_buf() });
    } else {
        debug!("No .bbl produced; the document has no bibliography");
    }
    if outcome.pdf.is_none() {
        warn!("The build did not produce {}", to_slash(&pdf));
    }
    Ok(outcome)
}

fn run_step(dir: &Path, step: &BuildStep) -> Result<()> {
    debug!("Running {} in {}", step.command_line(), dir.display());
    let output = match Command::new(&step.program).args(&step.args).current_dir(dir).output() {
        Ok(output) => output,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PackError::CompilerNotFound { program: step.program.clone() });
        }
        Err(e) => return Err(PackError::io(dir, e)),
    };
    if output.status.success() {
        return Ok(());
    }
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Err(PackError::CompileFailed {
        command: step.command_line(),
        status: output.status.to_string(),
        output: tail(&text, OUTPUT_TAIL_LINES),
    })
}

/// The last `n` lines of `text`.
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// Relative paths of all files under `dir`.
fn snapshot(dir: &Path) -> Result<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| PackError::io(dir, e.into()))?;
        if entry.file_type().is_file() {
            if let Ok(rel) = entry.path().strip_prefix(dir) {
                files.insert(rel.to_path_buf());
            }
        }
    }
    Ok(files)
}

/// Rename, falling back to copy + delete across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| PackError::io(to, e))?;
    fs::remove_file(from).map_err(|e| PackError::io(from, e))
}
