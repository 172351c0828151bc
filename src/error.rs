//! Error types for the packing pipeline.
//!
//! Every variant is fatal: the pipeline stops and the CLI prints the message.
//! Recoverable conditions (an image that cannot be found, a guessed file
//! encoding) are logged with `tracing::warn!` instead of being returned here.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the parser, compiler invoker and packager.
#[derive(Debug, Error)]
pub enum PackError {
    // ── Parsing ───────────────────────────────────────────────────────────
    /// An `\input`-style directive points at a file that does not exist.
    #[error("File not found: '{target}' (included from {from}:{line})")]
    MissingInclude { target: String, from: PathBuf, line: usize },

    /// A document includes itself, directly or transitively.
    #[error("Circular include: {}", format_cycle(.cycle))]
    IncludeCycle { cycle: Vec<PathBuf> },

    /// A directive names a file with the wrong extension, e.g. `\bibliography{refs.bbl}`.
    #[error("Invalid include in {from}:{line}: expected a {expected} file, got '{target}'")]
    InvalidInclude { target: String, expected: &'static str, from: PathBuf, line: usize },

    /// `\newcommand` used on a command that was already defined.
    #[error("Redefinition of {name} with \\newcommand in {from}:{line} (use \\renewcommand)")]
    Redefinition { name: String, from: PathBuf, line: usize },

    /// A command definition never closes its braces.
    #[error("Unbalanced braces in definition starting at {from}:{line}")]
    UnbalancedBraces { from: PathBuf, line: usize },

    /// User command expansion recursed too deeply (self-referential macro).
    #[error("Expansion of {name} exceeded {limit} nested levels")]
    MacroDepth { name: String, limit: usize },

    // ── Compilation ───────────────────────────────────────────────────────
    /// The LaTeX toolchain binary is not on PATH.
    #[error(
        "Compiler '{program}' not found on PATH.\nInstall a TeX distribution or pass --no-compile."
    )]
    CompilerNotFound { program: String },

    /// The LaTeX toolchain exited with a non-zero status.
    #[error("`{command}` failed with {status}\n--- compiler output (tail) ---\n{output}")]
    CompileFailed { command: String, status: String, output: String },

    /// The document declares a bibliography but the build produced no `.bbl`.
    #[error("No .bbl file was produced in {dir}; the bibliography would be missing on arXiv")]
    MissingBbl { dir: PathBuf },

    // ── Output ────────────────────────────────────────────────────────────
    /// The staging directory already exists and `--force` was not given.
    #[error("Output directory {path} exists! Delete it or pass --force.")]
    OutputExists { path: PathBuf },

    /// `--force` was given but the directory is too large to delete blindly.
    #[error("Will not delete {path}: larger than {limit} bytes. Please delete it manually.")]
    RefuseToDelete { path: PathBuf, limit: u64 },

    /// The staging directory is the project itself or one of its parents.
    #[error("Output directory {path} would overwrite the project; choose another --out-dir")]
    OutputOverlapsProject { path: PathBuf },

    /// `--rename` must name a file, not a path.
    #[error("Invalid --rename '{name}': expected a plain file name without directories")]
    InvalidRename { name: String },

    /// An `always_include` glob does not compile.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PackError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackError::Io { path: path.into(), source }
    }
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> ")
}

pub type Result<T> = std::result::Result<T, PackError>;

#[cfg(test)]
mod tests {
    use super::PackError;
    use std::path::PathBuf;

    #[test]
    fn cycle_message_lists_the_whole_path() {
        let err = PackError::IncludeCycle {
            cycle: vec![
                PathBuf::from("main.tex"),
                PathBuf::from("a.tex"),
                PathBuf::from("main.tex"),
            ],
        };
        assert_eq!(err.to_string(), "Circular include: main.tex -> a.tex -> main.tex");
    }

    #[test]
    fn missing_include_names_offending_path() {
        let err = PackError::MissingInclude {
            target: "sections/intro.tex".to_string(),
            from: PathBuf::from("main.tex"),
            line: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("sections/intro.tex"));
        assert!(msg.contains("main.tex:12"));
    }
}
