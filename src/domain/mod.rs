//! Core domain types and models
//!
//! Defines the parsed document tree, asset references, the bundle written to
//! the archive, and the tool configuration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// LaTeX toolchain used to produce the `.bbl` and the verification PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    /// `latexmk -pdf`, which reruns pdflatex/bibtex/biber as needed.
    #[default]
    Latexmk,
    /// `pdflatex`, `bibtex` (or `biber`), `pdflatex`, `pdflatex`.
    Pdflatex,
}

impl CompilerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CompilerKind::Latexmk => "latexmk",
            CompilerKind::Pdflatex => "pdflatex",
        }
    }
}

/// Program that turns citations into the `.bbl` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BibliographyTool {
    /// No bibliography is declared.
    #[default]
    None,
    /// Classic `\bibliography{}` documents.
    Bibtex,
    /// biblatex documents (`\addbibresource`, `\printbibliography`).
    Biber,
}

impl BibliographyTool {
    pub fn program(self) -> Option<&'static str> {
        match self {
            BibliographyTool::None => None,
            BibliographyTool::Bibtex => Some("bibtex"),
            BibliographyTool::Biber => Some("biber"),
        }
    }
}

/// Container format of the final upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ArchiveFormat {
    #[serde(rename = "tar")]
    Tar,
    #[default]
    #[serde(rename = "tar.gz", alias = "tgz")]
    TarGz,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

/// What an include directive pulls in, and how the parser treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeKind {
    /// `\input`, `\include`, `\subfile`: inlined LaTeX source.
    Source,
    /// `\usepackage` / `\RequirePackage` of a local `.sty`.
    Package,
    /// `\documentclass` with a local `.cls`.
    DocumentClass,
    /// `\bibliography` / `\addbibresource`.
    Bibliography,
    /// `\bibliographystyle` with a local `.bst`.
    BibStyle,
}

impl IncludeKind {
    /// Extension appended when the directive omits one.
    pub fn default_extension(self) -> &'static str {
        match self {
            IncludeKind::Source => "tex",
            IncludeKind::Package => "sty",
            IncludeKind::DocumentClass => "cls",
            IncludeKind::Bibliography => "bib",
            IncludeKind::BibStyle => "bst",
        }
    }

    /// Packages, classes and styles may come from the TeX distribution, so a
    /// missing local file is not an error for them.
    pub fn must_exist(self) -> bool {
        matches!(self, IncludeKind::Source | IncludeKind::Bibliography)
    }

    /// Whether the target is itself scanned for further directives.
    pub fn needs_parse(self) -> bool {
        matches!(self, IncludeKind::Source | IncludeKind::Package)
    }
}

/// One directive found in a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeDirective {
    pub kind: IncludeKind,

    /// Path exactly as written in the source
    pub tex_path: String,

    /// Project-relative file it resolved to, `None` for system packages/styles
    pub resolved: Option<PathBuf>,

    /// 1-indexed line in the including document
    pub line: usize,
}

/// A sanitized line together with the source line it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizedLine {
    /// 1-indexed line number in the raw file
    pub line: usize,
    pub text: String,
}

/// A parsed source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentNode {
    /// Path relative to the project root
    pub path: PathBuf,

    /// How this document was reached (`Source` for the root file)
    pub kind: IncludeKind,

    /// Encoding the file was decoded with
    pub encoding: String,

    #[serde(skip)]
    pub raw_lines: Vec<String>,

    #[serde(skip)]
    pub sanitized_lines: Vec<SanitizedLine>,

    pub includes: Vec<IncludeDirective>,
}

impl DocumentNode {
    /// Sanitized text of this document alone, newline-terminated.
    pub fn sanitized_text(&self) -> String {
        let mut out = String::new();
        for line in &self.sanitized_lines {
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }
}

/// A path extracted from an image-like inclusion command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    /// Path exactly as written in the source (after user-command expansion)
    pub tex_path: String,

    /// Command that referenced it, e.g. `includegraphics`
    pub command: String,

    /// Document containing the reference, relative to the project root
    pub document: PathBuf,

    /// 1-indexed line of the reference
    pub line: usize,
}

/// An asset reference matched to a file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedAsset {
    pub reference: AssetRef,
    /// Project-relative file
    pub path: PathBuf,
}

/// An asset reference that could not be matched and is left out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedAsset {
    pub reference: AssetRef,
    pub reason: String,
}

/// Result of matching every asset reference against the project directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetResolution {
    pub resolved: Vec<ResolvedAsset>,
    pub unresolved: Vec<UnresolvedAsset>,
}

impl AssetResolution {
    /// Distinct project-relative files required by the resolved references.
    pub fn required_files(&self) -> BTreeSet<PathBuf> {
        self.resolved.iter().map(|a| a.path.clone()).collect()
    }
}

/// Output of the parser: every reachable document and what it references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedProject {
    /// Absolute project directory (directory of the root file)
    pub root_dir: PathBuf,

    /// Root file, relative to `root_dir`
    pub root_file: PathBuf,

    /// Parsed documents in depth-first discovery order (root first)
    pub documents: Vec<DocumentNode>,

    /// Sanitized lines of the root with `\input`-style includes inlined
    #[serde(skip)]
    pub combined: Vec<String>,

    /// Resolved `.bib`, `.bst` and `.cls` files (not parsed)
    pub support_files: BTreeSet<PathBuf>,

    /// Asset references in discovery order
    pub assets: Vec<AssetRef>,

    /// Directories registered with `\graphicspath`, relative to the root
    pub graphics_paths: Vec<String>,

    /// Whether any bibliography directive was seen
    pub has_bibliography: bool,

    /// Whether the bibliography is managed by biblatex
    pub uses_biblatex: bool,
}

impl ParsedProject {
    /// The combined document text, newline-terminated.
    pub fn combined_text(&self) -> String {
        let mut out = self.combined.join("\n");
        out.push('\n');
        out
    }

    pub fn document(&self, path: &Path) -> Option<&DocumentNode> {
        self.documents.iter().find(|d| d.path == path)
    }

    pub fn bibliography_tool(&self) -> BibliographyTool {
        match (self.has_bibliography, self.uses_biblatex) {
            (false, _) => BibliographyTool::None,
            (true, false) => BibliographyTool::Bibtex,
            (true, true) => BibliographyTool::Biber,
        }
    }
}

/// Where the bytes of a bundle entry come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSource {
    /// Comment-stripped LaTeX written as UTF-8.
    Sanitized(String),
    /// Absolute path copied byte-for-byte.
    Copy(PathBuf),
    /// Produced inside the staging directory by the compiler (the `.bbl`).
    Generated,
}

/// Final mapping from archive path to content.
///
/// Only files reachable from the root through includes and asset references,
/// explicitly requested extra files, and the compiled `.bbl` may appear here.
#[derive(Debug, Clone, Default)]
pub struct ProjectBundle {
    pub entries: BTreeMap<PathBuf, BundleSource>,
    /// Archive path of the root document
    pub main_file: PathBuf,
}

impl ProjectBundle {
    pub fn paths(&self) -> BTreeSet<PathBuf> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }
}

/// Statistics reported after packing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackStats {
    pub documents: usize,
    pub support_files: usize,
    pub assets: usize,
    pub unresolved_assets: usize,
    pub extra_files: usize,
    /// Files removed from the staging directory by the final filter
    pub pruned_files: usize,
    pub total_bytes: u64,
    /// (size, archive path) of the biggest files, largest first
    pub largest_files: Vec<(u64, String)>,
    pub processing_time_seconds: f64,
}

/// Custom deserializer for lists: accepts a comma-separated string or an array.
///
/// Lets `ARXIV_PACK_ENCODINGS=utf-8,latin1` and `encodings = ["utf-8"]` both work.
fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct ListVisitor;

    impl<'de> Visitor<'de> for ListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a comma-separated string or an array of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut result = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                let trimmed = item.trim();
                if !trimmed.is_empty() {
                    result.push(trimmed.to_string());
                }
            }
            Ok(result)
        }
    }

    deserializer.deserialize_any(ListVisitor)
}

/// Same as [`deserialize_list`], normalising entries to dot-prefixed extensions.
fn deserialize_extensions<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(deserialize_list(deserializer)?.into_iter().map(|e| normalize_extension(&e)).collect())
}

pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().to_ascii_lowercase();
    if trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{trimmed}")
    }
}

/// Main configuration for arxiv-pack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Staging directory; defaults to `<project dir>_arXiv`
    #[serde(default)]
    pub out_dir: Option<PathBuf>,

    /// New name for the root file inside the bundle
    #[serde(default)]
    pub rename: Option<String>,

    /// Encodings tried, in order, when reading `.tex` files
    #[serde(default = "default_encodings", deserialize_with = "deserialize_list")]
    pub encodings: Vec<String>,

    /// Run the LaTeX toolchain to obtain the `.bbl` and a PDF
    #[serde(default = "default_true")]
    pub compile: bool,

    #[serde(default)]
    pub compiler: CompilerKind,

    #[serde(default)]
    pub archive_format: ArchiveFormat,

    /// Stamp `% <git commit>` at the top of the root file
    #[serde(default, alias = "git_hash")]
    pub store_git_hash: bool,

    /// Delete and re-create an existing staging directory
    #[serde(default)]
    pub force: bool,

    /// Extensions tried, in order, for `\includegraphics{name}` without one
    #[serde(default = "default_image_extensions", deserialize_with = "deserialize_extensions")]
    pub image_extensions: Vec<String>,

    /// Glob patterns (relative to the project root) copied verbatim
    #[serde(default, deserialize_with = "deserialize_list")]
    pub always_include: Vec<String>,

    /// `--force` refuses to delete a staging directory bigger than this
    #[serde(default = "default_max_delete_bytes")]
    pub max_delete_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            out_dir: None,
            rename: None,
            encodings: default_encodings(),
            compile: true,
            compiler: CompilerKind::default(),
            archive_format: ArchiveFormat::default(),
            store_git_hash: false,
            force: false,
            image_extensions: default_image_extensions(),
            always_include: Vec::new(),
            max_delete_bytes: default_max_delete_bytes(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_encodings() -> Vec<String> {
    vec!["utf-8".to_string()]
}

/// pdflatex's graphics extension search order, plus `.eps` for latex+dvips.
pub fn default_image_extensions() -> Vec<String> {
    [".pdf", ".png", ".jpg", ".jpeg", ".eps"].iter().map(|s| s.to_string()).collect()
}

fn default_max_delete_bytes() -> u64 {
    20 * 1024 * 1024 // 20 MiB
}
