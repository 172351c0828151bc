//! Recursive document parser.
//!
//! Starting from the root file, every `\input`-style directive is followed
//! depth-first. Each document is read once; a document that is reached again
//! while it is still being parsed is an include cycle.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::commands::{
    contains_end_document, find_assets, find_graphics_paths, find_includes, prints_bibliography,
    uses_biblatex,
};
use super::macros::{find_definition, scan_braces, BraceScan, MacroTable};
use super::strip::{strip_line, strip_numbered};
use crate::domain::{AssetRef, DocumentNode, IncludeDirective, IncludeKind, ParsedProject};
use crate::error::{PackError, Result};
use crate::utils::{normalize_relative, read_with_encodings};

/// A definition body may not run on for more lines than this.
const MAX_DEFINITION_LINES: usize = 200;

/// Parse `root_file` and everything it transitively includes.
pub fn parse_project(root_file: &Path, encodings: &[String]) -> Result<ParsedProject> {
    let absolute = root_file.canonicalize().map_err(|e| PackError::io(root_file, e))?;
    let root_dir = absolute.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("/"));
    let root_name = absolute
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| PackError::io(root_file, std::io::ErrorKind::InvalidInput.into()))?;

    let mut parser = Parser::new(root_dir, encodings.to_vec());
    parser.load(&root_name, IncludeKind::Source)?;

    let mut combined = Vec::new();
    parser.inline(&root_name, &mut combined);

    info!(
        "Parsed {} document(s), {} support file(s), {} asset reference(s), {} definition(s)",
        parser.documents.len(),
        parser.support_files.len(),
        parser.assets.len(),
        parser.macros.len()
    );

    Ok(ParsedProject {
        root_dir: parser.root_dir,
        root_file: root_name,
        documents: parser.documents,
        combined,
        support_files: parser.support_files,
        assets: parser.assets,
        graphics_paths: parser.graphics_paths,
        has_bibliography: parser.has_bibliography,
        uses_biblatex: parser.uses_biblatex,
    })
}

struct Parser {
    root_dir: PathBuf,
    encodings: Vec<String>,
    macros: MacroTable,
    documents: Vec<DocumentNode>,
    /// document path -> index in `documents`
    index: HashMap<PathBuf, usize>,
    /// documents currently being parsed, outermost first
    stack: Vec<PathBuf>,
    support_files: BTreeSet<PathBuf>,
    assets: Vec<AssetRef>,
    graphics_paths: Vec<String>,
    has_bibliography: bool,
    uses_biblatex: bool,
}

impl Parser {
    fn new(root_dir: PathBuf, encodings: Vec<String>) -> Self {
        Self {
            root_dir,
            encodings,
            macros: MacroTable::new(),
            documents: Vec::new(),
            index: HashMap::new(),
            stack: Vec::new(),
            support_files: BTreeSet::new(),
            assets: Vec::new(),
            graphics_paths: Vec::new(),
            has_bibliography: false,
            uses_biblatex: false,
        }
    }

    /// Read and scan `rel`, recursing into the documents it includes.
    fn load(&mut self, rel: &Path, kind: IncludeKind) -> Result<()> {
        if let Some(pos) = self.stack.iter().position(|p| p == rel) {
            let mut cycle = self.stack[pos..].to_vec();
            cycle.push(rel.to_path_buf());
            return Err(PackError::IncludeCycle { cycle });
        }
        if self.index.contains_key(rel) {
            debug!("{} already parsed", rel.display());
            return Ok(());
        }

        let absolute = self.root_dir.join(rel);
        let (text, encoding) = read_with_encodings(&absolute, &self.encodings)
            .map_err(|e| PackError::io(&absolute, e))?;
        debug!("Parsing {} ({encoding})", rel.display());
        let raw_lines: Vec<String> = text.lines().map(String::from).collect();

        self.stack.push(rel.to_path_buf());
        let includes = self.scan(rel, kind, &raw_lines)?;
        self.stack.pop();

        let sanitized_lines = strip_numbered(raw_lines.iter().map(String::as_str));
        self.index.insert(rel.to_path_buf(), self.documents.len());
        self.documents.push(DocumentNode {
            path: rel.to_path_buf(),
            kind,
            encoding: encoding.to_string(),
            raw_lines,
            sanitized_lines,
            includes,
        });
        Ok(())
    }

    /// Walk the lines of one document, recording directives and assets.
    fn scan(
        &mut self,
        rel: &Path,
        kind: IncludeKind,
        lines: &[String],
    ) -> Result<Vec<IncludeDirective>> {
        let is_package = kind == IncludeKind::Package;
        let doc_dir = rel.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut includes = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            let line_no = i + 1;
            let text = strip_line(&lines[i]).as_str().to_string();
            i += 1;
            if text.trim().is_empty() {
                continue;
            }

            let segments = if is_package {
                vec![(line_no, text)]
            } else {
                self.take_definitions(rel, text, lines, &mut i, line_no)?
            };
            let mut ends_document = false;
            for (seg_line, seg_text) in segments {
                ends_document |= contains_end_document(&seg_text);
                let expanded = self.macros.expand(&seg_text)?;
                self.scan_expanded(rel, &doc_dir, seg_line, &expanded, &mut includes)?;
            }

            if ends_document {
                debug!("Reached \\end{{document}} in {}, stopping", rel.display());
                break;
            }
        }
        Ok(includes)
    }

    /// Record the directives and assets found on one source line.
    fn scan_expanded(
        &mut self,
        rel: &Path,
        doc_dir: &Path,
        line_no: usize,
        expanded: &str,
        includes: &mut Vec<IncludeDirective>,
    ) -> Result<()> {
        if prints_bibliography(expanded) {
            self.has_bibliography = true;
        }
        if uses_biblatex(expanded) {
            self.uses_biblatex = true;
        }
        self.graphics_paths.extend(find_graphics_paths(expanded));

        for (include_kind, tex_path) in find_includes(expanded) {
            if include_kind == IncludeKind::Bibliography {
                self.has_bibliography = true;
            }
            let resolved = self.resolve_include(include_kind, &tex_path, doc_dir, rel, line_no)?;
            if let Some(target) = &resolved {
                if include_kind.needs_parse() {
                    debug!("Recursing into {}", target.display());
                    self.load(target, include_kind)?;
                } else {
                    self.support_files.insert(target.clone());
                }
            }
            includes.push(IncludeDirective {
                kind: include_kind,
                tex_path,
                resolved,
                line: line_no,
            });
        }

        for (command, tex_path) in find_assets(expanded) {
            self.assets.push(AssetRef {
                tex_path,
                command: command.to_string(),
                document: rel.to_path_buf(),
                line: line_no,
            });
        }
        Ok(())
    }

    /// Record every command definition starting in `text`, consuming
    /// continuation lines for multi-line bodies. Returns the text outside
    /// the definitions, each piece paired with the source line it sits on,
    /// so directives after a multi-line body keep their real line number.
    fn take_definitions(
        &mut self,
        rel: &Path,
        mut text: String,
        lines: &[String],
        next: &mut usize,
        line_no: usize,
    ) -> Result<Vec<(usize, String)>> {
        let mut segments: Vec<(usize, String)> = Vec::new();
        let mut current = line_no;
        while let Some(head) = find_definition(&text) {
            if self.macros.is_defined(&head.name) && !head.renew {
                return Err(PackError::Redefinition {
                    name: head.name,
                    from: rel.to_path_buf(),
                    line: current,
                });
            }
            push_segment(&mut segments, current, &text[..head.start]);

            let mut body = String::new();
            let mut rest = text[head.body_start..].to_string();
            let mut depth = 0;
            let mut consumed = 0;
            let remainder = loop {
                match scan_braces(&rest, depth) {
                    BraceScan::Closed(end) => {
                        body.push_str(&rest[..end]);
                        break rest[end + 1..].to_string();
                    }
                    BraceScan::Open(d) => {
                        depth = d;
                        body.push_str(&rest);
                        body.push('\n');
                        consumed += 1;
                        if *next >= lines.len() || consumed > MAX_DEFINITION_LINES {
                            return Err(PackError::UnbalancedBraces {
                                from: rel.to_path_buf(),
                                line: line_no,
                            });
                        }
                        rest = strip_line(&lines[*next]).as_str().to_string();
                        *next += 1;
                        current = *next;
                    }
                }
            };
            // drop the body's opening brace
            let body = body.strip_prefix('{').unwrap_or(&body);
            self.macros.define(&head.name, head.num_args, body);
            text = remainder;
        }
        push_segment(&mut segments, current, &text);
        Ok(segments)
    }

    /// Map a directive's path to a project-relative file.
    ///
    /// LaTeX resolves paths against the directory it runs in (the project
    /// root); the including document's directory is tried second.
    fn resolve_include(
        &self,
        kind: IncludeKind,
        tex_path: &str,
        doc_dir: &Path,
        from: &Path,
        line: usize,
    ) -> Result<Option<PathBuf>> {
        if tex_path.contains('#') {
            debug!("Skipping unexpanded argument {tex_path} in {}", from.display());
            return Ok(None);
        }
        let default_ext = kind.default_extension();
        let given_ext = Path::new(tex_path).extension().and_then(|e| e.to_str());

        let candidates: Vec<String> = match given_ext {
            Some(ext) if ext.eq_ignore_ascii_case(default_ext) => vec![tex_path.to_string()],
            // \input{table.tikz}: TeX tries `table.tikz.tex` first, then the name as given
            Some(_) if kind == IncludeKind::Source => {
                vec![format!("{tex_path}.{default_ext}"), tex_path.to_string()]
            }
            Some(_) if kind.must_exist() => {
                return Err(PackError::InvalidInclude {
                    target: tex_path.to_string(),
                    expected: default_ext,
                    from: from.to_path_buf(),
                    line,
                });
            }
            Some(_) => {
                debug!("Ignoring {tex_path}: not a .{default_ext} file");
                return Ok(None);
            }
            None => vec![format!("{tex_path}.{default_ext}")],
        };

        let mut bases = vec![PathBuf::new()];
        if !doc_dir.as_os_str().is_empty() {
            bases.push(doc_dir.to_path_buf());
        }
        for base in &bases {
            for candidate in &candidates {
                let Some(rel) = normalize_relative(&base.join(candidate)) else {
                    continue;
                };
                if self.root_dir.join(&rel).is_file() {
                    return Ok(Some(rel));
                }
            }
        }

        if kind.must_exist() {
            return Err(PackError::MissingInclude {
                target: candidates.first().cloned().unwrap_or_else(|| tex_path.to_string()),
                from: from.to_path_buf(),
                line,
            });
        }
        debug!("{tex_path}.{default_ext} is not local, assuming the TeX distribution has it");
        Ok(None)
    }

    /// Append the sanitized lines of `rel`, with included documents inlined
    /// after the line that includes them.
    fn inline(&self, rel: &Path, out: &mut Vec<String>) {
        let Some(&idx) = self.index.get(rel) else {
            return;
        };
        let node = &self.documents[idx];
        for line in &node.sanitized_lines {
            out.push(line.text.clone());
            for directive in node.includes.iter().filter(|d| d.line == line.line) {
                if directive.kind != IncludeKind::Source {
                    continue;
                }
                if let Some(target) = &directive.resolved {
                    self.inline(target, out);
                }
            }
        }
    }
}

/// Append `text` to the segment for `line`, starting a new one when the line changes.
fn push_segment(segments: &mut Vec<(usize, String)>, line: usize, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    match segments.last_mut() {
        Some((last, acc)) if *last == line => acc.push_str(text),
        _ => segments.push((line, text.to_string())),
    }
}
