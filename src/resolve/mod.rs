//! Asset resolution and staging directory pruning.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::{AssetRef, AssetResolution, ParsedProject, ResolvedAsset, UnresolvedAsset};
use crate::error::{PackError, Result};
use crate::utils::{normalize_relative, to_slash};

/// Map every asset reference in `project` to a file under its root.
///
/// References that cannot be mapped are returned in `unresolved` and logged
/// as warnings; they never fail the run.
pub fn resolve_assets(project: &ParsedProject, image_extensions: &[String]) -> AssetResolution {
    let mut resolution = AssetResolution::default();

    for reference in &project.assets {
        match resolve_one(project, reference, image_extensions) {
            Ok(path) => {
                debug!("{} -> {}", reference.tex_path, to_slash(&path));
                resolution.resolved.push(ResolvedAsset { reference: reference.clone(), path });
            }
            Err(reason) => {
                warn!(
                    "Skipping \\{}{{{}}} ({}:{}): {reason}",
                    reference.command,
                    reference.tex_path,
                    reference.document.display(),
                    reference.line
                );
                resolution
                    .unresolved
                    .push(UnresolvedAsset { reference: reference.clone(), reason });
            }
        }
    }
    resolution
}

fn resolve_one(
    project: &ParsedProject,
    reference: &AssetRef,
    extensions: &[String],
) -> std::result::Result<PathBuf, String> {
    let tex_path = reference.tex_path.as_str();
    if tex_path.contains('#') {
        return Err("path depends on a macro argument".to_string());
    }

    let candidates = candidate_names(tex_path, extensions);
    let mut matches: Vec<PathBuf> = Vec::new();
    for base in search_bases(project, &reference.document) {
        for candidate in &candidates {
            let Some(rel) = normalize_relative(&base.join(candidate)) else {
                continue;
            };
            if project.root_dir.join(&rel).is_file() && !matches.contains(&rel) {
                matches.push(rel);
            }
        }
    }

    let mut matches = matches.into_iter();
    let Some(first) = matches.next() else {
        return Err("file not found in the project".to_string());
    };
    let others: Vec<String> = matches.map(|p| to_slash(&p)).collect();
    if !others.is_empty() {
        warn!(
            "{tex_path} is ambiguous: using {}, also found {}",
            to_slash(&first),
            others.join(", ")
        );
    }
    Ok(first)
}

/// File names to try for `tex_path`, in priority order.
fn candidate_names(tex_path: &str, extensions: &[String]) -> Vec<String> {
    let has_known_ext = Path::new(tex_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            extensions.iter().any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(e))
        })
        .unwrap_or(false);
    if has_known_ext {
        return vec![tex_path.to_string()];
    }
    let mut names = vec![tex_path.to_string()];
    names.extend(extensions.iter().map(|ext| format!("{tex_path}{ext}")));
    names
}

/// Directories a reference is looked up in: the project root, the directory
/// of the referencing document, then each `\graphicspath` entry.
fn search_bases(project: &ParsedProject, document: &Path) -> Vec<PathBuf> {
    let mut bases = vec![PathBuf::new()];
    if let Some(dir) = document.parent().filter(|d| !d.as_os_str().is_empty()) {
        bases.push(dir.to_path_buf());
    }
    for entry in &project.graphics_paths {
        let dir = PathBuf::from(entry);
        if !bases.contains(&dir) {
            bases.push(dir);
        }
    }
    bases
}

/// Delete every file under `dir` whose relative path is not in `keep`,
/// then remove directories left empty. Returns the deleted files.
pub fn prune_unlisted(dir: &Path, keep: &BTreeSet<PathBuf>) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            PackError::io(path, e.into())
        })?;
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(dir) else {
            continue;
        };

        if entry.file_type().is_dir() {
            let is_empty = fs::read_dir(path).map_err(|e| PackError::io(path, e))?.next().is_none();
            if is_empty {
                debug!("Removing empty directory {}", to_slash(rel));
                fs::remove_dir(path).map_err(|e| PackError::io(path, e))?;
            }
        } else if !keep.contains(rel) {
            debug!("Pruning {}", to_slash(rel));
            fs::remove_file(path).map_err(|e| PackError::io(path, e))?;
            removed.push(rel.to_path_buf());
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::default_image_extensions;
    use crate::latex::parse_project;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &[u8]) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    fn resolve(dir: &Path) -> AssetResolution {
        let project = parse_project(&dir.join("main.tex"), &["utf-8".to_string()]).expect("parse");
        resolve_assets(&project, &default_image_extensions())
    }

    #[test]
    fn exact_path_is_resolved() {
        let dir = TempDir::new().expect("tmp");
        write(dir.path(), "main.tex", b"\\includegraphics{fig1.png} % not used\n");
        write(dir.path(), "fig1.png", b"png");
        let res = resolve(dir.path());
        assert_eq!(res.required_files(), BTreeSet::from([PathBuf::from("fig1.png")]));
        assert!(res.unresolved.is_empty());
    }

    #[test]
    fn missing_asset_is_unresolved_not_fatal() {
        let dir = TempDir::new().expect("tmp");
        write(dir.path(), "main.tex", b"\\includegraphics{fig1.png}\n");
        let res = resolve(dir.path());
        assert!(res.resolved.is_empty());
        assert_eq!(res.unresolved.len(), 1);
        assert_eq!(res.unresolved[0].reference.tex_path, "fig1.png");
    }

    #[test]
    fn extension_priority_and_dot_segments() {
        let dir = TempDir::new().expect("tmp");
        write(dir.path(), "main.tex", b"\\input{sec/a}\n");
        write(dir.path(), "sec/a.tex", b"\\includegraphics[width=3cm]{./figs/../figs/plot}\n");
        write(dir.path(), "figs/plot.png", b"png");
        write(dir.path(), "figs/plot.pdf", b"pdf");
        let res = resolve(dir.path());
        assert_eq!(res.resolved[0].path, PathBuf::from("figs/plot.pdf"));
    }

    #[test]
    fn graphicspath_and_document_dir_are_searched() {
        let dir = TempDir::new().expect("tmp");
        write(
            dir.path(),
            "main.tex",
            b"\\graphicspath{{images/}}\n\\input{ch/one}\n\\includegraphics{logo}\n",
        );
        write(dir.path(), "ch/one.tex", b"\\includegraphics{local.jpg}\n");
        write(dir.path(), "ch/local.jpg", b"jpg");
        write(dir.path(), "images/logo.eps", b"eps");
        let res = resolve(dir.path());
        assert_eq!(
            res.required_files(),
            BTreeSet::from([PathBuf::from("ch/local.jpg"), PathBuf::from("images/logo.eps")])
        );
    }

    #[test]
    fn escaping_the_project_is_unresolved() {
        let dir = TempDir::new().expect("tmp");
        write(dir.path(), "proj/main.tex", b"\\includegraphics{../outside.png}\n");
        write(dir.path(), "outside.png", b"png");
        let project = parse_project(&dir.path().join("proj/main.tex"), &["utf-8".to_string()])
            .expect("parse");
        let res = resolve_assets(&project, &default_image_extensions());
        assert_eq!(res.unresolved.len(), 1);
    }

    #[test]
    fn candidates_respect_known_extensions() {
        let exts = default_image_extensions();
        assert_eq!(candidate_names("a.png", &exts), vec!["a.png"]);
        assert_eq!(candidate_names("a.v2", &exts)[1], "a.v2.pdf");
        assert_eq!(candidate_names("a", &exts).len(), 1 + exts.len());
    }

    #[test]
    fn prune_removes_unlisted_files_and_empty_dirs() {
        let dir = TempDir::new().expect("tmp");
        write(dir.path(), "main.tex", b"x");
        write(dir.path(), "figs/used.png", b"x");
        write(dir.path(), "figs/unused.png", b"x");
        write(dir.path(), "old/stale.pdf", b"x");
        write(dir.path(), "main.aux", b"x");

        let keep = BTreeSet::from([PathBuf::from("main.tex"), PathBuf::from("figs/used.png")]);
        let mut removed = prune_unlisted(dir.path(), &keep).expect("prune");
        removed.sort();
        assert_eq!(
            removed,
            vec![
                PathBuf::from("figs/unused.png"),
                PathBuf::from("main.aux"),
                PathBuf::from("old/stale.pdf")
            ]
        );
        assert!(dir.path().join("figs/used.png").exists());
        assert!(!dir.path().join("old").exists());
    }
}
