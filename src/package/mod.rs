//! Bundle assembly, staging and the end-to-end packing pipeline.

pub mod archive;
pub mod git;

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::compile::compile_and_keep_bbl;
use crate::domain::{
    AssetResolution, BundleSource, Config, IncludeKind, PackStats, ParsedProject, ProjectBundle,
    UnresolvedAsset,
};
use crate::error::{PackError, Result};
use crate::latex::parse_project;
use crate::resolve::{prune_unlisted, resolve_assets};
use crate::utils::to_slash;

pub use archive::{sha256_file, write_archive};
pub use git::stamp_git_hash;

/// Number of files listed in the size report.
const LARGEST_FILES_SHOWN: usize = 10;

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct PackReport {
    pub staging_dir: PathBuf,
    /// Root document inside the bundle
    pub main_file: PathBuf,
    pub archive: PathBuf,
    pub archive_sha256: String,
    pub pdf: Option<PathBuf>,
    pub bbl: Option<PathBuf>,
    /// Whether the sources declare a bibliography
    pub has_bibliography: bool,
    pub git_hash: Option<String>,
    pub unresolved: Vec<UnresolvedAsset>,
    pub stats: PackStats,
}

/// `<project dir>_arXiv`, next to the project directory.
pub fn default_staging_dir(root_dir: &Path) -> PathBuf {
    let name = root_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    root_dir.with_file_name(format!("{name}_arXiv"))
}

/// Bundle name of the root file for `--rename`; `.tex` is appended when missing.
///
/// The name must be a single file name so the root file stays inside the
/// staging directory.
pub fn renamed_main(name: &str) -> Result<PathBuf> {
    let path = PathBuf::from(name);
    let mut components = path.components();
    if !matches!((components.next(), components.next()), (Some(Component::Normal(_)), None)) {
        return Err(PackError::InvalidRename { name: name.to_string() });
    }
    if path.extension().is_some_and(|e| e == "tex") {
        Ok(path)
    } else {
        Ok(PathBuf::from(format!("{name}.tex")))
    }
}

/// Create an empty staging directory, clearing an existing one when `force`
/// is set and it is no larger than `max_delete_bytes`.
pub fn prepare_out_dir(dir: &Path, force: bool, max_delete_bytes: u64) -> Result<()> {
    if dir.exists() {
        if !force {
            return Err(PackError::OutputExists { path: dir.to_path_buf() });
        }
        let size = dir_size(dir)?;
        if size > max_delete_bytes {
            return Err(PackError::RefuseToDelete {
                path: dir.to_path_buf(),
                limit: max_delete_bytes,
            });
        }
        info!("Deleting {} ({} bytes)", dir.display(), size);
        fs::remove_dir_all(dir).map_err(|e| PackError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| PackError::io(dir, e))
}

fn dir_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| PackError::io(dir, e.into()))?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(|e| PackError::io(entry.path(), e.into()))?.len();
        }
    }
    Ok(total)
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| PackError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| PackError::InvalidPattern {
            pattern: patterns.join(","),
            reason: e.to_string(),
        })
}

/// Project files matching `patterns`, skipping `.git` and `skip_dir`.
fn matching_files(
    root_dir: &Path,
    patterns: &[String],
    skip_dir: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let Some(globs) = build_globset(patterns)? else {
        return Ok(Vec::new());
    };
    let mut files = Vec::new();
    let walker = WalkDir::new(root_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.file_name() != ".git" && skip_dir.map_or(true, |skip| entry.path() != skip)
        });
    for entry in walker {
        let entry = entry.map_err(|e| PackError::io(root_dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root_dir) else {
            continue;
        };
        if globs.is_match(rel) {
            files.push(rel.to_path_buf());
        }
    }
    Ok(files)
}

/// Decide the content of every bundle entry.
///
/// `staging_dir` is excluded from the `always_include` walk in case it lives
/// inside the project.
pub fn assemble_bundle(
    project: &ParsedProject,
    resolution: &AssetResolution,
    config: &Config,
    staging_dir: Option<&Path>,
) -> Result<ProjectBundle> {
    let main_file = match config.rename.as_deref() {
        Some(name) => renamed_main(name)?,
        None => project.root_file.clone(),
    };
    let mut bundle = ProjectBundle { main_file: main_file.clone(), ..Default::default() };

    for doc in &project.documents {
        match doc.kind {
            IncludeKind::Source => {
                let dest = if doc.path == project.root_file {
                    main_file.clone()
                } else {
                    doc.path.clone()
                };
                bundle.entries.insert(dest, BundleSource::Sanitized(doc.sanitized_text()));
            }
            _ => {
                let source = BundleSource::Copy(project.root_dir.join(&doc.path));
                bundle.entries.insert(doc.path.clone(), source);
            }
        }
    }
    for rel in project.support_files.iter().chain(resolution.required_files().iter()) {
        bundle
            .entries
            .entry(rel.clone())
            .or_insert_with(|| BundleSource::Copy(project.root_dir.join(rel)));
    }

    // A .bbl shipped with the sources follows the root file's name.
    let shipped_bbl = project.root_file.with_extension("bbl");
    if project.root_dir.join(&shipped_bbl).is_file() {
        debug!("Including existing {}", to_slash(&shipped_bbl));
        bundle
            .entries
            .entry(main_file.with_extension("bbl"))
            .or_insert_with(|| BundleSource::Copy(project.root_dir.join(&shipped_bbl)));
    }

    for rel in matching_files(&project.root_dir, &config.always_include, staging_dir)? {
        if rel == project.root_file {
            continue;
        }
        bundle
            .entries
            .entry(rel.clone())
            .or_insert_with(|| BundleSource::Copy(project.root_dir.join(&rel)));
    }
    Ok(bundle)
}

/// Write every entry of `bundle` below `staging`. Returns `(bytes, path)` per file.
pub fn stage_bundle(bundle: &ProjectBundle, staging: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut sizes = Vec::new();
    for (rel, source) in &bundle.entries {
        let dest = staging.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;
        }
        let bytes = match source {
            BundleSource::Sanitized(text) => {
                fs::write(&dest, text).map_err(|e| PackError::io(&dest, e))?;
                text.len() as u64
            }
            BundleSource::Copy(from) => fs::copy(from, &dest).map_err(|e| PackError::io(from, e))?,
            BundleSource::Generated => continue,
        };
        debug!("Staged {} ({bytes} bytes)", to_slash(rel));
        sizes.push((bytes, rel.clone()));
    }
    Ok(sizes)
}

/// Run the whole pipeline for `main_tex` and return what was produced.
pub fn pack_project(main_tex: &Path, config: &Config) -> Result<PackReport> {
    let start = Instant::now();

    if let Some(name) = config.rename.as_deref() {
        renamed_main(name)?;
    }
    let project = parse_project(main_tex, &config.encodings)?;
    let resolution = resolve_assets(&project, &config.image_extensions);

    let staging = config.out_dir.clone().unwrap_or_else(|| default_staging_dir(&project.root_dir));
    let staging = if staging.is_absolute() {
        staging
    } else {
        std::env::current_dir().map_err(|e| PackError::io(&staging, e))?.join(&staging)
    };
    if project.root_dir.starts_with(staging.canonicalize().unwrap_or_else(|_| staging.clone())) {
        return Err(PackError::OutputOverlapsProject { path: staging });
    }
    prepare_out_dir(&staging, config.force, config.max_delete_bytes)?;
    let staging = staging.canonicalize().map_err(|e| PackError::io(&staging, e))?;

    let mut bundle = assemble_bundle(&project, &resolution, config, Some(&staging))?;
    let mut sizes = stage_bundle(&bundle, &staging)?;
    info!("Staged {} file(s) in {}", sizes.len(), staging.display());

    let git_hash = if config.store_git_hash {
        stamp_git_hash(&project.root_dir, &staging.join(&bundle.main_file))?
    } else {
        None
    };

    let output_dir = staging.parent().map(Path::to_path_buf).unwrap_or_else(|| staging.clone());
    let stem = bundle
        .main_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pdf_dest = output_dir.join(format!("{stem}.pdf"));
    let archive_path = output_dir.join(format!("{stem}.{}", config.archive_format.extension()));

    let bbl_rel = bundle.main_file.with_extension("bbl");
    let mut pdf = None;
    if config.compile {
        let outcome = compile_and_keep_bbl(
            &staging,
            &bundle.main_file,
            config.compiler,
            &pdf_dest,
            project.bibliography_tool(),
        )?;
        pdf = outcome.pdf;
        if let Some(bbl) = outcome.bbl {
            if !bundle.contains(&bbl) {
                let bytes = fs::metadata(staging.join(&bbl)).map(|m| m.len()).unwrap_or(0);
                sizes.push((bytes, bbl.clone()));
                bundle.entries.insert(bbl, BundleSource::Generated);
            }
        }
    } else if project.has_bibliography && !bundle.contains(&bbl_rel) {
        warn!("Compilation skipped and no {} found; arXiv will not run BibTeX", to_slash(&bbl_rel));
    }
    let bbl = bundle.contains(&bbl_rel).then_some(bbl_rel);

    let keep = bundle.paths();
    let pruned = prune_unlisted(&staging, &keep)?;

    write_archive(&staging, &keep, &archive_path, config.archive_format)?;
    let archive_sha256 = sha256_file(&archive_path)?;
    info!("Wrote {}", archive_path.display());

    sizes.sort_by(|a, b| b.cmp(a));
    let stats = PackStats {
        documents: project.documents.iter().filter(|d| d.kind == IncludeKind::Source).count(),
        support_files: project.support_files.len()
            + project.documents.iter().filter(|d| d.kind == IncludeKind::Package).count(),
        assets: resolution.required_files().len(),
        unresolved_assets: resolution.unresolved.len(),
        extra_files: count_extra(&bundle, &project, &resolution),
        pruned_files: pruned.len(),
        total_bytes: sizes.iter().map(|(bytes, _)| bytes).sum(),
        largest_files: sizes
            .iter()
            .take(LARGEST_FILES_SHOWN)
            .map(|(bytes, p)| (*bytes, to_slash(p)))
            .collect(),
        processing_time_seconds: start.elapsed().as_secs_f64(),
    };

    Ok(PackReport {
        staging_dir: staging,
        main_file: bundle.main_file,
        archive: archive_path,
        archive_sha256,
        pdf,
        bbl,
        has_bibliography: project.has_bibliography,
        git_hash,
        unresolved: resolution.unresolved,
        stats,
    })
}

/// Bundle entries that are neither documents, support files nor assets.
fn count_extra(
    bundle: &ProjectBundle,
    project: &ParsedProject,
    resolution: &AssetResolution,
) -> usize {
    let assets = resolution.required_files();
    bundle
        .entries
        .iter()
        .filter(|(path, source)| {
            !matches!(source, BundleSource::Sanitized(_) | BundleSource::Generated)
                && !assets.contains(*path)
                && !project.support_files.contains(*path)
                && project.document(path).is_none()
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    fn offline() -> Config {
        Config { compile: false, ..Config::default() }
    }

    fn sample_project(root: &Path) -> PathBuf {
        let proj = root.join("paper");
        write(
            &proj,
            "main.tex",
            concat!(
                "\\documentclass{article}\n",
                "% private note\n",
                "\\begin{document}\n",
                "\\input{sec/intro}\n",
                "\\includegraphics{figs/used}\n",
                "\\end{document}\n",
            ),
        );
        write(&proj, "sec/intro.tex", "Intro % todo\n");
        write(&proj, "figs/used.png", "png");
        write(&proj, "figs/unused.png", "png");
        write(&proj, "notes.txt", "not for arXiv");
        proj.join("main.tex")
    }

    #[test]
    fn staging_dir_is_sibling_of_project() {
        assert_eq!(
            default_staging_dir(Path::new("/work/paper")),
            PathBuf::from("/work/paper_arXiv")
        );
    }

    #[test]
    fn rename_appends_tex() {
        assert_eq!(renamed_main("final").expect("name"), PathBuf::from("final.tex"));
        assert_eq!(renamed_main("final.tex").expect("name"), PathBuf::from("final.tex"));
    }

    #[test]
    fn rename_must_be_a_plain_file_name() {
        for name in ["../../escaped", "../paper/main", "sub/final", "/tmp/final", "..", ""] {
            assert!(matches!(renamed_main(name), Err(PackError::InvalidRename { .. })), "{name}");
        }
    }

    #[test]
    fn rename_outside_staging_writes_nothing() {
        let dir = TempDir::new().expect("tmp");
        let main = sample_project(dir.path());
        let original = fs::read_to_string(&main).expect("read");
        let config = Config { rename: Some("../paper/main".to_string()), ..offline() };

        let err = pack_project(&main, &config).expect_err("rename escapes staging");
        assert!(matches!(err, PackError::InvalidRename { .. }));
        assert_eq!(fs::read_to_string(&main).expect("read"), original);
        assert!(!dir.path().join("paper_arXiv").exists());
    }

    #[test]
    fn existing_out_dir_requires_force() {
        let dir = TempDir::new().expect("tmp");
        let out = dir.path().join("out");
        write(&out, "old.txt", "x");
        assert!(matches!(prepare_out_dir(&out, false, 1024), Err(PackError::OutputExists { .. })));
        prepare_out_dir(&out, true, 1024).expect("force");
        assert!(!out.join("old.txt").exists());
    }

    #[test]
    fn force_refuses_large_directories() {
        let dir = TempDir::new().expect("tmp");
        let out = dir.path().join("out");
        write(&out, "big.bin", &"x".repeat(2048));
        let err = prepare_out_dir(&out, true, 1024).expect_err("too big");
        assert!(matches!(err, PackError::RefuseToDelete { limit: 1024, .. }));
        assert!(out.join("big.bin").exists());
    }

    #[test]
    fn pack_contains_only_required_files() {
        let dir = TempDir::new().expect("tmp");
        let main = sample_project(dir.path());
        let report = pack_project(&main, &offline()).expect("pack");

        let staged: BTreeSet<String> = WalkDir::new(&report.staging_dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| to_slash(e.path().strip_prefix(&report.staging_dir).expect("prefix")))
            .collect();
        assert_eq!(
            staged,
            BTreeSet::from([
                "figs/used.png".to_string(),
                "main.tex".to_string(),
                "sec/intro.tex".to_string()
            ])
        );
        let intro = fs::read_to_string(report.staging_dir.join("sec/intro.tex")).expect("read");
        assert_eq!(intro, "Intro\n");
        assert!(report.archive.ends_with("main.tar.gz"));
        assert_eq!(report.archive_sha256.len(), 64);
        assert_eq!(report.stats.documents, 2);
        assert_eq!(report.stats.assets, 1);
        assert!(dir.path().join("paper/figs/unused.png").exists());
    }

    #[test]
    fn rename_and_always_include() {
        let dir = TempDir::new().expect("tmp");
        let main = sample_project(dir.path());
        write(&dir.path().join("paper"), "00README.json", "{}");
        write(
            &dir.path().join("paper"),
            "main.bbl",
            "\\begin{thebibliography}{1}\\end{thebibliography}\n",
        );
        let config = Config {
            rename: Some("submission".to_string()),
            always_include: vec!["00README.json".to_string()],
            ..offline()
        };
        let report = pack_project(&main, &config).expect("pack");
        assert_eq!(report.main_file, PathBuf::from("submission.tex"));
        assert!(report.staging_dir.join("submission.tex").is_file());
        assert!(!report.staging_dir.join("main.tex").exists());
        assert!(report.staging_dir.join("submission.bbl").is_file());
        assert!(report.staging_dir.join("00README.json").is_file());
        assert_eq!(report.bbl, Some(PathBuf::from("submission.bbl")));
        assert!(report.archive.ends_with("submission.tar.gz"));
        assert_eq!(report.stats.extra_files, 2);
    }

    #[test]
    fn second_run_needs_force() {
        let dir = TempDir::new().expect("tmp");
        let main = sample_project(dir.path());
        pack_project(&main, &offline()).expect("first");
        assert!(matches!(pack_project(&main, &offline()), Err(PackError::OutputExists { .. })));
        pack_project(&main, &Config { force: true, ..offline() }).expect("forced");
    }

    #[test]
    fn out_dir_may_not_be_the_project() {
        let dir = TempDir::new().expect("tmp");
        let main = sample_project(dir.path());
        let config = Config { out_dir: Some(dir.path().join("paper")), force: true, ..offline() };
        let err = pack_project(&main, &config).expect_err("overlap");
        assert!(matches!(err, PackError::OutputOverlapsProject { .. }));
        assert!(dir.path().join("paper/notes.txt").exists());
    }

    #[test]
    fn invalid_glob_is_reported() {
        let result = build_globset(&["a[".to_string()]);
        assert!(matches!(result, Err(PackError::InvalidPattern { .. })));
    }
}
