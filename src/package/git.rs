//! Commit stamping for the root document.

use git2::Repository;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{PackError, Result};

/// Commit id of `HEAD` in the repository containing `project_dir`.
pub fn head_commit(project_dir: &Path) -> Option<String> {
    let repo = match Repository::discover(project_dir) {
        Ok(repo) => repo,
        Err(e) => {
            warn!("No git repository found for {}: {}", project_dir.display(), e.message());
            return None;
        }
    };
    let commit = repo.head().and_then(|head| head.peel_to_commit());
    match commit {
        Ok(commit) => Some(commit.id().to_string()),
        Err(e) => {
            warn!("Cannot read HEAD of {}: {}", project_dir.display(), e.message());
            None
        }
    }
}

/// Insert `% <commit>` as the first line of `file`. Returns the commit, or
/// `None` when the project is not under git.
pub fn stamp_git_hash(project_dir: &Path, file: &Path) -> Result<Option<String>> {
    let Some(hash) = head_commit(project_dir) else {
        return Ok(None);
    };
    info!("Writing git hash {hash}");
    let content = fs::read_to_string(file).map_err(|e| PackError::io(file, e))?;
    fs::write(file, format!("% {hash}\n{content}")).map_err(|e| PackError::io(file, e))?;
    Ok(Some(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stamps_head_commit() {
        let dir = TempDir::new().expect("tmp");
        let repo = Repository::init(dir.path()).expect("init");
        let sig = git2::Signature::now("Test", "test@example.com").expect("sig");
        let tree_id = repo.index().expect("index").write_tree().expect("tree");
        let tree = repo.find_tree(tree_id).expect("find tree");
        let commit = repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).expect("commit");

        let file = dir.path().join("out.tex");
        fs::write(&file, "\\documentclass{article}\n").expect("write");
        let stamped = stamp_git_hash(dir.path(), &file).expect("stamp");
        assert_eq!(stamped, Some(commit.to_string()));
        assert_eq!(
            fs::read_to_string(&file).expect("read"),
            format!("% {commit}\n\\documentclass{{article}}\n")
        );
    }

    #[test]
    fn outside_git_leaves_file_alone() {
        let dir = TempDir::new().expect("tmp");
        let file = dir.path().join("out.tex");
        fs::write(&file, "x\n").expect("write");
        // A TempDir may itself sit inside a repository; only check the no-repo path there.
        if Repository::discover(dir.path()).is_err() {
            assert_eq!(stamp_git_hash(dir.path(), &file).expect("stamp"), None);
            assert_eq!(fs::read_to_string(&file).expect("read"), "x\n");
        }
    }
}
