//! arxiv-pack: turn a LaTeX project into an arXiv-ready tarball
//!
//! Strips comments, drops unused figures, keeps the `.bbl` and leaves the
//! compiled PDF next to the archive for a last look before uploading.

use anyhow::Result;

fn main() -> Result<()> {
    arxiv_pack::cli::run()
}
