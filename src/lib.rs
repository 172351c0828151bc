//! arxiv-pack: prepare LaTeX projects for arXiv submission
//!
//! This library follows `\input`/`\include` from a root document, strips
//! comments, keeps only the files the document actually uses, compiles once
//! to obtain the `.bbl`, and writes the result as a tarball.

pub mod cli;
pub mod compile;
pub mod config;
pub mod domain;
pub mod error;
pub mod latex;
pub mod package;
pub mod resolve;
pub mod utils;

pub use error::{PackError, Result};
