//! Editor host seam.
//!
//! Everything UI-shaped lives behind this trait: the core decides *what* to
//! show and in which logical column, the host decides how.

use std::path::{Path, PathBuf};

pub trait EditorHost {
    /// Show a file at a logical one-based column.
    fn display_fragment(&mut self, path: &Path, column: usize);

    /// Ask the user to pick between equally viable candidates. The first
    /// candidate is the suggested default; `None` keeps it.
    fn prompt_choice(&mut self, candidates: &[PathBuf]) -> Option<PathBuf>;

    /// Request that an open fragment be closed. Returns whether the host
    /// confirmed within its own deadline.
    fn close_fragment(&mut self, path: &Path) -> bool;
}

/// Host that displays nothing, keeps defaults, and confirms every close.
/// Used by the CLI and anywhere no interactive host exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl EditorHost for NullHost {
    fn display_fragment(&mut self, _path: &Path, _column: usize) {}

    fn prompt_choice(&mut self, _candidates: &[PathBuf]) -> Option<PathBuf> {
        None
    }

    fn close_fragment(&mut self, _path: &Path) -> bool {
        true
    }
}
