//! Core traits for language analysis.

use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;

use super::FileFact;
use crate::error::ParseError;

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// This is kept separate from FileFact so the security scanner can reuse
/// the tree without going through fact extraction.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// Project-relative path with `/` separators.
    pub path: String,
}

impl ParsedFile {
    /// Get the source code as text. Invalid UTF-8 sequences become U+FFFD.
    pub fn source_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.source)
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// Whether the tree contains ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }
}

/// Limits applied while parsing a single file.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Wall-clock budget for the parser; zero disables the limit.
    pub timeout: Duration,
    /// Files larger than this are rejected before parsing.
    pub max_file_bytes: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            max_file_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Language-specific analyzer trait.
///
/// # Thread Safety
///
/// Note: tree_sitter::Parser is not Sync, so implementations should
/// create parsers as needed or use thread-local storage.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language identifier (e.g., "python").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Trees with ERROR nodes are returned as-is; callers that need a clean
    /// tree check [`ParsedFile::has_errors`].
    fn parse(&self, path: &str, source: &[u8], options: &ParseOptions)
        -> Result<ParsedFile, ParseError>;

    /// Extract all facts from a parsed, error-free file.
    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFact>;

    /// Check if this analyzer handles the given path.
    fn handles_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.file_extensions().contains(&ext))
            .unwrap_or(false)
    }
}
