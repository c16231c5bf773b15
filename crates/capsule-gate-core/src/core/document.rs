// crates/capsule-gate-core/src/core/document.rs
// ============================================================================
// Module: Capsule Document Loading
// Description: Discovery, bounded loading, and atomic write-back of capsules.
// Purpose: Turn a file or directory argument into parsed capsule documents.
// Dependencies: serde_yaml, tempfile, thiserror, walkdir
// ============================================================================

//! ## Overview
//! Capsule paths are discovered from a single file or a directory tree.
//! Directory walks collect files whose extension is on the configured list
//! (`yaml`, `yml` by default) and return them sorted, so every batch tool sees
//! the same order.
//!
//! Loading is per document: a read, size, encoding, parse, or structure
//! failure is attached to that document and never aborts the batch. Only a
//! missing root path is fatal.
//!
//! Write-back renders the whole document and replaces the file through a
//! temporary sibling and a rename, keeping the original file mode.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::bounded::ReadLimitError;
use crate::core::bounded::read_file_with_limit;
use crate::core::capsule::CapsuleDocument;
use crate::core::capsule::StructureError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default maximum size of a single capsule document in bytes.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 1024 * 1024;
/// Default file extensions treated as capsule documents.
pub const DEFAULT_DOCUMENT_EXTENSIONS: &[&str] = &["yaml", "yml"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Per-document load and write failures.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// File I/O failure while reading.
    #[error("read failed: {0}")]
    Io(String),
    /// Document exceeds the configured size limit.
    #[error("document is {size} bytes (limit {limit})")]
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
    /// Document is not UTF-8.
    #[error("document must be utf-8")]
    Utf8,
    /// YAML parse failure.
    #[error("parse error: {0}")]
    Parse(String),
    /// Parsed value is not a capsule mapping.
    #[error(transparent)]
    Structure(#[from] StructureError),
    /// Rendering the document failed.
    #[error("render failed: {0}")]
    Render(String),
    /// Writing the document failed.
    #[error("write failed: {0}")]
    Write(String),
}

impl From<ReadLimitError> for DocumentError {
    fn from(err: ReadLimitError) -> Self {
        match err {
            ReadLimitError::Io(err) => Self::Io(err.to_string()),
            ReadLimitError::TooLarge {
                size,
                limit,
            } => Self::TooLarge {
                size,
                limit,
            },
        }
    }
}

/// Fatal discovery failures at the batch boundary.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The root path does not exist.
    #[error("path not found: {0}")]
    NotFound(String),
    /// Directory traversal failed.
    #[error("failed to walk {path}: {message}")]
    Walk {
        /// Root being walked.
        path: String,
        /// Underlying error.
        message: String,
    },
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Discovery and loading options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Accepted extensions without the leading dot (matched case-insensitively).
    pub extensions: Vec<String>,
    /// Maximum size of one document in bytes.
    pub max_document_bytes: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_DOCUMENT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

impl DiscoveryOptions {
    /// Returns true when `path` carries an accepted extension.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

// ============================================================================
// SECTION: Loaded Documents
// ============================================================================

/// A discovered document and its load outcome.
#[derive(Debug)]
pub struct LoadedDocument {
    /// Source path as discovered.
    pub path: PathBuf,
    /// Parsed document or the reason it could not be loaded.
    pub document: Result<CapsuleDocument, DocumentError>,
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// Discovers capsule documents under `root`.
///
/// A file root is returned as-is regardless of extension. A directory root is
/// walked recursively and filtered by extension.
///
/// # Errors
///
/// Returns [`DiscoveryError`] when the root is missing or cannot be walked.
pub fn discover_documents(
    root: &Path,
    options: &DiscoveryOptions,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::NotFound(root.display().to_string()));
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| DiscoveryError::Walk {
            path: root.display().to_string(),
            message: err.to_string(),
        })?;
        if entry.file_type().is_file() && options.accepts(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Discovers and loads every document under `root`.
///
/// # Errors
///
/// Returns [`DiscoveryError`] when discovery fails; per-document failures are
/// carried inside each [`LoadedDocument`].
pub fn load_documents(
    root: &Path,
    options: &DiscoveryOptions,
) -> Result<Vec<LoadedDocument>, DiscoveryError> {
    let paths = discover_documents(root, options)?;
    Ok(paths
        .into_iter()
        .map(|path| {
            let document = load_document(&path, options.max_document_bytes);
            LoadedDocument {
                path,
                document,
            }
        })
        .collect())
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads and parses one capsule document.
///
/// # Errors
///
/// Returns [`DocumentError`] when the file cannot be read or parsed.
pub fn load_document(path: &Path, max_bytes: usize) -> Result<CapsuleDocument, DocumentError> {
    let bytes = read_file_with_limit(path, max_bytes)?;
    let text = std::str::from_utf8(&bytes).map_err(|_| DocumentError::Utf8)?;
    parse_document(text)
}

/// Parses YAML text into a capsule document.
///
/// # Errors
///
/// Returns [`DocumentError::Parse`] or [`DocumentError::Structure`].
pub fn parse_document(text: &str) -> Result<CapsuleDocument, DocumentError> {
    let value: Value =
        serde_yaml::from_str(text).map_err(|err| DocumentError::Parse(err.to_string()))?;
    CapsuleDocument::from_value(value).map_err(DocumentError::from)
}

// ============================================================================
// SECTION: Write-Back
// ============================================================================

/// Renders a document as YAML, preserving key order.
///
/// # Errors
///
/// Returns [`DocumentError::Render`] when serialization fails.
pub fn render_document(document: &CapsuleDocument) -> Result<String, DocumentError> {
    serde_yaml::to_string(document.body()).map_err(|err| DocumentError::Render(err.to_string()))
}

/// Replaces `path` with the rendered document.
///
/// The document is written to a temporary file in the same directory, synced,
/// and renamed over the target, so readers never observe a partial file. An
/// existing target's permissions carry over to the replacement.
///
/// # Errors
///
/// Returns [`DocumentError`] when rendering or any filesystem step fails.
pub fn write_document_atomic(path: &Path, document: &CapsuleDocument) -> Result<(), DocumentError> {
    let rendered = render_document(document)?;
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::Builder::new()
        .prefix(".capsule-gate-")
        .suffix(".tmp")
        .tempfile_in(directory)
        .map_err(|err| DocumentError::Write(err.to_string()))?;
    staged.write_all(rendered.as_bytes()).map_err(|err| DocumentError::Write(err.to_string()))?;
    if let Ok(existing) = fs::metadata(path) {
        staged
            .as_file()
            .set_permissions(existing.permissions())
            .map_err(|err| DocumentError::Write(err.to_string()))?;
    }
    staged.as_file().sync_all().map_err(|err| DocumentError::Write(err.to_string()))?;
    staged.persist(path).map_err(|err| DocumentError::Write(err.error.to_string()))?;
    Ok(())
}
