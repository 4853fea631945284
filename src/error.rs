//! Error types for the paper2post library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Paper2PostError`]: **fatal**, the run cannot produce a post at all
//!   (bad input file, no model provider configured, a summary could not be
//!   generated, the post could not be written). Returned as
//!   `Err(Paper2PostError)` from [`crate::run::summarize_paper`].
//!
//! * [`ModelError`]: a single call to the generative model or the file
//!   staging service failed. Whether that is fatal depends on the stage that
//!   made the call: a failed summary aborts the run, a failed figure
//!   selection only leaves that tier without a figure. The stage decides;
//!   see [`crate::outcome::StageOutcome`].

use crate::outcome::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paper2post library.
#[derive(Debug, Error)]
pub enum Paper2PostError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input path has no usable file stem to name the post after.
    #[error("Invalid input '{input}': cannot derive a paper name from this path")]
    InvalidInput { input: String },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// No generative-model provider could be configured (missing API key etc.).
    #[error("Model provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The paper could not be handed to the model's file staging service.
    #[error("Failed to upload '{path}': {source}")]
    UploadFailed {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    /// A generation call on the critical path failed.
    #[error("{stage} failed: {source}")]
    GenerationFailed {
        stage: Stage,
        #[source]
        source: ModelError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed call to the generative model or the file staging service.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The HTTP request could not be sent or its body not read.
    #[error("request failed: {0}")]
    Request(String),

    /// The API answered with a non-success status.
    #[error("API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The API answered, but with no text to use.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The call did not finish within the configured timeout.
    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A local file to be staged could not be read.
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A content part referenced a file that was never staged (or already deleted).
    #[error("unknown staged file '{0}'")]
    UnknownFile(String),

    /// The chat provider reported an error.
    #[error("provider error: {0}")]
    Provider(String),
}
