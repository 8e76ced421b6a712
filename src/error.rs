//! Error handling for the Haajar kiosk
//!
//! This module defines the crate error type and a Result alias. Per-scan
//! policy results (unknown code, already checked in, ...) are not errors;
//! they are [`crate::types::ScanOutcome`] values.

use thiserror::Error;

/// Main error type for kiosk operations
#[derive(Error, Debug)]
pub enum KioskError {
    /// The capture device could not be opened
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    /// A single frame read failed (transient)
    #[error("Frame read failed: {0}")]
    ReadFailed(String),

    /// A capture source is already active on this kiosk
    #[error("Capture is already running")]
    AlreadyCapturing,

    /// Errors from the durable store
    #[error("Store error: {0}")]
    Store(#[from] sea_orm::DbErr),

    /// The requested session does not exist
    #[error("Session {0} not found")]
    SessionNotFound(i64),

    /// Operator input rejected before any write
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// Image decoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<KioskError>,
    },
}

impl KioskError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        KioskError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether the capture loop may retry after this error
    pub fn is_transient(&self) -> bool {
        match self {
            KioskError::ReadFailed(_) => true,
            KioskError::WithContext { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for kiosk operations
pub type Result<T> = std::result::Result<T, KioskError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, sea_orm::DbErr> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| KioskError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| KioskError::from(e).with_context(f()))
    }
}
