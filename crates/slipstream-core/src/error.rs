use thiserror::Error;

/// Failure taxonomy for one update run. Every stage funnels into this type;
/// the session reports the `Display` text verbatim as the terminal failure
/// message. Cancellation is not represented here because it is not an
/// error (see [`crate::session::Outcome::Cancelled`]).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to retrieve version info.")]
    VersionUnavailable,

    #[error("Failed to download update.")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP error: {}", .code.as_u16())]
    HttpStatus { code: reqwest::StatusCode },

    #[error("Download incomplete.")]
    IncompleteDownload { expected: u64, received: u64 },

    #[error("Downloaded file is not a valid archive.")]
    CorruptArchive(#[source] zip::result::ZipError),

    #[error("Access denied while extracting files.")]
    PermissionDenied(#[source] std::io::Error),

    #[error("Failed to replace locked file: {name}")]
    LockedFile { name: String },

    #[error("Failed to extract files: {name}: {source}")]
    Member {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn member(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Member {
            name: name.into(),
            source,
        }
    }
}
