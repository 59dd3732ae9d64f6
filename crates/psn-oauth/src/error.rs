use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("system random source failed: {0}")]
    RandomSource(#[from] rand::Error),

    #[error("invalid redirect URL: {0}")]
    InvalidRedirectUrl(#[from] url::ParseError),

    #[error("redirect URL has no code parameter")]
    MissingAuthorizationCode,

    #[error("error while performing HTTP operation: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned status {0}")]
    TokenEndpoint(reqwest::StatusCode),

    #[error("error while decoding token response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot open or create {path}: {source}")]
    OutputFile { path: PathBuf, source: io::Error },

    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Process exit code the binaries report for this error.
    ///
    /// Problems with the pasted redirect URL are usage errors (2), output
    /// files that cannot be written are 3, everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidRedirectUrl(_) | Error::MissingAuthorizationCode => 2,
            Error::OutputFile { .. } => 3,
            _ => 1,
        }
    }
}
