use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

use crate::capture::BackendKind;

/// Errors raised while selecting a backend or performing a capture
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Neither PiCamera nor libcamera found!")]
    NoBackend,

    #[error("failed to open camera device {}: {source}", .path.display())]
    Device { path: PathBuf, source: io::Error },

    #[error("camera did not accept {requested} at {width}x{height} (got {actual})")]
    UnsupportedFormat {
        requested: String,
        actual: String,
        width: u32,
        height: u32,
    },

    #[error("camera stream failed: {0}")]
    Stream(#[source] io::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Output { path: PathBuf, source: io::Error },

    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to run `{program}`: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("`{program}` exited with {status}")]
    ExitStatus { program: String, status: ExitStatus },
}

pub type Result<T> = std::result::Result<T, CaptureError>;

/// A capture that was attempted and failed, tagged with what was being done and on which backend
#[derive(Error, Debug)]
#[error("Error {action} with {backend}: {source}")]
pub struct CaptureFailure {
    pub action: &'static str,
    pub backend: BackendKind,
    #[source]
    pub source: CaptureError,
}
