mod legacy;
mod modern;

pub use legacy::LegacyDriver;
pub use modern::ModernCli;

use crate::config::CameraConfig;
use crate::error::{CaptureError, CaptureFailure, Result};
use crate::request::CaptureRequest;
use std::fmt;
use std::path::PathBuf;

/// Which camera stack the process captures with; fixed once selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Legacy V4L2 camera driver, driven in-process
    LegacyLibrary,
    /// libcamera command-line tools, run as subprocesses
    ModernCli,
}

impl BackendKind {
    pub fn description(self) -> &'static str {
        match self {
            BackendKind::LegacyLibrary => "PiCamera (legacy camera system)",
            BackendKind::ModernCli => "libcamera (new camera system)",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::LegacyLibrary => f.write_str("PiCamera"),
            BackendKind::ModernCli => f.write_str("libcamera"),
        }
    }
}

/// Trait for camera backends
pub trait CaptureBackend {
    fn kind(&self) -> BackendKind;

    /// Write one still image to `request.filename`
    fn capture_still(&mut self, request: &CaptureRequest) -> Result<()>;

    /// Record to `request.filename`, blocking for the requested duration
    fn record_video(&mut self, request: &CaptureRequest) -> Result<()>;
}

/// Probe the machine once: the legacy driver wins, then the libcamera tools.
pub fn select_backend(config: &CameraConfig) -> Result<BackendKind> {
    detect(
        || legacy::probe(&config.device),
        || modern::probe(&config.still_command),
    )
}

fn detect(
    legacy_available: impl FnOnce() -> bool,
    modern_available: impl FnOnce() -> bool,
) -> Result<BackendKind> {
    if legacy_available() {
        Ok(BackendKind::LegacyLibrary)
    } else if modern_available() {
        Ok(BackendKind::ModernCli)
    } else {
        Err(CaptureError::NoBackend)
    }
}

pub fn create_backend(kind: BackendKind, config: &CameraConfig) -> Box<dyn CaptureBackend> {
    match kind {
        BackendKind::LegacyLibrary => Box::new(LegacyDriver::new(&config.device)),
        BackendKind::ModernCli => Box::new(ModernCli::new(
            config.still_command.clone(),
            config.video_command.clone(),
        )),
    }
}

/// Runs a single capture on the selected backend and reports it on the console
pub struct CaptureDispatcher {
    backend: Box<dyn CaptureBackend>,
}

impl CaptureDispatcher {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn take_photo(&mut self, filename: &str) -> std::result::Result<PathBuf, CaptureFailure> {
        let request = CaptureRequest::photo(filename);
        tracing::info!(
            "Taking photo with {} into {}",
            self.backend.kind(),
            request.filename.display()
        );

        let result = self.backend.capture_still(&request);
        self.report(request, result, "Photo")
    }

    pub fn take_video(
        &mut self,
        filename: &str,
        duration_secs: u32,
    ) -> std::result::Result<PathBuf, CaptureFailure> {
        let request = CaptureRequest::video(filename, duration_secs);
        tracing::info!(
            "Recording video with {} into {}",
            self.backend.kind(),
            request.filename.display()
        );

        println!("Recording video for {} seconds...", duration_secs);
        let result = self.backend.record_video(&request);
        self.report(request, result, "Video")
    }

    fn report(
        &self,
        request: CaptureRequest,
        result: Result<()>,
        noun: &str,
    ) -> std::result::Result<PathBuf, CaptureFailure> {
        match result {
            Ok(()) => {
                println!("{} saved as: {}", noun, request.filename.display());
                Ok(request.filename)
            }
            Err(source) => {
                let failure = CaptureFailure {
                    action: request.kind.action(),
                    backend: self.backend.kind(),
                    source,
                };
                eprintln!("{failure}");
                Err(failure)
            }
        }
    }
}
