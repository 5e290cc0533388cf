use std::path::PathBuf;
use std::time::Duration;

/// Video length used when `--duration` is not given
pub const DEFAULT_DURATION_SECS: u32 = 10;

/// Still capture resolution (full sensor)
pub const PHOTO_RESOLUTION: (u32, u32) = (2592, 1944);

/// Video capture resolution
pub const VIDEO_RESOLUTION: (u32, u32) = (1920, 1080);

/// Pause between starting the sensor and grabbing a still on the legacy driver
pub const WARM_UP: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Photo,
    Video,
}

impl CaptureKind {
    /// Extension the output file must carry, including the dot
    pub fn extension(self) -> &'static str {
        match self {
            CaptureKind::Photo => ".jpg",
            CaptureKind::Video => ".mp4",
        }
    }

    /// Verb phrase used in console messages
    pub fn action(self) -> &'static str {
        match self {
            CaptureKind::Photo => "taking photo",
            CaptureKind::Video => "recording video",
        }
    }

    pub fn resolution(self) -> (u32, u32) {
        match self {
            CaptureKind::Photo => PHOTO_RESOLUTION,
            CaptureKind::Video => VIDEO_RESOLUTION,
        }
    }
}

/// A single photo or video capture, with its output filename already normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub kind: CaptureKind,
    pub filename: PathBuf,
    pub duration_secs: u32,
}

impl CaptureRequest {
    pub fn photo(filename: &str) -> Self {
        Self {
            kind: CaptureKind::Photo,
            filename: normalize_filename(filename, CaptureKind::Photo),
            duration_secs: 0,
        }
    }

    pub fn video(filename: &str, duration_secs: u32) -> Self {
        Self {
            kind: CaptureKind::Video,
            filename: normalize_filename(filename, CaptureKind::Video),
            duration_secs,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_secs))
    }

    /// Recording length in milliseconds, as libcamera's `-t` expects
    pub fn duration_millis(&self) -> u64 {
        u64::from(self.duration_secs) * 1000
    }
}

/// Append the kind's extension unless the name already ends with it (any case).
pub fn normalize_filename(filename: &str, kind: CaptureKind) -> PathBuf {
    let ext = kind.extension();
    if filename.to_lowercase().ends_with(ext) {
        PathBuf::from(filename)
    } else {
        PathBuf::from(format!("{filename}{ext}"))
    }
}
