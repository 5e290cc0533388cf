use std::env;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.env";

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_STILL_CMD: &str = "libcamera-jpeg";
const DEFAULT_VIDEO_CMD: &str = "libcamera-vid";

/// Runtime settings for both camera backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// V4L2 node exposed by the legacy camera driver
    pub device: PathBuf,
    /// libcamera still capture tool, also used for probing
    pub still_command: String,
    /// libcamera video capture tool
    pub video_command: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            still_command: DEFAULT_STILL_CMD.to_owned(),
            video_command: DEFAULT_VIDEO_CMD.to_owned(),
        }
    }
}

impl CameraConfig {
    /// Load `config.env` (if any) next to the executable, then read the environment
    pub fn load() -> Self {
        match env::current_exe() {
            Ok(exe) => Self::load_from(exe.parent().unwrap_or(&exe)),
            Err(e) => {
                tracing::warn!("Failed to locate the running executable: {}", e);
                Self::from_env()
            }
        }
    }

    /// A missing or unreadable `config.env` only costs a warning
    pub fn load_from(exe_dir: &Path) -> Self {
        match find_env_file(exe_dir) {
            Some(path) => match dotenvy::from_path(&path) {
                Ok(()) => tracing::debug!("Loaded configuration from {}", path.display()),
                Err(e) => tracing::warn!(
                    "Ignoring {}: {}, using default values",
                    path.display(),
                    e
                ),
            },
            None => tracing::warn!("No {} found, using default values", CONFIG_FILE_NAME),
        }

        Self::from_env()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            device: non_empty_var("CAMERA_DEVICE")
                .map(PathBuf::from)
                .unwrap_or(defaults.device),
            still_command: non_empty_var("CAMERA_STILL_CMD").unwrap_or(defaults.still_command),
            video_command: non_empty_var("CAMERA_VIDEO_CMD").unwrap_or(defaults.video_command),
        }
    }
}

/// The parent of `exe_dir` wins over `exe_dir` itself.
pub fn find_env_file(exe_dir: &Path) -> Option<PathBuf> {
    exe_dir
        .parent()
        .into_iter()
        .chain(std::iter::once(exe_dir))
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
