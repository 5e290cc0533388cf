use super::{BackendKind, CaptureBackend};
use crate::error::{CaptureError, Result};
use crate::request::CaptureRequest;
use std::process::Command;

/// Check that the libcamera still tool can be executed at all.
///
/// Its exit status is ignored: any tool that runs counts as present.
pub fn probe(still_command: &str) -> bool {
    match Command::new(still_command).arg("--version").output() {
        Ok(output) => {
            tracing::debug!(
                "`{} --version` exited with {}: {}",
                still_command,
                output.status,
                String::from_utf8_lossy(&output.stdout).trim()
            );
            true
        }
        Err(e) => {
            tracing::debug!("`{}` unavailable: {}", still_command, e);
            false
        }
    }
}

/// Captures by running the libcamera command-line tools
pub struct ModernCli {
    still_command: String,
    video_command: String,
}

impl ModernCli {
    pub fn new(still_command: impl Into<String>, video_command: impl Into<String>) -> Self {
        Self {
            still_command: still_command.into(),
            video_command: video_command.into(),
        }
    }

    fn still_invocation(&self, request: &CaptureRequest) -> Command {
        let (width, height) = request.kind.resolution();
        let mut cmd = Command::new(&self.still_command);
        cmd.arg("-o")
            .arg(&request.filename)
            .arg("--width")
            .arg(width.to_string())
            .arg("--height")
            .arg(height.to_string())
            .arg("--nopreview");
        cmd
    }

    fn video_invocation(&self, request: &CaptureRequest) -> Command {
        let (width, height) = request.kind.resolution();
        let mut cmd = Command::new(&self.video_command);
        cmd.arg("-o")
            .arg(&request.filename)
            .arg("--width")
            .arg(width.to_string())
            .arg("--height")
            .arg(height.to_string())
            .arg("-t")
            .arg(request.duration_millis().to_string());
        cmd
    }
}

impl CaptureBackend for ModernCli {
    fn kind(&self) -> BackendKind {
        BackendKind::ModernCli
    }

    fn capture_still(&mut self, request: &CaptureRequest) -> Result<()> {
        run(self.still_invocation(request))
    }

    fn record_video(&mut self, request: &CaptureRequest) -> Result<()> {
        run(self.video_invocation(request))
    }
}

/// Run to completion with inherited stdio; a non-zero exit is an error
fn run(mut cmd: Command) -> Result<()> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    tracing::info!("Running {:?}", cmd);

    let status = cmd.status().map_err(|source| CaptureError::Spawn {
        program: program.clone(),
        source,
    })?;

    if !status.success() {
        return Err(CaptureError::ExitStatus { program, status });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn args(cmd: &Command) -> Vec<&OsStr> {
        cmd.get_args().collect()
    }

    fn cli() -> ModernCli {
        ModernCli::new("libcamera-jpeg", "libcamera-vid")
    }

    #[test]
    fn still_invocation_fixes_resolution_and_disables_preview() {
        let cmd = cli().still_invocation(&CaptureRequest::photo("img.JPG"));
        assert_eq!(cmd.get_program(), "libcamera-jpeg");
        assert_eq!(
            args(&cmd),
            ["-o", "img.JPG", "--width", "2592", "--height", "1944", "--nopreview"]
        );
    }

    #[test]
    fn video_invocation_passes_duration_in_millis() {
        let cmd = cli().video_invocation(&CaptureRequest::video("clip", 5));
        assert_eq!(cmd.get_program(), "libcamera-vid");
        assert_eq!(
            args(&cmd),
            ["-o", "clip.mp4", "--width", "1920", "--height", "1080", "-t", "5000"]
        );
    }

    #[test]
    fn default_duration_is_ten_seconds() {
        let request = CaptureRequest::video("clip", crate::request::DEFAULT_DURATION_SECS);
        let cmd = cli().video_invocation(&request);
        assert_eq!(args(&cmd).last().copied(), Some(OsStr::new("10000")));
    }

    #[test]
    fn configured_tools_are_used() {
        let cli = ModernCli::new("rpicam-jpeg", "rpicam-vid");
        assert_eq!(
            cli.still_invocation(&CaptureRequest::photo("a")).get_program(),
            "rpicam-jpeg"
        );
        assert_eq!(
            cli.video_invocation(&CaptureRequest::video("a", 1)).get_program(),
            "rpicam-vid"
        );
    }

    #[test]
    fn missing_tool_is_not_available() {
        assert!(!probe("picam-cli-test-no-such-tool"));
    }

    #[test]
    fn missing_tool_at_capture_time_is_a_spawn_error() {
        let mut cli = ModernCli::new("picam-cli-test-no-such-tool", "picam-cli-test-no-such-tool");
        let err = cli
            .capture_still(&CaptureRequest::photo("never"))
            .unwrap_err();
        assert!(matches!(err, CaptureError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_reported() {
        let err = run(Command::new("false")).unwrap_err();
        match err {
            CaptureError::ExitStatus { program, status } => {
                assert_eq!(program, "false");
                assert!(!status.success());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(run(Command::new("true")).is_ok());
    }
}
