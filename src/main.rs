mod capture;
mod config;
mod error;
mod output;
mod request;

use anyhow::Result;
use capture::{BackendKind, CaptureBackend, CaptureDispatcher};
use clap::{CommandFactory, Parser};
use config::CameraConfig;
use request::DEFAULT_DURATION_SECS;
use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Raspberry Pi Camera CLI tool (supports both PiCamera and libcamera)",
    long_about = None
)]
struct Args {
    /// Take a photo and save it as JPG
    #[arg(long, value_name = "FILENAME")]
    take_photo: Option<String>,

    /// Record a video and save it as MP4
    #[arg(long, value_name = "FILENAME")]
    take_video: Option<String>,

    /// Video duration in seconds
    #[arg(long, default_value_t = DEFAULT_DURATION_SECS)]
    duration: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Photo(String),
    Video { filename: String, duration: u32 },
}

impl Args {
    /// The capture to run; a photo request shadows a video request
    fn action(&self) -> Option<Action> {
        if let Some(filename) = &self.take_photo {
            Some(Action::Photo(filename.clone()))
        } else {
            self.take_video.as_ref().map(|filename| Action::Video {
                filename: filename.clone(),
                duration: self.duration,
            })
        }
    }
}

/// How a run ended; decides the process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Captured,
    NothingRequested,
    CaptureFailed,
}

impl Outcome {
    fn succeeded(self) -> bool {
        !matches!(self, Outcome::CaptureFailed)
    }

    fn exit_code(self) -> ExitCode {
        if self.succeeded() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let Some(args) = parse_args(std::env::args_os(), &mut std::io::stdout()) else {
        return ExitCode::FAILURE;
    };

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = CameraConfig::load();
    match run(&args, &config, capture::select_backend, capture::create_backend) {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Parse the command line; a bare invocation writes the help text and yields `None`
fn parse_args<I, T, W>(argv: I, help_out: &mut W) -> Option<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    if argv.len() <= 1 {
        let _ = writeln!(help_out, "{}", Args::command().render_help());
        return None;
    }

    Some(Args::parse_from(argv))
}

fn run<S, B>(args: &Args, config: &CameraConfig, select: S, build: B) -> Result<Outcome>
where
    S: FnOnce(&CameraConfig) -> error::Result<BackendKind>,
    B: FnOnce(BackendKind, &CameraConfig) -> Box<dyn CaptureBackend>,
{
    tracing::debug!("Configuration: {:?}", config);

    let kind = select(config)?;
    println!("Using {}", kind.description());

    let Some(action) = args.action() else {
        tracing::info!("Nothing to capture");
        return Ok(Outcome::NothingRequested);
    };

    let mut dispatcher = CaptureDispatcher::new(build(kind, config));
    tracing::debug!("Dispatching {:?} to {}", action, dispatcher.backend_kind());
    let result = match action {
        Action::Photo(filename) => dispatcher.take_photo(&filename),
        Action::Video { filename, duration } => dispatcher.take_video(&filename, duration),
    };

    // The failure itself was already reported by the dispatcher
    Ok(match result {
        Ok(_) => Outcome::Captured,
        Err(_) => Outcome::CaptureFailed,
    })
}
