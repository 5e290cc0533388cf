use super::{BackendKind, CaptureBackend};
use crate::error::{CaptureError, Result};
use crate::output::{Frame, OutputSink, StillImageFile, StreamFile};
use crate::request::{CaptureRequest, WARM_UP};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

/// Driver name reported by the legacy (MMAL based) Raspberry Pi camera stack
pub const LEGACY_DRIVER: &str = "bm2835 mmal";

const BUFFER_COUNT: u32 = 4;

/// Still formats in order of preference; compressed ones go straight to disk
const STILL_FORMATS: [&[u8; 4]; 3] = [b"JPEG", b"MJPG", b"YUYV"];
const VIDEO_FORMATS: [&[u8; 4]; 1] = [b"H264"];

/// Check whether the legacy camera driver is loaded behind `path`.
pub fn probe(path: &Path) -> bool {
    let device = match Device::with_path(path) {
        Ok(device) => device,
        Err(e) => {
            tracing::debug!("Legacy camera device {} unavailable: {}", path.display(), e);
            return false;
        }
    };

    match device.query_caps() {
        Ok(caps) => {
            tracing::debug!(
                "{}: driver={}, card={}, bus={}",
                path.display(),
                caps.driver,
                caps.card,
                caps.bus
            );
            is_legacy_driver(&caps.driver, caps.capabilities)
        }
        Err(e) => {
            tracing::debug!("Failed to query {}: {}", path.display(), e);
            false
        }
    }
}

fn is_legacy_driver(driver: &str, capabilities: Flags) -> bool {
    driver.trim() == LEGACY_DRIVER && capabilities.contains(Flags::VIDEO_CAPTURE)
}

/// Captures through the legacy V4L2 driver, in-process
pub struct LegacyDriver {
    device_path: PathBuf,
}

impl LegacyDriver {
    pub fn new<P: AsRef<Path>>(device_path: P) -> Self {
        Self {
            device_path: device_path.as_ref().to_path_buf(),
        }
    }
}

impl CaptureBackend for LegacyDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::LegacyLibrary
    }

    fn capture_still(&mut self, request: &CaptureRequest) -> Result<()> {
        let (width, height) = request.kind.resolution();
        let camera = LegacyCamera::open(&self.device_path)?;
        let format = camera.configure(width, height, &STILL_FORMATS)?;
        let mut sink = StillImageFile::new(&request.filename);
        camera.capture_still(&format, &mut sink, WARM_UP)
    }

    fn record_video(&mut self, request: &CaptureRequest) -> Result<()> {
        let (width, height) = request.kind.resolution();
        let camera = LegacyCamera::open(&self.device_path)?;
        let format = camera.configure(width, height, &VIDEO_FORMATS)?;
        let mut sink = StreamFile::create(&request.filename)?;
        camera.record(&format, &mut sink, request.duration())
    }
}

/// Open handle on the camera device; dropping it releases the camera
struct LegacyCamera {
    device: Device,
    path: PathBuf,
}

impl LegacyCamera {
    fn open(path: &Path) -> Result<Self> {
        tracing::info!("Opening legacy camera at {}", path.display());

        let device = Device::with_path(path).map_err(|source| CaptureError::Device {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            device,
            path: path.to_path_buf(),
        })
    }

    /// Negotiate the first of `fourccs` the driver accepts at the given resolution
    fn configure(&self, width: u32, height: u32, fourccs: &[&[u8; 4]]) -> Result<Format> {
        let mut last_seen = String::from("nothing");

        for code in fourccs {
            let fourcc = FourCC::new(code);
            let requested = Format::new(width, height, fourcc);

            match self.device.set_format(&requested) {
                Ok(actual) if actual.fourcc == fourcc => {
                    if (actual.width, actual.height) != (width, height) {
                        tracing::warn!(
                            "Requested {}x{}, driver chose {}x{}",
                            width,
                            height,
                            actual.width,
                            actual.height
                        );
                    }
                    tracing::info!("Format: {}x{} {}", actual.width, actual.height, actual.fourcc);
                    return Ok(actual);
                }
                Ok(actual) => {
                    tracing::debug!("Driver replaced {} with {}", fourcc, actual.fourcc);
                    last_seen = actual.fourcc.to_string();
                }
                Err(e) => tracing::debug!("Driver rejected {}: {}", fourcc, e),
            }
        }

        Err(CaptureError::UnsupportedFormat {
            requested: fourccs
                .iter()
                .map(|code| FourCC::new(code).to_string())
                .collect::<Vec<_>>()
                .join("/"),
            actual: last_seen,
            width,
            height,
        })
    }

    fn capture_still<S: OutputSink>(
        &self,
        format: &Format,
        sink: &mut S,
        warm_up: Duration,
    ) -> Result<()> {
        let mut stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(CaptureError::Stream)?;

        tracing::debug!("Warming up for {:?}", warm_up);
        let started = Instant::now();
        let mut discarded = 0u32;

        loop {
            let (buf, meta) = stream.next().map_err(CaptureError::Stream)?;
            let data = used_bytes(buf, meta.bytesused);
            if started.elapsed() < warm_up || data.is_empty() {
                discarded += 1;
                continue;
            }

            tracing::debug!("Discarded {} warm-up frames", discarded);
            sink.write_frame(&frame(format, data))?;
            break;
        }

        sink.finish()
    }

    /// Stream encoded buffers into `sink` until `duration` has elapsed
    fn record<S: OutputSink>(&self, format: &Format, sink: &mut S, duration: Duration) -> Result<()> {
        let mut stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(CaptureError::Stream)?;

        let deadline = Instant::now() + duration;
        let mut frame_count = 0u64;

        while Instant::now() < deadline {
            let (buf, meta) = stream.next().map_err(CaptureError::Stream)?;
            let data = used_bytes(buf, meta.bytesused);
            if data.is_empty() {
                continue;
            }
            sink.write_frame(&frame(format, data))?;

            frame_count += 1;
            if frame_count % 30 == 0 {
                tracing::debug!("Recorded {} frames", frame_count);
            }
        }

        // Stop streaming before the file is closed
        drop(stream);
        sink.finish()
    }
}

impl Drop for LegacyCamera {
    fn drop(&mut self) {
        tracing::debug!("Released legacy camera at {}", self.path.display());
    }
}

fn used_bytes(buf: &[u8], bytesused: u32) -> &[u8] {
    let used = (bytesused as usize).min(buf.len());
    &buf[..used]
}

fn frame<'a>(format: &Format, data: &'a [u8]) -> Frame<'a> {
    Frame {
        data,
        fourcc: format.fourcc,
        width: format.width,
        height: format.height,
        stride: format.stride,
    }
}
