mod file;

pub use file::{StillImageFile, StreamFile};

use crate::error::Result;
use v4l::FourCC;

/// A raw buffer dequeued from the camera, tagged with its negotiated format
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub data: &'a [u8],
    pub fourcc: FourCC,
    pub width: u32,
    pub height: u32,
    /// Bytes per row as reported by the driver; 0 means tightly packed
    pub stride: u32,
}

/// Trait for capture destinations
pub trait OutputSink {
    /// Write a frame to the output
    fn write_frame(&mut self, frame: &Frame<'_>) -> Result<()>;

    /// Flush whatever is buffered; the sink must not be written to afterwards
    fn finish(&mut self) -> Result<()>;
}
