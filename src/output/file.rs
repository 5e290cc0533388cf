use super::{Frame, OutputSink};
use crate::error::{CaptureError, Result};
use image::{ImageFormat, RgbImage};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use v4l::FourCC;

/// Writes exactly one frame to disk as a JPEG file
pub struct StillImageFile {
    path: PathBuf,
    written: bool,
}

impl StillImageFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            written: false,
        }
    }

    fn output_error(&self, source: io::Error) -> CaptureError {
        CaptureError::Output {
            path: self.path.clone(),
            source,
        }
    }
}

impl OutputSink for StillImageFile {
    fn write_frame(&mut self, frame: &Frame<'_>) -> Result<()> {
        let fourcc = frame.fourcc;
        if fourcc == FourCC::new(b"JPEG") || fourcc == FourCC::new(b"MJPG") {
            // Already compressed by the driver
            std::fs::write(&self.path, frame.data).map_err(|e| self.output_error(e))?;
        } else if fourcc == FourCC::new(b"YUYV") {
            let row_bytes = frame.width as usize * 2;
            let stride = (frame.stride as usize).max(row_bytes);
            let short_frame = || {
                CaptureError::Stream(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "short YUYV frame: {} bytes for {}x{} (stride {})",
                        frame.data.len(),
                        frame.width,
                        frame.height,
                        stride
                    ),
                ))
            };
            let packed = packed_rows(frame.data, stride, row_bytes, frame.height as usize)
                .ok_or_else(short_frame)?;
            let rgb = yuyv_to_rgb(&packed);
            let image =
                RgbImage::from_raw(frame.width, frame.height, rgb).ok_or_else(short_frame)?;
            image.save_with_format(&self.path, ImageFormat::Jpeg)?;
        } else {
            return Err(CaptureError::UnsupportedFormat {
                requested: "JPEG".to_owned(),
                actual: fourcc.to_string(),
                width: frame.width,
                height: frame.height,
            });
        }

        tracing::debug!(
            "Wrote {} frame ({} bytes) to {}",
            fourcc,
            frame.data.len(),
            self.path.display()
        );
        self.written = true;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.written {
            Ok(())
        } else {
            Err(self.output_error(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no frame was captured",
            )))
        }
    }
}

/// Appends encoded buffers (H.264 elementary stream) to a file
pub struct StreamFile {
    path: PathBuf,
    writer: BufWriter<File>,
    frames: u64,
    bytes: u64,
}

impl StreamFile {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| CaptureError::Output {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            frames: 0,
            bytes: 0,
        })
    }
}

impl OutputSink for StreamFile {
    fn write_frame(&mut self, frame: &Frame<'_>) -> Result<()> {
        self.writer
            .write_all(frame.data)
            .map_err(|source| CaptureError::Output {
                path: self.path.clone(),
                source,
            })?;
        self.frames += 1;
        self.bytes += frame.data.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.frames == 0 {
            return Err(CaptureError::Output {
                path: self.path.clone(),
                source: io::Error::new(io::ErrorKind::UnexpectedEof, "no frames were recorded"),
            });
        }

        self.writer.flush().map_err(|source| CaptureError::Output {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(
            "Wrote {} frames ({} bytes) to {}",
            self.frames,
            self.bytes,
            self.path.display()
        );
        Ok(())
    }
}

/// Drop the per-row padding some drivers add after `row_bytes`
fn packed_rows(data: &[u8], stride: usize, row_bytes: usize, height: usize) -> Option<Vec<u8>> {
    let mut packed = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        packed.extend_from_slice(data.get(start..start + row_bytes)?);
    }
    Some(packed)
}

/// Convert packed YUV422 (Y0 U Y1 V) to interleaved RGB
fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);

    for chunk in yuyv.chunks_exact(4) {
        let (y1, u, y2, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y2, u, v));
    }

    rgb
}

/// Convert YUV to RGB color space
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.140 * v).round().clamp(0.0, 255.0) as u8;
    let g = (y - 0.395 * u - 0.581 * v).round().clamp(0.0, 255.0) as u8;
    let b = (y + 2.032 * u).round().clamp(0.0, 255.0) as u8;

    [r, g, b]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_path(name: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("picam-cli-{suffix}-{name}"))
    }

    #[test]
    fn neutral_chroma_gives_gray() {
        assert_eq!(yuv_to_rgb(0, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(128, 128, 128), [128, 128, 128]);
        assert_eq!(yuv_to_rgb(255, 128, 128), [255, 255, 255]);
    }

    #[test]
    fn strong_chroma_is_clamped() {
        let [r, g, b] = yuv_to_rgb(255, 255, 255);
        assert_eq!(r, 255);
        assert_eq!(b, 255);
        assert!(g < 255);
    }

    #[test]
    fn one_macropixel_expands_to_two_pixels() {
        let rgb = yuyv_to_rgb(&[16, 128, 235, 128, 99]);
        assert_eq!(rgb, vec![16, 16, 16, 235, 235, 235]);
    }

    #[test]
    fn yuyv_still_is_encoded_as_jpeg() {
        let path = scratch_path("still.jpg");
        let data = [128u8; 4 * 2 * 2];
        let mut sink = StillImageFile::new(&path);
        sink.write_frame(&Frame {
            data: &data,
            fourcc: FourCC::new(b"YUYV"),
            width: 4,
            height: 2,
            stride: 8,
        })
        .expect("frame should encode");
        sink.finish().expect("frame was written");

        let decoded = image::open(&path).expect("jpeg should decode");
        assert_eq!((decoded.width(), decoded.height()), (4, 2));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn jpeg_still_is_written_verbatim() {
        let path = scratch_path("raw.jpg");
        let data = [0xFF, 0xD8, 0xFF, 0xD9];
        let mut sink = StillImageFile::new(&path);
        sink.write_frame(&Frame {
            data: &data,
            fourcc: FourCC::new(b"MJPG"),
            width: 1,
            height: 1,
            stride: 0,
        })
        .expect("write");
        assert_eq!(std::fs::read(&path).expect("read back"), data);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn unknown_still_format_is_rejected() {
        let path = scratch_path("bad.jpg");
        let mut sink = StillImageFile::new(&path);
        let err = sink
            .write_frame(&Frame {
                data: &[0; 8],
                fourcc: FourCC::new(b"H264"),
                width: 2,
                height: 2,
                stride: 0,
            })
            .unwrap_err();
        assert!(matches!(err, CaptureError::UnsupportedFormat { .. }));
        assert!(sink.finish().is_err());
        assert!(!path.exists());
    }

    #[test]
    fn stream_file_concatenates_buffers() {
        let path = scratch_path("clip.mp4");
        let mut sink = StreamFile::create(&path).expect("create");
        for chunk in [&[0u8, 0, 0, 1][..], &[0x65, 0x88][..]] {
            sink.write_frame(&Frame {
                data: chunk,
                fourcc: FourCC::new(b"H264"),
                width: 1920,
                height: 1080,
                stride: 0,
            })
            .expect("write");
        }
        sink.finish().expect("flush");
        assert_eq!(
            std::fs::read(&path).expect("read back"),
            vec![0, 0, 0, 1, 0x65, 0x88]
        );
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn padded_rows_are_stripped() {
        let data = [
            16, 128, 16, 128, 0xAA, 0xAA, 0xAA, 0xAA, //
            235, 128, 235, 128, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        let packed = packed_rows(&data, 8, 4, 2).expect("rows fit");
        assert_eq!(packed, vec![16, 128, 16, 128, 235, 128, 235, 128]);
        assert_eq!(
            yuyv_to_rgb(&packed),
            vec![16, 16, 16, 16, 16, 16, 235, 235, 235, 235, 235, 235]
        );
    }

    #[test]
    fn padded_yuyv_still_keeps_its_geometry() {
        let path = scratch_path("padded.jpg");
        let mut data = vec![0xAAu8; 16 * 2];
        for row in data.chunks_exact_mut(16) {
            row[..8].copy_from_slice(&[128; 8]);
        }
        let mut sink = StillImageFile::new(&path);
        sink.write_frame(&Frame {
            data: &data,
            fourcc: FourCC::new(b"YUYV"),
            width: 4,
            height: 2,
            stride: 16,
        })
        .expect("padded frame should encode");

        let decoded = image::open(&path).expect("jpeg should decode").to_rgb8();
        assert_eq!(decoded.dimensions(), (4, 2));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn frame_shorter_than_its_stride_is_rejected() {
        let path = scratch_path("short.jpg");
        let mut sink = StillImageFile::new(&path);
        let err = sink
            .write_frame(&Frame {
                data: &[128; 10],
                fourcc: FourCC::new(b"YUYV"),
                width: 2,
                height: 2,
                stride: 8,
            })
            .unwrap_err();
        assert!(matches!(err, CaptureError::Stream(_)));
        assert!(!path.exists());
    }

    #[test]
    fn empty_recording_is_an_error() {
        let path = scratch_path("empty.mp4");
        let mut sink = StreamFile::create(&path).expect("create");
        let err = sink.finish().unwrap_err();
        assert!(matches!(err, CaptureError::Output { .. }));
        assert!(err.to_string().contains("no frames were recorded"));
        let _ = std::fs::remove_file(path);
    }
}
