//! Collaborator traits around the pipeline and their stock implementations.

use crate::frame::{Frame, ImageFormat};
use crate::{CalibrationError, ConfigError, Detection, SinkError, SizeTable};
use fiducial_pose_core::ImageError;
use fiducial_pose_pnp::CameraModel;
use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Why a frame could not be delivered.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    /// Nothing ready yet; try again shortly.
    #[error("no frame available yet")]
    Unavailable,
    #[error("end of stream")]
    EndOfStream,
    /// The frame cannot be converted to grayscale; skip it.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("frame has {actual} bytes, expected {expected}")]
    Malformed { expected: usize, actual: usize },
    #[error(transparent)]
    Image(#[from] ImageError),
    /// One input of a multi-file source could not be opened or read.
    #[error("cannot read {}: {source}", .path.display())]
    Unreadable {
        path: std::path::PathBuf,
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Whether the loop should drop this frame and carry on.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_)
                | Self::Malformed { .. }
                | Self::Image(_)
                | Self::Unreadable { .. }
        )
    }
}

/// Blocking source of frames.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, FrameError>;
}

/// Receiver of detections.
pub trait DetectionSink {
    fn publish(&mut self, detection: Detection) -> Result<(), SinkError>;
}

/// Supplies the camera model; failures keep the pipeline from starting.
pub trait CalibrationProvider {
    fn load(&self) -> Result<CameraModel, CalibrationError>;
}

/// Supplies per-id marker sizes.
pub trait SizeTableProvider {
    fn load(&self) -> Result<SizeTable, ConfigError>;
}

impl CalibrationProvider for CameraModel {
    fn load(&self) -> Result<CameraModel, CalibrationError> {
        Ok(self.clone())
    }
}

impl SizeTableProvider for SizeTable {
    fn load(&self) -> Result<SizeTable, ConfigError> {
        Ok(self.clone())
    }
}

impl DetectionSink for Vec<Detection> {
    fn publish(&mut self, detection: Detection) -> Result<(), SinkError> {
        self.push(detection);
        Ok(())
    }
}

fn wall_clock_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Back-to-back fixed-size frames of known geometry read from any reader.
///
/// A clean end of input, or a trailing partial frame, ends the stream.
/// `WouldBlock` / `Interrupted` reads surface as [`FrameError::Unavailable`];
/// bytes of a partially read frame are kept for the next call.
pub struct RawStreamSource<R> {
    reader: R,
    format: ImageFormat,
    width: usize,
    height: usize,
    buf: Vec<u8>,
    filled: usize,
    clock: Option<(u64, u64)>,
    frames: u64,
}

impl<R: Read> RawStreamSource<R> {
    pub fn new(
        reader: R,
        format: ImageFormat,
        width: usize,
        height: usize,
    ) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::EmptyImage { width, height });
        }
        Ok(Self {
            reader,
            format,
            width,
            height,
            buf: vec![0; format.frame_len(width, height)],
            filled: 0,
            clock: None,
            frames: 0,
        })
    }

    /// Stamp frames `start_ns + k · interval_ns` instead of wall-clock time.
    pub fn with_frame_clock(mut self, start_ns: u64, interval_ns: u64) -> Self {
        self.clock = Some((start_ns, interval_ns));
        self
    }

    pub fn frames_read(&self) -> u64 {
        self.frames
    }
}

impl<R: Read> FrameSource for RawStreamSource<R> {
    fn next_frame(&mut self) -> Result<Frame, FrameError> {
        while self.filled < self.buf.len() {
            match self.reader.read(&mut self.buf[self.filled..]) {
                Ok(0) => {
                    if self.filled > 0 {
                        log::warn!(
                            "stream ended inside a frame ({} of {} bytes)",
                            self.filled,
                            self.buf.len()
                        );
                    }
                    return Err(FrameError::EndOfStream);
                }
                Ok(n) => self.filled += n,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    return Err(FrameError::Unavailable)
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.filled = 0;
        let timestamp_ns = match self.clock {
            Some((start, step)) => start + step * self.frames,
            None => wall_clock_ns(),
        };
        self.frames += 1;
        Frame::from_raw(
            self.format,
            self.width,
            self.height,
            &self.buf,
            timestamp_ns,
        )
    }
}

/// Decodes a list of image files, one frame each, converting to luma.
///
/// Files the `image` crate cannot decode are reported as
/// [`FrameError::UnsupportedFormat`], files that cannot be opened as
/// [`FrameError::Unreadable`]; both are skippable, so one bad path does not
/// end the batch. The timestamp is the file's mtime.
#[cfg(feature = "image")]
pub struct ImageFileSource {
    paths: std::collections::VecDeque<std::path::PathBuf>,
}

#[cfg(feature = "image")]
impl ImageFileSource {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<std::path::PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(feature = "image")]
impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<Frame, FrameError> {
        let path = self.paths.pop_front().ok_or(FrameError::EndOfStream)?;
        let decoded = image::open(&path).map_err(|e| match e {
            image::ImageError::IoError(source) => FrameError::Unreadable {
                path: path.clone(),
                source,
            },
            other => FrameError::UnsupportedFormat(format!("{}: {other}", path.display())),
        })?;
        let luma = decoded.to_luma8();
        let (w, h) = (luma.width() as usize, luma.height() as usize);
        let image = fiducial_pose_core::GrayImage::from_raw(w, h, luma.into_raw())?;
        let timestamp_ns = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Ok(Frame::new(image, timestamp_ns))
    }
}

/// Writes one JSON object per detection, newline separated.
///
/// Each line is serialized in full before it is written, so an I/O failure
/// surfaces as [`SinkError::Io`].
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> DetectionSink for JsonLinesSink<W> {
    fn publish(&mut self, detection: Detection) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&detection)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        Ok(())
    }
}
