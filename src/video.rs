use crate::config::CaptureConfig;
use crate::error::SwapError;
use crate::frame::{self, Frame};
use crate::session::SwapSession;
use anyhow::{Result, anyhow};
use image::EncodableLayout;
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::{nokhwa_initialize, query};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{Level, debug, error, info, span, warn};

/// A source of live frames. `start` and `stop` are idempotent, `stop`
/// never fails, and a `None` from `read_frame` means the stream ended.
pub trait CaptureDevice {
    fn start(&mut self) -> std::result::Result<(), SwapError>;
    fn read_frame(&mut self) -> Option<Frame>;
    fn stop(&mut self);
}

pub struct Webcam {
    config: CaptureConfig,
    camera: Option<Camera>,
}

impl Webcam {
    pub fn new(config: CaptureConfig) -> Webcam {
        Webcam {
            config,
            camera: None,
        }
    }

    fn open(&self) -> Result<Camera> {
        nokhwa_initialize(|granted| {
            debug!("User said {}", granted);
        });

        let cameras = query(ApiBackend::Auto)?;
        cameras
            .iter()
            .for_each(|cam| debug!("Found camera: {:?}", cam));

        let index = match self.config.camera_index {
            Some(i) => CameraIndex::Index(i),
            None => cameras
                .last()
                .ok_or_else(|| anyhow!("No camera found"))?
                .index()
                .clone(),
        };

        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(self.config.width, self.config.height),
                FrameFormat::MJPEG,
                self.config.fps,
            ),
        ));

        let mut camera = Camera::new(index, format)?;
        camera.open_stream()?;
        info!("Opened camera {:?} at {:?}", camera.index(), camera.camera_format());

        Ok(camera)
    }
}

impl CaptureDevice for Webcam {
    fn start(&mut self) -> std::result::Result<(), SwapError> {
        if self.camera.is_some() {
            return Ok(());
        }

        let camera = self.open().map_err(|e| SwapError::io("opening camera", e))?;
        self.camera = Some(camera);
        Ok(())
    }

    fn read_frame(&mut self) -> Option<Frame> {
        let camera = self.camera.as_mut()?;

        match camera.frame().and_then(|buf| buf.decode_image::<RgbFormat>()) {
            Ok(img) => Some(img),
            Err(e) => {
                warn!("Failed to read frame: {e}");
                None
            }
        }
    }

    fn stop(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                warn!("Failed to stop camera stream: {e}");
            }
            debug!("Camera released");
        }
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Replays still frames as if they came from a camera.
pub struct ImageSequence {
    frames: Vec<Frame>,
    position: usize,
    running: bool,
    looping: bool,
}

impl ImageSequence {
    pub fn new(frames: Vec<Frame>) -> ImageSequence {
        ImageSequence {
            frames,
            position: 0,
            running: false,
            looping: false,
        }
    }

    /// Every image in `dir`, in file name order.
    pub fn from_dir(dir: &Path) -> std::result::Result<ImageSequence, SwapError> {
        let context = || format!("listing {}", dir.display());

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| SwapError::io(context(), e))? {
            let path = entry.map_err(|e| SwapError::io(context(), e))?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    matches!(
                        ext.to_ascii_lowercase().as_str(),
                        "png" | "jpg" | "jpeg" | "bmp"
                    )
                })
                .unwrap_or(false);
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();

        let frames = paths
            .iter()
            .map(|p| frame::load(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Loaded {} frames from {}", frames.len(), dir.display());

        Ok(ImageSequence::new(frames))
    }

    pub fn looping(mut self, looping: bool) -> ImageSequence {
        self.looping = looping;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl CaptureDevice for ImageSequence {
    fn start(&mut self) -> std::result::Result<(), SwapError> {
        if !self.running {
            self.running = true;
            self.position = 0;
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Option<Frame> {
        if !self.running || self.frames.is_empty() {
            return None;
        }
        if self.position >= self.frames.len() {
            if !self.looping {
                return None;
            }
            self.position = 0;
        }

        let frame = self.frames[self.position].clone();
        self.position += 1;
        Some(frame)
    }

    fn stop(&mut self) {
        self.running = false;
    }
}

impl Drop for ImageSequence {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: usize,
    pub swapped: usize,
}

/// Pulls frames from an owned capture device, swaps them through the
/// session and hands the results to a sink.
pub struct FrameLoop<'a, D: CaptureDevice> {
    session: &'a SwapSession,
    device: D,
    fps: u32,
    max_frames: Option<usize>,
}

impl<'a, D: CaptureDevice> FrameLoop<'a, D> {
    pub fn new(session: &'a SwapSession, device: D, fps: u32) -> Self {
        FrameLoop {
            session,
            device,
            fps,
            max_frames: None,
        }
    }

    pub fn max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Runs until the device runs dry, the frame limit is hit or the sink
    /// fails. The device is stopped on every exit path.
    pub fn run(&mut self, sink: impl FnMut(&Frame) -> Result<()>) -> Result<FrameStats> {
        self.device.start()?;
        let res = self.pump(sink);
        self.device.stop();

        if let Ok(stats) = &res {
            info!("Processed {} frames, swapped {}", stats.frames, stats.swapped);
        }
        res
    }

    fn pump(&mut self, mut sink: impl FnMut(&Frame) -> Result<()>) -> Result<FrameStats> {
        let frame_interval = (self.fps > 0).then(|| Duration::from_secs_f64(1. / self.fps as f64));
        let mut stats = FrameStats::default();

        while self.max_frames.is_none_or(|max| stats.frames < max) {
            let start = Instant::now();
            let Some(frame) = self.device.read_frame() else {
                debug!("Capture device returned no frame, stopping");
                break;
            };

            let span = span!(Level::DEBUG, "frame", n = stats.frames);
            let _guard = span.enter();

            let output = match self.session.process(&frame) {
                Ok(output) => {
                    if output != frame {
                        stats.swapped += 1;
                    }
                    output
                }
                Err(SwapError::NotConfigured) => frame,
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping frame: {e}");
                    frame
                }
                Err(e) => {
                    error!("Frame processing failed: {e}");
                    return Err(e.into());
                }
            };

            sink(&output)?;
            stats.frames += 1;

            if let Some(interval) = frame_interval {
                if let Some(rest) = interval.checked_sub(start.elapsed()) {
                    thread::sleep(rest);
                }
            }
        }

        Ok(stats)
    }
}

pub struct OutputVideoStream {
    ffplay: std::process::Child,
}

impl OutputVideoStream {
    pub fn new(width: u32, height: u32, fps: u32) -> Result<Self> {
        let ffplay = Command::new("ffplay")
            .args([
                "-f",
                "rawvideo",
                "-pixel_format",
                "rgb24",
                "-video_size",
                &format!("{}x{}", width, height),
                "-framerate",
                &fps.to_string(),
                "-fflags",
                "nobuffer",
                "-flags",
                "low_delay",
                "-",
            ])
            .stdin(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { ffplay })
    }

    pub fn write_frame(&mut self, img: &Frame) -> Result<()> {
        if let Some(stdin) = self.ffplay.stdin.as_mut() {
            stdin.write_all(img.as_bytes())?;
            stdin.flush()?;
        }

        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        drop(self.ffplay.stdin.take());
        self.ffplay.wait()?;
        Ok(())
    }
}
