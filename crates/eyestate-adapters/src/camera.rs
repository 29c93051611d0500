//! Synthetic camera adapter.
//!
//! Streams a still image as YUV 4:2:0 frames through the same provider,
//! device, session and reader ports a real camera framework would use.
//! Frames only flow while a repeating request targets the reader.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam_channel::{SendTimeoutError, Sender};
use eyestate_core::domain::{
    write_yuv420, yuv420_len, BufferPool, CaptureDevice, Frame, LensFacing, PixelFormat, Size,
};
use eyestate_core::error::CaptureError;
use eyestate_core::ports::{
    CameraProvider, CaptureRequest, DeviceHandle, FrameReader, ReaderConfig, SessionEvent,
    SessionEvents, StreamingSession, SurfaceId,
};
use image::imageops::FilterType;
use image::RgbaImage;
use tracing::{debug, info, warn};

/// Synthetic camera settings.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Delay between frames.
    pub frame_interval: Duration,
    /// Sizes every device advertises.
    pub sizes: Vec<Size>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            sizes: vec![
                Size::new(1920, 1080),
                Size::new(1280, 720),
                Size::new(720, 720),
                Size::new(640, 480),
                Size::new(320, 240),
            ],
        }
    }
}

#[derive(Debug, Default)]
struct StreamControl {
    reader: AtomicU64,
    streaming: AtomicBool,
}

/// A camera provider backed by a still image.
///
/// Lists a back camera `"0"` and a front camera `"1"`.
pub struct SyntheticCamera {
    source: Arc<RgbaImage>,
    config: SyntheticConfig,
    control: Arc<StreamControl>,
    next_surface: AtomicU64,
}

impl SyntheticCamera {
    /// Creates a camera streaming `source`.
    #[must_use]
    pub fn new(source: RgbaImage, config: SyntheticConfig) -> Self {
        Self {
            source: Arc::new(source),
            config,
            control: Arc::new(StreamControl::default()),
            next_surface: AtomicU64::new(1000),
        }
    }

    /// Creates a camera streaming the image at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be opened or decoded.
    pub fn from_path(path: &Path, config: SyntheticConfig) -> anyhow::Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("Failed to open source image: {}", path.display()))?
            .to_rgba8();
        Ok(Self::new(image, config))
    }

    /// Whether a repeating request is currently driving the reader.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.control.streaming.load(Ordering::SeqCst)
    }
}

impl CameraProvider for SyntheticCamera {
    fn devices(&self) -> Result<Vec<CaptureDevice>, CaptureError> {
        let sizes = &self.config.sizes;
        if sizes.is_empty() {
            return Err(CaptureError::UnsupportedDevice(
                "synthetic camera has no sizes".into(),
            ));
        }
        Ok(vec![
            CaptureDevice::new("0", LensFacing::Back)
                .with_format(PixelFormat::Yuv420, sizes.clone())
                .with_display_sizes(sizes.clone()),
            CaptureDevice::new("1", LensFacing::Front)
                .with_format(PixelFormat::Yuv420, sizes.clone())
                .with_display_sizes(sizes.clone()),
        ])
    }

    fn open_device(&self, device_id: &str, events: SessionEvents) -> Result<(), CaptureError> {
        if device_id != "0" && device_id != "1" {
            return Err(CaptureError::UnsupportedDevice(format!(
                "no synthetic device {device_id}"
            )));
        }
        info!("Opening synthetic camera {device_id}");
        let device = SyntheticDevice {
            id: device_id.to_string(),
            control: Arc::clone(&self.control),
        };
        events
            .send(SessionEvent::Opened(Box::new(device)))
            .map_err(|_| CaptureError::Platform(anyhow::anyhow!("session event channel closed")))
    }

    fn create_reader(
        &self,
        config: ReaderConfig,
        frames: Sender<Frame>,
    ) -> Result<Box<dyn FrameReader>, CaptureError> {
        if config.format != PixelFormat::Yuv420 {
            return Err(CaptureError::SessionConfiguration(format!(
                "synthetic camera cannot produce {:?}",
                config.format
            )));
        }

        let surface = SurfaceId(self.next_surface.fetch_add(1, Ordering::SeqCst));
        self.control.reader.store(surface.0, Ordering::SeqCst);
        self.control.streaming.store(false, Ordering::SeqCst);

        let reader = SyntheticReader::spawn(
            surface,
            &self.source,
            config,
            self.config.frame_interval,
            Arc::clone(&self.control),
            frames,
        )?;
        Ok(Box::new(reader))
    }
}

/// An opened synthetic device.
pub struct SyntheticDevice {
    id: String,
    control: Arc<StreamControl>,
}

impl DeviceHandle for SyntheticDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_session(
        &mut self,
        outputs: &[SurfaceId],
        events: SessionEvents,
    ) -> Result<(), CaptureError> {
        let reader = SurfaceId(self.control.reader.load(Ordering::SeqCst));
        let event = if outputs.contains(&reader) {
            SessionEvent::Configured(Box::new(SyntheticSession {
                control: Arc::clone(&self.control),
            }))
        } else {
            warn!("Session outputs do not include the frame reader");
            SessionEvent::ConfigureFailed
        };
        events
            .send(event)
            .map_err(|_| CaptureError::Platform(anyhow::anyhow!("session event channel closed")))
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        debug!("Closing synthetic camera {}", self.id);
        self.control.streaming.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// A synthetic streaming session.
pub struct SyntheticSession {
    control: Arc<StreamControl>,
}

impl StreamingSession for SyntheticSession {
    fn set_repeating_request(&mut self, request: &CaptureRequest) -> Result<(), CaptureError> {
        let reader = SurfaceId(self.control.reader.load(Ordering::SeqCst));
        let streaming = request.targets.contains(&reader);
        self.control.streaming.store(streaming, Ordering::SeqCst);
        debug!("Repeating request set, streaming={streaming}");
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.control.streaming.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Frame reader fed by a background producer thread.
pub struct SyntheticReader {
    surface: SurfaceId,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyntheticReader {
    fn spawn(
        surface: SurfaceId,
        source: &RgbaImage,
        config: ReaderConfig,
        interval: Duration,
        control: Arc<StreamControl>,
        frames: Sender<Frame>,
    ) -> Result<Self, CaptureError> {
        let size = config.size;
        let scaled = image::imageops::resize(source, size.width, size.height, FilterType::Triangle);
        let mut encoded = vec![0; yuv420_len(size)];
        if !write_yuv420(&scaled, &mut encoded) {
            return Err(CaptureError::SessionConfiguration(format!(
                "cannot encode {size} frame"
            )));
        }

        let pool = BufferPool::new(config.max_images, encoded.len());
        let stop = Arc::new(AtomicBool::new(false));
        let producer = Producer {
            surface,
            size,
            encoded,
            pool,
            interval,
            control,
            stop: Arc::clone(&stop),
            frames,
        };
        let handle = thread::Builder::new()
            .name("synthetic-camera".to_string())
            .spawn(move || producer.run())
            .context("Failed to spawn synthetic camera thread")?;

        Ok(Self {
            surface,
            stop,
            handle: Some(handle),
        })
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Synthetic camera thread panicked");
            }
        }
    }
}

impl FrameReader for SyntheticReader {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.shutdown();
        Ok(())
    }
}

impl Drop for SyntheticReader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Producer {
    surface: SurfaceId,
    size: Size,
    encoded: Vec<u8>,
    pool: BufferPool,
    interval: Duration,
    control: Arc<StreamControl>,
    stop: Arc<AtomicBool>,
    frames: Sender<Frame>,
}

impl Producer {
    fn is_targeted(&self) -> bool {
        self.control.streaming.load(Ordering::SeqCst)
            && self.control.reader.load(Ordering::SeqCst) == self.surface.0
    }

    fn run(self) {
        let start = Instant::now();
        let mut delivered = 0u64;

        while !self.stop.load(Ordering::SeqCst) {
            if !self.is_targeted() {
                thread::sleep(self.interval);
                continue;
            }

            let Some(mut buffer) = self.pool.acquire_timeout(self.interval) else {
                debug!("No free frame buffer, skipping frame");
                continue;
            };
            buffer.copy_from_slice(&self.encoded);
            let Some(frame) = Frame::new(self.size, start.elapsed(), buffer) else {
                warn!("Frame buffer too small for {}", self.size);
                break;
            };

            match self.frames.send_timeout(frame, self.interval) {
                Ok(()) => delivered += 1,
                Err(SendTimeoutError::Timeout(_)) => debug!("Frame consumer busy, frame dropped"),
                Err(SendTimeoutError::Disconnected(_)) => break,
            }
            thread::sleep(self.interval);
        }

        debug!("Synthetic camera delivered {delivered} frames");
    }
}
