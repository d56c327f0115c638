//! V4L2 webcam source
//!
//! The device and its mmap stream live on a dedicated capture thread; the
//! most recent frame is published to the async side, the way a video element
//! always shows the latest frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::{CameraError, CameraSource, StreamConstraints, StreamInfo, VideoFrame};

const BUFFER_COUNT: u32 = 4;

struct CaptureThread {
    stop: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<VideoFrame>>>,
    handle: JoinHandle<()>,
}

/// V4L2 camera (e.g. `/dev/video0`)
pub struct V4l2Camera {
    device: String,
    size: (u32, u32),
    thread: Option<CaptureThread>,
}

impl V4l2Camera {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            size: (0, 0),
            thread: None,
        }
    }
}

fn negotiate(
    path: &str,
    constraints: &StreamConstraints,
) -> Result<(v4l::Device, v4l::Format), CameraError> {
    use v4l::video::Capture;

    let device = v4l::Device::with_path(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(e.to_string()),
        _ => CameraError::Open(format!("{}: {}", path, e)),
    })?;

    let mut format = device
        .format()
        .map_err(|e| CameraError::Format(e.to_string()))?;
    format.width = constraints.ideal_width;
    format.height = constraints.ideal_height;
    format.fourcc = v4l::FourCC::new(b"MJPG");

    let format = match device.set_format(&format) {
        Ok(format) => format,
        Err(e) => {
            warn!("Failed to set MJPG format on {}: {}", path, e);
            device
                .format()
                .map_err(|e| CameraError::Format(e.to_string()))?
        }
    };

    Ok((device, format))
}

fn decode(buf: &[u8], format: &v4l::Format, timestamp_ns: u64, sequence: u32) -> Option<VideoFrame> {
    if format.fourcc == v4l::FourCC::new(b"MJPG") {
        match image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg) {
            Ok(img) => Some(VideoFrame::from_rgb_image(img.to_rgb8(), timestamp_ns, sequence)),
            Err(e) => {
                debug!("Dropping corrupt MJPG frame {}: {}", sequence, e);
                None
            }
        }
    } else {
        let expected = (format.width * format.height * 3) as usize;
        if buf.len() < expected {
            debug!("Dropping short RGB frame {}", sequence);
            return None;
        }
        Some(VideoFrame::new(
            buf[..expected].to_vec(),
            format.width,
            format.height,
            timestamp_ns,
            sequence,
        ))
    }
}

fn capture_loop(
    path: String,
    constraints: StreamConstraints,
    ready: oneshot::Sender<Result<StreamInfo, CameraError>>,
    stop: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<VideoFrame>>>,
) {
    use v4l::buffer::Type;
    use v4l::io::traits::CaptureStream;

    let (mut device, format) = match negotiate(&path, &constraints) {
        Ok(negotiated) => negotiated,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let supported = [v4l::FourCC::new(b"MJPG"), v4l::FourCC::new(b"RGB3")];
    if !supported.contains(&format.fourcc) {
        let _ = ready.send(Err(CameraError::Format(format!(
            "unsupported pixel format {}",
            format.fourcc
        ))));
        return;
    }

    let mut stream = match v4l::prelude::MmapStream::with_buffers(
        &mut device,
        Type::VideoCapture,
        BUFFER_COUNT,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(CameraError::Stream(e.to_string())));
            return;
        }
    };

    let _ = ready.send(Ok(StreamInfo {
        width: format.width,
        height: format.height,
        label: path.clone(),
    }));

    let started = Instant::now();
    let mut sequence: u32 = 0;
    while !stop.load(Ordering::Acquire) {
        let buf = match stream.next() {
            Ok((buf, _meta)) => buf,
            Err(e) => {
                error!("V4L2 capture on {} failed: {}", path, e);
                break;
            }
        };

        let timestamp_ns = started.elapsed().as_nanos() as u64;
        if let Some(frame) = decode(buf, &format, timestamp_ns, sequence) {
            match latest.lock() {
                Ok(mut slot) => *slot = Some(frame),
                Err(_) => break,
            }
        }
        sequence = sequence.wrapping_add(1);
    }

    info!("V4L2 capture thread for {} exiting", path);
}

#[async_trait::async_trait]
impl CameraSource for V4l2Camera {
    async fn open(&mut self, constraints: &StreamConstraints) -> Result<StreamInfo, CameraError> {
        if self.thread.is_some() {
            self.release();
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let latest = Arc::new(Mutex::new(None));

        let handle = {
            let path = self.device.clone();
            let constraints = constraints.clone();
            let stop = stop.clone();
            let latest = latest.clone();
            std::thread::Builder::new()
                .name("v4l2-capture".to_string())
                .spawn(move || capture_loop(path, constraints, ready_tx, stop, latest))
                .map_err(|e| CameraError::Open(e.to_string()))?
        };

        let info = ready_rx
            .await
            .map_err(|_| CameraError::Open("capture thread exited".to_string()))??;

        info!("V4L2 camera {} streaming at {}x{}", self.device, info.width, info.height);
        self.size = (info.width, info.height);
        self.thread = Some(CaptureThread { stop, latest, handle });
        Ok(info)
    }

    fn video_size(&self) -> (u32, u32) {
        self.size
    }

    async fn capture_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let thread = self.thread.as_ref().ok_or(CameraError::NotInitialized)?;
        let slot = thread
            .latest
            .lock()
            .map_err(|_| CameraError::Stream("capture thread panicked".to_string()))?;
        slot.clone()
            .ok_or_else(|| CameraError::Stream("no frame received yet".to_string()))
    }

    fn release(&mut self) {
        if let Some(thread) = self.thread.take() {
            thread.stop.store(true, Ordering::Release);
            if thread.handle.join().is_err() {
                warn!("V4L2 capture thread panicked");
            }
            info!("V4L2 camera {} released", self.device);
        }
        self.size = (0, 0);
    }

    fn is_streaming(&self) -> bool {
        self.thread.is_some()
    }

    fn name(&self) -> &str {
        "v4l2"
    }
}

impl Drop for V4l2Camera {
    fn drop(&mut self) {
        self.release();
    }
}
