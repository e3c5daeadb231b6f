use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError};
use image::ImageReader;

use crate::error::SourceError;
use crate::models::Frame;

/// Where frames come from
pub trait FrameSource {
    /// Block until the next frame is available. `Ok(None)` ends the stream.
    fn capture(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// Decodes image files in order, one frame per file
pub struct ImageFileSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageFileSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths, next: 0 }
    }
}

impl FrameSource for ImageFileSource {
    fn capture(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        let index = self.next;
        self.next += 1;

        let image = ImageReader::open(path)
            .map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })?
            .decode()
            .map_err(|source| SourceError::Decode {
                path: path.clone(),
                source,
            })?;
        log::debug!("Loaded {} ({}x{})", path.display(), image.width(), image.height());
        Ok(Some(Frame::from_dynamic(image, index)))
    }
}

type Captured = Result<Option<Frame>, SourceError>;

const TERMINAL_SEND_POLL: Duration = Duration::from_millis(50);

/// Captures on a background thread and always hands out the freshest frame
///
/// The hand-off queue holds one frame. When a new frame arrives before the
/// previous one was taken, the previous one is discarded.
pub struct LatestFrameSource {
    rx: Receiver<Captured>,
    stop: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl LatestFrameSource {
    pub fn spawn<S>(mut inner: S) -> Self
    where
        S: FrameSource + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded::<Captured>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicUsize::new(0));

        let handle = {
            let rx = rx.clone();
            let stop = stop.clone();
            let dropped = dropped.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    match inner.capture() {
                        Ok(Some(frame)) => offer_latest(&tx, &rx, frame, &dropped),
                        terminal => {
                            send_terminal(&tx, terminal, &stop);
                            break;
                        }
                    }
                }
            })
        };

        Self {
            rx,
            stop,
            dropped,
            handle: Some(handle),
        }
    }

    /// Frames replaced by a fresher one before anyone took them
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn offer_latest(tx: &Sender<Captured>, rx: &Receiver<Captured>, frame: Frame, dropped: &AtomicUsize) {
    let mut pending = Ok(Some(frame));
    loop {
        match tx.try_send(pending) {
            Ok(()) => return,
            Err(TrySendError::Full(item)) => {
                if rx.try_recv().is_ok() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    log::trace!("Dropped stale frame");
                }
                pending = item;
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

/// End-of-stream and errors are never evicted: wait until the consumer takes them.
fn send_terminal(tx: &Sender<Captured>, item: Captured, stop: &AtomicBool) {
    let mut pending = item;
    loop {
        match tx.send_timeout(pending, TERMINAL_SEND_POLL) {
            Ok(()) | Err(SendTimeoutError::Disconnected(_)) => return,
            Err(SendTimeoutError::Timeout(item)) => {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                pending = item;
            }
        }
    }
}

impl FrameSource for LatestFrameSource {
    fn capture(&mut self) -> Result<Option<Frame>, SourceError> {
        match self.rx.recv() {
            Ok(captured) => captured,
            Err(_) => Ok(None),
        }
    }
}

impl Drop for LatestFrameSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // A capture blocked in the camera driver cannot be interrupted;
        // only reap the thread if it already finished.
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}
