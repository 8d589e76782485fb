//! Runs the hand estimator on DETECT ticks.
//!
//! `Inline` blocks the tick until the estimator returns. `Background` hands
//! the frame to a worker thread and reads results from a one-slot mailbox
//! without blocking, so a slow estimator never stalls the render loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::estimator::{tip_of, HandEstimator};
use crate::types::{DetectionResult, FrameBuffer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    #[default]
    Inline,
    Background,
}

/// Outcome of one tick, from the tracker's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// No result was delivered this tick.
    Skipped,
    /// A result was delivered. Estimator failures arrive as an empty result.
    Ran(DetectionResult),
}

impl Detection {
    pub fn ran(&self) -> bool {
        matches!(self, Detection::Ran(_))
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        match self {
            Detection::Ran(result) => Some(result),
            Detection::Skipped => None,
        }
    }
}

/// Call the estimator and absorb its failure into "no hands".
fn run_estimator<E: HandEstimator + ?Sized>(estimator: &mut E, frame: &FrameBuffer) -> DetectionResult {
    match estimator.estimate_hands(frame) {
        Ok(hands) => {
            let tips: Vec<_> = hands.iter().take(2).filter_map(tip_of).collect();
            debug!(hands = hands.len(), tips = ?tips, "Detection finished");
            DetectionResult { hands }
        }
        Err(e) => {
            warn!("Detection failed, treating as no hands: {e}");
            DetectionResult::empty()
        }
    }
}

pub struct DetectionDriver {
    inner: Driver,
}

enum Driver {
    Inline(Box<dyn HandEstimator>),
    Background(BackgroundDetector),
}

impl DetectionDriver {
    pub fn new(mode: DetectionMode, estimator: Box<dyn HandEstimator>) -> Self {
        let inner = match mode {
            DetectionMode::Inline => Driver::Inline(estimator),
            DetectionMode::Background => Driver::Background(BackgroundDetector::spawn(estimator)),
        };
        Self { inner }
    }

    pub fn inline(estimator: Box<dyn HandEstimator>) -> Self {
        Self::new(DetectionMode::Inline, estimator)
    }

    pub fn mode(&self) -> DetectionMode {
        match self.inner {
            Driver::Inline(_) => DetectionMode::Inline,
            Driver::Background(_) => DetectionMode::Background,
        }
    }

    /// Called once per tick. `detect_tick` says whether the cadence asks for
    /// detection on this tick.
    pub fn poll(&mut self, frame: &FrameBuffer, detect_tick: bool) -> Detection {
        match &mut self.inner {
            Driver::Inline(estimator) => {
                if detect_tick {
                    Detection::Ran(run_estimator(estimator.as_mut(), frame))
                } else {
                    Detection::Skipped
                }
            }
            Driver::Background(worker) => {
                if detect_tick {
                    worker.submit(frame);
                }
                worker.try_take()
            }
        }
    }
}

/// Estimator running on its own thread.
///
/// The job channel has no buffer, so a frame is only accepted while the worker
/// is waiting for one; frames offered while it is busy are dropped. The result
/// mailbox holds one result and the worker replaces whatever is still unread.
struct BackgroundDetector {
    jobs: Option<Sender<FrameBuffer>>,
    results: Receiver<DetectionResult>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundDetector {
    fn spawn(mut estimator: Box<dyn HandEstimator>) -> Self {
        let (job_tx, job_rx) = bounded::<FrameBuffer>(0);
        let (result_tx, result_rx) = bounded::<DetectionResult>(1);
        let stale = result_rx.clone();
        let stop = Arc::new(AtomicBool::new(false));

        let worker_stop = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("hand-detector".into())
            .spawn(move || {
                // recv fails once the driver drops its sender
                while let Ok(frame) = job_rx.recv() {
                    let result = run_estimator(estimator.as_mut(), &frame);
                    if worker_stop.load(Ordering::Acquire) {
                        break;
                    }
                    while stale.try_recv().is_ok() {
                        debug!("Unread detection replaced");
                    }
                    // only this thread sends, so the slot is free
                    let _ = result_tx.try_send(result);
                }
                debug!("Detection worker stopped");
            });

        let handle = match handle {
            Ok(handle) => {
                info!("Detection worker started");
                Some(handle)
            }
            Err(e) => {
                warn!("Could not spawn detection worker, detection disabled: {e}");
                None
            }
        };

        Self { jobs: Some(job_tx), results: result_rx, stop, handle }
    }

    fn submit(&self, frame: &FrameBuffer) {
        let Some(jobs) = &self.jobs else { return };
        match jobs.try_send(frame.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Detector busy, frame skipped"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn try_take(&self) -> Detection {
        match self.results.try_recv() {
            Ok(result) => Detection::Ran(result),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Detection::Skipped,
        }
    }
}

impl Drop for BackgroundDetector {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.jobs.take();
        // A worker stuck inside the estimator is left to finish on its own;
        // its result is discarded once it sees `stop`.
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                debug!("Detection worker still busy, detaching");
            }
        }
    }
}
