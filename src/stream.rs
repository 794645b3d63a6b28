//! Detection stream controller.
//!
//! Bridges an independently-timed detector to a render loop that samples state
//! synchronously:
//!
//! - `SnapshotPublisher`: single writer of the published `DetectionSnapshot`.
//!   Batches are normalized in full before an `Arc` swap, so readers never see
//!   a half-updated sequence.
//! - `DetectionStream`: owns the detector and the polling worker thread.
//!
//! At most one batch request is in flight. A request older than the configured
//! timeout is treated as abandoned so a stuck detector cannot stall the feed;
//! if the abandoned request completes late, the ordering rule discards it.

use anyhow::{anyhow, bail, Result};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::detect::{
    BatchOutcome, Completion, DetectorSource, Normalizer, PersonDetection, PoseListener, RawBatch,
};
use crate::frame::FrameSource;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Detector readiness, distinct from "zero detections".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorStatus {
    /// No detector, or it failed to load.
    Unavailable,
    /// Present but not yet warmed up.
    Loading,
    Ready,
}

/// Immutable, fully normalized detections from one completed request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSnapshot {
    /// Monotonic publication counter; 0 is the initial empty snapshot.
    pub sequence: u64,
    /// Request that produced this snapshot; 0 before the first result.
    pub request_id: u64,
    pub detections: Vec<PersonDetection>,
}

impl DetectionSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PersonDetection> {
        self.detections.iter()
    }
}

/// Proof that a request was issued. Not `Clone`: each ticket resolves once.
#[derive(Debug)]
pub struct RequestTicket {
    id: u64,
    issued_at: Instant,
}

impl RequestTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn age(&self) -> Duration {
        self.issued_at.elapsed()
    }
}

/// What happened to a completed request's result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// Became the published snapshot with this sequence number.
    Published { sequence: u64 },
    /// A newer request had already been applied.
    Discarded,
}

struct PublisherState {
    last_issued_id: u64,
    in_flight: Option<(u64, Instant)>,
    last_applied_id: u64,
    published: Arc<DetectionSnapshot>,
    status: DetectorStatus,
}

pub struct SnapshotPublisher {
    normalizer: Normalizer,
    request_timeout: Duration,
    state: Mutex<PublisherState>,
}

impl SnapshotPublisher {
    pub fn new(normalizer: Normalizer, request_timeout: Duration) -> Self {
        Self {
            normalizer,
            request_timeout,
            state: Mutex::new(PublisherState {
                last_issued_id: 0,
                in_flight: None,
                last_applied_id: 0,
                published: Arc::new(DetectionSnapshot::empty()),
                status: DetectorStatus::Loading,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PublisherState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is still safe to read.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Latest published snapshot. Never blocks on normalization.
    pub fn current(&self) -> Arc<DetectionSnapshot> {
        self.lock().published.clone()
    }

    pub fn status(&self) -> DetectorStatus {
        self.lock().status
    }

    pub(crate) fn set_status(&self, status: DetectorStatus) {
        let mut state = self.lock();
        if state.status != status {
            log::info!("detector status: {:?} -> {:?}", state.status, status);
            state.status = status;
        }
    }

    pub fn in_flight(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// Issue a new request, unless one is already in flight and not yet timed out.
    pub fn issue(&self) -> Option<RequestTicket> {
        let mut state = self.lock();
        if let Some((id, issued_at)) = state.in_flight {
            let age = issued_at.elapsed();
            if age < self.request_timeout {
                return None;
            }
            log::warn!(
                "detection request {} abandoned after {}ms; clearing detections",
                id,
                age.as_millis()
            );
            state.in_flight = None;
            Self::apply(&mut state, id, Vec::new());
        }
        let ticket = Self::next_ticket(&mut state);
        state.in_flight = Some((ticket.id, ticket.issued_at));
        Some(ticket)
    }

    /// Issue a request that does not occupy the in-flight slot. Used for
    /// results pushed by event sources, which complete immediately.
    pub fn issue_unbounded(&self) -> RequestTicket {
        Self::next_ticket(&mut self.lock())
    }

    fn next_ticket(state: &mut PublisherState) -> RequestTicket {
        state.last_issued_id += 1;
        RequestTicket {
            id: state.last_issued_id,
            issued_at: Instant::now(),
        }
    }

    /// Give back an issued request that was never sent to the detector.
    pub(crate) fn release(&self, ticket: RequestTicket) {
        let mut state = self.lock();
        if matches!(state.in_flight, Some((id, _)) if id == ticket.id) {
            state.in_flight = None;
        }
    }

    /// Normalize a whole batch, then publish it if no newer request has already
    /// been applied. Malformed and empty batches publish an empty snapshot.
    pub fn complete(&self, ticket: RequestTicket, batch: RawBatch) -> Applied {
        let detections = match self.normalizer.normalize_batch(&batch) {
            BatchOutcome::Detections(detections) => detections,
            BatchOutcome::Malformed(kind) => {
                log::warn!(
                    "detection request {} returned malformed result ({}); publishing empty snapshot",
                    ticket.id,
                    kind
                );
                Vec::new()
            }
        };
        self.publish(ticket, detections)
    }

    /// Record a failed request. The feed is cleared rather than left stale.
    pub fn fail(&self, ticket: RequestTicket, err: &anyhow::Error) -> Applied {
        log::warn!("detection request {} failed: {:#}", ticket.id, err);
        self.publish(ticket, Vec::new())
    }

    fn publish(&self, ticket: RequestTicket, detections: Vec<PersonDetection>) -> Applied {
        let mut state = self.lock();
        if matches!(state.in_flight, Some((id, _)) if id == ticket.id) {
            state.in_flight = None;
        }
        Self::apply(&mut state, ticket.id, detections)
    }

    fn apply(state: &mut PublisherState, id: u64, detections: Vec<PersonDetection>) -> Applied {
        if id <= state.last_applied_id {
            log::debug!(
                "discarding result of request {} (request {} already applied)",
                id,
                state.last_applied_id
            );
            return Applied::Discarded;
        }
        let sequence = state.published.sequence + 1;
        state.last_applied_id = id;
        state.published = Arc::new(DetectionSnapshot {
            sequence,
            request_id: id,
            detections,
        });
        Applied::Published { sequence }
    }
}

struct DetectorSlot {
    source: DetectorSource,
    warmed_up: bool,
    subscribed: bool,
}

struct PollWorker {
    stop_tx: Sender<()>,
    join: Option<JoinHandle<()>>,
    interval: Duration,
}

/// Owns the detector and its polling cadence.
pub struct DetectionStream {
    publisher: Arc<SnapshotPublisher>,
    frames: Arc<dyn FrameSource>,
    detector: Option<Arc<Mutex<DetectorSlot>>>,
    worker: Option<PollWorker>,
}

impl DetectionStream {
    /// `detector` is probed here: `None` means detection is unavailable and the
    /// stream reports that instead of an empty room.
    pub fn new(
        frames: Arc<dyn FrameSource>,
        detector: Option<DetectorSource>,
        normalizer: Normalizer,
        request_timeout: Duration,
    ) -> Self {
        let publisher = Arc::new(SnapshotPublisher::new(normalizer, request_timeout));
        let detector = match detector {
            Some(source) => {
                log::info!("detector '{}' registered", source.name());
                Some(Arc::new(Mutex::new(DetectorSlot {
                    source,
                    warmed_up: false,
                    subscribed: false,
                })))
            }
            None => {
                log::warn!("no pose detector available; detection disabled");
                publisher.set_status(DetectorStatus::Unavailable);
                None
            }
        };
        Self {
            publisher,
            frames,
            detector,
            worker: None,
        }
    }

    pub fn publisher(&self) -> Arc<SnapshotPublisher> {
        self.publisher.clone()
    }

    /// Latest fully normalized snapshot; empty before the first result.
    pub fn current_snapshot(&self) -> Arc<DetectionSnapshot> {
        self.publisher.current()
    }

    pub fn status(&self) -> DetectorStatus {
        self.publisher.status()
    }

    pub fn is_polling(&self) -> bool {
        self.worker.is_some()
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.worker.as_ref().map(|w| w.interval)
    }

    /// Start (or restart) the polling cadence. A running cycle is stopped and
    /// replaced, never stacked.
    pub fn start_polling(&mut self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            bail!("poll interval must be greater than zero");
        }
        self.stop()?;

        let Some(slot) = self.detector.clone() else {
            log::warn!("start_polling: no detector; staying unavailable");
            return Ok(());
        };

        let publisher = self.publisher.clone();
        let frames = self.frames.clone();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let join = std::thread::Builder::new()
            .name("detection-poll".into())
            .spawn(move || {
                if let Err(err) = prepare(&slot, &publisher) {
                    log::error!("detector failed to load: {:#}", err);
                    publisher.set_status(DetectorStatus::Unavailable);
                    return;
                }
                let mut next = Instant::now();
                loop {
                    if let Err(err) = poll(&slot, &publisher, frames.as_ref()) {
                        log::warn!("detection poll failed: {:#}", err);
                    }
                    next += interval;
                    let wait = next.saturating_duration_since(Instant::now());
                    if wait.is_zero() {
                        // Overran the cadence; skip missed ticks instead of bursting.
                        next = Instant::now();
                    }
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("detection poll worker stopped");
            })
            .map_err(|e| anyhow!("failed to spawn detection poll worker: {}", e))?;

        log::info!("detection polling every {}ms", interval.as_millis());
        self.worker = Some(PollWorker {
            stop_tx,
            join: Some(join),
            interval,
        });
        Ok(())
    }

    /// Run one poll on the caller's thread, loading the detector first if
    /// needed. For hosts that drive detection cooperatively from the render loop.
    pub fn poll_once(&self) -> Result<()> {
        let slot = self
            .detector
            .as_ref()
            .ok_or_else(|| anyhow!("no detector available"))?;
        if let Err(err) = prepare(slot, &self.publisher) {
            self.publisher.set_status(DetectorStatus::Unavailable);
            return Err(err);
        }
        poll(slot, &self.publisher, self.frames.as_ref())
    }

    /// Halt the polling cadence and wait for the worker to exit.
    pub fn stop(&mut self) -> Result<()> {
        let Some(mut worker) = self.worker.take() else {
            return Ok(());
        };
        // A send error only means the worker already exited.
        let _ = worker.stop_tx.send(());
        if let Some(join) = worker.join.take() {
            join.join()
                .map_err(|_| anyhow!("detection poll worker panicked"))?;
        }
        Ok(())
    }
}

impl Drop for DetectionStream {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("{}", err);
        }
    }
}

fn lock_slot(slot: &Mutex<DetectorSlot>) -> Result<MutexGuard<'_, DetectorSlot>> {
    slot.lock().map_err(|_| anyhow!("detector lock poisoned"))
}

/// Warm up once and, for event sources, subscribe once.
fn prepare(slot: &Mutex<DetectorSlot>, publisher: &Arc<SnapshotPublisher>) -> Result<()> {
    let mut guard = lock_slot(slot)?;
    if !guard.warmed_up {
        publisher.set_status(DetectorStatus::Loading);
        guard.source.warm_up()?;
        guard.warmed_up = true;
    }
    if !guard.subscribed {
        if let DetectorSource::Events(source) = &mut guard.source {
            source.subscribe(PoseListener::new(publisher.clone()))?;
        }
        guard.subscribed = true;
    }
    publisher.set_status(DetectorStatus::Ready);
    Ok(())
}

fn poll(
    slot: &Mutex<DetectorSlot>,
    publisher: &Arc<SnapshotPublisher>,
    frames: &dyn FrameSource,
) -> Result<()> {
    let mut guard = lock_slot(slot)?;
    match &mut guard.source {
        DetectorSource::Batch(detector) => {
            let Some(ticket) = publisher.issue() else {
                log::trace!("previous detection request still in flight");
                return Ok(());
            };
            let frame = match frames.current_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    publisher.release(ticket);
                    return Err(err);
                }
            };
            let completion = Completion::new(ticket, publisher.clone());
            detector.detect(&frame, completion)
        }
        DetectorSource::Events(source) => {
            let frame = frames.current_frame()?;
            source.feed(&frame)
        }
    }
}
