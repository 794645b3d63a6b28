use anyhow::{anyhow, Result};
use std::sync::Arc;

use super::raw::RawBatch;
use crate::frame::Frame;
use crate::stream::{Applied, RequestTicket, SnapshotPublisher};

/// Batch-style pose detector: one request in, one result batch out.
///
/// `detect` may resolve the [`Completion`] before returning, or hand it to another
/// thread and resolve it later. Dropping it unresolved counts as a failed request.
///
/// Implementations must treat the frame as read-only and must not retain it
/// beyond the request.
pub trait PoseDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Model loading. Called once before the first request.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    fn detect(&mut self, frame: &Frame, completion: Completion) -> Result<()>;
}

/// Event-style pose detector: subscribe once, then results are pushed as they
/// become available.
pub trait PoseEventSource: Send {
    fn name(&self) -> &'static str;

    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Register the single listener. Called exactly once per source.
    fn subscribe(&mut self, listener: PoseListener) -> Result<()>;

    /// Offer the current frame. Sources may emit zero or more times per frame.
    fn feed(&mut self, frame: &Frame) -> Result<()>;
}

/// The detector shapes the stream controller can drive.
pub enum DetectorSource {
    Batch(Box<dyn PoseDetector>),
    Events(Box<dyn PoseEventSource>),
}

impl DetectorSource {
    pub fn batch<D: PoseDetector + 'static>(detector: D) -> Self {
        DetectorSource::Batch(Box::new(detector))
    }

    pub fn events<S: PoseEventSource + 'static>(source: S) -> Self {
        DetectorSource::Events(Box::new(source))
    }

    pub fn name(&self) -> &'static str {
        match self {
            DetectorSource::Batch(detector) => detector.name(),
            DetectorSource::Events(source) => source.name(),
        }
    }

    pub(crate) fn warm_up(&mut self) -> Result<()> {
        match self {
            DetectorSource::Batch(detector) => detector.warm_up(),
            DetectorSource::Events(source) => source.warm_up(),
        }
    }
}

/// One-shot result handle for a single issued request.
pub struct Completion {
    ticket: Option<RequestTicket>,
    publisher: Arc<SnapshotPublisher>,
}

impl Completion {
    pub(crate) fn new(ticket: RequestTicket, publisher: Arc<SnapshotPublisher>) -> Self {
        Self {
            ticket: Some(ticket),
            publisher,
        }
    }

    /// Identifier of the request this handle resolves.
    pub fn request_id(&self) -> u64 {
        self.ticket.as_ref().map(RequestTicket::id).unwrap_or_default()
    }

    /// Report the detector's raw output.
    pub fn deliver(mut self, batch: impl Into<RawBatch>) -> Applied {
        match self.ticket.take() {
            Some(ticket) => self.publisher.complete(ticket, batch.into()),
            None => Applied::Discarded,
        }
    }

    /// Report that detection failed for this request.
    pub fn fail(mut self, err: anyhow::Error) -> Applied {
        match self.ticket.take() {
            Some(ticket) => self.publisher.fail(ticket, &err),
            None => Applied::Discarded,
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            let err = anyhow!("detector dropped request {} without a result", ticket.id());
            self.publisher.fail(ticket, &err);
        }
    }
}

/// Push handle given to a [`PoseEventSource`]. Each emission is published as a
/// freshly issued request.
#[derive(Clone)]
pub struct PoseListener {
    publisher: Arc<SnapshotPublisher>,
}

impl PoseListener {
    pub(crate) fn new(publisher: Arc<SnapshotPublisher>) -> Self {
        Self { publisher }
    }

    pub fn emit(&self, batch: impl Into<RawBatch>) -> Applied {
        let ticket = self.publisher.issue_unbounded();
        self.publisher.complete(ticket, batch.into())
    }
}
