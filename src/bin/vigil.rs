//! vigil - headless overlay runner
//!
//! This binary:
//! 1. Opens the configured camera source (synthetic by default)
//! 2. Polls a stub pose detector on its own cadence
//! 3. Composites the overlay into an in-memory surface at the tick rate
//! 4. Optionally presses the PNG/GIF buttons at given ticks
//! 5. Stops polling and abandons any active recording on Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Instant;

use vigil_overlay::{
    open_source, CaptureMachine, CaptureState, DetectionStream, DetectorSource,
    GifRecorderFactory, Normalizer, OverlayConfig, PngExporter, PointerAction, RasterCanvas,
    RecorderFactory, RenderPipeline, StillExporter, StubPoseDetector, StubPoseEmitter,
    TickOutcome,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Stop after this many render ticks (runs until Ctrl-C when omitted).
    #[arg(long)]
    ticks: Option<u64>,
    /// Surface size as WIDTHxHEIGHT (overrides config).
    #[arg(long, value_parser = parse_surface)]
    surface: Option<(u32, u32)>,
    /// Press the PNG button at this tick.
    #[arg(long)]
    still_at: Option<u64>,
    /// Press the GIF button at this tick.
    #[arg(long)]
    record_at: Option<u64>,
    /// Output directory for screenshot.png and capture.gif (overrides config).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Use the event-emitter detector instead of the batch one.
    #[arg(long)]
    emitter: bool,
    /// Run without any detector (the loading overlay stays up).
    #[arg(long, conflicts_with = "emitter")]
    no_detector: bool,
    /// Number of synthetic people.
    #[arg(long, default_value_t = 2)]
    people: usize,
}

fn parse_surface(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("bad width '{w}'"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("bad height '{h}'"))?;
    if w == 0 || h == 0 {
        return Err("surface dimensions must be greater than zero".into());
    }
    Ok((w, h))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = OverlayConfig::load()?;
    if let Some((w, h)) = args.surface {
        cfg.render.width = w;
        cfg.render.height = h;
    }
    if let Some(out) = &args.out {
        cfg.capture.output_dir = out.clone();
    }
    cfg.validate()?;

    let frames = open_source(&cfg.camera.url, cfg.camera.width, cfg.camera.height)?;
    log::info!(
        "camera {} at {}x{}",
        frames.name(),
        frames.width(),
        frames.height()
    );

    let detector = if args.no_detector {
        None
    } else if args.emitter {
        Some(DetectorSource::events(StubPoseEmitter::new(args.people)))
    } else {
        Some(DetectorSource::batch(StubPoseDetector::new(args.people)))
    };
    let normalizer = Normalizer::new(
        cfg.detection.normalizer,
        frames.width(),
        frames.height(),
    );
    let mut stream = DetectionStream::new(
        frames.clone(),
        detector,
        normalizer,
        cfg.detection.request_timeout,
    );
    stream.start_polling(cfg.detection.poll_interval)?;

    let factory: Box<dyn RecorderFactory> = Box::new(GifRecorderFactory {
        output_dir: cfg.capture.output_dir.clone(),
        name: "capture".into(),
        fps: cfg.capture.settings.fps,
        max_width: cfg.capture.max_width,
    });
    let still: Box<dyn StillExporter> =
        Box::new(PngExporter::new(cfg.capture.output_dir.clone(), "screenshot"));
    let capture = CaptureMachine::new(cfg.capture.settings, Some(factory), Some(still));
    if capture.state() == CaptureState::Unavailable {
        log::warn!("recording disabled; GIF button will be ignored");
    }

    let mut pipeline = RenderPipeline::new(
        Arc::clone(&frames),
        stream.publisher(),
        capture,
        cfg.render.layers,
    );
    let mut canvas = RasterCanvas::new(cfg.render.width, cfg.render.height);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let interval = cfg.render.tick_interval();
    log::info!(
        "vigil running at {} Hz on a {}x{} surface, writing to {}",
        cfg.render.tick_hz,
        cfg.render.width,
        cfg.render.height,
        cfg.capture.output_dir.display()
    );

    let mut last_health_log = Instant::now();
    let mut next = Instant::now();
    loop {
        let tick = pipeline.ticks() + 1;
        if args.still_at == Some(tick) {
            pipeline.queue(PointerAction::ExportStill);
        }
        if args.record_at == Some(tick) {
            pipeline.queue(PointerAction::StartRecording);
        }

        let report = pipeline.tick(&mut canvas);
        if let Some(path) = &report.still_exported {
            log::info!("tick {}: still written to {}", report.tick, path.display());
        }
        if let TickOutcome::Finished { saved: Some(path) } = &report.capture {
            log::info!("tick {}: capture written to {}", report.tick, path.display());
        }

        if last_health_log.elapsed() >= interval * 150 {
            log::info!(
                "tick={} detector={:?} people={} snapshot={} capture={:?}",
                report.tick,
                stream.status(),
                report.boxes.len(),
                report.snapshot_sequence,
                pipeline.capture().state()
            );
            last_health_log = Instant::now();
        }

        if args.ticks.is_some_and(|limit| report.tick >= limit) {
            break;
        }

        next += interval;
        let wait = next.saturating_duration_since(Instant::now());
        if wait.is_zero() {
            next = Instant::now();
        }
        match rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) => {
                log::info!("shutdown signal received");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if pipeline.capture().is_recording() {
        pipeline.capture_mut().abandon(false);
    }
    stream.stop()?;
    log::info!("vigil stopped after {} ticks", pipeline.ticks());
    Ok(())
}
