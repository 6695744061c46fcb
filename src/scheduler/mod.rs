//! Single-flight detection scheduling.
//!
//! `DetectionScheduler` lives on the interaction thread (the thread that
//! receives camera frames and user events). It owns a flag with two states:
//!
//! - `Idle`: the next frame is copied out of its camera buffer and handed to
//!   the background worker; the scheduler becomes `Detecting`.
//! - `Detecting`: frames are released straight back to the camera without
//!   being processed. They are never queued.
//!
//! The flag is only read and written on the interaction thread, and at most
//! one pass is ever in flight, so the latest frame and latest detections
//! need no locking. Results come back over a channel and are applied by
//! `poll` or `wait_idle`, which return the scheduler to `Idle` and trigger
//! speech for every ranged detection.

mod report;
mod worker;

use anyhow::{anyhow, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::depth::{DepthModel, DEFAULT_DEPTH_DIVISOR};
use crate::detect::{Detection, DetectorBackend};
use crate::frame::{FrameLease, RgbFrame};
use crate::geometry::{FrameGeometry, GeometryParams, Size};
use crate::speech::{Annunciator, SpeechSink};

pub use report::{PassKind, PassReport, RangedDetection};
use worker::{Job, Worker};

/// Thresholds and calibration used by every pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerSettings {
    /// Minimum confidence for a detection to be tracked/displayed.
    pub tracking_confidence: f32,
    /// Minimum confidence for a detection to be ranged and spoken.
    pub speech_confidence: f32,
    /// Raw depth units per meter.
    pub depth_divisor: f64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tracking_confidence: 0.5,
            speech_confidence: 0.6,
            depth_divisor: DEFAULT_DEPTH_DIVISOR,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Detecting,
}

/// What happened to a frame handed to `on_frame`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Copied and sent to the worker. `ranging` is set when the pass will
    /// also run depth for a deferred distance request.
    Dispatched { sequence: u64, ranging: bool },
    /// A pass was in flight; the frame went back to the camera unprocessed.
    Dropped { sequence: u64 },
}

/// What happened to a distance request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A ranging pass over the latest frame and detections was started.
    Dispatched,
    /// A pass is in flight; the next detection pass will range its results.
    Deferred,
    /// No recent frame or no recent detections.
    NoOp,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames_seen: u64,
    pub frames_dispatched: u64,
    pub frames_dropped: u64,
    pub passes_completed: u64,
    pub passes_failed: u64,
    pub utterances: u64,
}

pub struct DetectionScheduler<S: SpeechSink> {
    state: SchedulerState,
    geometry: Option<Arc<FrameGeometry>>,
    latest_frame: Option<Arc<RgbFrame>>,
    latest_detections: Arc<Vec<Detection>>,
    ranging_requested: bool,
    detector_input: Size,
    depth_input: Size,
    jobs: Option<Sender<Job>>,
    results: Receiver<Result<PassReport>>,
    worker: Option<JoinHandle<()>>,
    annunciator: Annunciator<S>,
    stats: SchedulerStats,
}

impl<S: SpeechSink> DetectionScheduler<S> {
    /// Moves the detector and depth model onto a new worker thread.
    pub fn new(
        detector: Box<dyn DetectorBackend>,
        depth: Box<dyn DepthModel>,
        sink: S,
        settings: SchedulerSettings,
    ) -> Result<Self> {
        Self::with_annunciator(detector, depth, Annunciator::new(sink), settings)
    }

    pub fn with_annunciator(
        detector: Box<dyn DetectorBackend>,
        depth: Box<dyn DepthModel>,
        annunciator: Annunciator<S>,
        settings: SchedulerSettings,
    ) -> Result<Self> {
        if !(settings.depth_divisor.is_finite() && settings.depth_divisor > 0.0) {
            return Err(anyhow!(
                "depth divisor must be positive, got {}",
                settings.depth_divisor
            ));
        }
        let detector_input = detector.input_size();
        let depth_input = depth.input_size();

        let (job_tx, job_rx) = mpsc::channel();
        let (result_tx, result_rx) = mpsc::channel();
        let worker = Worker::new(detector, depth, settings);
        let handle = std::thread::Builder::new()
            .name("detection-worker".to_string())
            .spawn(move || worker.run(job_rx, result_tx))
            .map_err(|e| anyhow!("failed to start detection worker: {}", e))?;

        Ok(Self {
            state: SchedulerState::Idle,
            geometry: None,
            latest_frame: None,
            latest_detections: Arc::new(Vec::new()),
            ranging_requested: false,
            detector_input,
            depth_input,
            jobs: Some(job_tx),
            results: result_rx,
            worker: Some(handle),
            annunciator,
            stats: SchedulerStats::default(),
        })
    }

    /// Starts (or restarts) a session with new frame geometry.
    ///
    /// The whole transform set is replaced at once. A pass already in flight
    /// keeps the geometry it was dispatched with.
    pub fn configure(&mut self, params: GeometryParams) -> Result<()> {
        if params.crop != self.detector_input {
            return Err(anyhow!(
                "crop size {} does not match detector input {}",
                params.crop,
                self.detector_input
            ));
        }
        if params.depth != self.depth_input {
            return Err(anyhow!(
                "depth size {} does not match depth model input {}",
                params.depth,
                self.depth_input
            ));
        }
        let geometry = FrameGeometry::configure(params)?;
        self.geometry = Some(Arc::new(geometry));
        self.latest_frame = None;
        self.latest_detections = Arc::new(Vec::new());
        self.ranging_requested = false;
        Ok(())
    }

    pub fn geometry(&self) -> Option<&FrameGeometry> {
        self.geometry.as_deref()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Detections (crop space) from the latest completed detection pass.
    pub fn latest_detections(&self) -> &[Detection] {
        &self.latest_detections
    }

    /// Offers a camera frame. The lease is released before this returns,
    /// whatever the outcome.
    pub fn on_frame(&mut self, lease: FrameLease) -> Result<FrameDisposition> {
        self.stats.frames_seen += 1;
        let sequence = lease.sequence();

        let geometry = self.geometry.clone().ok_or_else(|| {
            anyhow!(
                "frame {} arrived before the frame geometry was configured",
                sequence
            )
        })?;

        if self.state == SchedulerState::Detecting {
            lease.release();
            self.stats.frames_dropped += 1;
            log::debug!("frame {} dropped: detection in flight", sequence);
            return Ok(FrameDisposition::Dropped { sequence });
        }

        if lease.size() != geometry.preview_size() {
            return Err(anyhow!(
                "frame {} is {}, expected preview size {}",
                sequence,
                lease.size(),
                geometry.preview_size()
            ));
        }

        let frame = Arc::new(lease.to_frame()?);
        // The camera may refill its buffer from here on.
        lease.release();

        let ranging = self.ranging_requested;
        self.dispatch(Job::Detect {
            frame: frame.clone(),
            geometry,
            ranging,
        })?;
        self.ranging_requested = false;
        self.latest_frame = Some(frame);
        self.state = SchedulerState::Detecting;
        self.stats.frames_dispatched += 1;
        log::debug!("frame {} dispatched for detection", sequence);
        Ok(FrameDisposition::Dispatched { sequence, ranging })
    }

    /// Requests distances for the latest detections.
    pub fn request_distance(&mut self) -> Result<TriggerOutcome> {
        if self.state == SchedulerState::Detecting {
            self.ranging_requested = true;
            log::debug!("distance request deferred to the next detection pass");
            return Ok(TriggerOutcome::Deferred);
        }
        let (Some(frame), Some(geometry)) = (self.latest_frame.clone(), self.geometry.clone())
        else {
            log::debug!("distance request ignored: no frame yet");
            return Ok(TriggerOutcome::NoOp);
        };
        if self.latest_detections.is_empty() {
            log::debug!("distance request ignored: no detections");
            return Ok(TriggerOutcome::NoOp);
        }

        self.dispatch(Job::Range {
            frame,
            detections: self.latest_detections.clone(),
            geometry,
        })?;
        self.state = SchedulerState::Detecting;
        Ok(TriggerOutcome::Dispatched)
    }

    /// Fire-and-forget detector hint, applied on the worker between passes.
    pub fn set_thread_count(&self, threads: usize) -> Result<()> {
        self.dispatch(Job::SetThreadCount(threads))
    }

    /// Fire-and-forget detector hint, applied on the worker between passes.
    pub fn set_acceleration_enabled(&self, enabled: bool) -> Result<()> {
        self.dispatch(Job::SetAcceleration(enabled))
    }

    /// Applies every finished pass without blocking.
    pub fn poll(&mut self) -> Vec<PassReport> {
        let mut reports = Vec::new();
        loop {
            match self.results.try_recv() {
                Ok(outcome) => match self.finish(outcome) {
                    Ok(report) => reports.push(report),
                    Err(e) => log::error!("detection pass failed: {:#}", e),
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.worker_lost();
                    break;
                }
            }
        }
        reports
    }

    /// Blocks until the in-flight pass finishes and applies it.
    ///
    /// Returns `Ok(None)` when nothing was in flight.
    pub fn wait_idle(&mut self, timeout: Duration) -> Result<Option<PassReport>> {
        if self.state == SchedulerState::Idle {
            return Ok(None);
        }
        match self.results.recv_timeout(timeout) {
            Ok(outcome) => self.finish(outcome).map(Some),
            Err(RecvTimeoutError::Timeout) => {
                Err(anyhow!("detection pass still running after {:?}", timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.worker_lost();
                Err(anyhow!("detection worker stopped unexpectedly"))
            }
        }
    }

    fn dispatch(&self, job: Job) -> Result<()> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("detection worker is shut down"))?;
        jobs.send(job)
            .map_err(|_| anyhow!("detection worker has stopped"))
    }

    fn finish(&mut self, outcome: Result<PassReport>) -> Result<PassReport> {
        self.state = SchedulerState::Idle;
        let mut report = match outcome {
            Ok(report) => report,
            Err(e) => {
                self.stats.passes_failed += 1;
                return Err(e);
            }
        };
        self.stats.passes_completed += 1;

        if report.kind == PassKind::Detection {
            self.latest_detections = Arc::new(report.detections.clone());
        }
        for ranged in &report.ranged {
            if let Some(estimate) = ranged.estimate {
                let text = self.annunciator.announce(
                    &ranged.detection.label,
                    estimate.meters,
                    ranged.direction,
                );
                report.utterances.push(text);
                self.stats.utterances += 1;
            }
        }

        log::info!(
            "frame {} {:?} pass: {} detections, {} tracked, {} ranged, inference {}ms",
            report.sequence,
            report.kind,
            report.detections.len(),
            report.tracked.len(),
            report.ranged.len(),
            report.inference_time.as_millis()
        );
        Ok(report)
    }

    fn worker_lost(&mut self) {
        if self.state == SchedulerState::Detecting {
            log::error!("detection worker stopped with a pass in flight");
            self.stats.passes_failed += 1;
        }
        self.state = SchedulerState::Idle;
        self.jobs = None;
    }
}

impl<S: SpeechSink> Drop for DetectionScheduler<S> {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("detection worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depth::{ConstantDepth, DepthBuffer};
    use crate::detect::StubBackend;
    use crate::geometry::{Rect, Rotation};
    use crate::speech::LogSpeech;

    /// Depth model whose every inference fails.
    struct BrokenDepth(Size);

    impl DepthModel for BrokenDepth {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn input_size(&self) -> Size {
            self.0
        }

        fn infer(&mut self, _input: &[f32], _size: Size) -> Result<DepthBuffer> {
            Err(anyhow!("depth inference failed"))
        }
    }

    const WAIT: Duration = Duration::from_secs(5);

    fn params() -> GeometryParams {
        GeometryParams {
            preview: Size::new(64, 48),
            crop: Size::new(30, 30),
            depth: Size::new(64, 44),
            rotation: Rotation::Deg0,
            maintain_aspect: false,
        }
    }

    fn scheduler(detections: Vec<Detection>) -> DetectionScheduler<LogSpeech> {
        let p = params();
        DetectionScheduler::new(
            Box::new(StubBackend::new(p.crop, detections)),
            Box::new(ConstantDepth::new(p.depth, 16.0)),
            LogSpeech,
            SchedulerSettings::default(),
        )
        .unwrap()
    }

    fn lease(sequence: u64) -> FrameLease {
        let size = params().preview;
        FrameLease::detached(vec![0u8; size.rgb_len().unwrap()], size, sequence).unwrap()
    }

    #[test]
    fn frame_before_configure_is_an_error() {
        let mut s = scheduler(Vec::new());
        assert!(s.on_frame(lease(1)).is_err());
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[test]
    fn configure_rejects_mismatched_model_sizes() {
        let mut s = scheduler(Vec::new());
        let mut p = params();
        p.crop = Size::new(31, 30);
        assert!(s.configure(p).is_err());
    }

    #[test]
    fn distance_request_without_detections_is_noop() {
        let mut s = scheduler(Vec::new());
        s.configure(params()).unwrap();
        assert_eq!(s.request_distance().unwrap(), TriggerOutcome::NoOp);

        s.on_frame(lease(1)).unwrap();
        s.wait_idle(WAIT).unwrap();
        assert_eq!(s.request_distance().unwrap(), TriggerOutcome::NoOp);
    }

    #[test]
    fn distance_request_ranges_latest_detections() {
        let det = Detection::new("box", 0.9, Rect::new(10.0, 10.0, 20.0, 20.0));
        let mut s = scheduler(vec![det]);
        s.configure(params()).unwrap();

        s.on_frame(lease(1)).unwrap();
        let report = s.wait_idle(WAIT).unwrap().unwrap();
        assert_eq!(report.kind, PassKind::Detection);
        assert!(report.ranged.is_empty());
        assert_eq!(s.latest_detections().len(), 1);

        assert_eq!(s.request_distance().unwrap(), TriggerOutcome::Dispatched);
        assert_eq!(s.state(), SchedulerState::Detecting);
        let report = s.wait_idle(WAIT).unwrap().unwrap();
        assert_eq!(report.kind, PassKind::Ranging);
        assert_eq!(report.ranged.len(), 1);
        assert_eq!(
            report.utterances,
            vec!["The box is 2.00 meters in front of you.".to_string()]
        );
        assert_eq!(s.stats().utterances, 1);
    }

    #[test]
    fn request_during_pass_is_deferred_to_next_frame() {
        let det = Detection::new("box", 0.9, Rect::new(0.0, 0.0, 5.0, 5.0));
        let mut s = scheduler(vec![det]);
        s.configure(params()).unwrap();

        s.on_frame(lease(1)).unwrap();
        assert_eq!(s.request_distance().unwrap(), TriggerOutcome::Deferred);
        s.wait_idle(WAIT).unwrap();

        assert_eq!(
            s.on_frame(lease(2)).unwrap(),
            FrameDisposition::Dispatched {
                sequence: 2,
                ranging: true
            }
        );
        let report = s.wait_idle(WAIT).unwrap().unwrap();
        assert_eq!(report.ranged.len(), 1);
        assert_eq!(report.ranged[0].direction, crate::direction::Direction::Left);
    }

    #[test]
    fn depth_failure_in_deferred_ranging_keeps_detections() {
        let p = params();
        let det = Detection::new("box", 0.9, Rect::new(10.0, 10.0, 20.0, 20.0));
        let mut s = DetectionScheduler::new(
            Box::new(StubBackend::new(p.crop, vec![det])),
            Box::new(BrokenDepth(p.depth)),
            LogSpeech,
            SchedulerSettings::default(),
        )
        .unwrap();
        s.configure(p).unwrap();

        s.on_frame(lease(1)).unwrap();
        assert_eq!(s.request_distance().unwrap(), TriggerOutcome::Deferred);
        s.wait_idle(WAIT).unwrap();

        assert_eq!(
            s.on_frame(lease(2)).unwrap(),
            FrameDisposition::Dispatched {
                sequence: 2,
                ranging: true
            }
        );
        let report = s.wait_idle(WAIT).unwrap().unwrap();
        assert_eq!(report.kind, PassKind::Detection);
        assert_eq!(report.detections.len(), 1);
        assert_eq!(report.tracked.len(), 1);
        assert!(report.ranged.is_empty());
        assert!(report.depth_time.is_none());
        assert_eq!(s.latest_detections().len(), 1);

        let stats = s.stats();
        assert_eq!(stats.passes_completed, 2);
        assert_eq!(stats.passes_failed, 0);
        assert_eq!(stats.utterances, 0);
    }

    #[test]
    fn low_confidence_is_neither_tracked_nor_ranged() {
        let weak = Detection::new("ghost", 0.55, Rect::new(10.0, 10.0, 20.0, 20.0));
        let faint = Detection::new("shadow", 0.2, Rect::new(0.0, 0.0, 4.0, 4.0));
        let mut s = scheduler(vec![weak, faint]);
        s.configure(params()).unwrap();

        s.on_frame(lease(1)).unwrap();
        let report = s.wait_idle(WAIT).unwrap().unwrap();
        // 0.55 clears tracking (0.5) but not speech (0.6).
        assert_eq!(report.tracked.len(), 1);
        assert_eq!(report.tracked[0].label, "ghost");

        assert_eq!(s.request_distance().unwrap(), TriggerOutcome::Dispatched);
        let report = s.wait_idle(WAIT).unwrap().unwrap();
        assert!(report.ranged.is_empty());
        assert!(report.depth_time.is_none());
        assert_eq!(s.stats().utterances, 0);
    }
}
