use anyhow::{Context, Result};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::report::{PassKind, PassReport, RangedDetection};
use super::SchedulerSettings;
use crate::depth::{DepthAggregator, DepthModel};
use crate::detect::{Detection, DetectorBackend};
use crate::direction::classify_rect;
use crate::frame::{normalize_rgb, RgbFrame};
use crate::geometry::warp::warp_rgb;
use crate::geometry::FrameGeometry;

/// Unit of work for the worker thread. Every job owns what it reads.
pub(crate) enum Job {
    Detect {
        frame: Arc<RgbFrame>,
        geometry: Arc<FrameGeometry>,
        ranging: bool,
    },
    Range {
        frame: Arc<RgbFrame>,
        detections: Arc<Vec<Detection>>,
        geometry: Arc<FrameGeometry>,
    },
    SetThreadCount(usize),
    SetAcceleration(bool),
}

pub(crate) struct Worker {
    detector: Box<dyn DetectorBackend>,
    depth: Box<dyn DepthModel>,
    aggregator: DepthAggregator,
    settings: SchedulerSettings,
}

impl Worker {
    pub(crate) fn new(
        detector: Box<dyn DetectorBackend>,
        depth: Box<dyn DepthModel>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            detector,
            depth,
            aggregator: DepthAggregator::new(settings.depth_divisor),
            settings,
        }
    }

    /// Runs jobs until the scheduler hangs up.
    pub(crate) fn run(mut self, jobs: Receiver<Job>, results: Sender<Result<PassReport>>) {
        log::debug!(
            "detection worker started (detector={}, depth={})",
            self.detector.name(),
            self.depth.name()
        );
        if let Err(e) = self.detector.warm_up() {
            log::warn!("detector warm-up failed: {:#}", e);
        }
        while let Ok(job) = jobs.recv() {
            let outcome = match job {
                Job::Detect {
                    frame,
                    geometry,
                    ranging,
                } => self.detect(&frame, &geometry, ranging),
                Job::Range {
                    frame,
                    detections,
                    geometry,
                } => self.range_only(&frame, &detections, &geometry),
                Job::SetThreadCount(threads) => {
                    self.detector.set_thread_count(threads);
                    continue;
                }
                Job::SetAcceleration(enabled) => {
                    self.detector.set_acceleration_enabled(enabled);
                    continue;
                }
            };
            if results.send(outcome).is_err() {
                break;
            }
        }
        log::debug!("detection worker stopped");
    }

    fn detect(
        &mut self,
        frame: &RgbFrame,
        geometry: &FrameGeometry,
        ranging: bool,
    ) -> Result<PassReport> {
        log::debug!(
            "running detection on frame {} ({}ms after capture)",
            frame.sequence(),
            frame.age().as_millis()
        );
        let crop = warp_rgb(
            frame.pixels(),
            frame.size(),
            geometry.preview_to_crop_transform(),
        )
        .context("rendering crop image")?;

        let start = Instant::now();
        let detections = self
            .detector
            .recognize_image(&crop, geometry.crop_size())
            .with_context(|| format!("detector {} failed", self.detector.name()))?;
        let inference_time = start.elapsed();

        let tracked = detections
            .iter()
            .filter(|d| d.meets(self.settings.tracking_confidence))
            .map(|d| d.with_location(geometry.crop_to_preview(&d.location)))
            .collect();

        // A failed deferred ranging keeps the detections of this pass.
        let (ranged, depth_time) = if ranging {
            match self.range(frame, &detections, geometry) {
                Ok(ranged) => ranged,
                Err(e) => {
                    log::error!("frame {}: ranging failed: {:#}", frame.sequence(), e);
                    (Vec::new(), None)
                }
            }
        } else {
            (Vec::new(), None)
        };

        Ok(PassReport {
            kind: PassKind::Detection,
            sequence: frame.sequence(),
            preview_size: geometry.preview_size(),
            crop_size: geometry.crop_size(),
            detections,
            tracked,
            ranged,
            inference_time,
            depth_time,
            utterances: Vec::new(),
        })
    }

    fn range_only(
        &mut self,
        frame: &RgbFrame,
        detections: &[Detection],
        geometry: &FrameGeometry,
    ) -> Result<PassReport> {
        let (ranged, depth_time) = self.range(frame, detections, geometry)?;
        Ok(PassReport {
            kind: PassKind::Ranging,
            sequence: frame.sequence(),
            preview_size: geometry.preview_size(),
            crop_size: geometry.crop_size(),
            detections: detections.to_vec(),
            tracked: Vec::new(),
            ranged,
            inference_time: Duration::ZERO,
            depth_time,
            utterances: Vec::new(),
        })
    }

    /// Depth inference over `frame`, then distance and direction for every
    /// detection above the speech threshold.
    fn range(
        &mut self,
        frame: &RgbFrame,
        detections: &[Detection],
        geometry: &FrameGeometry,
    ) -> Result<(Vec<RangedDetection>, Option<Duration>)> {
        let candidates: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.meets(self.settings.speech_confidence))
            .collect();
        if candidates.is_empty() {
            log::debug!("frame {}: nothing to range", frame.sequence());
            return Ok((Vec::new(), None));
        }

        let depth_pixels = warp_rgb(
            frame.pixels(),
            frame.size(),
            geometry.preview_to_depth_transform(),
        )
        .context("rendering depth input")?;
        let input = normalize_rgb(&depth_pixels);

        let start = Instant::now();
        let buffer = self
            .depth
            .infer(&input, geometry.depth_size())
            .with_context(|| format!("depth model {} failed", self.depth.name()))?;
        let depth_time = start.elapsed();

        let reference_width = geometry.crop_size().width as f32;
        let ranged = candidates
            .into_iter()
            .map(|detection| {
                let depth_location = geometry.crop_to_depth(&detection.location);
                let estimate = self.aggregator.estimate_distance(&buffer, &depth_location);
                let direction = classify_rect(&detection.location, reference_width);
                match &estimate {
                    Some(e) => log::info!(
                        "{} at {:.2} m ({:?}, {} samples)",
                        detection.label,
                        e.meters,
                        direction,
                        e.sample_count
                    ),
                    None => log::debug!(
                        "{}: no depth samples under {:?}",
                        detection.label,
                        depth_location
                    ),
                }
                RangedDetection {
                    detection: detection.clone(),
                    depth_location,
                    estimate,
                    direction,
                }
            })
            .collect();
        Ok((ranged, Some(depth_time)))
    }
}
