//! sightline - spoken obstacle guidance session
//!
//! This binary:
//! 1. Loads the pipeline configuration (file + environment)
//! 2. Loads the detector and depth model
//! 3. Feeds camera frames through the single-flight scheduler
//! 4. Issues a distance request every N frames and speaks the results

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
#[cfg(feature = "ingest-image")]
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sightline::config::{PipelineConfig, SpeechEngine};
use sightline::depth::ConstantDepth;
use sightline::detect::CpuBackend;
use sightline::ingest::{SyntheticConfig, SyntheticSource};
use sightline::speech::{CommandSpeech, LogSpeech};
use sightline::ui::{Ui, UiMode};
use sightline::{
    Annunciator, DepthModel, DetectionScheduler, DetectorBackend, FrameSource, SpeechSink,
    TriggerOutcome,
};

/// Depth reported for every pixel when no depth model is configured.
const FALLBACK_DEPTH_METERS: f32 = 1.5;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frames to process (0 runs until Ctrl-C).
    #[arg(long, default_value_t = 300)]
    frames: u64,
    /// Camera frame rate.
    #[arg(long, default_value_t = 15)]
    fps: u32,
    /// Request distances every N frames (0 disables).
    #[arg(long, default_value_t = 30)]
    range_every: u64,
    /// Terminal output style.
    #[arg(long, value_enum, default_value = "auto")]
    ui: UiMode,
    /// Speech engine: "log" or "command" (overrides the configuration).
    #[arg(long)]
    speech: Option<String>,
    /// Seed for the synthetic camera.
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
    /// Use a still image as the camera instead of the synthetic scene.
    #[cfg(feature = "ingest-image")]
    #[arg(long)]
    image: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }
    let ui = Ui::new(args.ui, std::io::stderr().is_terminal());

    let config = {
        let _stage = ui.stage("load configuration");
        let mut config = PipelineConfig::load()?;
        if let Some(engine) = args.speech.as_deref() {
            config.speech.engine = engine.parse()?;
        }
        config
    };
    let params = config.geometry_params()?;

    let stage = ui.stage("load models");
    let (detector, depth) = match load_models(&config) {
        Ok(models) => models,
        Err(e) => {
            stage.fail();
            return Err(e);
        }
    };
    drop(stage);

    let sink: Box<dyn SpeechSink> = match config.speech.engine {
        SpeechEngine::Log => Box::new(LogSpeech),
        SpeechEngine::Command => Box::new(CommandSpeech::new(
            config.speech.command.clone(),
            Vec::new(),
        )),
    };
    let annunciator = Annunciator::with_tag(sink, config.speech.tag.clone());
    let mut scheduler = DetectionScheduler::with_annunciator(
        detector,
        depth,
        annunciator,
        config.scheduler_settings(),
    )?;
    scheduler.set_thread_count(config.detector.threads)?;
    scheduler.set_acceleration_enabled(config.detector.acceleration)?;
    scheduler.configure(params)?;

    let mut source = open_source(&args, &config)?;
    if source.preview_size() != params.preview {
        return Err(anyhow!(
            "source produces {} frames, configuration expects {}",
            source.preview_size(),
            params.preview
        ));
    }

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!(
        "sightline running: {} frames at {} fps, distance every {} frames",
        if args.frames == 0 {
            "unbounded".to_string()
        } else {
            args.frames.to_string()
        },
        args.fps,
        args.range_every
    );

    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(args.fps));
    let progress = ui.session(args.frames);
    let started = Instant::now();
    let mut last_health_log = Instant::now();
    let mut index = 0u64;

    while running.load(Ordering::SeqCst) && (args.frames == 0 || index < args.frames) {
        let tick = Instant::now();
        index += 1;

        let lease = source.next_frame()?;
        scheduler.on_frame(lease)?;

        for report in scheduler.poll() {
            for utterance in &report.utterances {
                progress.println(&format!("speak: {}", utterance));
            }
        }

        if args.range_every > 0 && index % args.range_every == 0 {
            match scheduler.request_distance()? {
                TriggerOutcome::Dispatched => log::debug!("frame {}: ranging", index),
                TriggerOutcome::Deferred => log::debug!("frame {}: ranging deferred", index),
                TriggerOutcome::NoOp => log::debug!("frame {}: nothing to range", index),
            }
        }

        progress.frame(&scheduler.stats());

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = source.stats();
            log::info!(
                "source health={} frames={} outstanding={} ({})",
                source.is_healthy(),
                stats.frames_captured,
                stats.buffers_outstanding,
                stats.description
            );
            last_health_log = Instant::now();
        }

        if let Some(rest) = frame_interval.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    if !running.load(Ordering::SeqCst) {
        log::info!("shutdown signal received, finishing in-flight pass...");
    }
    if let Some(report) = scheduler.wait_idle(SHUTDOWN_TIMEOUT)? {
        for utterance in &report.utterances {
            progress.println(&format!("speak: {}", utterance));
        }
    }
    drop(progress);
    ui.summary(&scheduler.stats(), started.elapsed());
    Ok(())
}

type Models = (Box<dyn DetectorBackend>, Box<dyn DepthModel>);

fn load_models(config: &PipelineConfig) -> Result<Models> {
    Ok((load_detector(config)?, load_depth(config)?))
}

fn load_detector(config: &PipelineConfig) -> Result<Box<dyn DetectorBackend>> {
    let crop = config.frames.crop;
    match &config.detector.model_path {
        Some(model) => {
            #[cfg(feature = "backend-tract")]
            {
                let labels = config
                    .detector
                    .labels_path
                    .as_ref()
                    .ok_or_else(|| anyhow!("detector model configured without a label map"))?;
                Ok(Box::new(sightline::detect::TractBackend::new(
                    model, labels, crop,
                )?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                Err(anyhow!(
                    "detector model {} requires the backend-tract feature",
                    model.display()
                ))
            }
        }
        None => {
            log::info!("no detector model configured; using bright-region detector");
            Ok(Box::new(CpuBackend::new(crop, config.detector.label.clone())))
        }
    }
}

fn load_depth(config: &PipelineConfig) -> Result<Box<dyn DepthModel>> {
    let size = config.frames.depth;
    match &config.depth.model_path {
        Some(model) => {
            #[cfg(feature = "backend-tract")]
            {
                Ok(Box::new(sightline::depth::TractDepthModel::new(model, size)?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                Err(anyhow!(
                    "depth model {} requires the backend-tract feature",
                    model.display()
                ))
            }
        }
        None => {
            log::warn!(
                "no depth model configured; every object reads {} m",
                FALLBACK_DEPTH_METERS
            );
            let raw = FALLBACK_DEPTH_METERS * config.depth.divisor as f32;
            Ok(Box::new(ConstantDepth::new(size, raw)))
        }
    }
}

fn open_source(args: &Args, config: &PipelineConfig) -> Result<Box<dyn FrameSource>> {
    #[cfg(feature = "ingest-image")]
    {
        if let Some(path) = &args.image {
            return Ok(Box::new(sightline::ingest::StillImageSource::open(
                path,
                config.frames.preview,
            )?));
        }
    }
    Ok(Box::new(SyntheticSource::new(SyntheticConfig {
        size: config.frames.preview,
        seed: args.seed,
        ..SyntheticConfig::default()
    })?))
}
