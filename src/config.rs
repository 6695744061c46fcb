use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::depth::DEFAULT_DEPTH_DIVISOR;
use crate::geometry::{GeometryParams, Rotation, Size};
use crate::scheduler::SchedulerSettings;
use crate::speech::UTTERANCE_TAG;

const DEFAULT_PREVIEW: Size = Size::new(640, 480);
const DEFAULT_CROP: Size = Size::new(300, 300);
const DEFAULT_DEPTH: Size = Size::new(640, 448);
const DEFAULT_TRACKING_CONFIDENCE: f32 = 0.5;
const DEFAULT_SPEECH_CONFIDENCE: f32 = 0.6;
const DEFAULT_DETECTOR_THREADS: usize = 4;
const DEFAULT_DETECTOR_LABEL: &str = "object";
const DEFAULT_SPEECH_ENGINE: &str = "log";
const DEFAULT_SPEECH_COMMAND: &str = "espeak-ng";

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    frames: Option<FramesConfigFile>,
    thresholds: Option<ThresholdsConfigFile>,
    detector: Option<DetectorConfigFile>,
    depth: Option<DepthConfigFile>,
    speech: Option<SpeechConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct FramesConfigFile {
    preview: Option<Size>,
    crop: Option<Size>,
    depth: Option<Size>,
    rotation: Option<i32>,
    maintain_aspect: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdsConfigFile {
    tracking_confidence: Option<f32>,
    speech_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    threads: Option<usize>,
    acceleration: Option<bool>,
    label: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DepthConfigFile {
    model_path: Option<PathBuf>,
    divisor: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct SpeechConfigFile {
    engine: Option<String>,
    command: Option<String>,
    tag: Option<String>,
}

/// Settings for one pipeline session.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub frames: FrameSettings,
    pub tracking_confidence: f32,
    pub speech_confidence: f32,
    pub detector: DetectorSettings,
    pub depth: DepthSettings,
    pub speech: SpeechSettings,
}

#[derive(Debug, Clone)]
pub struct FrameSettings {
    pub preview: Size,
    pub crop: Size,
    pub depth: Size,
    /// Degrees clockwise; normalised to 0, 90, 180 or 270 by validation.
    pub rotation: i32,
    pub maintain_aspect: bool,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub threads: usize,
    pub acceleration: bool,
    /// Label used by the built-in bright-region detector.
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct DepthSettings {
    pub model_path: Option<PathBuf>,
    pub divisor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEngine {
    Log,
    Command,
}

impl std::str::FromStr for SpeechEngine {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "command" => Ok(Self::Command),
            other => Err(anyhow!(
                "unknown speech engine {:?} (expected \"log\" or \"command\")",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub engine: SpeechEngine,
    pub command: String,
    pub tag: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frames: FrameSettings {
                preview: DEFAULT_PREVIEW,
                crop: DEFAULT_CROP,
                depth: DEFAULT_DEPTH,
                rotation: 0,
                maintain_aspect: false,
            },
            tracking_confidence: DEFAULT_TRACKING_CONFIDENCE,
            speech_confidence: DEFAULT_SPEECH_CONFIDENCE,
            detector: DetectorSettings {
                model_path: None,
                labels_path: None,
                threads: DEFAULT_DETECTOR_THREADS,
                acceleration: false,
                label: DEFAULT_DETECTOR_LABEL.to_string(),
            },
            depth: DepthSettings {
                model_path: None,
                divisor: DEFAULT_DEPTH_DIVISOR,
            },
            speech: SpeechSettings {
                engine: SpeechEngine::Log,
                command: DEFAULT_SPEECH_COMMAND.to_string(),
                tag: UTTERANCE_TAG.to_string(),
            },
        }
    }
}

impl PipelineConfig {
    /// Defaults, then the file named by `SIGHTLINE_CONFIG`, then
    /// `SIGHTLINE_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SIGHTLINE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let frames = file.frames.unwrap_or_default();
        let thresholds = file.thresholds.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let depth = file.depth.unwrap_or_default();
        let speech = file.speech.unwrap_or_default();

        let engine = match speech.engine {
            Some(engine) => engine.parse()?,
            None => defaults.speech.engine,
        };

        Ok(Self {
            frames: FrameSettings {
                preview: frames.preview.unwrap_or(defaults.frames.preview),
                crop: frames.crop.unwrap_or(defaults.frames.crop),
                depth: frames.depth.unwrap_or(defaults.frames.depth),
                rotation: frames.rotation.unwrap_or(defaults.frames.rotation),
                maintain_aspect: frames
                    .maintain_aspect
                    .unwrap_or(defaults.frames.maintain_aspect),
            },
            tracking_confidence: thresholds
                .tracking_confidence
                .unwrap_or(defaults.tracking_confidence),
            speech_confidence: thresholds
                .speech_confidence
                .unwrap_or(defaults.speech_confidence),
            detector: DetectorSettings {
                model_path: detector.model_path,
                labels_path: detector.labels_path,
                threads: detector.threads.unwrap_or(defaults.detector.threads),
                acceleration: detector
                    .acceleration
                    .unwrap_or(defaults.detector.acceleration),
                label: detector.label.unwrap_or(defaults.detector.label),
            },
            depth: DepthSettings {
                model_path: depth.model_path,
                divisor: depth.divisor.unwrap_or(defaults.depth.divisor),
            },
            speech: SpeechSettings {
                engine,
                command: speech.command.unwrap_or(defaults.speech.command),
                tag: speech.tag.unwrap_or(defaults.speech.tag),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(divisor) = env_value("SIGHTLINE_DEPTH_DIVISOR") {
            self.depth.divisor = divisor
                .parse()
                .map_err(|_| anyhow!("SIGHTLINE_DEPTH_DIVISOR must be a number"))?;
        }
        if let Some(confidence) = env_value("SIGHTLINE_TRACKING_CONFIDENCE") {
            self.tracking_confidence = confidence
                .parse()
                .map_err(|_| anyhow!("SIGHTLINE_TRACKING_CONFIDENCE must be a number"))?;
        }
        if let Some(confidence) = env_value("SIGHTLINE_SPEECH_CONFIDENCE") {
            self.speech_confidence = confidence
                .parse()
                .map_err(|_| anyhow!("SIGHTLINE_SPEECH_CONFIDENCE must be a number"))?;
        }
        if let Some(rotation) = env_value("SIGHTLINE_ROTATION") {
            self.frames.rotation = rotation
                .parse()
                .map_err(|_| anyhow!("SIGHTLINE_ROTATION must be an integer number of degrees"))?;
        }
        if let Some(path) = env_value("SIGHTLINE_DETECTOR_MODEL") {
            self.detector.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_value("SIGHTLINE_DEPTH_MODEL") {
            self.depth.model_path = Some(PathBuf::from(path));
        }
        if let Some(engine) = env_value("SIGHTLINE_SPEECH_ENGINE") {
            self.speech.engine = engine.parse()?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        for (what, size) in [
            ("preview", self.frames.preview),
            ("crop", self.frames.crop),
            ("depth", self.frames.depth),
        ] {
            if !size.is_positive() {
                return Err(anyhow!("{} size must be positive, got {}", what, size));
            }
        }
        self.frames.rotation = Rotation::from_degrees(self.frames.rotation)?.degrees();

        for (what, value) in [
            ("tracking confidence", self.tracking_confidence),
            ("speech confidence", self.speech_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", what, value));
            }
        }
        if !(self.depth.divisor.is_finite() && self.depth.divisor > 0.0) {
            return Err(anyhow!(
                "depth divisor must be a positive number, got {}",
                self.depth.divisor
            ));
        }
        if self.detector.threads == 0 {
            return Err(anyhow!("detector threads must be at least 1"));
        }
        if self.detector.model_path.is_some() && self.detector.labels_path.is_none() {
            return Err(anyhow!("detector model configured without a label map"));
        }
        if self.speech.command.trim().is_empty() {
            return Err(anyhow!("speech command must not be empty"));
        }
        Ok(())
    }

    pub fn geometry_params(&self) -> Result<GeometryParams> {
        Ok(GeometryParams {
            preview: self.frames.preview,
            crop: self.frames.crop,
            depth: self.frames.depth,
            rotation: Rotation::from_degrees(self.frames.rotation)?,
            maintain_aspect: self.frames.maintain_aspect,
        })
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            tracking_confidence: self.tracking_confidence,
            speech_confidence: self.speech_confidence,
            depth_divisor: self.depth.divisor,
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let mut cfg = PipelineConfig::from_file(PipelineConfigFile::default()).unwrap();
        cfg.validate().unwrap();
        let params = cfg.geometry_params().unwrap();
        assert_eq!(params.preview, Size::new(640, 480));
        assert_eq!(params.crop, Size::new(300, 300));
        assert_eq!(params.depth, Size::new(640, 448));
        assert_eq!(params.rotation, Rotation::Deg0);
        assert_eq!(cfg.scheduler_settings(), SchedulerSettings::default());
        assert_eq!(cfg.speech.tag, "Object Annotation");
    }

    #[test]
    fn rotation_is_normalised() {
        let mut cfg = PipelineConfig::default();
        cfg.frames.rotation = -90;
        cfg.validate().unwrap();
        assert_eq!(cfg.frames.rotation, 270);

        cfg.frames.rotation = 45;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = PipelineConfig::default();
        cfg.speech_confidence = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.depth.divisor = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.frames.crop = Size::new(0, 300);
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.detector.threads = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn speech_engine_parses_case_insensitively() {
        assert_eq!("LOG".parse::<SpeechEngine>().unwrap(), SpeechEngine::Log);
        assert_eq!(
            " command ".parse::<SpeechEngine>().unwrap(),
            SpeechEngine::Command
        );
        assert!("festival".parse::<SpeechEngine>().is_err());
    }
}
