use std::sync::Mutex;

use tempfile::NamedTempFile;

use sightline::config::{PipelineConfig, SpeechEngine};
use sightline::{Rotation, Size};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SIGHTLINE_CONFIG",
        "SIGHTLINE_DEPTH_DIVISOR",
        "SIGHTLINE_TRACKING_CONFIDENCE",
        "SIGHTLINE_SPEECH_CONFIDENCE",
        "SIGHTLINE_ROTATION",
        "SIGHTLINE_DETECTOR_MODEL",
        "SIGHTLINE_DEPTH_MODEL",
        "SIGHTLINE_SPEECH_ENGINE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PipelineConfig::load().expect("load config");
    let params = cfg.geometry_params().unwrap();
    assert_eq!(params.preview, Size::new(640, 480));
    assert_eq!(params.crop, Size::new(300, 300));
    assert_eq!(params.depth, Size::new(640, 448));
    assert_eq!(params.rotation, Rotation::Deg0);
    assert!(!params.maintain_aspect);

    let settings = cfg.scheduler_settings();
    assert_eq!(settings.tracking_confidence, 0.5);
    assert_eq!(settings.speech_confidence, 0.6);
    assert_eq!(settings.depth_divisor, 8.0);
    assert_eq!(cfg.detector.threads, 4);
    assert!(!cfg.detector.acceleration);
    assert_eq!(cfg.speech.engine, SpeechEngine::Log);
    assert_eq!(cfg.speech.tag, "Object Annotation");
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "frames": {
            "preview": { "width": 1280, "height": 720 },
            "rotation": 90,
            "maintain_aspect": true
        },
        "thresholds": { "tracking_confidence": 0.4 },
        "detector": { "threads": 2, "acceleration": true, "label": "obstacle" },
        "depth": { "divisor": 4.0 },
        "speech": { "engine": "command", "command": "say" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SIGHTLINE_CONFIG", file.path());
    std::env::set_var("SIGHTLINE_DEPTH_DIVISOR", "16");
    std::env::set_var("SIGHTLINE_SPEECH_CONFIDENCE", "0.75");
    std::env::set_var("SIGHTLINE_ROTATION", "-90");
    std::env::set_var("SIGHTLINE_SPEECH_ENGINE", "log");

    let cfg = PipelineConfig::load().expect("load config");
    let params = cfg.geometry_params().unwrap();
    assert_eq!(params.preview, Size::new(1280, 720));
    assert_eq!(params.crop, Size::new(300, 300));
    assert_eq!(params.rotation, Rotation::Deg270);
    assert!(params.maintain_aspect);

    let settings = cfg.scheduler_settings();
    assert_eq!(settings.tracking_confidence, 0.4);
    assert_eq!(settings.speech_confidence, 0.75);
    assert_eq!(settings.depth_divisor, 16.0);
    assert_eq!(cfg.detector.threads, 2);
    assert!(cfg.detector.acceleration);
    assert_eq!(cfg.detector.label, "obstacle");
    assert_eq!(cfg.speech.engine, SpeechEngine::Log);
    assert_eq!(cfg.speech.command, "say");

    clear_env();
}

#[test]
fn loads_toml_file_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[frames]
crop = { width = 320, height = 320 }
rotation = 180

[speech]
tag = "Guidance"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("SIGHTLINE_CONFIG", file.path());

    let cfg = PipelineConfig::load().expect("load config");
    let params = cfg.geometry_params().unwrap();
    assert_eq!(params.crop, Size::new(320, 320));
    assert_eq!(params.rotation, Rotation::Deg180);
    assert_eq!(cfg.speech.tag, "Guidance");

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SIGHTLINE_ROTATION", "45");
    assert!(PipelineConfig::load().is_err());
    clear_env();

    std::env::set_var("SIGHTLINE_DEPTH_DIVISOR", "0");
    assert!(PipelineConfig::load().is_err());
    clear_env();

    std::env::set_var("SIGHTLINE_TRACKING_CONFIDENCE", "high");
    assert!(PipelineConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "frames": { "depth": { "width": 0, "height": 448 } } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("SIGHTLINE_CONFIG", file.path());
    assert!(PipelineConfig::load().is_err());

    clear_env();
}
