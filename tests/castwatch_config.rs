use std::sync::Mutex;

use tempfile::NamedTempFile;

use castwatch::config::CastwatchConfig;
use castwatch::{CastwatchError, FrameFormat};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CASTWATCH_CONFIG",
        "CASTWATCH_ANALYZED_FPS",
        "CASTWATCH_ANALYSIS_HEIGHT",
        "CASTWATCH_TOLERANCE",
        "CASTWATCH_BACKEND",
        "CASTWATCH_CAST_DIR",
        "CASTWATCH_CAST_MANIFEST",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = CastwatchConfig::load().expect("load config");

    assert_eq!(cfg.analysis.analyzed_fps, 4.0);
    assert_eq!(cfg.analysis.analysis_height, 360);
    assert_eq!(cfg.analysis.tolerance, 0.6);
    assert_eq!(cfg.analysis.backend, "stub");
    assert_eq!(cfg.output.codec, "MJPG");
    assert_eq!(cfg.output.image_format, FrameFormat::Jpeg);
    assert!(!cfg.output.highlight_faces);
    assert_eq!(cfg.cast.photos_per_actor, 5);
    assert!(cfg.cast.dir.is_none());
    assert!(cfg.limits.max_seconds.is_none());
    assert_eq!(cfg.timeline.top_actors, 5);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "analysis": {
                "analyzed_fps": 2.0,
                "analysis_height": 240,
                "tolerance": 0.5
            },
            "output": {
                "codec": "xvid",
                "highlight_faces": true,
                "image_format": "png"
            },
            "cast": {
                "manifest": "/srv/casts.json",
                "photos_per_actor": 3
            },
            "limits": {
                "max_seconds": 90.0,
                "max_frames": 5000
            },
            "timeline": {
                "top_actors": 8
            }
        }"#,
    );

    std::env::set_var("CASTWATCH_CONFIG", file.path());
    std::env::set_var("CASTWATCH_ANALYZED_FPS", "6");
    std::env::set_var("CASTWATCH_BACKEND", "tract");

    let cfg = CastwatchConfig::load().expect("load config");

    assert_eq!(cfg.analysis.analyzed_fps, 6.0);
    assert_eq!(cfg.analysis.analysis_height, 240);
    assert_eq!(cfg.analysis.tolerance, 0.5);
    assert_eq!(cfg.analysis.backend, "tract");
    assert_eq!(cfg.output.codec, "XVID");
    assert!(cfg.output.highlight_faces);
    assert_eq!(cfg.output.image_format, FrameFormat::Png);
    assert_eq!(cfg.cast.manifest.as_deref(), Some(std::path::Path::new("/srv/casts.json")));
    assert_eq!(cfg.cast.photos_per_actor, 3);
    assert_eq!(cfg.limits.max_seconds, Some(90.0));
    assert_eq!(cfg.limits.max_frames, Some(5000));
    assert_eq!(cfg.timeline.top_actors, 8);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CASTWATCH_ANALYZED_FPS", "fast");
    assert!(CastwatchConfig::load().is_err());
    clear_env();

    std::env::set_var("CASTWATCH_TOLERANCE", "0");
    let err = CastwatchConfig::load().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CastwatchError>(),
        Some(CastwatchError::Config(_))
    ));
    clear_env();

    let file = write_config(r#"{ "output": { "codec": "H264X" } }"#);
    std::env::set_var("CASTWATCH_CONFIG", file.path());
    assert!(CastwatchConfig::load().is_err());
    clear_env();

    let file = write_config(r#"{ "cast": { "dir": "/a" } }"#);
    std::env::set_var("CASTWATCH_CONFIG", file.path());
    std::env::set_var("CASTWATCH_CAST_MANIFEST", "/b.json");
    assert!(CastwatchConfig::load().is_err());
    clear_env();

    let file = write_config("{ not json");
    std::env::set_var("CASTWATCH_CONFIG", file.path());
    assert!(CastwatchConfig::load().is_err());
    clear_env();
}
