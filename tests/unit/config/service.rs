use super::*;
use std::collections::HashMap;

#[test]
fn defaults_match_the_documented_service_behavior() {
    let cfg = ServiceConfig::default();
    assert!(cfg.workers >= 1);
    assert_eq!(cfg.retry.max_attempts, 3);
    assert_eq!(cfg.retry.initial_backoff_ms, 500);
    assert_eq!(cfg.ffmpeg.video_codec, "libx264");
    assert_eq!(cfg.ffmpeg.audio_codec, "aac");
    assert!(cfg.ffmpeg.overwrite);
    assert_eq!(cfg.logging.level, "info");
    assert!(cfg.validate().is_ok());
}

#[test]
fn partial_file_keeps_defaults_for_missing_fields() {
    let dir = crate::test_support::scratch_dir("config");
    let path = dir.join("scenecast.json");
    std::fs::write(
        &path,
        r#"{"workers": 2, "retry": {"max_attempts": 5}, "ffmpeg": {"crf": 20}}"#,
    )
    .unwrap();
    let cfg = ServiceConfig::from_path(&path).unwrap();
    assert_eq!(cfg.workers, 2);
    assert_eq!(cfg.retry.max_attempts, 5);
    assert_eq!(cfg.retry.multiplier, 2.0);
    assert_eq!(cfg.ffmpeg.crf, Some(20));
    assert_eq!(cfg.ffmpeg.pix_fmt, "yuv420p");
}

#[test]
fn unreadable_or_malformed_files_fail() {
    let missing = ServiceConfig::from_path(Path::new("/definitely/not/here.json"));
    assert!(matches!(missing, Err(ScenecastError::Other(_))));

    let dir = crate::test_support::scratch_dir("config-bad");
    let path = dir.join("bad.json");
    std::fs::write(&path, "{ nope").unwrap();
    assert!(matches!(
        ServiceConfig::from_path(&path),
        Err(ScenecastError::Serde(_))
    ));
}

#[test]
fn environment_overrides_file_values() {
    let env: HashMap<&str, &str> = [
        ("SCENECAST_WORKERS", "3"),
        ("SCENECAST_OUTPUT_DIR", "/srv/videos"),
        ("SCENECAST_LOG", "scenecast=debug"),
        ("SCENECAST_FFMPEG", "/opt/ffmpeg/bin/ffmpeg"),
    ]
    .into_iter()
    .collect();
    let mut cfg = ServiceConfig::default();
    cfg.apply_env_from(|k| env.get(k).map(|v| (*v).to_owned()))
        .unwrap();
    assert_eq!(cfg.workers, 3);
    assert_eq!(cfg.output_dir, PathBuf::from("/srv/videos"));
    assert_eq!(cfg.logging.level, "scenecast=debug");
    assert_eq!(cfg.ffmpeg.program, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
}

#[test]
fn bad_overrides_and_zero_values_are_rejected() {
    let mut cfg = ServiceConfig::default();
    assert!(
        cfg.apply_env_from(|k| (k == "SCENECAST_WORKERS").then(|| "many".to_owned()))
            .is_err()
    );

    cfg.workers = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = ServiceConfig::default();
    cfg.retry.max_attempts = 0;
    assert!(cfg.validate().is_err());
}
