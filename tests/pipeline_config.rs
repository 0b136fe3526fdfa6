use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use sensor_pipeline::config::PipelineConfig;
use sensor_pipeline::DetectionCapability;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SCAN_CONFIG",
        "SCAN_RENDER_INTERVAL_MS",
        "SCAN_STALL_WARN_MS",
        "SCAN_SOURCE_FPS",
        "SCAN_METADATA_DETECTION",
        "SCAN_CAPABILITIES",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "render": { "interval_ms": 33 },
        "worker": { "stall_warn_ms": 250 },
        "source": {
            "name": "stub://dock-door",
            "fps": 30,
            "width": 320,
            "height": 240
        },
        "capabilities": { "faces": false, "codes": true }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("SCAN_CONFIG", file.path());
    std::env::set_var("SCAN_SOURCE_FPS", "120");
    std::env::set_var("SCAN_METADATA_DETECTION", "true");

    let cfg = PipelineConfig::load().expect("load config");

    assert_eq!(cfg.render_interval, Duration::from_millis(33));
    assert_eq!(cfg.stall_warning, Duration::from_millis(250));
    assert_eq!(cfg.source.name, "stub://dock-door");
    assert_eq!(cfg.source.fps, 120);
    assert_eq!(cfg.source.width, 320);
    assert_eq!(cfg.source.height, 240);
    assert_eq!(cfg.capabilities, vec![DetectionCapability::Codes]);
    assert!(!cfg.render_enabled);
    assert!(cfg.pipeline_options().metadata_detection);

    let source = cfg.synthetic_source();
    assert_eq!(source.fps, 120);
    assert_eq!(source.name, "stub://dock-door");

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[render]
interval_ms = 40
enabled = false

[source]
fps = 15
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = PipelineConfig::load_from(Some(file.path())).expect("load config");

    assert_eq!(cfg.render_interval, Duration::from_millis(40));
    assert!(!cfg.render_enabled);
    assert_eq!(cfg.source.fps, 15);
    assert_eq!(cfg.source.width, 640);
    assert_eq!(
        cfg.capabilities,
        vec![DetectionCapability::Faces, DetectionCapability::Codes]
    );

    clear_env();
}

#[test]
fn defaults_apply_without_file_and_capabilities_come_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SCAN_CAPABILITIES", "codes, faces, codes");
    std::env::set_var("SCAN_RENDER_INTERVAL_MS", "25");

    let cfg = PipelineConfig::load_from(None).expect("load config");

    assert_eq!(cfg.render_interval, Duration::from_millis(25));
    assert_eq!(cfg.stall_warning, Duration::from_secs(1));
    assert_eq!(cfg.source.fps, 60);
    assert!(cfg.render_enabled);
    assert_eq!(
        cfg.capabilities,
        vec![DetectionCapability::Codes, DetectionCapability::Faces]
    );

    clear_env();
}

#[test]
fn rejects_invalid_overrides_and_files() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SCAN_RENDER_INTERVAL_MS", "0");
    assert!(PipelineConfig::load_from(None).is_err());
    clear_env();

    std::env::set_var("SCAN_CAPABILITIES", "faces,teleport");
    assert!(PipelineConfig::load_from(None).is_err());
    clear_env();

    std::env::set_var("SCAN_METADATA_DETECTION", "sometimes");
    assert!(PipelineConfig::load_from(None).is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"{ not json").expect("write config");
    assert!(PipelineConfig::load_from(Some(file.path())).is_err());

    clear_env();
}
