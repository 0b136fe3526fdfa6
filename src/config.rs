use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::detect::DetectionCapability;
use crate::ingest::SyntheticConfig;
use crate::pipeline::PipelineOptions;

const DEFAULT_RENDER_INTERVAL_MS: u64 = 20;
const DEFAULT_STALL_WARN_MS: u64 = 1_000;
const DEFAULT_SOURCE_NAME: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 60;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    render: Option<RenderConfigFile>,
    worker: Option<WorkerConfigFile>,
    source: Option<SourceConfigFile>,
    capabilities: Option<CapabilitiesConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    interval_ms: Option<u64>,
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct WorkerConfigFile {
    stall_warn_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    name: Option<String>,
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CapabilitiesConfigFile {
    faces: Option<bool>,
    codes: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub render_interval: Duration,
    /// False while metadata-style detection owns the preview.
    pub render_enabled: bool,
    pub stall_warning: Duration,
    pub source: SourceSettings,
    pub capabilities: Vec<DetectionCapability>,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub name: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl PipelineConfig {
    /// Load from `SCAN_CONFIG` (JSON, or TOML by extension), then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SCAN_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or none), then environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let render_interval = Duration::from_millis(
            file.render
                .as_ref()
                .and_then(|render| render.interval_ms)
                .unwrap_or(DEFAULT_RENDER_INTERVAL_MS),
        );
        let render_enabled = file
            .render
            .as_ref()
            .and_then(|render| render.enabled)
            .unwrap_or(true);
        let stall_warning = Duration::from_millis(
            file.worker
                .and_then(|worker| worker.stall_warn_ms)
                .unwrap_or(DEFAULT_STALL_WARN_MS),
        );
        let source = SourceSettings {
            name: file
                .source
                .as_ref()
                .and_then(|source| source.name.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE_NAME.to_string()),
            fps: file
                .source
                .as_ref()
                .and_then(|source| source.fps)
                .unwrap_or(DEFAULT_SOURCE_FPS),
            width: file
                .source
                .as_ref()
                .and_then(|source| source.width)
                .unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: file
                .source
                .as_ref()
                .and_then(|source| source.height)
                .unwrap_or(DEFAULT_SOURCE_HEIGHT),
        };
        let caps = file.capabilities.unwrap_or_default();
        let mut capabilities = Vec::new();
        if caps.faces.unwrap_or(true) {
            capabilities.push(DetectionCapability::Faces);
        }
        if caps.codes.unwrap_or(true) {
            capabilities.push(DetectionCapability::Codes);
        }
        Self {
            render_interval,
            render_enabled,
            stall_warning,
            source,
            capabilities,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(ms) = std::env::var("SCAN_RENDER_INTERVAL_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                anyhow!("SCAN_RENDER_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.render_interval = Duration::from_millis(ms);
        }
        if let Ok(ms) = std::env::var("SCAN_STALL_WARN_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                anyhow!("SCAN_STALL_WARN_MS must be an integer number of milliseconds")
            })?;
            self.stall_warning = Duration::from_millis(ms);
        }
        if let Ok(fps) = std::env::var("SCAN_SOURCE_FPS") {
            self.source.fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("SCAN_SOURCE_FPS must be an integer"))?;
        }
        if let Ok(flag) = std::env::var("SCAN_METADATA_DETECTION") {
            self.render_enabled = !parse_bool(&flag)
                .ok_or_else(|| anyhow!("SCAN_METADATA_DETECTION must be true or false"))?;
        }
        if let Ok(list) = std::env::var("SCAN_CAPABILITIES") {
            let mut parsed = Vec::new();
            for name in split_csv(&list) {
                let cap = DetectionCapability::parse(&name)
                    .ok_or_else(|| anyhow!("unknown capability in SCAN_CAPABILITIES: {}", name))?;
                if !parsed.contains(&cap) {
                    parsed.push(cap);
                }
            }
            if !parsed.is_empty() {
                self.capabilities = parsed;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.render_interval.is_zero() {
            return Err(anyhow!("render interval must be greater than zero"));
        }
        if self.source.fps == 0 {
            return Err(anyhow!("source fps must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source dimensions must be non-zero"));
        }
        if self.capabilities.is_empty() {
            return Err(anyhow!("at least one detection capability must be enabled"));
        }
        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            render_interval: self.render_interval,
            stall_warning: self.stall_warning,
            metadata_detection: !self.render_enabled,
        }
    }

    pub fn synthetic_source(&self) -> SyntheticConfig {
        SyntheticConfig {
            name: self.source.name.clone(),
            fps: self.source.fps,
            width: self.source.width,
            height: self.source.height,
            ..SyntheticConfig::default()
        }
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fifty_hertz_preview() {
        let cfg = PipelineConfig::from_file(PipelineConfigFile::default());
        assert_eq!(cfg.render_interval, Duration::from_millis(20));
        assert!(cfg.render_enabled);
        assert_eq!(
            cfg.capabilities,
            vec![DetectionCapability::Faces, DetectionCapability::Codes]
        );
        assert!(cfg.validate().is_ok());
        assert!(!cfg.pipeline_options().metadata_detection);
    }

    #[test]
    fn validate_rejects_zero_interval_and_no_capabilities() {
        let mut cfg = PipelineConfig::from_file(PipelineConfigFile::default());
        cfg.render_interval = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let cfg = PipelineConfig::from_file(PipelineConfigFile {
            capabilities: Some(CapabilitiesConfigFile {
                faces: Some(false),
                codes: Some(false),
            }),
            ..PipelineConfigFile::default()
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool(" ON "), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
