//! Service configuration: defaults, an optional TOML file, and
//! `VISAGE_`-prefixed environment overrides.

use crate::analyzer::DetectorBackend;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "visage.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub model: ModelSettings,
    pub viewer: ViewerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Run-mode toggle: verbose logging when set.
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    /// Path to the scripted face-attribute pipeline file.
    pub path: PathBuf,
    pub detector: DetectorBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerSettings {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Settings {
    /// Load settings from `path` (if it exists) over the built-in defaults,
    /// then apply `VISAGE_*` environment overrides (e.g.
    /// `VISAGE_SERVER__PORT=9000`).
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let settings = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000_i64)?
            .set_default("server.debug", false)?
            .set_default("model.path", "models/face_attributes.pt")?
            .set_default("model.detector", "lightweight")?
            .set_default("viewer.device_index", 0_i64)?
            .set_default("viewer.width", 640_i64)?
            .set_default("viewer.height", 480_i64)?
            .set_default("viewer.fps", 30_i64)?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("VISAGE").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
