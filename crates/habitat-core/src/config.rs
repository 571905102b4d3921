//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_SCAN__THRESHOLD=0.7`). Provides helpers to expand `~` and `${VAR}` and
//! to resolve relative paths against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::BoundingBox;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tiles: TileSettings,
    pub train: TrainSettings,
    pub scan: ScanSettings,
    pub output: OutputSettings,
    pub regions: Regions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSettings {
    /// Directory holding `tile_<x>_<y>.json` files.
    pub dir: String,
    /// Tile edge length in degrees.
    pub tile_size: f64,
    /// Embedding dimensionality.
    pub dim: usize,
}

impl Default for TileSettings {
    fn default() -> Self { Self { dir: "cache/2024".to_string(), tile_size: 0.1, dim: 128 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainSettings {
    pub min_positives: usize,
    /// Negatives drawn per resolved positive.
    pub negative_ratio: f64,
    /// Sampling attempts allowed per wanted negative before giving up.
    pub attempts_per_sample: usize,
    /// Background points closer than this (degrees) to an occurrence are rejected.
    pub min_distance_deg: f64,
    pub neighbors: usize,
    pub seed: u64,
    /// Region negatives are drawn from; defaults to the scan bbox.
    pub region: Option<BoundingBox>,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            min_positives: 1,
            negative_ratio: 5.0,
            attempts_per_sample: 100,
            min_distance_deg: 0.005,
            neighbors: 10,
            seed: 42,
            region: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub resolution: f64,
    pub threshold: f64,
    pub max_candidates: Option<usize>,
    /// Worker threads; the global rayon pool when unset.
    pub workers: Option<usize>,
    pub progress: bool,
}

impl Default for ScanSettings {
    fn default() -> Self { Self { resolution: 0.1, threshold: 0.6, max_candidates: None, workers: None, progress: true } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub results_dir: String,
}

impl Default for OutputSettings {
    fn default() -> Self { Self { results_dir: "output".to_string() } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSettings {
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Regions(pub BTreeMap<String, RegionSettings>);

impl Default for Regions {
    fn default() -> Self {
        let mut regions = BTreeMap::new();
        regions.insert(
            "cambridge".to_string(),
            RegionSettings { bbox: BoundingBox { min_lon: 0.03, min_lat: 52.13, max_lon: 0.22, max_lat: 52.29 } },
        );
        Self(regions)
    }
}

impl Regions {
    pub fn get(&self, name: &str) -> Option<BoundingBox> { self.0.get(name).map(|r| r.bbox) }
    pub fn names(&self) -> impl Iterator<Item = &str> { self.0.keys().map(String::as_str) }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 { Ok(()) } else { Err(Error::InvalidConfig(format!("{name} must be > 0, got {v}"))) }
        };
        positive("tiles.tile_size", self.tiles.tile_size)?;
        positive("scan.resolution", self.scan.resolution)?;
        if self.tiles.dim == 0 {
            return Err(Error::InvalidConfig("tiles.dim must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.scan.threshold) {
            return Err(Error::InvalidConfig(format!("scan.threshold must be in [0, 1], got {}", self.scan.threshold)));
        }
        if self.scan.workers == Some(0) {
            return Err(Error::InvalidConfig("scan.workers must be > 0 when set".into()));
        }
        if self.train.neighbors == 0 {
            return Err(Error::InvalidConfig("train.neighbors must be > 0".into()));
        }
        if self.train.min_positives == 0 {
            return Err(Error::InvalidConfig("train.min_positives must be > 0".into()));
        }
        if !(self.train.negative_ratio.is_finite() && self.train.negative_ratio >= 0.0) {
            return Err(Error::InvalidConfig(format!("train.negative_ratio must be >= 0, got {}", self.train.negative_ratio)));
        }
        if !(self.train.min_distance_deg.is_finite() && self.train.min_distance_deg >= 0.0) {
            return Err(Error::InvalidConfig(format!("train.min_distance_deg must be >= 0, got {}", self.train.min_distance_deg)));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
