use serde::Deserialize;
use soil_client::ProbeTable;
use std::{collections::BTreeMap, fs};

use crate::{
    error::EtError,
    et::{DepthWeights, REFERENCE_DEPTH_WEIGHTS, UNIFORM_DEPTH_WEIGHT},
    soil::SoilType,
};

/// Most probes a multi-depth join is configured with.
pub const MAX_MULTI_DEPTH_PROBES: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    pub table: String,
    pub depth_cm: Option<u32>,
    /// Converts a water content change at this depth to mm of water.
    pub depth_weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiDepthConfig {
    /// Probe names in join order; the first one is the base stream.
    pub probes: Vec<String>,
    #[serde(default = "default_weights")]
    pub weights: Vec<f64>,
    #[serde(default = "default_uniform_weight")]
    pub uniform_weight: f64,
}

fn default_weights() -> Vec<f64> {
    REFERENCE_DEPTH_WEIGHTS.to_vec()
}

fn default_uniform_weight() -> f64 {
    UNIFORM_DEPTH_WEIGHT
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoilConfig {
    pub default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub http: HttpConfig,
    pub metrics: Option<MetricsConfig>,
    pub probes: BTreeMap<String, ProbeConfig>,
    pub multi_depth: MultiDepthConfig,
    #[serde(default)]
    pub soil: SoilConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("ET_SERVICE_CONFIG").unwrap_or_else(|_| "et-service.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics.as_ref().is_some_and(|m| m.enabled)
    }

    /// Validate the probe and soil sections and resolve them for the engine.
    pub fn probe_catalog(&self) -> Result<ProbeCatalog, EtError> {
        let mut probes = BTreeMap::new();
        for (name, probe) in &self.probes {
            let table = ProbeTable::new(&probe.table)
                .map_err(|e| EtError::Configuration(format!("probe '{name}': {e}")))?;
            if !(probe.depth_weight.is_finite() && probe.depth_weight > 0.0) {
                return Err(EtError::Configuration(format!(
                    "probe '{name}': depth_weight must be positive, got {}",
                    probe.depth_weight
                )));
            }
            probes.insert(
                name.clone(),
                ResolvedProbe {
                    name: name.clone(),
                    table,
                    depth_cm: probe.depth_cm,
                    depth_weight: probe.depth_weight,
                },
            );
        }

        let md = &self.multi_depth;
        if md.probes.is_empty() || md.probes.len() > MAX_MULTI_DEPTH_PROBES {
            return Err(EtError::Configuration(format!(
                "multi_depth.probes must list 1 to {MAX_MULTI_DEPTH_PROBES} probes, got {}",
                md.probes.len()
            )));
        }
        if let Some(unknown) = md.probes.iter().find(|p| !probes.contains_key(*p)) {
            return Err(EtError::Configuration(format!(
                "multi_depth references unknown probe '{unknown}'"
            )));
        }
        if md.weights.len() != md.probes.len() {
            return Err(EtError::Configuration(format!(
                "multi_depth has {} probes but {} weights",
                md.probes.len(),
                md.weights.len()
            )));
        }
        let weights = DepthWeights::new(md.weights.clone())?;
        if !(md.uniform_weight.is_finite() && md.uniform_weight > 0.0) {
            return Err(EtError::Configuration(format!(
                "multi_depth.uniform_weight must be positive, got {}",
                md.uniform_weight
            )));
        }

        let default_soil = match &self.soil.default {
            Some(name) => name.parse()?,
            None => SoilType::default(),
        };

        Ok(ProbeCatalog {
            probes,
            multi_depth: md.probes.clone(),
            weights,
            uniform_weight: md.uniform_weight,
            default_soil,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProbe {
    pub name: String,
    pub table: ProbeTable,
    pub depth_cm: Option<u32>,
    pub depth_weight: f64,
}

/// Validated probe and soil settings.
#[derive(Debug, Clone)]
pub struct ProbeCatalog {
    probes: BTreeMap<String, ResolvedProbe>,
    multi_depth: Vec<String>,
    pub weights: DepthWeights,
    pub uniform_weight: f64,
    pub default_soil: SoilType,
}

impl ProbeCatalog {
    pub fn probe(&self, name: &str) -> Result<&ResolvedProbe, EtError> {
        self.probes
            .get(name)
            .ok_or_else(|| EtError::Configuration(format!("unknown probe '{name}'")))
    }

    pub fn probes(&self) -> impl Iterator<Item = &ResolvedProbe> {
        self.probes.values()
    }

    pub fn probe_names(&self) -> impl Iterator<Item = &str> {
        self.probes.keys().map(String::as_str)
    }

    /// Probes of the multi-depth join; the first is the base stream.
    pub fn multi_depth_probes(&self) -> impl Iterator<Item = &ResolvedProbe> {
        self.multi_depth.iter().filter_map(|name| self.probes.get(name))
    }
}
