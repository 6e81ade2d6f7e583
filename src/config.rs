// Detection configuration.
//
// Defaults come from code, then environment variables (the binary loads a
// .env file first via dotenvy), then CLI flags layered on top by main.rs.
// Whatever the source, `validate` runs before any event is touched.

use std::env;
use std::str::FromStr;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Default maximum gap between two shares of the same object, in seconds.
pub const DEFAULT_TIME_WINDOW_SECS: f64 = 10.0;

/// Default minimum number of distinct accounts per object.
pub const DEFAULT_MIN_REPETITION: usize = 2;

/// Seed used for refinement when the caller enables it without supplying one.
pub const DEFAULT_REFINE_SEED: u64 = 0;

/// How repeated co-occurrences between the same pair turn into edge weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeightPolicy {
    /// Every qualifying (object, timestamp pair) adds 1.
    #[default]
    Linear,
    /// Each object adds at most 1 per pair, however often it was repeated.
    PerObject,
}

impl WeightPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightPolicy::Linear => "linear",
            WeightPolicy::PerObject => "per-object",
        }
    }
}

impl std::fmt::Display for WeightPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WeightPolicy {
    type Err = DetectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(WeightPolicy::Linear),
            "per-object" | "per_object" | "capped" => Ok(WeightPolicy::PerObject),
            other => Err(DetectionError::InvalidConfiguration(format!(
                "unknown weight policy '{other}' (expected 'linear' or 'per-object')"
            ))),
        }
    }
}

/// Options consumed by the detection core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum distinct accounts sharing an object for it to be compared at all.
    pub min_repetition: usize,
    /// Maximum gap, in seconds, between two shares to count as coordinated.
    pub time_window_secs: f64,
    /// Split connected components into denser communities (Louvain).
    pub refine: bool,
    /// Seed for refinement. Ignored unless `refine` is set.
    pub refine_seed: Option<u64>,
    /// Collapse repeated shares of one object by one account to the earliest.
    pub dedupe_self_repeats: bool,
    pub weight_policy: WeightPolicy,
    /// Worker count for the parallel matcher. 1 means sequential.
    pub concurrency: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_repetition: DEFAULT_MIN_REPETITION,
            time_window_secs: DEFAULT_TIME_WINDOW_SECS,
            refine: false,
            refine_seed: None,
            dedupe_self_repeats: false,
            weight_policy: WeightPolicy::Linear,
            concurrency: 4,
        }
    }
}

impl DetectionConfig {
    /// Load configuration from `LOCKSTEP_*` environment variables.
    ///
    /// Unset variables keep their defaults. A variable that is set but
    /// cannot be parsed is a configuration error, not silently ignored.
    pub fn from_env() -> Result<Self, DetectionError> {
        let defaults = Self::default();
        let config = Self {
            min_repetition: env_parse("LOCKSTEP_MIN_REPETITION")?
                .unwrap_or(defaults.min_repetition),
            time_window_secs: env_parse("LOCKSTEP_TIME_WINDOW")?
                .unwrap_or(defaults.time_window_secs),
            refine: env_flag("LOCKSTEP_REFINE")?.unwrap_or(defaults.refine),
            refine_seed: env_parse("LOCKSTEP_REFINE_SEED")?,
            dedupe_self_repeats: env_flag("LOCKSTEP_DEDUPE")?
                .unwrap_or(defaults.dedupe_self_repeats),
            weight_policy: env_parse("LOCKSTEP_WEIGHT_POLICY")?
                .unwrap_or(defaults.weight_policy),
            concurrency: env_parse("LOCKSTEP_CONCURRENCY")?.unwrap_or(defaults.concurrency),
        };
        Ok(config)
    }

    /// Reject configurations that make the run meaningless.
    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.min_repetition < 2 {
            return Err(DetectionError::InvalidConfiguration(format!(
                "min_repetition must be at least 2, got {}",
                self.min_repetition
            )));
        }
        if !self.time_window_secs.is_finite() || self.time_window_secs <= 0.0 {
            return Err(DetectionError::InvalidConfiguration(format!(
                "time_window must be a positive number of seconds, got {}",
                self.time_window_secs
            )));
        }
        if self.time_window().is_none() {
            return Err(DetectionError::InvalidConfiguration(format!(
                "time_window of {} seconds is out of range",
                self.time_window_secs
            )));
        }
        if self.concurrency == 0 {
            return Err(DetectionError::InvalidConfiguration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The window as a chrono duration, at nanosecond resolution.
    ///
    /// `None` when the value does not fit in a `TimeDelta`.
    pub fn time_window(&self) -> Option<TimeDelta> {
        let nanos = self.time_window_secs * 1e9;
        if !nanos.is_finite() || nanos < 1.0 || nanos > i64::MAX as f64 {
            return None;
        }
        Some(TimeDelta::nanoseconds(nanos.round() as i64))
    }

    /// The seed refinement actually uses (explicit seed or the fixed default).
    pub fn effective_seed(&self) -> u64 {
        self.refine_seed.unwrap_or(DEFAULT_REFINE_SEED)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, DetectionError> {
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            DetectionError::InvalidConfiguration(format!("{key} has an invalid value: '{raw}'"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_flag(key: &str) -> Result<Option<bool>, DetectionError> {
    match env::var(key).as_deref().map(str::trim) {
        Ok("") | Err(_) => Ok(None),
        Ok("1" | "true" | "yes" | "on") => Ok(Some(true)),
        Ok("0" | "false" | "no" | "off") => Ok(Some(false)),
        Ok(other) => Err(DetectionError::InvalidConfiguration(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}
