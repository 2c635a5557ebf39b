use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::constants::DEFAULT_FLUCTUATION_RANGE_KB;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not open config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid value {value:?} for {key} on line {line}")]
    InvalidValue {
        key: &'static str,
        value: String,
        line: usize,
    },
    #[error("invalid limit values in config file: {key} must be a positive integer, got {value}")]
    NotPositive { key: &'static str, value: i64 },
    #[error(
        "invalid limits in config file: LOWER_LIMIT ({lower} KB) must be below UPPER_LIMIT ({upper} KB)"
    )]
    Ordering { lower: u64, upper: u64 },
    #[error("invalid config: TIME_FRAME must not be negative, got {0}")]
    NegativeTimeFrame(i64),
}

/// Which limit checks a policy needs beyond a positive upper limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitRules {
    pub lower_required: bool,
    /// `lower < upper` must hold.
    pub ordered: bool,
}

/// Values exactly as read from a `KEY=VALUE` file, before validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawConfig {
    pub upper_limit: Option<i64>,
    pub lower_limit: Option<i64>,
    pub time_frame: Option<i64>,
    pub fluctuation_range: Option<i64>,
}

impl FromStr for RawConfig {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut raw = RawConfig::default();

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };

            let (key, slot) = match key.trim() {
                "UPPER_LIMIT" => ("UPPER_LIMIT", &mut raw.upper_limit),
                "LOWER_LIMIT" => ("LOWER_LIMIT", &mut raw.lower_limit),
                "TIME_FRAME" => ("TIME_FRAME", &mut raw.time_frame),
                "FLUCTUATION_RANGE" => ("FLUCTUATION_RANGE", &mut raw.fluctuation_range),
                _ => continue,
            };

            let value = value.trim();
            *slot = Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                key,
                value: value.to_string(),
                line: idx + 1,
            })?);
        }

        Ok(raw)
    }
}

impl RawConfig {
    pub fn validate(&self, rules: LimitRules) -> Result<ThresholdConfig, ConfigError> {
        let mut config = ThresholdConfig::new(
            self.upper_limit.unwrap_or(0),
            self.lower_limit.unwrap_or(0),
            rules,
        )?;

        match self.time_frame {
            Some(secs) if secs < 0 => return Err(ConfigError::NegativeTimeFrame(secs)),
            Some(secs) => config.time_frame = Duration::from_secs(secs.unsigned_abs()),
            None => {}
        }

        if let Some(range) = self.fluctuation_range {
            config.fluctuation_range_kb = positive("FLUCTUATION_RANGE", range)?;
        }

        Ok(config)
    }
}

#[tracing::instrument]
pub async fn load(path: &Path) -> Result<RawConfig, ConfigError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let raw = text.parse()?;
    tracing::debug!("Loaded config: {:?}", raw);
    Ok(raw)
}

/// Validated limits shared read-only by a policy and its simulation loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThresholdConfig {
    upper_limit_kb: u64,
    lower_limit_kb: u64,
    time_frame: Duration,
    fluctuation_range_kb: u64,
}

impl ThresholdConfig {
    /// Checks that the upper limit is positive and, depending on `rules`,
    /// that the lower limit is positive and below the upper one.
    ///
    /// When the lower limit is not required a non-positive value is stored
    /// as zero.
    pub fn new(
        upper_limit_kb: i64,
        lower_limit_kb: i64,
        rules: LimitRules,
    ) -> Result<Self, ConfigError> {
        let upper = positive("UPPER_LIMIT", upper_limit_kb)?;
        let lower = if rules.lower_required {
            positive("LOWER_LIMIT", lower_limit_kb)?
        } else {
            lower_limit_kb.max(0).unsigned_abs()
        };

        if rules.ordered && lower >= upper {
            return Err(ConfigError::Ordering { lower, upper });
        }

        Ok(Self {
            upper_limit_kb: upper,
            lower_limit_kb: lower,
            time_frame: Duration::ZERO,
            fluctuation_range_kb: DEFAULT_FLUCTUATION_RANGE_KB,
        })
    }

    pub fn with_time_frame(self, time_frame: Duration) -> Self {
        Self { time_frame, ..self }
    }

    pub fn with_fluctuation_range_kb(self, fluctuation_range_kb: u64) -> Self {
        Self {
            fluctuation_range_kb,
            ..self
        }
    }

    pub fn upper_limit_kb(&self) -> u64 {
        self.upper_limit_kb
    }

    pub fn lower_limit_kb(&self) -> u64 {
        self.lower_limit_kb
    }

    pub fn time_frame(&self) -> Duration {
        self.time_frame
    }

    pub fn fluctuation_range_kb(&self) -> u64 {
        self.fluctuation_range_kb
    }
}

fn positive(key: &'static str, value: i64) -> Result<u64, ConfigError> {
    if value <= 0 {
        return Err(ConfigError::NotPositive { key, value });
    }
    Ok(value.unsigned_abs())
}
