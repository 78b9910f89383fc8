use serde::Deserialize;
use bootwire_core::error::{BootwireError, Result};

/// Optional YAML override file. Every field is optional; anything present
/// replaces the profile default, and environment variables win over both.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideFile {
    pub version: u32,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl OverrideFile {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(BootwireError::Configuration(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.metrics.validate()?;

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors: Option<bool>,
    pub global_prefix: Option<String>,
    #[serde(default)]
    pub validation: ValidationSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationSection {
    pub transform: Option<bool>,
    pub whitelist: Option<bool>,
    pub forbid_unknown: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    pub sample_interval_ms: Option<u64>,
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if let Some(ms) = self.sample_interval_ms {
            validate_sample_interval_ms(ms)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_sample_interval_ms(ms: u64) -> Result<()> {
    if !(100..=300_000).contains(&ms) {
        return Err(BootwireError::Configuration(
            "metrics.sample_interval_ms must be between 100 and 300000".into(),
        ));
    }
    Ok(())
}
