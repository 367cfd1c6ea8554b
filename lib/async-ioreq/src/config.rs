use serde::Deserialize;
use std::io::ErrorKind;
use std::io::Result;

/// Engine settings.
///
/// ```toml
/// name = "vd1"
/// io_buf_max = 8388608
/// registry_shards = 16
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Prefix of every log line.
    pub name: String,
    /// Arena capacity in bytes.
    pub io_buf_max: usize,
    pub registry_shards: usize,
    /// Requests older than this are logged when they finish.
    pub slow_request_secs: u64,
    /// Failed requests beyond this count are not logged.
    pub max_logged_errors: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "vd0".to_owned(),
            io_buf_max: 5 * 1024 * 1024,
            registry_shards: 8,
            slow_request_secs: 25,
            max_logged_errors: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config = toml::from_str::<EngineConfig>(config_str).map_err(|err| {
            log::error!("{}:{} error parsing engine config: {:#?}.", file!(), line!(), err);
            std::io::Error::from(ErrorKind::InvalidData)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path).inspect_err(|err| {
            log::error!("{}:{} error reading {}: {err}.", file!(), line!(), path.display());
        })?;
        Self::from_toml(config_str.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.io_buf_max == 0 || self.registry_shards == 0 || self.name.is_empty() {
            log::error!("bad engine config: {self:?}");
            return Err(ErrorKind::InvalidInput.into());
        }
        Ok(())
    }
}
