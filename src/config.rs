//! Tunables for this crate's own runtime behavior.
//!
//! Scope is deliberately narrow: the zone list, TSIG keys, and the rest
//! of a real server's configuration belong to the surrounding daemon,
//! which is out of scope for this crate (spec.md's Non-goals).

use serde::Deserialize;

use crate::error::Result;

#[derive(Deserialize, Clone)]
pub struct Config {
    /// Directory spool files are created in. `None` means next to the
    /// zone file being frozen, matching `ixfr_create_start`'s
    /// `<zfile>.spoolzone.<pid>` naming.
    #[serde(default)]
    pub spool_dir: Option<String>,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            spool_dir: None,
            log: LogConfig::default(),
        }
    }
}

impl TryFrom<&[u8]> for Config {
    type Error = crate::error::Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        Ok(serde_yaml::from_slice(value)?)
    }
}

#[derive(Deserialize, Clone, Copy)]
pub struct LogConfig {
    #[serde(deserialize_with = "de_level_filter", default = "default_level")]
    pub level: log::LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: log::LevelFilter::Info,
        }
    }
}

fn default_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

fn de_level_filter<'de, D>(deserializer: D) -> std::result::Result<log::LevelFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: LevelFilter = Deserialize::deserialize(deserializer)?;
    match s {
        LevelFilter::Off => Ok(log::LevelFilter::Off),
        LevelFilter::Error => Ok(log::LevelFilter::Error),
        LevelFilter::Warn => Ok(log::LevelFilter::Warn),
        LevelFilter::Info => Ok(log::LevelFilter::Info),
        LevelFilter::Debug => Ok(log::LevelFilter::Debug),
        LevelFilter::Trace => Ok(log::LevelFilter::Trace),
    }
}

#[derive(Deserialize)]
enum LevelFilter {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
