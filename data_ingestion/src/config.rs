use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;

/// Prefix of the environment variables that override file settings,
/// e.g. `VOLMODEL__DATA__CSV_PATH`.
pub const ENV_PREFIX: &str = "VOLMODEL";

#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceConfig {
    pub csv_path: PathBuf,
}

impl DataSourceConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        load_section(path, "data")
    }
}

/// Reads one table of a TOML file, with `VOLMODEL__<TABLE>__<KEY>` overrides applied.
pub fn load_section<T>(path: &str, section: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    let cfg = Config::builder()
        .add_source(File::new(path, FileFormat::Toml))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    cfg.get::<T>(section)
}
