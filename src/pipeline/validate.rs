// src/pipeline/validate.rs

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load `config.toml` from the data directory and validate it.
///
/// A missing file is not an error: the defaults are validated instead.
pub fn run_validate(data_dir: &Path) -> Result<Config> {
    let path = data_dir.join("config.toml");
    let config = if path.exists() {
        Config::load(&path)?
    } else {
        log::warn!("{} not found, validating defaults", path.display());
        Config::default()
    };

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {e}");
        return Err(e);
    }

    log::info!("✓ Config OK");
    log::info!(
        "  AWS department: {}",
        config.normalize.aws_department.as_deref().unwrap_or("-")
    );
    log::info!(
        "  Similarity threshold: {}, deadline tolerance: {}",
        config.dedup.similarity_threshold,
        config
            .dedup
            .deadline_tolerance_days
            .map_or_else(|| "exact".to_string(), |d| format!("{d} days"))
    );
    if config.filter.enabled {
        log::info!(
            "  BOAMP filter: departments {}, max age {} days",
            config.filter.target_departments.join(", "),
            config.filter.max_age_days
        );
    } else {
        log::info!("  BOAMP filter: disabled");
    }

    Ok(config)
}
