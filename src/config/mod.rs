pub mod types;

use std::path::{Path, PathBuf};

use crate::error::{Result, StayError};
use types::Config;

pub const CONFIG_ENV: &str = "STAYSYNC_CONFIG";

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        StayError::Config(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.pms.enabled && config.pms.client_id.trim().is_empty() {
        return Err(StayError::Config(
            "pms.enabled is true but pms.client_id is empty".into(),
        ));
    }
    if config.pricing.quote_ttl_hours <= 0 {
        return Err(StayError::Config(
            "pricing.quote_ttl_hours must be positive".into(),
        ));
    }
    let pricing = &config.pricing;
    let stay_bps = pricing.weekly_discount_bps.max(pricing.monthly_discount_bps);
    if u64::from(stay_bps) + u64::from(pricing.promo_discount_bps) > 10_000 {
        return Err(StayError::Config(format!(
            "stay discount ({stay_bps} bps) plus promo_discount_bps ({}) exceeds 10000 bps",
            pricing.promo_discount_bps
        )));
    }
    if config.webhooks.max_attempts == 0 {
        return Err(StayError::Config(
            "webhooks.max_attempts must be at least 1".into(),
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for property in &config.properties {
        if property.id.trim().is_empty() {
            return Err(StayError::Config("properties[].id must not be empty".into()));
        }
        if !seen.insert(property.id.as_str()) {
            return Err(StayError::Config(format!(
                "property '{}' is listed twice",
                property.id
            )));
        }
        if property.max_guests == 0 {
            return Err(StayError::Config(format!(
                "property '{}' must allow at least one guest",
                property.id
            )));
        }
    }
    Ok(())
}

/// `$STAYSYNC_CONFIG`, else `config.yaml` in the working directory, else
/// next to the binary.
pub fn find_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }

    let candidates = [PathBuf::from("config.yaml"), exe_dir().join("config.yaml")];
    for path in &candidates {
        if path.exists() {
            return path.clone();
        }
    }
    candidates[0].clone()
}

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn load_config_missing_file_returns_defaults() {
        let config = load_config(Path::new("/tmp/nonexistent_staysync_config_12345.yaml")).unwrap();
        assert_eq!(config.pricing.tax_bps, 1700);
        assert_eq!(config.database.url, "sqlite://staysync.db");
    }

    #[test]
    fn load_config_valid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            "pms:\n  enabled: true\n  client_id: abc\n  max_retries: 5\npricing:\n  service_fee_bps: 1000\ncache:\n  max_entries: 200"
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert!(config.pms.enabled);
        assert_eq!(config.pms.max_retries, 5);
        assert_eq!(config.pricing.service_fee_bps, 1000);
        assert_eq!(config.cache.max_entries, 200);
    }

    #[test]
    fn load_config_partial_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "intelligence:\n  flex_days: 7").unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.intelligence.flex_days, 7);
        assert_eq!(config.intelligence.window_days, 90);
        assert_eq!(config.pricing.weekly_discount_bps, 1000);
        assert_eq!(config.webhooks.max_attempts, 3);
    }

    #[test]
    fn load_config_empty_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp).unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.cache.max_entries, 500);
        assert!((config.pms.rate_limit_per_second - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn enabled_pms_requires_client_id() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "pms:\n  enabled: true").unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn discounts_above_the_whole_price_are_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            "pricing:\n  monthly_discount_bps: 9000\n  promo_discount_bps: 1500"
        )
        .unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("exceeds 10000 bps"), "got {err}");

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "pricing:\n  promo_discount_bps: 4294967295").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn discounts_adding_up_to_the_whole_price_are_allowed() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            "pricing:\n  monthly_discount_bps: 9000\n  promo_discount_bps: 1000"
        )
        .unwrap();
        assert!(load_config(tmp.path()).is_ok());
    }

    const SEED: &str = "properties:
  - id: villa-1
    organization_id: org1
    slug: sea-villa
    name: Sea Villa
    base_price: 75000
    currency: ILS
    cleaning_fee: 25000
    min_nights: 2
    max_nights: null
    max_guests: 4
    external_listing_id: L-1
";

    #[test]
    fn load_config_property_seeds() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "{SEED}").unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.properties.len(), 1);
        let villa = &config.properties[0];
        assert_eq!(villa.base_price.minor(), 75_000);
        assert!(villa.is_linked());
    }

    #[test]
    fn duplicate_property_seed_is_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let twice = format!("{SEED}{}", SEED.trim_start_matches("properties:\n"));
        write!(tmp, "{twice}").unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn load_config_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "{{{{invalid yaml: [[[").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }
}
