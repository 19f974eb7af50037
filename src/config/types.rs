use serde::{Deserialize, Serialize};

use crate::domain::property::Property;
use crate::domain::quote::PricingPolicy;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pms: PmsConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub availability: AvailabilityConfig,
    #[serde(default)]
    pub intelligence: IntelligenceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
    /// Properties upserted into the directory at startup.
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// External property-management system connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PmsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_pms_base_url")]
    pub base_url: String,
    #[serde(default = "default_pms_auth_url")]
    pub auth_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: f64,
    #[serde(default = "default_token_refresh_margin_secs")]
    pub token_refresh_margin_secs: u64,
}

impl Default for PmsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_pms_base_url(),
            auth_url: default_pms_auth_url(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout_secs: default_timeout(),
            max_retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            rate_limit_per_second: default_rate_limit(),
            token_refresh_margin_secs: default_token_refresh_margin_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
    #[serde(default = "default_weekend_markup_bps")]
    pub weekend_markup_bps: u32,
    #[serde(default = "default_weekly_min_nights")]
    pub weekly_min_nights: u32,
    #[serde(default = "default_weekly_discount_bps")]
    pub weekly_discount_bps: u32,
    #[serde(default = "default_monthly_min_nights")]
    pub monthly_min_nights: u32,
    #[serde(default = "default_monthly_discount_bps")]
    pub monthly_discount_bps: u32,
    #[serde(default = "default_promo_discount_bps")]
    pub promo_discount_bps: u32,
    #[serde(default = "default_service_fee_bps")]
    pub service_fee_bps: u32,
    #[serde(default = "default_tax_bps")]
    pub tax_bps: u32,
    #[serde(default = "default_quote_ttl_hours")]
    pub quote_ttl_hours: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            weekend_markup_bps: default_weekend_markup_bps(),
            weekly_min_nights: default_weekly_min_nights(),
            weekly_discount_bps: default_weekly_discount_bps(),
            monthly_min_nights: default_monthly_min_nights(),
            monthly_discount_bps: default_monthly_discount_bps(),
            promo_discount_bps: default_promo_discount_bps(),
            service_fee_bps: default_service_fee_bps(),
            tax_bps: default_tax_bps(),
            quote_ttl_hours: default_quote_ttl_hours(),
        }
    }
}

impl PricingConfig {
    pub fn policy(&self) -> PricingPolicy {
        PricingPolicy {
            weekend_markup_bps: self.weekend_markup_bps,
            weekly_min_nights: self.weekly_min_nights,
            weekly_discount_bps: self.weekly_discount_bps,
            monthly_min_nights: self.monthly_min_nights,
            monthly_discount_bps: self.monthly_discount_bps,
            promo_discount_bps: self.promo_discount_bps,
            service_fee_bps: self.service_fee_bps,
            tax_bps: self.tax_bps,
            quote_ttl_hours: self.quote_ttl_hours,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AvailabilityConfig {
    /// Overall budget for the external PMS lookup during resolution. Keep it
    /// below the PMS client's own retry budget.
    #[serde(default = "default_external_timeout_ms")]
    pub external_timeout_ms: u64,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            external_timeout_ms: default_external_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntelligenceConfig {
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "default_flex_days")]
    pub flex_days: u32,
    #[serde(default = "default_max_alternatives")]
    pub max_alternatives: usize,
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            flex_days: default_flex_days(),
            max_alternatives: default_max_alternatives(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_intelligence_ttl")]
    pub intelligence_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            intelligence_ttl_secs: default_intelligence_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_webhook_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_webhook_attempts(),
            retry_backoff_ms: default_webhook_backoff_ms(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://staysync.db".into()
}
fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_pms_base_url() -> String {
    "https://open-api.guesty.com/v1".into()
}
fn default_pms_auth_url() -> String {
    "https://open-api.guesty.com/oauth2/token".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_rate_limit() -> f64 {
    5.0
}
fn default_token_refresh_margin_secs() -> u64 {
    60
}
fn default_weekend_markup_bps() -> u32 {
    2000
}
fn default_weekly_min_nights() -> u32 {
    7
}
fn default_weekly_discount_bps() -> u32 {
    1000
}
fn default_monthly_min_nights() -> u32 {
    28
}
fn default_monthly_discount_bps() -> u32 {
    2000
}
fn default_promo_discount_bps() -> u32 {
    500
}
fn default_service_fee_bps() -> u32 {
    1200
}
fn default_tax_bps() -> u32 {
    1700
}
fn default_quote_ttl_hours() -> i64 {
    24
}
fn default_external_timeout_ms() -> u64 {
    8000
}
fn default_window_days() -> u32 {
    90
}
fn default_flex_days() -> u32 {
    3
}
fn default_max_alternatives() -> usize {
    6
}
fn default_max_entries() -> usize {
    500
}
fn default_intelligence_ttl() -> u64 {
    900
}
fn default_webhook_attempts() -> u32 {
    3
}
fn default_webhook_backoff_ms() -> u64 {
    200
}
