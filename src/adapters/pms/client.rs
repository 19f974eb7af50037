use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::adapters::pms::auth::TokenManager;
use crate::adapters::pms::parser;
use crate::adapters::pms::rate_limiter::RateLimiter;
use crate::config::types::PmsConfig;
use crate::domain::calendar::RateDay;
use crate::domain::dates::{DATE_FORMAT, NightRange};
use crate::error::{Result, StayError};
use crate::ports::pms_client::{OutboundReservation, PmsClient};

pub struct HttpPmsClient {
    http: Client,
    base_url: Url,
    tokens: TokenManager,
    rate_limiter: RateLimiter,
    config: PmsConfig,
}

impl HttpPmsClient {
    pub fn new(config: PmsConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("staysync/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(StayError::Config(format!(
                "pms.base_url '{}' is not a base URL",
                config.base_url
            )));
        }
        let tokens = TokenManager::new(
            http.clone(),
            config.auth_url.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.token_refresh_margin_secs,
        );
        let rate_limiter = RateLimiter::new(config.rate_limit_per_second);
        Ok(Self {
            http,
            base_url,
            tokens,
            rate_limiter,
            config,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send with retries: transport errors, 429 and 5xx back off linearly;
    /// a 401 refreshes the token once and retries once.
    ///
    /// Non-idempotent requests are only replayed when the PMS refused them
    /// outright (429, 503). A dropped connection or another 5xx may have been
    /// applied already, so those fail straight away.
    async fn execute(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
        idempotency_key: Option<&str>,
    ) -> Result<String> {
        let replayable = method.is_idempotent();
        let mut attempt: u32 = 0;
        let mut refreshed = false;
        let mut last_error: Option<StayError> = None;

        loop {
            if attempt > self.config.max_retries {
                break;
            }
            let after_refresh = matches!(
                last_error,
                Some(StayError::UpstreamRejected { status: 401, .. })
            );
            if attempt > 0 && !after_refresh {
                let delay =
                    Duration::from_millis(self.config.retry_backoff_ms * u64::from(attempt));
                debug!(attempt, delay_ms = delay.as_millis(), %url, "Retrying PMS request");
                tokio::time::sleep(delay).await;
            }
            self.rate_limiter.wait().await;

            let token = self.tokens.token().await?;
            let mut request = self.http.request(method.clone(), url.clone()).bearer_auth(token);
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(key) = idempotency_key {
                request = request.header(IDEMPOTENCY_KEY, key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.text().await.map_err(StayError::Http);
                    }
                    if status == StatusCode::UNAUTHORIZED {
                        if refreshed {
                            return Err(StayError::UpstreamRejected {
                                status: 401,
                                reason: "unauthorized after token refresh".into(),
                            });
                        }
                        warn!(%url, "PMS returned 401, refreshing token");
                        self.tokens.invalidate().await;
                        refreshed = true;
                        last_error = Some(StayError::UpstreamRejected {
                            status: 401,
                            reason: "unauthorized".into(),
                        });
                        continue;
                    }
                    let refused = status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE;
                    if status.is_server_error() && !refused && !replayable {
                        warn!(%status, %method, %url, "PMS request failed, not replaying");
                        return Err(StayError::transient(format!("PMS returned {status}")));
                    }
                    if refused || status.is_server_error() {
                        warn!(%status, attempt, %url, "PMS request failed, will retry");
                        last_error = Some(StayError::transient(format!("PMS returned {status}")));
                        attempt += 1;
                        continue;
                    }
                    let text = response.text().await.unwrap_or_default();
                    if status == StatusCode::NOT_FOUND {
                        return Err(StayError::not_found("PMS resource", url.path()));
                    }
                    return Err(StayError::UpstreamRejected {
                        status: status.as_u16(),
                        reason: truncate(&text, 200),
                    });
                }
                Err(e) if !replayable => {
                    warn!(error = %e, %method, %url, "PMS request failed, not replaying");
                    return Err(StayError::transient(format!("PMS unreachable: {e}")));
                }
                Err(e) => {
                    warn!(error = %e, attempt, %url, "PMS request failed");
                    last_error = Some(StayError::Http(e));
                    attempt += 1;
                }
            }
        }

        let last = last_error.unwrap_or_else(|| StayError::transient("all retries exhausted"));
        Err(match last {
            StayError::Http(e) => StayError::transient(format!("PMS unreachable: {e}")),
            other => other,
        })
    }
}

const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

/// JSON body for a PMS create-reservation call.
pub fn reservation_body(reservation: &OutboundReservation) -> Value {
    json!({
        "listingId": reservation.listing_id,
        "checkInDateLocalized": reservation.range.check_in().format(DATE_FORMAT).to_string(),
        "checkOutDateLocalized": reservation.range.check_out().format(DATE_FORMAT).to_string(),
        "status": "confirmed",
        "guest": {
            "fullName": reservation.guest.name,
            "email": reservation.guest.email,
            "phone": reservation.guest.phone,
        },
        "guestsCount": reservation.party.occupancy(),
        "money": {
            "fareAccommodation": reservation.total.to_major(),
            "currency": reservation.currency,
        },
        "source": "direct",
        "notes": { "other": format!("staysync:{}", reservation.reference) },
    })
}

#[async_trait]
impl PmsClient for HttpPmsClient {
    async fn get_calendar(
        &self,
        listing_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RateDay>> {
        let range = NightRange::new(from, to)?;
        let mut url = self.endpoint(&["listings", listing_id, "calendar"]);
        url.query_pairs_mut()
            .append_pair("startDate", &from.format(DATE_FORMAT).to_string())
            .append_pair("endDate", &range.last_night().format(DATE_FORMAT).to_string());

        let body = self.execute(Method::GET, &url, None, None).await?;
        let days = parser::parse_calendar(&body, from, to)?;
        debug!(listing_id, days = days.len(), "Fetched PMS calendar");
        Ok(days)
    }

    async fn create_reservation(&self, reservation: &OutboundReservation) -> Result<String> {
        let url = self.endpoint(&["reservations"]);
        let body = reservation_body(reservation);
        let key = format!("staysync-{}", reservation.reference);
        let response = self
            .execute(Method::POST, &url, Some(&body), Some(&key))
            .await?;
        parser::parse_created_reservation(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use crate::domain::property::GuestProfile;
    use crate::domain::reservation::PartySize;

    #[test]
    fn endpoint_keeps_base_path_and_escapes_ids() {
        let client = HttpPmsClient::new(PmsConfig {
            base_url: "https://pms.example.com/v1/".into(),
            ..PmsConfig::default()
        })
        .unwrap();
        let url = client.endpoint(&["listings", "a/b", "calendar"]);
        assert_eq!(url.as_str(), "https://pms.example.com/v1/listings/a%2Fb/calendar");
    }

    #[test]
    fn rejects_non_base_url() {
        let result = HttpPmsClient::new(PmsConfig {
            base_url: "mailto:ops@example.com".into(),
            ..PmsConfig::default()
        });
        assert!(matches!(result, Err(StayError::Config(_))));
    }

    #[test]
    fn reservation_body_uses_major_units() {
        let body = reservation_body(&OutboundReservation {
            listing_id: "L-1".into(),
            range: NightRange::parse("2026-05-04", "2026-05-06").unwrap(),
            guest: GuestProfile {
                name: "Dana".into(),
                email: "dana@example.com".into(),
                phone: None,
            },
            party: PartySize::new(2, 1),
            total: Money::from_minor(184_350),
            currency: "ILS".into(),
            reference: "res-1".into(),
        });
        assert_eq!(body["money"]["fareAccommodation"], 1843.5);
        assert_eq!(body["guestsCount"], 3);
        assert_eq!(body["checkOutDateLocalized"], "2026-05-06");
        assert_eq!(body["notes"]["other"], "staysync:res-1");
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("שלום עולם", 4), "שלום...");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
