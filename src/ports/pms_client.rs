use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::calendar::RateDay;
use crate::domain::dates::NightRange;
use crate::domain::money::Money;
use crate::domain::property::GuestProfile;
use crate::domain::reservation::PartySize;
use crate::error::Result;

/// A direct booking pushed to the PMS so other channels stop selling its
/// nights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundReservation {
    pub listing_id: String,
    pub range: NightRange,
    pub guest: GuestProfile,
    pub party: PartySize,
    pub total: Money,
    pub currency: String,
    /// Internal reservation id.
    pub reference: String,
}

#[async_trait]
pub trait PmsClient: Send + Sync {
    /// Day rates for `[from, to)` of a listing.
    async fn get_calendar(
        &self,
        listing_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RateDay>>;

    /// Returns the PMS's reservation id.
    async fn create_reservation(&self, reservation: &OutboundReservation) -> Result<String>;
}
