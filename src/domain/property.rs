use serde::{Deserialize, Serialize};

use super::money::Money;

/// Read-only view of a listed property, owned by property management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub organization_id: String,
    pub slug: String,
    pub name: String,
    pub base_price: Money,
    pub currency: String,
    pub cleaning_fee: Money,
    pub min_nights: u32,
    pub max_nights: Option<u32>,
    pub max_guests: u32,
    /// Listing id in the external PMS. When set, the PMS is the source of
    /// truth for rates and availability.
    pub external_listing_id: Option<String>,
}

impl Property {
    pub fn is_linked(&self) -> bool {
        self.external_listing_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: String,
    pub organization_id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

/// Guest details supplied by a booking request or a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GuestProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl GuestProfile {
    /// Emails are matched case-insensitively within an organization.
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_external_listing_is_not_linked() {
        let mut property = crate::test_helpers::make_property("p1");
        assert!(!property.is_linked());
        property.external_listing_id = Some("  ".into());
        assert!(!property.is_linked());
        property.external_listing_id = Some("L-1".into());
        assert!(property.is_linked());
    }

    #[test]
    fn guest_email_normalized() {
        let guest = GuestProfile {
            name: "Dana".into(),
            email: "  Dana@Example.COM ".into(),
            phone: None,
        };
        assert_eq!(guest.normalized_email(), "dana@example.com");
    }
}
