use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::calendar::{RateDay, RateSourceKind};
use super::dates::{DATE_FORMAT, NightRange};
use super::property::Property;
use super::reservation::PartySize;
use crate::error::StayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Every source that should have been consulted answered.
    High,
    /// The external PMS could not be consulted; only the internal ledger
    /// was checked.
    Low,
}

/// Why a stay cannot be sold. Reasons are itemized so callers can render
/// each one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnavailableReason {
    DatesUnavailable {
        source: RateSourceKind,
        dates: Vec<NaiveDate>,
    },
    GuestLimitExceeded {
        requested: u32,
        max: u32,
    },
    MinimumNightsNotMet {
        requested: u32,
        required: u32,
    },
    MaximumNightsExceeded {
        requested: u32,
        max: u32,
    },
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatesUnavailable { source, dates } => {
                let list: Vec<String> = dates
                    .iter()
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .collect();
                write!(f, "Unavailable in {source}: {}", list.join(", "))
            }
            Self::GuestLimitExceeded { requested, max } => {
                write!(f, "{requested} guests requested, property sleeps {max}")
            }
            Self::MinimumNightsNotMet {
                requested,
                required,
            } => write!(f, "Minimum stay is {required} nights, {requested} requested"),
            Self::MaximumNightsExceeded { requested, max } => {
                write!(f, "Maximum stay is {max} nights, {requested} requested")
            }
        }
    }
}

/// What the external PMS reported for the requested nights.
#[derive(Debug, Clone)]
pub enum ExternalView<'a> {
    /// Property is not linked to a PMS.
    NotLinked,
    /// Linked, but the PMS could not be consulted.
    Failed { reason: String },
    /// Linked and answered.
    Rates(&'a [RateDay]),
}

/// What the internal ledger holds for the requested nights.
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalView<'a> {
    /// Booked or blocked nights, and nights of live reservations.
    pub occupied: &'a [NaiveDate],
    /// Largest per-date minimum-stay override in the range.
    pub min_nights_override: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub property_id: String,
    pub range: NightRange,
    pub available: bool,
    pub reasons: Vec<UnavailableReason>,
    /// Union of every night any source reported unavailable, ascending.
    pub blocked_dates: Vec<NaiveDate>,
    pub min_nights_required: u32,
    pub confidence: Confidence,
    /// Which source supplied rates and min-stay rules.
    pub source: RateSourceKind,
    /// Set when resolution fell back to internal-only data.
    pub degraded_reason: Option<String>,
}

impl AvailabilityResult {
    /// The caller-facing error for an unavailable result, most specific
    /// first: blocked dates, then capacity, then stay length.
    pub fn to_error(&self) -> Option<StayError> {
        if self.available {
            return None;
        }
        if !self.blocked_dates.is_empty() {
            return Some(StayError::NotAvailable {
                blocked_dates: self.blocked_dates.clone(),
            });
        }
        self.reasons
            .iter()
            .filter_map(|reason| match *reason {
                UnavailableReason::DatesUnavailable { .. } => None,
                UnavailableReason::GuestLimitExceeded { requested, max } => {
                    Some((0, StayError::GuestLimitExceeded { requested, max }))
                }
                UnavailableReason::MinimumNightsNotMet {
                    requested,
                    required,
                } => Some((
                    1,
                    StayError::MinimumNightsNotMet {
                        requested,
                        required,
                    },
                )),
                UnavailableReason::MaximumNightsExceeded { requested, max } => {
                    Some((2, StayError::MaximumNightsExceeded { requested, max }))
                }
            })
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, err)| err)
    }
}

/// Combine the external view and the internal ledger into one decision.
///
/// External availability can only make a stay less available: an internally
/// occupied night always blocks, whatever the PMS says. An external answer
/// that does not cover every night is treated like a failed lookup.
pub fn evaluate(
    property: &Property,
    range: &NightRange,
    party: &PartySize,
    external: &ExternalView<'_>,
    internal: &InternalView<'_>,
) -> AvailabilityResult {
    let nights = range.nights();
    let mut reasons = Vec::new();
    let mut blocked: BTreeSet<NaiveDate> = BTreeSet::new();

    let mut confidence = Confidence::High;
    let mut source = RateSourceKind::Internal;
    let mut degraded_reason = None;
    let mut external_min: Option<u32> = None;

    match external {
        ExternalView::NotLinked => {}
        ExternalView::Failed { reason } => {
            confidence = Confidence::Low;
            degraded_reason = Some(reason.clone());
        }
        ExternalView::Rates(rates) => match covering_rates(range, rates) {
            Some(covered) => {
                source = RateSourceKind::External;
                let unavailable: Vec<NaiveDate> = covered
                    .iter()
                    .filter(|d| !d.available)
                    .map(|d| d.date)
                    .collect();
                if !unavailable.is_empty() {
                    blocked.extend(unavailable.iter().copied());
                    reasons.push(UnavailableReason::DatesUnavailable {
                        source: RateSourceKind::External,
                        dates: unavailable,
                    });
                }
                external_min = covered.iter().filter_map(|d| d.min_nights).max();
            }
            None => {
                confidence = Confidence::Low;
                degraded_reason = Some(format!(
                    "external calendar did not cover all {nights} nights"
                ));
            }
        },
    }

    let occupied: Vec<NaiveDate> = internal
        .occupied
        .iter()
        .copied()
        .filter(|d| range.contains(*d))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !occupied.is_empty() {
        blocked.extend(occupied.iter().copied());
        reasons.push(UnavailableReason::DatesUnavailable {
            source: RateSourceKind::Internal,
            dates: occupied,
        });
    }

    let occupancy = party.occupancy();
    if occupancy > property.max_guests {
        reasons.push(UnavailableReason::GuestLimitExceeded {
            requested: occupancy,
            max: property.max_guests,
        });
    }

    // External min-stay wins when present, then per-date overrides, then
    // the property default.
    let min_nights_required = external_min
        .or(internal.min_nights_override)
        .unwrap_or(property.min_nights)
        .max(1);
    if nights < min_nights_required {
        reasons.push(UnavailableReason::MinimumNightsNotMet {
            requested: nights,
            required: min_nights_required,
        });
    }
    if let Some(max) = property.max_nights
        && nights > max
    {
        reasons.push(UnavailableReason::MaximumNightsExceeded {
            requested: nights,
            max,
        });
    }

    AvailabilityResult {
        property_id: property.id.clone(),
        range: *range,
        available: reasons.is_empty(),
        reasons,
        blocked_dates: blocked.into_iter().collect(),
        min_nights_required,
        confidence,
        source,
        degraded_reason,
    }
}

/// The rates for exactly the nights of `range`, in order, or `None` if any
/// night is missing.
pub fn covering_rates<'a>(range: &NightRange, rates: &'a [RateDay]) -> Option<Vec<&'a RateDay>> {
    range
        .iter_nights()
        .map(|night| rates.iter().find(|r| r.date == night))
        .collect()
}

impl fmt::Display for AvailabilityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Availability for property {}", self.property_id)?;
        writeln!(f, "Stay: {}", self.range)?;
        writeln!(
            f,
            "Status: {}",
            if self.available { "AVAILABLE" } else { "NOT AVAILABLE" }
        )?;
        writeln!(f, "Minimum stay: {} nights", self.min_nights_required)?;
        writeln!(
            f,
            "Rates from: {} (confidence: {})",
            self.source,
            match self.confidence {
                Confidence::High => "high",
                Confidence::Low => "low",
            }
        )?;
        if let Some(ref reason) = self.degraded_reason {
            writeln!(f, "Note: external PMS not consulted ({reason})")?;
        }
        if !self.reasons.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Reasons")?;
            for reason in &self.reasons {
                writeln!(f, "- {reason}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dates::parse_date;
    use crate::domain::money::Money;
    use crate::test_helpers::make_property;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn occupied(dates: &[NaiveDate]) -> InternalView<'_> {
        InternalView {
            occupied: dates,
            min_nights_override: None,
        }
    }

    fn rates(range: &NightRange, available: bool, min_nights: Option<u32>) -> Vec<RateDay> {
        range
            .iter_nights()
            .map(|date| RateDay {
                date,
                price: Money::from_minor(75_000),
                available,
                min_nights,
            })
            .collect()
    }

    #[test]
    fn internal_booking_vetoes_external_available() {
        let property = make_property("p1");
        let range = NightRange::parse("2026-05-04", "2026-05-07").unwrap();
        let ext = rates(&range, true, None);
        let result = evaluate(
            &property,
            &range,
            &PartySize::new(2, 0),
            &ExternalView::Rates(&ext),
            &occupied(&[d("2026-05-05")]),
        );
        assert!(!result.available);
        assert_eq!(result.blocked_dates, vec![d("2026-05-05")]);
        assert_eq!(result.source, RateSourceKind::External);
        assert!(matches!(
            result.to_error(),
            Some(StayError::NotAvailable { .. })
        ));
    }

    #[test]
    fn one_night_below_property_minimum() {
        let property = make_property("p1");
        let range = NightRange::parse("2026-05-04", "2026-05-05").unwrap();
        let result = evaluate(
            &property,
            &range,
            &PartySize::new(2, 0),
            &ExternalView::NotLinked,
            &InternalView::default(),
        );
        assert!(!result.available);
        assert_eq!(result.min_nights_required, 2);
        assert!(matches!(
            result.to_error(),
            Some(StayError::MinimumNightsNotMet {
                requested: 1,
                required: 2
            })
        ));
    }

    #[test]
    fn external_min_stay_overrides_property_default() {
        let property = make_property("p1");
        let range = NightRange::parse("2026-05-04", "2026-05-07").unwrap();
        let ext = rates(&range, true, Some(1));
        let result = evaluate(
            &property,
            &NightRange::parse("2026-05-04", "2026-05-05").unwrap(),
            &PartySize::new(1, 0),
            &ExternalView::Rates(&ext),
            &InternalView::default(),
        );
        assert!(result.available);
        assert_eq!(result.min_nights_required, 1);

        let strict = rates(&range, true, Some(5));
        let result = evaluate(
            &property,
            &range,
            &PartySize::new(1, 0),
            &ExternalView::Rates(&strict),
            &InternalView::default(),
        );
        assert!(!result.available);
        assert_eq!(result.min_nights_required, 5);
    }

    #[test]
    fn internal_override_beats_property_default() {
        let property = make_property("p1");
        let range = NightRange::parse("2026-05-04", "2026-05-07").unwrap();
        let result = evaluate(
            &property,
            &range,
            &PartySize::new(2, 0),
            &ExternalView::NotLinked,
            &InternalView {
                occupied: &[],
                min_nights_override: Some(4),
            },
        );
        assert_eq!(result.min_nights_required, 4);
        assert!(matches!(
            result.to_error(),
            Some(StayError::MinimumNightsNotMet {
                requested: 3,
                required: 4
            })
        ));
    }

    #[test]
    fn failed_external_degrades_to_low_confidence() {
        let property = make_property("p1");
        let range = NightRange::parse("2026-05-04", "2026-05-07").unwrap();
        let result = evaluate(
            &property,
            &range,
            &PartySize::new(2, 0),
            &ExternalView::Failed {
                reason: "timeout".into(),
            },
            &InternalView::default(),
        );
        assert!(result.available);
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.source, RateSourceKind::Internal);
        assert!(result.to_string().contains("timeout"));
    }

    #[test]
    fn partial_external_answer_is_not_trusted() {
        let property = make_property("p1");
        let range = NightRange::parse("2026-05-04", "2026-05-07").unwrap();
        let mut ext = rates(&range, false, None);
        ext.pop();
        let result = evaluate(
            &property,
            &range,
            &PartySize::new(2, 0),
            &ExternalView::Rates(&ext),
            &InternalView::default(),
        );
        assert!(result.available);
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn blocked_dates_take_priority_over_capacity() {
        let property = make_property("p1");
        let range = NightRange::parse("2026-05-04", "2026-05-05").unwrap();
        let result = evaluate(
            &property,
            &range,
            &PartySize::new(10, 0),
            &ExternalView::NotLinked,
            &occupied(&[d("2026-05-04")]),
        );
        assert_eq!(result.reasons.len(), 3);
        assert!(matches!(
            result.to_error(),
            Some(StayError::NotAvailable { .. })
        ));
    }

    #[test]
    fn capacity_checked_before_stay_length() {
        let property = make_property("p1");
        let range = NightRange::parse("2026-05-04", "2026-05-05").unwrap();
        let result = evaluate(
            &property,
            &range,
            &PartySize::new(10, 0),
            &ExternalView::NotLinked,
            &InternalView::default(),
        );
        assert!(matches!(
            result.to_error(),
            Some(StayError::GuestLimitExceeded {
                requested: 10,
                max: 4
            })
        ));
    }

    #[test]
    fn max_nights_enforced() {
        let mut property = make_property("p1");
        property.max_nights = Some(3);
        let range = NightRange::parse("2026-05-04", "2026-05-09").unwrap();
        let result = evaluate(
            &property,
            &range,
            &PartySize::new(2, 0),
            &ExternalView::NotLinked,
            &InternalView::default(),
        );
        assert!(matches!(
            result.to_error(),
            Some(StayError::MaximumNightsExceeded { requested: 5, max: 3 })
        ));
    }

    #[test]
    fn checkout_day_occupancy_does_not_block() {
        let property = make_property("p1");
        let range = NightRange::parse("2026-05-04", "2026-05-06").unwrap();
        let result = evaluate(
            &property,
            &range,
            &PartySize::new(2, 0),
            &ExternalView::NotLinked,
            &occupied(&[d("2026-05-06")]),
        );
        assert!(result.available);
    }
}
