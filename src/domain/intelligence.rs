#![allow(clippy::cast_precision_loss)] // Day counts are small enough for f64

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::calendar::{RateCalendar, RateDay, RateSourceKind};
use super::dates::{DATE_FORMAT, NightRange, add_days, is_weekend_night};
use super::money::Money;

const SCARCITY_HORIZON_DAYS: usize = 30;
const WEEKEND_HORIZON_DAYS: usize = 60;
const TREND_THRESHOLD_PCT: f64 = 10.0;
const WEEKEND_PREMIUM_THRESHOLD_PCT: f64 = 5.0;
const MIN_STAY_PREVALENCE_PCT: f64 = 50.0;
const SCARCE_WEEKENDS_PCT: f64 = 50.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PriceLevel {
    Low,
    Medium,
    High,
    Peak,
}

impl PriceLevel {
    pub fn from_percentile(percentile: u32) -> Self {
        match percentile {
            0..=25 => Self::Low,
            26..=50 => Self::Medium,
            51..=75 => Self::High,
            _ => Self::Peak,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Peak => "peak",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPrice {
    pub date: NaiveDate,
    pub price: Money,
    pub available: bool,
    pub percentile: u32,
    pub level: PriceLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Pressure {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Pressure {
    /// Lower availability means higher booking pressure.
    pub fn from_availability(pct: f64) -> Self {
        if pct >= 70.0 {
            Self::Low
        } else if pct >= 50.0 {
            Self::Medium
        } else if pct >= 30.0 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scarcity {
    pub horizon_days: u32,
    /// Nights of the horizon covered by the window.
    pub horizon_nights: u32,
    pub available_nights: u32,
    pub availability_pct: f64,
    pub weekend_nights: u32,
    pub booked_weekend_nights: u32,
    pub pressure: Pressure,
    pub urgency: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OptionAvailability {
    Full,
    Partial,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    BestValue,
    Cheapest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeOption {
    pub range: NightRange,
    /// Days relative to the requested check-in; never zero.
    pub shift_days: i64,
    /// Sum of nightly prices, before fees.
    pub total: Money,
    /// Requested total minus this total; negative when more expensive.
    pub savings: Money,
    pub availability: OptionAvailability,
    pub unavailable_nights: u32,
    pub best_value: bool,
    pub cheapest: bool,
    /// The single badge shown, first match wins: best value, then cheapest.
    pub badge: Option<Badge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    BestAlternative,
    PriceTrend,
    WeekendPremium,
    MinimumStay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    /// Display order only; 1 is shown first.
    pub priority: u8,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedStay {
    pub range: NightRange,
    pub total: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceReport {
    pub property_id: String,
    pub currency: String,
    pub source: RateSourceKind,
    pub window_start: Option<NaiveDate>,
    pub window_days: u32,
    pub average_price: Option<Money>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub days: Vec<DayPrice>,
    pub scarcity: Scarcity,
    pub requested: Option<RequestedStay>,
    pub alternatives: Vec<AlternativeOption>,
    pub insights: Vec<Insight>,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Display impls
// ---------------------------------------------------------------------------

impl fmt::Display for IntelligenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cur = &self.currency;
        writeln!(f, "# Price intelligence: property {}", self.property_id)?;
        if let (Some(first), Some(last)) = (self.days.first(), self.days.last()) {
            writeln!(
                f,
                "Window: {} to {} ({} days, rates from {})",
                first.date.format(DATE_FORMAT),
                last.date.format(DATE_FORMAT),
                self.window_days,
                self.source
            )?;
        }
        if let Some(avg) = self.average_price {
            writeln!(f, "Average nightly price: {cur} {avg}")?;
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            writeln!(f, "Price range: {cur} {min} - {max}")?;
        }

        let s = &self.scarcity;
        writeln!(f, "\n## Scarcity")?;
        writeln!(
            f,
            "Next {} days: {}/{} nights available ({:.0}%), pressure {}",
            s.horizon_days,
            s.available_nights,
            s.horizon_nights,
            s.availability_pct,
            s.pressure.as_str()
        )?;
        writeln!(
            f,
            "Weekend nights booked: {}/{}",
            s.booked_weekend_nights, s.weekend_nights
        )?;
        if let Some(ref msg) = s.urgency {
            writeln!(f, "{msg}")?;
        }

        if let Some(ref req) = self.requested {
            writeln!(f, "\n## Requested stay")?;
            match req.total {
                Some(total) => writeln!(f, "{}: {cur} {total} in nightly rates", req.range)?,
                None => writeln!(f, "{}: not priced in this window", req.range)?,
            }
        }

        if !self.alternatives.is_empty() {
            writeln!(f, "\n## Alternative dates")?;
            writeln!(
                f,
                "{:<26} {:>6} {:>12} {:>12} {:>12}  {}",
                "Dates", "Shift", "Total", "Savings", "Status", "Badge"
            )?;
            for alt in &self.alternatives {
                let badge = match alt.badge {
                    Some(Badge::BestValue) => "best value",
                    Some(Badge::Cheapest) => "cheapest",
                    None => "",
                };
                let status = match alt.availability {
                    OptionAvailability::Full => "available",
                    OptionAvailability::Partial => "partial",
                    OptionAvailability::Unavailable => "unavailable",
                };
                writeln!(
                    f,
                    "{:<26} {:>+6} {:>12} {:>12} {:>12}  {}",
                    format!(
                        "{} to {}",
                        alt.range.check_in().format(DATE_FORMAT),
                        alt.range.check_out().format(DATE_FORMAT)
                    ),
                    alt.shift_days,
                    alt.total.to_string(),
                    alt.savings.to_string(),
                    status,
                    badge
                )?;
            }
        }

        if !self.insights.is_empty() {
            writeln!(f, "\n## Insights")?;
            for insight in &self.insights {
                writeln!(f, "- {}", insight.message)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pure computation functions
// ---------------------------------------------------------------------------

/// Share of `sorted` prices strictly below `price`, as 0..=100.
pub fn percentile_of(price: Money, sorted: &[Money]) -> u32 {
    if sorted.is_empty() {
        return 0;
    }
    let below = sorted.partition_point(|p| *p < price);
    u32::try_from(below * 100 / sorted.len()).unwrap_or(100)
}

pub fn price_levels(days: &[RateDay]) -> Vec<DayPrice> {
    let mut sorted: Vec<Money> = days.iter().map(|d| d.price).collect();
    sorted.sort_unstable();
    days.iter()
        .map(|d| {
            let percentile = percentile_of(d.price, &sorted);
            DayPrice {
                date: d.date,
                price: d.price,
                available: d.available,
                percentile,
                level: PriceLevel::from_percentile(percentile),
            }
        })
        .collect()
}

/// Availability density over the first 30 days and booked weekend nights
/// over the first 60 days of the window.
#[allow(clippy::cast_possible_truncation)]
pub fn compute_scarcity(days: &[RateDay]) -> Scarcity {
    let near: Vec<&RateDay> = days.iter().take(SCARCITY_HORIZON_DAYS).collect();
    let available_nights = near.iter().filter(|d| d.available).count();
    let availability_pct = if near.is_empty() {
        100.0
    } else {
        available_nights as f64 / near.len() as f64 * 100.0
    };

    let weekends: Vec<&RateDay> = days
        .iter()
        .take(WEEKEND_HORIZON_DAYS)
        .filter(|d| is_weekend_night(d.date))
        .collect();
    let booked_weekends = weekends.iter().filter(|d| !d.available).count();
    let weekends_scarce = !weekends.is_empty()
        && booked_weekends as f64 / weekends.len() as f64 * 100.0 >= SCARCE_WEEKENDS_PCT;

    let pressure = Pressure::from_availability(availability_pct);
    let urgency = match pressure {
        Pressure::VeryHigh => Some(format!(
            "Only {available_nights} nights left in the next {SCARCITY_HORIZON_DAYS} days, book soon"
        )),
        Pressure::High => Some(format!(
            "Filling up: {availability_pct:.0}% of the next {SCARCITY_HORIZON_DAYS} days still available"
        )),
        _ if weekends_scarce => Some(format!(
            "Weekends are going fast: {booked_weekends} of {} weekend nights already booked",
            weekends.len()
        )),
        _ => None,
    };

    Scarcity {
        horizon_days: SCARCITY_HORIZON_DAYS as u32,
        horizon_nights: near.len() as u32,
        available_nights: available_nights as u32,
        availability_pct,
        weekend_nights: weekends.len() as u32,
        booked_weekend_nights: booked_weekends as u32,
        pressure,
        urgency,
    }
}

/// Sum of nightly prices for `range`, with the count of unavailable nights.
/// `None` if any night has no rate in `calendar` or the sum overflows.
fn price_range(calendar: &RateCalendar, range: &NightRange) -> Option<(Money, u32)> {
    let mut total = Money::ZERO;
    let mut unavailable = 0;
    for night in range.iter_nights() {
        let day = calendar.get(night)?;
        total = total.checked_add(day.price)?;
        if !day.available {
            unavailable += 1;
        }
    }
    Some((total, unavailable))
}

/// Every same-length stay shifted by up to `flex_days` either way, ranked
/// by savings against the requested stay.
///
/// The most-saving fully available option is `best_value` (only when it
/// actually saves money); the lowest-total fully available option is
/// `cheapest`. Ties rank the smaller shift first.
pub fn search_alternatives(
    calendar: &RateCalendar,
    requested: &NightRange,
    flex_days: u32,
    max_results: usize,
) -> Vec<AlternativeOption> {
    let Some((requested_total, _)) = price_range(calendar, requested) else {
        return Vec::new();
    };
    let flex = i64::from(flex_days);

    let mut options: Vec<AlternativeOption> = (-flex..=flex)
        .filter(|shift| *shift != 0)
        .filter_map(|shift| {
            let range = requested.shifted(shift)?;
            let (total, unavailable) = price_range(calendar, &range)?;
            let availability = if unavailable == 0 {
                OptionAvailability::Full
            } else if unavailable < range.nights() {
                OptionAvailability::Partial
            } else {
                OptionAvailability::Unavailable
            };
            Some(AlternativeOption {
                range,
                shift_days: shift,
                total,
                savings: requested_total - total,
                availability,
                unavailable_nights: unavailable,
                best_value: false,
                cheapest: false,
                badge: None,
            })
        })
        .collect();

    options.sort_by(|a, b| {
        b.savings
            .cmp(&a.savings)
            .then(a.shift_days.abs().cmp(&b.shift_days.abs()))
            .then(a.shift_days.cmp(&b.shift_days))
    });

    if let Some(best) = options
        .iter_mut()
        .find(|o| o.availability == OptionAvailability::Full)
        && best.savings > Money::ZERO
    {
        best.best_value = true;
    }
    let cheapest_idx = options
        .iter()
        .enumerate()
        .filter(|(_, o)| o.availability == OptionAvailability::Full)
        .min_by_key(|(i, o)| (o.total, *i))
        .map(|(i, _)| i);
    if let Some(i) = cheapest_idx {
        options[i].cheapest = true;
    }
    for option in &mut options {
        option.badge = if option.best_value {
            Some(Badge::BestValue)
        } else if option.cheapest {
            Some(Badge::Cheapest)
        } else {
            None
        };
    }

    options.truncate(max_results);
    options
}

fn average(prices: impl Iterator<Item = Money>) -> Option<Money> {
    let (sum, count) = prices.fold((0i128, 0i128), |(s, c), p| (s + i128::from(p.minor()), c + 1));
    if count == 0 {
        return None;
    }
    // Round half away from zero; the mean of i64 values always fits back
    let mean = (2 * sum + count * sum.signum()) / (2 * count);
    i64::try_from(mean).ok().map(Money::from_minor)
}

fn pct_diff(value: Money, baseline: Money) -> Option<f64> {
    if baseline.is_zero() {
        return None;
    }
    Some((value.minor() - baseline.minor()) as f64 / baseline.minor() as f64 * 100.0)
}

pub fn generate_insights(
    calendar: &RateCalendar,
    alternatives: &[AlternativeOption],
) -> Vec<Insight> {
    let days = &calendar.days;
    let cur = &calendar.currency;
    let mut insights = Vec::new();

    if let Some(best) = alternatives.iter().find(|o| o.best_value) {
        let direction = if best.shift_days < 0 { "earlier" } else { "later" };
        insights.push(Insight {
            kind: InsightKind::BestAlternative,
            priority: 1,
            message: format!(
                "Arriving {} day{} {direction} ({}) saves {cur} {}",
                best.shift_days.abs(),
                if best.shift_days.abs() == 1 { "" } else { "s" },
                best.range,
                best.savings
            ),
        });
    }

    let window_avg = average(days.iter().map(|d| d.price));
    let near_avg = average(days.iter().take(SCARCITY_HORIZON_DAYS).map(|d| d.price));
    if let (Some(window_avg), Some(near_avg)) = (window_avg, near_avg)
        && days.len() > SCARCITY_HORIZON_DAYS
        && let Some(diff) = pct_diff(near_avg, window_avg)
        && diff.abs() >= TREND_THRESHOLD_PCT
    {
        let direction = if diff > 0.0 { "above" } else { "below" };
        insights.push(Insight {
            kind: InsightKind::PriceTrend,
            priority: 2,
            message: format!(
                "Prices over the next {SCARCITY_HORIZON_DAYS} days average {cur} {near_avg}, {:.0}% {direction} the {}-day average",
                diff.abs(),
                days.len()
            ),
        });
    }

    let weekend_avg = average(
        days.iter()
            .filter(|d| is_weekend_night(d.date))
            .map(|d| d.price),
    );
    let weekday_avg = average(
        days.iter()
            .filter(|d| !is_weekend_night(d.date))
            .map(|d| d.price),
    );
    if let (Some(weekend), Some(weekday)) = (weekend_avg, weekday_avg)
        && let Some(premium) = pct_diff(weekend, weekday)
        && premium >= WEEKEND_PREMIUM_THRESHOLD_PCT
    {
        insights.push(Insight {
            kind: InsightKind::WeekendPremium,
            priority: 3,
            message: format!(
                "Friday and Saturday nights cost {premium:.0}% more than weekdays ({cur} {weekend} vs {weekday})"
            ),
        });
    }

    if !days.is_empty() {
        let with_min_stay = days
            .iter()
            .filter(|d| d.min_nights.is_some_and(|n| n > 1))
            .count();
        let share = with_min_stay as f64 / days.len() as f64 * 100.0;
        if share >= MIN_STAY_PREVALENCE_PCT {
            let longest = days.iter().filter_map(|d| d.min_nights).max().unwrap_or(1);
            insights.push(Insight {
                kind: InsightKind::MinimumStay,
                priority: 4,
                message: format!(
                    "{share:.0}% of dates require a multi-night stay (up to {longest} nights)"
                ),
            });
        }
    }

    insights.sort_by_key(|i| i.priority);
    insights
}

/// Parameters for [`build_report`].
///
/// `calendar` may run past the window when alternatives around `requested`
/// need later rates; only `window_days` from `window_start` feed the
/// statistics.
pub struct ReportRequest<'a> {
    pub calendar: &'a RateCalendar,
    pub window_start: NaiveDate,
    pub window_days: u32,
    pub requested: Option<NightRange>,
    pub flex_days: u32,
    pub max_alternatives: usize,
    pub generated_at: DateTime<Utc>,
}

pub fn build_report(req: &ReportRequest<'_>) -> IntelligenceReport {
    let calendar = req.calendar;
    let window_end = add_days(req.window_start, u64::from(req.window_days));
    let window = RateCalendar {
        property_id: calendar.property_id.clone(),
        currency: calendar.currency.clone(),
        source: calendar.source,
        days: calendar
            .days
            .iter()
            .filter(|d| d.date >= req.window_start && d.date < window_end)
            .cloned()
            .collect(),
    };
    let days = &window.days;

    let alternatives = req
        .requested
        .map(|range| search_alternatives(calendar, &range, req.flex_days, req.max_alternatives))
        .unwrap_or_default();
    let insights = generate_insights(&window, &alternatives);

    IntelligenceReport {
        property_id: calendar.property_id.clone(),
        currency: calendar.currency.clone(),
        source: calendar.source,
        window_start: Some(req.window_start),
        window_days: req.window_days,
        average_price: average(days.iter().map(|d| d.price)),
        min_price: days.iter().map(|d| d.price).min(),
        max_price: days.iter().map(|d| d.price).max(),
        days: price_levels(days),
        scarcity: compute_scarcity(days),
        requested: req.requested.map(|range| RequestedStay {
            range,
            total: price_range(calendar, &range).map(|(total, _)| total),
        }),
        alternatives,
        insights,
        generated_at: req.generated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dates::{add_days, parse_date};
    use pretty_assertions::assert_eq;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    // 2026-05-04 is a Monday
    fn flat_calendar(days: u64, price: i64) -> RateCalendar {
        let start = d("2026-05-04");
        RateCalendar {
            property_id: "p1".into(),
            currency: "ILS".into(),
            source: RateSourceKind::Internal,
            days: (0..days)
                .map(|i| RateDay {
                    date: add_days(start, i),
                    price: Money::from_minor(price),
                    available: true,
                    min_nights: None,
                })
                .collect(),
        }
    }

    #[test]
    fn percentile_counts_strictly_lower_prices() {
        let sorted: Vec<Money> = [100, 200, 200, 300].map(Money::from_minor).to_vec();
        assert_eq!(percentile_of(Money::from_minor(100), &sorted), 0);
        assert_eq!(percentile_of(Money::from_minor(200), &sorted), 25);
        assert_eq!(percentile_of(Money::from_minor(300), &sorted), 75);
        assert_eq!(percentile_of(Money::from_minor(300), &[]), 0);
    }

    #[test]
    fn level_buckets() {
        assert_eq!(PriceLevel::from_percentile(0), PriceLevel::Low);
        assert_eq!(PriceLevel::from_percentile(25), PriceLevel::Low);
        assert_eq!(PriceLevel::from_percentile(26), PriceLevel::Medium);
        assert_eq!(PriceLevel::from_percentile(50), PriceLevel::Medium);
        assert_eq!(PriceLevel::from_percentile(75), PriceLevel::High);
        assert_eq!(PriceLevel::from_percentile(76), PriceLevel::Peak);
    }

    #[test]
    fn pressure_thresholds() {
        assert_eq!(Pressure::from_availability(100.0), Pressure::Low);
        assert_eq!(Pressure::from_availability(70.0), Pressure::Low);
        assert_eq!(Pressure::from_availability(69.9), Pressure::Medium);
        assert_eq!(Pressure::from_availability(50.0), Pressure::Medium);
        assert_eq!(Pressure::from_availability(30.0), Pressure::High);
        assert_eq!(Pressure::from_availability(29.0), Pressure::VeryHigh);
    }

    #[test]
    fn scarcity_counts_booked_weekends() {
        let mut cal = flat_calendar(60, 50_000);
        for day in &mut cal.days {
            if is_weekend_night(day.date) {
                day.available = false;
            }
        }
        let s = compute_scarcity(&cal.days);
        assert_eq!(s.weekend_nights, s.booked_weekend_nights);
        assert!(s.weekend_nights > 0);
        assert!(s.availability_pct > 70.0);
        assert_eq!(s.pressure, Pressure::Low);
        assert!(s.urgency.unwrap().contains("Weekends"));
    }

    #[test]
    fn scarcity_with_mostly_booked_month() {
        let mut cal = flat_calendar(30, 50_000);
        for day in cal.days.iter_mut().skip(5) {
            day.available = false;
        }
        let s = compute_scarcity(&cal.days);
        assert_eq!(s.available_nights, 5);
        assert_eq!(s.pressure, Pressure::VeryHigh);
        assert!(s.urgency.is_some());
    }

    #[test]
    fn cheaper_week_is_cheapest_and_best_value() {
        let mut cal = flat_calendar(40, 100_000);
        // Nights 2026-05-14 .. 2026-05-20 are discounted
        for day in &mut cal.days {
            if day.date >= d("2026-05-14") && day.date < d("2026-05-21") {
                day.price = Money::from_minor(60_000);
            }
        }
        let requested = NightRange::parse("2026-05-11", "2026-05-14").unwrap();
        let options = search_alternatives(&cal, &requested, 3, 6);

        assert_eq!(options.len(), 6);
        let top = &options[0];
        assert_eq!(top.range.check_in(), d("2026-05-14"));
        assert_eq!(top.shift_days, 3);
        assert_eq!(top.savings, Money::from_minor(120_000));
        assert!(top.cheapest);
        assert!(top.best_value);
        assert_eq!(top.badge, Some(Badge::BestValue));
        assert_eq!(options.iter().filter(|o| o.cheapest).count(), 1);
        assert_eq!(options.iter().filter(|o| o.best_value).count(), 1);
    }

    #[test]
    fn unavailable_cheap_week_is_not_badged() {
        let mut cal = flat_calendar(40, 100_000);
        for day in &mut cal.days {
            if day.date >= d("2026-05-14") && day.date < d("2026-05-21") {
                day.price = Money::from_minor(60_000);
                day.available = false;
            }
        }
        let requested = NightRange::parse("2026-05-11", "2026-05-14").unwrap();
        let options = search_alternatives(&cal, &requested, 3, 10);
        let top = &options[0];
        assert_eq!(top.availability, OptionAvailability::Unavailable);
        assert_eq!(top.badge, None);
        let cheapest = options.iter().find(|o| o.cheapest).unwrap();
        assert_eq!(cheapest.availability, OptionAvailability::Full);
        // No full option saves money, so none is best value
        assert!(options.iter().all(|o| !o.best_value));
        assert_eq!(cheapest.badge, Some(Badge::Cheapest));
    }

    #[test]
    fn shifts_without_data_are_skipped() {
        let cal = flat_calendar(10, 100_000);
        // Starts on the first day of the window, so earlier shifts have no data
        let requested = NightRange::parse("2026-05-04", "2026-05-06").unwrap();
        let options = search_alternatives(&cal, &requested, 3, 10);
        assert!(options.iter().all(|o| o.shift_days > 0));
        assert_eq!(options.len(), 3);
    }

    #[test]
    fn unpriced_request_has_no_alternatives() {
        let cal = flat_calendar(10, 100_000);
        let requested = NightRange::parse("2026-07-01", "2026-07-03").unwrap();
        assert!(search_alternatives(&cal, &requested, 3, 10).is_empty());
    }

    #[test]
    fn weekend_premium_and_min_stay_insights() {
        let mut cal = flat_calendar(90, 50_000);
        for day in &mut cal.days {
            if is_weekend_night(day.date) {
                day.price = Money::from_minor(60_000);
            }
            day.min_nights = Some(3);
        }
        let insights = generate_insights(&cal, &[]);
        let kinds: Vec<InsightKind> = insights.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![InsightKind::WeekendPremium, InsightKind::MinimumStay]
        );
        assert!(insights[0].message.contains("20%"));
    }

    #[test]
    fn rising_prices_produce_trend_insight() {
        let mut cal = flat_calendar(90, 50_000);
        for day in cal.days.iter_mut().take(30) {
            day.price = Money::from_minor(80_000);
        }
        let insights = generate_insights(&cal, &[]);
        let trend = insights
            .iter()
            .find(|i| i.kind == InsightKind::PriceTrend)
            .unwrap();
        assert!(trend.message.contains("above"));
    }

    #[test]
    fn report_renders_all_sections() {
        let cal = flat_calendar(90, 50_000);
        let report = build_report(&ReportRequest {
            calendar: &cal,
            window_start: d("2026-05-04"),
            window_days: 90,
            requested: Some(NightRange::parse("2026-05-20", "2026-05-23").unwrap()),
            flex_days: 2,
            max_alternatives: 6,
            generated_at: Utc::now(),
        });
        assert_eq!(report.window_days, 90);
        assert_eq!(report.average_price, Some(Money::from_minor(50_000)));
        assert_eq!(report.alternatives.len(), 4);
        assert_eq!(
            report.requested.as_ref().unwrap().total,
            Some(Money::from_minor(150_000))
        );
        let text = report.to_string();
        assert!(text.contains("## Scarcity"));
        assert!(text.contains("## Alternative dates"));
    }

    #[test]
    fn statistics_ignore_rates_fetched_for_late_alternatives() {
        // 30-day window at 500.00, then expensive nights only needed for
        // the shifted alternatives around a stay near day 60
        let mut cal = flat_calendar(65, 50_000);
        for day in cal.days.iter_mut().skip(30) {
            day.price = Money::from_minor(200_000);
            day.available = false;
        }
        let report = build_report(&ReportRequest {
            calendar: &cal,
            window_start: d("2026-05-04"),
            window_days: 30,
            requested: Some(NightRange::parse("2026-07-01", "2026-07-03").unwrap()),
            flex_days: 2,
            max_alternatives: 6,
            generated_at: Utc::now(),
        });
        assert_eq!(report.window_days, 30);
        assert_eq!(report.days.len(), 30);
        assert_eq!(report.max_price, Some(Money::from_minor(50_000)));
        assert_eq!(report.average_price, Some(Money::from_minor(50_000)));
        assert_eq!(report.scarcity.available_nights, 30);
        assert_eq!(
            report.requested.as_ref().unwrap().total,
            Some(Money::from_minor(400_000))
        );
        assert_eq!(report.alternatives.len(), 4);
    }

    #[test]
    fn average_rounds_to_nearest() {
        let avg = average([1, 2].map(Money::from_minor).into_iter()).unwrap();
        assert_eq!(avg.minor(), 2);
        assert!(average(std::iter::empty::<Money>()).is_none());
    }

    #[test]
    fn average_of_huge_prices_does_not_overflow() {
        let huge = Money::from_minor(i64::MAX - 1);
        assert_eq!(average([huge, huge, huge].into_iter()), Some(huge));
    }
}
