//! Slot availability, pricing and revenue over the in-memory collections.
//!
//! Everything here is a pure function of its arguments: callers pass the
//! current appointment list and catalog, nothing is cached.

use chrono::NaiveDate;

use crate::loyalty::LoyaltyStatus;
use crate::models::{Appointment, Price, Service, ServiceKind, SlotView};

/// Bookable time labels, identical for every day (lunch break at 12:00).
pub const BUSINESS_HOURS: [&str; 10] = [
    "09:00", "10:00", "11:00", "13:00", "14:00", "15:00", "16:00", "17:00", "18:00", "19:00",
];

/// Highest price the admin editor accepts (R$ 1.000.000,00).
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PriceParseError {
    #[error("preço vazio")]
    Empty,
    #[error("preço inválido: {0}")]
    Invalid(String),
    #[error("preço acima do limite: {0}")]
    TooLarge(String),
}

pub fn is_business_hour(time: &str) -> bool {
    BUSINESS_HOURS.contains(&time)
}

/// True iff some appointment already holds `time` on `date`.
pub fn is_slot_occupied(appointments: &[Appointment], date: NaiveDate, time: &str) -> bool {
    appointments
        .iter()
        .any(|app| app.date == date && app.time == time)
}

/// Time labels already taken on `date`, in business-hours order.
pub fn occupied_times(appointments: &[Appointment], date: NaiveDate) -> Vec<&'static str> {
    BUSINESS_HOURS
        .iter()
        .copied()
        .filter(|time| is_slot_occupied(appointments, date, time))
        .collect()
}

/// The picker view for one day.
pub fn day_slots(appointments: &[Appointment], date: NaiveDate) -> Vec<SlotView> {
    let taken = occupied_times(appointments, date);
    BUSINESS_HOURS
        .iter()
        .map(|&time| SlotView {
            time,
            occupied: taken.contains(&time),
        })
        .collect()
}

/// The free haircut applies only to the plain haircut service.
pub fn is_redemption(service: ServiceKind, is_loyalty_reward: bool) -> bool {
    is_loyalty_reward && service == ServiceKind::Haircut
}

/// Price the customer pays for `service` right now.
///
/// Falls back to zero when the service is missing from the catalog.
pub fn current_price(catalog: &[Service], service: ServiceKind, is_loyalty_reward: bool) -> Price {
    if is_redemption(service, is_loyalty_reward) {
        return Price::FREE;
    }
    catalog
        .iter()
        .find(|s| s.name == service)
        .map(|s| s.price)
        .unwrap_or(Price::FREE)
}

/// Whether `phone` has an unused free service.
pub fn loyalty_eligible(appointments: &[Appointment], phone: &str) -> bool {
    LoyaltyStatus::for_phone(appointments, phone).available > 0
}

/// Sum of fixed prices over completed appointments, in cents.
pub fn revenue_total(appointments: &[Appointment]) -> i64 {
    appointments
        .iter()
        .filter(|app| app.completed)
        .filter_map(|app| app.price.cents())
        .fold(0i64, i64::saturating_add)
}

/// Parse the admin's free-text price field.
///
/// Anything mentioning "consulta" or "quote" becomes the quoted sentinel;
/// otherwise an optional `R$` prefix is dropped and a comma is accepted as
/// the decimal separator.
pub fn parse_price_input(text: &str) -> Result<Price, PriceParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PriceParseError::Empty);
    }

    let lower = trimmed.to_lowercase();
    if lower.contains("consulta") || lower.contains("quote") {
        return Ok(Price::Quoted);
    }

    let numeric = trimmed
        .trim_start_matches("R$")
        .trim()
        .replacen(',', ".", 1);
    let value: f64 = numeric
        .parse()
        .map_err(|_| PriceParseError::Invalid(trimmed.to_string()))?;

    if !value.is_finite() || value < 0.0 {
        return Err(PriceParseError::Invalid(trimmed.to_string()));
    }

    let cents = (value * 100.0).round();
    if cents > MAX_PRICE_CENTS as f64 {
        return Err(PriceParseError::TooLarge(trimmed.to_string()));
    }
    Ok(Price::fixed(cents as i64))
}
