use serde::Serialize;

use crate::models::{Appointment, PaymentMethod};

/// Completed visits needed for one free service.
pub const VISITS_PER_REWARD: usize = 10;

/// Loyalty card for one phone number, derived from the appointment history.
///
/// Never stored: build it from the current list every time it is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoyaltyStatus {
    pub completed: usize,
    pub redemptions_used: usize,
    /// Stamps on the current card, always in `0..VISITS_PER_REWARD`.
    pub progress: usize,
    /// Free services earned and not yet redeemed.
    pub available: usize,
    pub remaining_to_reward: usize,
}

impl LoyaltyStatus {
    pub fn for_phone(appointments: &[Appointment], phone: &str) -> Self {
        let mine = appointments.iter().filter(|app| app.phone == phone);

        let (completed, redemptions_used) = mine.fold((0, 0), |(done, redeemed), app| {
            (
                done + usize::from(app.completed),
                redeemed + usize::from(app.payment_method == PaymentMethod::LoyaltyRedemption),
            )
        });

        let progress = completed % VISITS_PER_REWARD;
        // Redemptions can outnumber earned rewards if the admin deletes
        // completed visits afterwards.
        let available = (completed / VISITS_PER_REWARD).saturating_sub(redemptions_used);

        Self {
            completed,
            redemptions_used,
            progress,
            available,
            remaining_to_reward: VISITS_PER_REWARD - progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Price, ServiceKind};
    use chrono::{NaiveDate, Utc};

    fn visit(phone: &str, n: u32, completed: bool, payment: PaymentMethod) -> Appointment {
        Appointment {
            id: format!("{}-{}", phone, n),
            customer_name: "Cliente".into(),
            phone: phone.into(),
            address: None,
            date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + chrono::Days::new(n.into()),
            time: "10:00".into(),
            service: ServiceKind::Haircut,
            price: Price::fixed(5000),
            payment_method: payment,
            created_at: Utc::now(),
            completed,
        }
    }

    fn history(phone: &str, completed: u32) -> Vec<Appointment> {
        (0..completed)
            .map(|n| visit(phone, n, true, PaymentMethod::Cash))
            .collect()
    }

    #[test]
    fn test_empty_history() {
        let status = LoyaltyStatus::for_phone(&[], "11999990000");
        assert_eq!(status.completed, 0);
        assert_eq!(status.progress, 0);
        assert_eq!(status.available, 0);
        assert_eq!(status.remaining_to_reward, 10);
    }

    #[test]
    fn test_progress_wraps_every_ten() {
        for completed in [0u32, 3, 9, 10, 11, 19, 20, 27] {
            let apps = history("p", completed);
            let status = LoyaltyStatus::for_phone(&apps, "p");
            assert_eq!(status.progress, completed as usize % 10);
            assert!(status.progress < VISITS_PER_REWARD);
        }
    }

    #[test]
    fn test_nine_visits_not_yet_rewarded() {
        let apps = history("p", 9);
        let status = LoyaltyStatus::for_phone(&apps, "p");
        assert_eq!(status.available, 0);
        assert_eq!(status.remaining_to_reward, 1);
    }

    #[test]
    fn test_ten_visits_earn_one_reward() {
        let apps = history("p", 10);
        assert_eq!(LoyaltyStatus::for_phone(&apps, "p").available, 1);
    }

    #[test]
    fn test_pending_visits_do_not_count() {
        let mut apps = history("p", 9);
        apps.push(visit("p", 99, false, PaymentMethod::Cash));
        let status = LoyaltyStatus::for_phone(&apps, "p");
        assert_eq!(status.completed, 9);
        assert_eq!(status.available, 0);
    }

    #[test]
    fn test_redemption_consumes_reward() {
        let mut apps = history("p", 10);
        apps.push(visit("p", 50, false, PaymentMethod::LoyaltyRedemption));
        let status = LoyaltyStatus::for_phone(&apps, "p");
        assert_eq!(status.redemptions_used, 1);
        assert_eq!(status.available, 0);
    }

    #[test]
    fn test_other_phones_ignored() {
        let mut apps = history("p", 10);
        apps.extend(history("q", 4));
        assert_eq!(LoyaltyStatus::for_phone(&apps, "q").completed, 4);
        assert_eq!(LoyaltyStatus::for_phone(&apps, "q").available, 0);
    }

    #[test]
    fn test_available_never_negative() {
        let apps = vec![
            visit("p", 1, false, PaymentMethod::LoyaltyRedemption),
            visit("p", 2, false, PaymentMethod::LoyaltyRedemption),
        ];
        assert_eq!(LoyaltyStatus::for_phone(&apps, "p").available, 0);
    }
}
