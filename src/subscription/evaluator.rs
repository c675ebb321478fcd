// Pure lifecycle queries over an account snapshot
// Nothing here writes. A missing trial end date fails closed.

use chrono::NaiveDate;

use crate::subscription::config::{plan_client_limit, UNLIMITED_CLIENTS};
use crate::subscription::types::{SubscriptionStatus, TrainerAccount};

/// Trial status with an end date that has not passed yet
pub fn is_trial_active(account: &TrainerAccount, today: NaiveDate) -> bool {
    if account.subscription_status != Some(SubscriptionStatus::Trial) {
        return false;
    }

    match account.trial_end_date {
        Some(end) => today <= end,
        None => false,
    }
}

/// Access through either a live trial or a paid plan.
///
/// A `trial` status past its end date is not active even if nobody moved it
/// to `expired` yet.
pub fn is_subscription_active(account: &TrainerAccount, today: NaiveDate) -> bool {
    match account.subscription_status {
        Some(SubscriptionStatus::Active) => true,
        Some(SubscriptionStatus::Trial) => is_trial_active(account, today),
        _ => false,
    }
}

/// Whole days left in the trial, never negative
pub fn days_until_trial_end(account: &TrainerAccount, today: NaiveDate) -> Option<i64> {
    account
        .trial_end_date
        .map(|end| (end - today).num_days().max(0))
}

/// Trainer whose trial lapsed without an admin moving them off trial/expired
pub fn should_auto_block(account: &TrainerAccount, today: NaiveDate) -> bool {
    // Check user type first - only trainers carry trials
    if !account.is_trainer() {
        return false;
    }

    // Active/cancelled/suspended were set by an admin; leave them alone
    match account.subscription_status {
        Some(status) if status.is_trial_bound() => {}
        _ => return false,
    }

    match account.trial_end_date {
        Some(end) => today > end,
        None => false,
    }
}

/// Explicit limit wins, else the plan default. Zero counts as unset.
pub fn resolve_client_limit(account: &TrainerAccount) -> i64 {
    match account.client_limit {
        Some(limit) if limit != 0 => limit,
        _ => plan_client_limit(account.plan_type),
    }
}

pub fn can_add_client(account: &TrainerAccount, current_count: usize) -> bool {
    let limit = resolve_client_limit(account);
    if limit == UNLIMITED_CLIENTS {
        return true;
    }
    (current_count as i64) < limit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::types::{PlanType, UserType};
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn trainer(status: Option<SubscriptionStatus>, end_offset: Option<i64>) -> TrainerAccount {
        let mut account =
            TrainerAccount::new("coach", "coach@example.com", UserType::Trainer, Utc::now());
        account.subscription_status = status;
        account.trial_end_date = end_offset.map(|days| today() + Duration::days(days));
        account
    }

    fn any_status() -> impl Strategy<Value = SubscriptionStatus> {
        prop_oneof![
            Just(SubscriptionStatus::Trial),
            Just(SubscriptionStatus::Active),
            Just(SubscriptionStatus::Expired),
            Just(SubscriptionStatus::Cancelled),
            Just(SubscriptionStatus::Suspended),
        ]
    }

    #[test]
    fn test_trial_active_through_end_date() {
        assert!(is_trial_active(&trainer(Some(SubscriptionStatus::Trial), Some(0)), today()));
        assert!(is_trial_active(&trainer(Some(SubscriptionStatus::Trial), Some(5)), today()));
        assert!(!is_trial_active(&trainer(Some(SubscriptionStatus::Trial), Some(-1)), today()));
    }

    #[test]
    fn test_trial_without_end_date_fails_closed() {
        let account = trainer(Some(SubscriptionStatus::Trial), None);
        assert!(!is_trial_active(&account, today()));
        assert!(!is_subscription_active(&account, today()));
        assert!(!should_auto_block(&account, today()));
        assert_eq!(days_until_trial_end(&account, today()), None);
    }

    #[test]
    fn test_lapsed_trial_is_not_active_and_not_yet_blocked() {
        let account = trainer(Some(SubscriptionStatus::Trial), Some(-3));
        assert!(!is_subscription_active(&account, today()));
        assert!(!account.account_blocked);
        assert!(should_auto_block(&account, today()));
    }

    #[test]
    fn test_admin_statuses_exempt_from_auto_block() {
        let overrides = [
            SubscriptionStatus::Active,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Suspended,
        ];
        for status in overrides {
            assert!(!should_auto_block(&trainer(Some(status), Some(-30)), today()));
        }

        let cancelled = trainer(Some(SubscriptionStatus::Cancelled), Some(10));
        assert!(!is_subscription_active(&cancelled, today()));
    }

    #[test]
    fn test_non_trainers_never_auto_blocked() {
        let mut account = trainer(Some(SubscriptionStatus::Expired), Some(-30));
        account.user_type = UserType::Client;
        assert!(!should_auto_block(&account, today()));
    }

    #[test]
    fn test_signup_then_day_fifteen() {
        let signup = today();
        let mut account = trainer(Some(SubscriptionStatus::Trial), None);
        account.trial_start_date = Some(signup);
        account.trial_end_date = Some(signup + Duration::days(14));

        let day_fifteen = signup + Duration::days(15);
        assert!(!is_trial_active(&account, day_fifteen));
        assert!(!is_subscription_active(&account, day_fifteen));
        assert!(should_auto_block(&account, day_fifteen));
    }

    #[test]
    fn test_client_limit_resolution() {
        let mut account = trainer(Some(SubscriptionStatus::Active), None);
        account.plan_type = Some(PlanType::Professional);
        assert_eq!(resolve_client_limit(&account), 50);

        account.client_limit = Some(0);
        assert_eq!(resolve_client_limit(&account), 50);

        account.client_limit = Some(12);
        assert_eq!(resolve_client_limit(&account), 12);

        account.client_limit = Some(-1);
        assert!(can_add_client(&account, 10_000));

        account.client_limit = None;
        account.plan_type = None;
        assert_eq!(resolve_client_limit(&account), 5);
        assert!(can_add_client(&account, 4));
        assert!(!can_add_client(&account, 5));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn test_active_status_never_auto_blocks(offset in proptest::option::of(-3650i64..3650)) {
            let account = trainer(Some(SubscriptionStatus::Active), offset);
            prop_assert!(!should_auto_block(&account, today()));
        }

        #[test]
        fn test_lapsed_trial_bound_trainer_auto_blocks(
            offset in -3650i64..0,
            expired in any::<bool>(),
        ) {
            let status = if expired {
                SubscriptionStatus::Expired
            } else {
                SubscriptionStatus::Trial
            };
            let account = trainer(Some(status), Some(offset));
            prop_assert!(should_auto_block(&account, today()));
        }

        #[test]
        fn test_days_until_trial_end_never_negative(
            status in any_status(),
            offset in -3650i64..3650,
        ) {
            let account = trainer(Some(status), Some(offset));
            let days = days_until_trial_end(&account, today());
            prop_assert!(days.is_some());
            prop_assert!(days.unwrap_or(-1) >= 0);
        }
    }
}
