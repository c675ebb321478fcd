// Admin subscription updates and block reconciliation
// After an admin changes a blocked trainer, `reconcile_block` decides whether
// the block lifts. First matching rule wins.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::subscription::config::{ADMIN_BLOCK_REASON, MAX_TRIAL_DAYS, UNLIMITED_CLIENTS};
use crate::subscription::evaluator;
use crate::subscription::types::{
    AccountError, BlockState, PlanType, SubscriptionStatus, TrainerAccount,
};

/// Admin PATCH of a trainer's subscription fields
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SubscriptionUpdate {
    pub subscription_status: Option<SubscriptionStatus>,
    pub plan_type: Option<PlanType>,
    pub client_limit: Option<i64>,
    /// Days added to the current trial end (or to today if none)
    pub extend_trial_days: Option<i64>,
    /// Replaces the trial end date outright
    pub trial_end_date: Option<NaiveDate>,
    /// Explicit block (`true`) or unblock (`false`)
    pub account_blocked: Option<bool>,
    pub block_reason: Option<String>,
}

impl SubscriptionUpdate {
    pub fn extends_trial(&self) -> bool {
        self.extend_trial_days.is_some() || self.trial_end_date.is_some()
    }

    fn validate(&self) -> Result<(), AccountError> {
        if let Some(days) = self.extend_trial_days {
            if days < 0 {
                return Err(AccountError::InvalidUpdate(format!(
                    "trial extension must not be negative ({days})"
                )));
            }
        }
        if let Some(limit) = self.client_limit {
            if limit < UNLIMITED_CLIENTS {
                return Err(AccountError::InvalidUpdate(format!(
                    "client limit must be -1 or greater ({limit})"
                )));
            }
        }
        Ok(())
    }
}

/// `base` plus `days`, rejecting negative or out-of-range results
pub fn add_trial_days(base: NaiveDate, days: i64) -> Result<NaiveDate, AccountError> {
    if !(0..=MAX_TRIAL_DAYS).contains(&days) {
        return Err(AccountError::InvalidUpdate(format!(
            "trial days must be between 0 and {MAX_TRIAL_DAYS} ({days})"
        )));
    }

    base.checked_add_days(Days::new(days as u64)).ok_or_else(|| {
        AccountError::InvalidUpdate(format!("trial end out of range ({base} + {days} days)"))
    })
}

/// Which rule lifted the block
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum UnblockReason {
    UpgradedToActive,
    TrialExtended,
    StatusOverride,
    NoLongerExpired,
    AdminUnblock,
}

/// What an update did to the block fields
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum BlockChange {
    Unchanged,
    Blocked,
    Unblocked(UnblockReason),
}

/// Should a blocked account be unblocked, given its post-update state?
pub fn reconcile_block(
    account: &TrainerAccount,
    update: &SubscriptionUpdate,
    today: NaiveDate,
) -> Option<UnblockReason> {
    if update.subscription_status == Some(SubscriptionStatus::Active) {
        return Some(UnblockReason::UpgradedToActive);
    }

    if update.extends_trial() {
        if let Some(end) = account.trial_end_date {
            if end >= today {
                return Some(UnblockReason::TrialExtended);
            }
        }
    }

    if let Some(status) = update.subscription_status {
        if !status.is_trial_bound() {
            return Some(UnblockReason::StatusOverride);
        }
    }

    if !evaluator::should_auto_block(account, today) {
        return Some(UnblockReason::NoLongerExpired);
    }

    None
}

/// Applies an admin update in place and reconciles the block fields.
pub fn apply_update(
    account: &mut TrainerAccount,
    update: &SubscriptionUpdate,
    now: DateTime<Utc>,
) -> Result<BlockChange, AccountError> {
    update.validate()?;
    let today = now.date_naive();

    // Resolve the new trial end before touching the account
    let mut trial_end = account.trial_end_date;
    if let Some(days) = update.extend_trial_days {
        trial_end = Some(add_trial_days(trial_end.unwrap_or(today), days)?);
    }
    if let Some(end) = update.trial_end_date {
        trial_end = Some(end);
    }

    if let Some(status) = update.subscription_status {
        account.subscription_status = Some(status);
    }
    if let Some(plan) = update.plan_type {
        account.plan_type = Some(plan);
    }
    if let Some(limit) = update.client_limit {
        account.client_limit = Some(limit);
    }
    account.trial_end_date = trial_end;

    // Explicit admin block/unblock beats reconciliation
    match update.account_blocked {
        Some(true) => {
            if account.account_blocked {
                return Ok(BlockChange::Unchanged);
            }
            let reason = update
                .block_reason
                .clone()
                .unwrap_or_else(|| ADMIN_BLOCK_REASON.to_string());
            account.apply_block_state(BlockState::blocked(reason, now));
            Ok(BlockChange::Blocked)
        }
        Some(false) => {
            if !account.account_blocked {
                return Ok(BlockChange::Unchanged);
            }
            account.apply_block_state(BlockState::unblocked());
            Ok(BlockChange::Unblocked(UnblockReason::AdminUnblock))
        }
        None if account.account_blocked => match reconcile_block(account, update, today) {
            Some(reason) => {
                account.apply_block_state(BlockState::unblocked());
                Ok(BlockChange::Unblocked(reason))
            }
            None => Ok(BlockChange::Unchanged),
        },
        None => Ok(BlockChange::Unchanged),
    }
}
