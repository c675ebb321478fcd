// Per-request access checkpoint for trainer subscriptions
// `evaluate` reports the auto-block write it wants; the manager persists it.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};

use crate::subscription::config::{
    is_exempt_path, ADMIN_BLOCK_REASON, AUTO_BLOCK_REASON, TRIAL_DAYS_LEFT_HEADER,
    TRIAL_WARNING_DAYS, TRIAL_WARNING_HEADER,
};
use crate::subscription::evaluator;
use crate::subscription::types::{BlockState, SubscriptionStatus, TrainerAccount};

/// What the HTTP layer hands the checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointRequest {
    pub path: String,
    pub principal: Option<TrainerAccount>,
}

impl CheckpointRequest {
    pub fn new(path: impl Into<String>, principal: Option<TrainerAccount>) -> Self {
        Self {
            path: path.into(),
            principal,
        }
    }
}

/// Trial is close to ending; surfaced as response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialWarning {
    pub days_left: i64,
}

impl TrialWarning {
    pub fn message(&self) -> String {
        let plural = if self.days_left == 1 { "" } else { "s" };
        format!("Your trial ends in {} day{}", self.days_left, plural)
    }
}

/// Reasons a request is turned away
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AccessDenied {
    #[error("Account blocked: {reason}")]
    AccountBlocked { reason: String },

    #[error("Subscription expired")]
    SubscriptionExpired {
        subscription_status: Option<SubscriptionStatus>,
        trial_end_date: Option<NaiveDate>,
    },
}

impl AccessDenied {
    pub fn status_code(&self) -> u16 {
        match self {
            AccessDenied::AccountBlocked { .. } => 403,
            AccessDenied::SubscriptionExpired { .. } => 402,
        }
    }

    /// JSON error body returned to the client
    pub fn body(&self) -> Value {
        match self {
            AccessDenied::AccountBlocked { reason } => json!({
                "error": "Account blocked",
                "message": reason,
                "block_reason": reason,
                "account_blocked": true,
            }),
            AccessDenied::SubscriptionExpired {
                subscription_status,
                trial_end_date,
            } => json!({
                "error": "Subscription expired",
                "message": "Your trial has ended. Please upgrade to continue using TrainrUp.",
                "subscription_status": subscription_status,
                "trial_end_date": trial_end_date.map(|d| d.to_string()),
                "upgrade_required": true,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointDecision {
    /// Not subject to subscription enforcement
    Bypass,
    Allow { warning: Option<TrialWarning> },
    Deny(AccessDenied),
}

impl CheckpointDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, CheckpointDecision::Deny(_))
    }

    /// Status code to short-circuit with, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CheckpointDecision::Deny(denied) => Some(denied.status_code()),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<Value> {
        match self {
            CheckpointDecision::Deny(denied) => Some(denied.body()),
            _ => None,
        }
    }

    /// Headers to add to the downstream response
    pub fn response_headers(&self) -> Vec<(&'static str, String)> {
        match self {
            CheckpointDecision::Allow { warning: Some(warning) } => vec![
                (TRIAL_WARNING_HEADER, warning.message()),
                (TRIAL_DAYS_LEFT_HEADER, warning.days_left.to_string()),
            ],
            _ => Vec::new(),
        }
    }
}

/// Decision plus the block write it requires, if any
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointOutcome {
    pub decision: CheckpointDecision,
    pub block: Option<BlockState>,
}

impl CheckpointOutcome {
    fn pass(decision: CheckpointDecision) -> Self {
        Self { decision, block: None }
    }
}

/// Block write due for this account, or None when nothing changes.
///
/// Already-blocked accounts yield None so `blocked_at` keeps its first value.
pub fn auto_block(account: &TrainerAccount, now: DateTime<Utc>) -> Option<BlockState> {
    if account.account_blocked {
        return None;
    }
    if !evaluator::should_auto_block(account, now.date_naive()) {
        return None;
    }
    Some(BlockState::blocked(AUTO_BLOCK_REASON, now))
}

pub fn evaluate(request: &CheckpointRequest, now: DateTime<Utc>) -> CheckpointOutcome {
    // Skip if path is exempt
    if is_exempt_path(&request.path) {
        return CheckpointOutcome::pass(CheckpointDecision::Bypass);
    }

    // Skip if not authenticated
    let Some(principal) = request.principal.as_ref() else {
        return CheckpointOutcome::pass(CheckpointDecision::Bypass);
    };

    // Skip for admins, superusers and non-trainers
    if principal.is_privileged() || !principal.is_trainer() {
        return CheckpointOutcome::pass(CheckpointDecision::Bypass);
    }

    let block = auto_block(principal, now);
    let mut account = principal.clone();
    if let Some(state) = block.clone() {
        account.apply_block_state(state);
    }

    CheckpointOutcome {
        decision: decide(&account, now.date_naive()),
        block,
    }
}

fn decide(account: &TrainerAccount, today: NaiveDate) -> CheckpointDecision {
    if account.account_blocked {
        let reason = account
            .block_reason
            .clone()
            .unwrap_or_else(|| ADMIN_BLOCK_REASON.to_string());
        return CheckpointDecision::Deny(AccessDenied::AccountBlocked { reason });
    }

    // Trainers created before trial tracking have no status yet
    let Some(status) = account.subscription_status else {
        return CheckpointDecision::Bypass;
    };

    // Check subscription status
    if !evaluator::is_subscription_active(account, today) {
        return CheckpointDecision::Deny(AccessDenied::SubscriptionExpired {
            subscription_status: account.subscription_status,
            trial_end_date: account.trial_end_date,
        });
    }

    // Warn when the trial is about to end
    if status == SubscriptionStatus::Trial {
        if let Some(days_left) = evaluator::days_until_trial_end(account, today) {
            if days_left <= TRIAL_WARNING_DAYS {
                return CheckpointDecision::Allow {
                    warning: Some(TrialWarning { days_left }),
                };
            }
        }
    }

    CheckpointDecision::Allow { warning: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::types::UserType;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            .and_utc()
    }

    fn trainer(status: SubscriptionStatus, end_offset: i64) -> TrainerAccount {
        let mut account =
            TrainerAccount::new("coach", "coach@example.com", UserType::Trainer, now());
        account.subscription_status = Some(status);
        account.trial_end_date = Some(now().date_naive() + Duration::days(end_offset));
        account
    }

    fn request(principal: TrainerAccount) -> CheckpointRequest {
        CheckpointRequest::new("/api/clients/", Some(principal))
    }

    #[test]
    fn test_exempt_and_anonymous_requests_bypass() {
        let expired = trainer(SubscriptionStatus::Expired, -10);

        let outcome = evaluate(&CheckpointRequest::new("/api/auth/login/", Some(expired)), now());
        assert_eq!(outcome.decision, CheckpointDecision::Bypass);
        assert!(outcome.block.is_none());

        let outcome = evaluate(&CheckpointRequest::new("/api/clients/", None), now());
        assert_eq!(outcome.decision, CheckpointDecision::Bypass);
    }

    #[test]
    fn test_privileged_and_client_users_bypass() {
        let mut admin = trainer(SubscriptionStatus::Expired, -10);
        admin.user_type = UserType::Admin;
        assert_eq!(evaluate(&request(admin), now()).decision, CheckpointDecision::Bypass);

        let mut superuser = trainer(SubscriptionStatus::Expired, -10);
        superuser.is_superuser = true;
        assert_eq!(evaluate(&request(superuser), now()).decision, CheckpointDecision::Bypass);

        let mut client = trainer(SubscriptionStatus::Expired, -10);
        client.user_type = UserType::Client;
        assert_eq!(evaluate(&request(client), now()).decision, CheckpointDecision::Bypass);
    }

    #[test]
    fn test_expired_trial_is_blocked_and_denied() {
        let outcome = evaluate(&request(trainer(SubscriptionStatus::Trial, -1)), now());

        let block = outcome.block.expect("block write expected");
        assert!(block.account_blocked);
        assert_eq!(block.block_reason.as_deref(), Some(AUTO_BLOCK_REASON));
        assert_eq!(block.blocked_at, Some(now()));

        assert_eq!(outcome.decision.status_code(), Some(403));
        let body = outcome.decision.body().unwrap();
        assert_eq!(body["block_reason"], AUTO_BLOCK_REASON);
        assert_eq!(body["account_blocked"], true);
    }

    #[test]
    fn test_second_evaluation_of_blocked_account_writes_nothing() {
        let account = trainer(SubscriptionStatus::Trial, -1);
        let first = evaluate(&request(account.clone()), now());

        let mut stored = account;
        stored.apply_block_state(first.block.unwrap());
        let first_blocked_at = stored.blocked_at;

        let later = now() + Duration::hours(5);
        let second = evaluate(&request(stored.clone()), later);
        assert!(second.block.is_none());
        assert_eq!(second.decision.status_code(), Some(403));
        assert_eq!(stored.blocked_at, first_blocked_at);
    }

    #[test]
    fn test_inactive_subscription_gets_payment_required() {
        // Cancelled accounts are never auto-blocked but still lose access
        let account = trainer(SubscriptionStatus::Cancelled, 20);
        let outcome = evaluate(&request(account), now());
        assert!(outcome.block.is_none());
        assert_eq!(outcome.decision.status_code(), Some(402));

        let body = outcome.decision.body().unwrap();
        assert_eq!(body["error"], "Subscription expired");
        assert_eq!(body["subscription_status"], "cancelled");
        assert_eq!(body["upgrade_required"], true);
        assert_eq!(body["trial_end_date"], "2025-06-21");
    }

    #[test]
    fn test_trial_ending_soon_attaches_warning() {
        let outcome = evaluate(&request(trainer(SubscriptionStatus::Trial, 2)), now());
        assert_eq!(
            outcome.decision,
            CheckpointDecision::Allow {
                warning: Some(TrialWarning { days_left: 2 })
            }
        );

        let headers = outcome.decision.response_headers();
        assert_eq!(headers[0], (TRIAL_WARNING_HEADER, "Your trial ends in 2 days".to_string()));
        assert_eq!(headers[1], (TRIAL_DAYS_LEFT_HEADER, "2".to_string()));
    }

    #[test]
    fn test_last_trial_day_warning_is_singular_or_zero() {
        assert_eq!(TrialWarning { days_left: 1 }.message(), "Your trial ends in 1 day");

        let outcome = evaluate(&request(trainer(SubscriptionStatus::Trial, 0)), now());
        assert_eq!(
            outcome.decision,
            CheckpointDecision::Allow {
                warning: Some(TrialWarning { days_left: 0 })
            }
        );
    }

    #[test]
    fn test_healthy_accounts_allowed_without_warning() {
        let outcome = evaluate(&request(trainer(SubscriptionStatus::Trial, 10)), now());
        assert_eq!(outcome.decision, CheckpointDecision::Allow { warning: None });
        assert!(outcome.decision.response_headers().is_empty());

        // Paid plans never warn, even near the old trial end
        let outcome = evaluate(&request(trainer(SubscriptionStatus::Active, -40)), now());
        assert_eq!(outcome.decision, CheckpointDecision::Allow { warning: None });
    }

    #[test]
    fn test_legacy_trainer_without_status_passes() {
        let mut account = trainer(SubscriptionStatus::Trial, -5);
        account.subscription_status = None;
        let outcome = evaluate(&request(account), now());
        assert_eq!(outcome.decision, CheckpointDecision::Bypass);
        assert!(outcome.block.is_none());
    }

    #[test]
    fn test_admin_block_without_reason_uses_default() {
        let mut account = trainer(SubscriptionStatus::Active, 30);
        account.account_blocked = true;
        account.blocked_at = Some(now());
        let outcome = evaluate(&request(account), now());
        assert_eq!(
            outcome.decision,
            CheckpointDecision::Deny(AccessDenied::AccountBlocked {
                reason: ADMIN_BLOCK_REASON.to_string()
            })
        );
    }
}
