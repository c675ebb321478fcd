use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::subscription::checkpoint::{self, CheckpointDecision, CheckpointRequest};
use crate::subscription::clock::Clock;
use crate::subscription::config::{DEFAULT_CLIENT_LIMIT, TRIAL_DAYS};
use crate::subscription::evaluator;
use crate::subscription::reconciler::{self, add_trial_days, BlockChange, SubscriptionUpdate};
use crate::subscription::storage::AccountStore;
use crate::subscription::types::{
    AccountError, AccountInfo, NewAccount, PlanType, SubscriptionStatus, TrainerAccount,
};

/// Result of an admin subscription update
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateOutcome {
    pub account: AccountInfo,
    pub block_change: BlockChange,
}

/// One trainer touched by the trial-date backfill
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BackfillEntry {
    pub id: Uuid,
    pub username: String,
    pub trial_start_date: NaiveDate,
    pub trial_end_date: NaiveDate,
    pub subscription_status: SubscriptionStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BackfillReport {
    pub dry_run: bool,
    pub entries: Vec<BackfillEntry>,
}

/// Runs the lifecycle flows against a store and a clock
pub struct LifecycleManager<S, C> {
    store: Mutex<S>,
    clock: C,
}

impl<S: AccountStore, C: Clock> LifecycleManager<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store: Mutex::new(store),
            clock,
        }
    }

    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    /// Create an account; trainers start a fresh trial
    pub async fn signup(&self, new: NewAccount) -> Result<AccountInfo, AccountError> {
        let now = self.clock.now();
        let today = now.date_naive();

        let mut account = TrainerAccount::new(new.username, new.email, new.user_type, now);
        if account.is_trainer() {
            account.subscription_status = Some(SubscriptionStatus::Trial);
            account.plan_type = Some(PlanType::Trial);
            account.trial_start_date = Some(today);
            account.trial_end_date = Some(add_trial_days(today, TRIAL_DAYS)?);
            account.client_limit = Some(DEFAULT_CLIENT_LIMIT);
        }

        let info = AccountInfo::evaluate(&account, today);
        self.store.lock().await.insert(account)?;

        tracing::info!(
            account_id = %info.id,
            username = %info.username,
            trial_end = ?info.trial_end_date,
            "Account created"
        );
        Ok(info)
    }

    /// Login side of the lifecycle: blocks a lapsed trial before letting anyone in
    pub async fn login(&self, id: Uuid) -> Result<AccountInfo, AccountError> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;
        let mut account = store.load(id)?.ok_or(AccountError::NotFound(id))?;

        if let Some(block) = checkpoint::auto_block(&account, now) {
            store.update_block_state(id, &block)?;
            account.apply_block_state(block);
            tracing::warn!(account_id = %id, "Auto-blocked expired trial at login");
        }

        if account.is_trainer() && account.account_blocked {
            let reason = account.block_reason.clone().unwrap_or_default();
            return Err(AccountError::AccountBlocked { reason });
        }

        Ok(AccountInfo::evaluate(&account, now.date_naive()))
    }

    /// Checkpoint for one request, persisting any auto-block it calls for.
    ///
    /// The principal is re-read from the store so a stale snapshot never
    /// re-blocks an account that is already blocked.
    pub async fn check_request(
        &self,
        request: &CheckpointRequest,
    ) -> Result<CheckpointDecision, AccountError> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;

        // Evaluate against the stored row, not the caller's copy
        let fresh = match request.principal.as_ref() {
            Some(principal) => {
                let stored = store
                    .load(principal.id)?
                    .ok_or(AccountError::NotFound(principal.id))?;
                CheckpointRequest::new(request.path.clone(), Some(stored))
            }
            None => request.clone(),
        };

        let outcome = checkpoint::evaluate(&fresh, now);

        let principal = fresh.principal.as_ref();
        if let (Some(block), Some(principal)) = (outcome.block.as_ref(), principal) {
            store.update_block_state(principal.id, block)?;
            tracing::warn!(
                account_id = %principal.id,
                path = %request.path,
                "Auto-blocked expired trial"
            );
        }
        drop(store);

        if let CheckpointDecision::Deny(denied) = &outcome.decision {
            tracing::info!(
                path = %request.path,
                status = denied.status_code(),
                "Request denied: {}",
                denied
            );
        }

        Ok(outcome.decision)
    }

    /// Admin PATCH of a trainer's subscription
    pub async fn update_subscription(
        &self,
        admin_id: Uuid,
        target_id: Uuid,
        update: SubscriptionUpdate,
    ) -> Result<UpdateOutcome, AccountError> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;
        Self::require_admin(&*store, admin_id)?;

        let mut account = store.load(target_id)?.ok_or(AccountError::NotFound(target_id))?;
        if !account.is_trainer() {
            return Err(AccountError::NotATrainer);
        }

        let block_change = reconciler::apply_update(&mut account, &update, now)?;
        store.save(&account)?;

        tracing::info!(
            admin_id = %admin_id,
            account_id = %target_id,
            status = ?account.subscription_status,
            plan = ?account.plan_type,
            trial_end = ?account.trial_end_date,
            block_change = ?block_change,
            "Subscription updated"
        );

        Ok(UpdateOutcome {
            account: AccountInfo::evaluate(&account, now.date_naive()),
            block_change,
        })
    }

    pub async fn block_account(
        &self,
        admin_id: Uuid,
        target_id: Uuid,
        reason: Option<String>,
    ) -> Result<UpdateOutcome, AccountError> {
        let update = SubscriptionUpdate {
            account_blocked: Some(true),
            block_reason: reason,
            ..Default::default()
        };
        self.update_subscription(admin_id, target_id, update).await
    }

    pub async fn unblock_account(
        &self,
        admin_id: Uuid,
        target_id: Uuid,
    ) -> Result<UpdateOutcome, AccountError> {
        let update = SubscriptionUpdate {
            account_blocked: Some(false),
            ..Default::default()
        };
        self.update_subscription(admin_id, target_id, update).await
    }

    /// Current subscription view, no writes
    pub async fn subscription_status(&self, id: Uuid) -> Result<AccountInfo, AccountError> {
        let account = self.store.lock().await.load(id)?.ok_or(AccountError::NotFound(id))?;
        Ok(AccountInfo::evaluate(&account, self.clock.today()))
    }

    /// Ok with the resolved limit when one more client fits
    pub async fn check_client_capacity(
        &self,
        id: Uuid,
        current_count: usize,
    ) -> Result<i64, AccountError> {
        let account = self.store.lock().await.load(id)?.ok_or(AccountError::NotFound(id))?;
        let limit = evaluator::resolve_client_limit(&account);

        if !evaluator::can_add_client(&account, current_count) {
            return Err(AccountError::ClientLimitReached { limit });
        }
        Ok(limit)
    }

    /// One-shot migration giving trial dates to trainers created before they existed
    pub async fn backfill_trial_dates(
        &self,
        trial_days: i64,
        dry_run: bool,
    ) -> Result<BackfillReport, AccountError> {
        let today = self.clock.today();
        let mut store = self.store.lock().await;

        let mut entries = Vec::new();
        for mut account in store.list()? {
            if !account.is_trainer() || account.trial_start_date.is_some() {
                continue;
            }

            let start = account.date_joined.date_naive().min(today);
            let end = add_trial_days(start, trial_days)?;
            let status = if today > end {
                SubscriptionStatus::Expired
            } else {
                SubscriptionStatus::Trial
            };

            entries.push(BackfillEntry {
                id: account.id,
                username: account.username.clone(),
                trial_start_date: start,
                trial_end_date: end,
                subscription_status: status,
            });

            if dry_run {
                continue;
            }

            account.trial_start_date = Some(start);
            account.trial_end_date = Some(end);
            account.subscription_status = Some(status);
            account.plan_type.get_or_insert(PlanType::Trial);
            account.client_limit.get_or_insert(DEFAULT_CLIENT_LIMIT);
            store.save(&account)?;
        }

        tracing::info!(count = entries.len(), dry_run, "Trial date backfill finished");
        Ok(BackfillReport { dry_run, entries })
    }

    fn require_admin(store: &S, admin_id: Uuid) -> Result<(), AccountError> {
        match store.load(admin_id)? {
            Some(admin) if admin.is_privileged() => Ok(()),
            _ => Err(AccountError::Forbidden),
        }
    }
}
