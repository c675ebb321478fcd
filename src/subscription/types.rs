use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subscription::evaluator;

/// Kind of user an account belongs to
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Trainer,
    Client,
    Admin,
}

/// Current subscription status
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,      // In trial period
    Active,     // Paid plan, never auto-blocked
    Expired,    // Trial or plan has lapsed
    Cancelled,  // Cancelled by the trainer or an admin
    Suspended,  // Suspended by an admin
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Suspended => "suspended",
        }
    }

    /// Statuses that still fall under trial-expiry auto-blocking
    pub fn is_trial_bound(&self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Expired)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plan a trainer is subscribed to
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Trial,
    Starter,
    Professional,
    Enterprise,
}

/// The three block fields, always written together
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct BlockState {
    pub account_blocked: bool,
    pub block_reason: Option<String>,
    pub blocked_at: Option<DateTime<Utc>>,
}

impl BlockState {
    pub fn blocked(reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            account_blocked: true,
            block_reason: Some(reason.into()),
            blocked_at: Some(at),
        }
    }

    pub fn unblocked() -> Self {
        Self::default()
    }
}

/// Account snapshot as stored
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TrainerAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub user_type: UserType,
    #[serde(default)]
    pub is_superuser: bool,
    pub subscription_status: Option<SubscriptionStatus>,
    pub plan_type: Option<PlanType>,
    pub trial_start_date: Option<NaiveDate>,
    pub trial_end_date: Option<NaiveDate>,
    pub client_limit: Option<i64>,
    #[serde(default)]
    pub account_blocked: bool,
    pub block_reason: Option<String>,
    pub blocked_at: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl TrainerAccount {
    /// Bare account with no subscription fields set
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        user_type: UserType,
        joined: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            user_type,
            is_superuser: false,
            subscription_status: None,
            plan_type: None,
            trial_start_date: None,
            trial_end_date: None,
            client_limit: None,
            account_blocked: false,
            block_reason: None,
            blocked_at: None,
            date_joined: joined,
        }
    }

    pub fn is_trainer(&self) -> bool {
        self.user_type == UserType::Trainer
    }

    /// Admins and superusers skip subscription enforcement
    pub fn is_privileged(&self) -> bool {
        self.is_superuser || self.user_type == UserType::Admin
    }

    pub fn block_state(&self) -> BlockState {
        BlockState {
            account_blocked: self.account_blocked,
            block_reason: self.block_reason.clone(),
            blocked_at: self.blocked_at,
        }
    }

    pub fn apply_block_state(&mut self, state: BlockState) {
        self.account_blocked = state.account_blocked;
        self.block_reason = state.block_reason;
        self.blocked_at = state.blocked_at;
    }
}

/// Input for creating an account at signup
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub user_type: UserType,
}

/// Subscription state for the frontend (simplified view)
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AccountInfo {
    pub id: Uuid,
    pub username: String,
    pub user_type: UserType,
    pub subscription_status: Option<SubscriptionStatus>,
    pub plan_type: Option<PlanType>,
    pub trial_start_date: Option<NaiveDate>,
    pub trial_end_date: Option<NaiveDate>,
    pub is_trial_active: bool,
    pub is_subscription_active: bool,
    pub days_until_trial_end: Option<i64>,
    pub client_limit: i64,
    pub account_blocked: bool,
    pub block_reason: Option<String>,
}

impl AccountInfo {
    pub fn evaluate(account: &TrainerAccount, today: NaiveDate) -> Self {
        AccountInfo {
            id: account.id,
            username: account.username.clone(),
            user_type: account.user_type,
            subscription_status: account.subscription_status,
            plan_type: account.plan_type,
            trial_start_date: account.trial_start_date,
            trial_end_date: account.trial_end_date,
            is_trial_active: evaluator::is_trial_active(account, today),
            is_subscription_active: evaluator::is_subscription_active(account, today),
            days_until_trial_end: evaluator::days_until_trial_end(account, today),
            client_limit: evaluator::resolve_client_limit(account),
            account_blocked: account.account_blocked,
            block_reason: account.block_reason.clone(),
        }
    }
}

/// Error types for lifecycle operations
#[derive(thiserror::Error, Debug)]
pub enum AccountError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Account not found: {0}")]
    NotFound(Uuid),

    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    #[error("Account blocked: {reason}")]
    AccountBlocked { reason: String },

    #[error("Admin privileges required")]
    Forbidden,

    #[error("Account is not a trainer")]
    NotATrainer,

    #[error("Client limit reached ({limit})")]
    ClientLimitReached { limit: i64 },

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),
}

impl Serialize for AccountError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
