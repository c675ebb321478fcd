use std::path::PathBuf;

use crate::subscription::types::PlanType;

/// Trial configuration
pub const TRIAL_DAYS: i64 = 14;
pub const TRIAL_WARNING_DAYS: i64 = 3;
pub const MAX_TRIAL_DAYS: i64 = 36_500;

/// Client limit used when neither the account nor its plan gives one
pub const DEFAULT_CLIENT_LIMIT: i64 = 5;
pub const UNLIMITED_CLIENTS: i64 = -1;

/// Block reasons
pub const AUTO_BLOCK_REASON: &str =
    "Your 14-day trial period has expired. Please contact support to upgrade your subscription.";
pub const ADMIN_BLOCK_REASON: &str = "Account blocked by an administrator.";

/// Response headers carrying the trial warning
pub const TRIAL_WARNING_HEADER: &str = "X-Trial-Warning";
pub const TRIAL_DAYS_LEFT_HEADER: &str = "X-Trial-Days-Left";

/// Path prefixes that never require an active subscription
pub const EXEMPT_PATHS: &[&str] = &[
    "/api/auth/login/",
    "/api/auth/signup/",
    "/api/auth/logout/",
    "/api/auth/password-reset/",
    "/api/auth/subscription/status/",
    "/api/auth/subscription/upgrade/",
    "/api/auth/me/",
    "/api/auth/terms/",
    "/admin/",
    "/static/",
    "/media/",
];

/// JSON store configuration
pub const DATA_DIR_ENV: &str = "TRAINER_LIFECYCLE_DATA_DIR";
pub const ACCOUNTS_FILE: &str = "accounts.json";

/// Plan default client limits
pub fn plan_client_limit(plan: Option<PlanType>) -> i64 {
    match plan {
        Some(PlanType::Trial) => 5,
        Some(PlanType::Starter) => 10,
        Some(PlanType::Professional) => 50,
        Some(PlanType::Enterprise) => UNLIMITED_CLIENTS,
        None => DEFAULT_CLIENT_LIMIT,
    }
}

pub fn is_exempt_path(path: &str) -> bool {
    EXEMPT_PATHS.iter().any(|prefix| path.starts_with(prefix))
}

/// Directory for the JSON account store
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir));
        }
    }

    dirs::data_local_dir().map(|dir| dir.join("trainer-lifecycle"))
}
