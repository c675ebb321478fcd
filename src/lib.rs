// Trainer subscription lifecycle
// Trial tracking, per-request access checkpoint, admin block reconciliation

pub mod logging;
pub mod subscription;

pub use subscription::checkpoint::{
    AccessDenied, CheckpointDecision, CheckpointRequest, TrialWarning,
};
pub use subscription::clock::{Clock, FixedClock, SystemClock};
pub use subscription::reconciler::{
    reconcile_block, BlockChange, SubscriptionUpdate, UnblockReason,
};
pub use subscription::storage::{AccountStore, JsonFileStore, MemoryStore};
pub use subscription::{AccountError, AccountInfo, LifecycleManager, TrainerAccount};
