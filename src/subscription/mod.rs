// Subscription lifecycle module
// Trial tracking, access checkpoint and admin reconciliation for trainers

pub mod types;
pub mod config;
pub mod clock;
pub mod evaluator;
pub mod checkpoint;
pub mod reconciler;
pub mod storage;
pub mod manager;

pub use types::*;
pub use config::*;
pub use manager::LifecycleManager;
