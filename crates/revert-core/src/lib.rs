pub mod services;
mod shared;
mod tracker;

pub use services::change_log::{
    ChangeLogManager, ChangeType, FileChange, FileChangeEntry, RestoreSource, RevertibleChangeSet,
};
pub use services::revert::{RevertBatchResult, RevertOutcome, RevertService, SkipReason};
pub use shared::settings::{ChangeTrackingSettings, DEFAULT_TRASH_DIR};
pub use tracker::ChangeTracker;
