//! Object transfers: strategy selection, multipart worker pool, progress

mod engine;
mod policy;
mod progress;
mod types;
mod worker;

pub use engine::TransferEngine;
pub use policy::{TransferPolicy, TransferStrategy};
pub use progress::{ProgressObserver, ProgressSnapshot, ProgressTracker, WorkerId};
pub use types::{TransferResult, UploadOptions, UploadSource};
