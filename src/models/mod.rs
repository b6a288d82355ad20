//! Data models for urlharvest.

mod entry;
mod heartbeat;
mod result;
mod state;

pub use entry::{EntryStatus, PayloadStatus, QueueEntry};
pub use heartbeat::{WorkerHeartbeat, ACTIVE_THRESHOLD_SECS};
pub use result::{FetchDebug, HarvestResult, OracleAssessment, PayloadMetrics, PresentationRef};
pub use state::{DedupKey, PayloadPolicy, QueueState, SourceConfig};
