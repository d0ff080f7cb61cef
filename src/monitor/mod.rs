pub mod collector;
pub mod quality;
pub mod snapshot;
pub mod store;
pub mod types;

pub use collector::{AlertCallback, AlertSubscription, MetricsMonitor};
pub use quality::{evaluate_framing, evaluate_metrics};
pub use snapshot::{Aggregate, HealthLevel, HealthStatus, MetricsSnapshot};
pub use store::{JsonLinesStore, SnapshotRecord, SnapshotStore};
pub use types::{EnvironmentIssue, IssueKind, PerformanceMetrics, Severity};
