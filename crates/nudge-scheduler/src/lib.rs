//! # Nudge Scheduler
//!
//! Everything between "a message exists" and "a message was delivered":
//! the durable backlog, the daily occasion clock and webhook dispatch.
//!
//! ## Architecture
//! ```text
//! OccasionScheduler (Idle → Armed → Fired)
//!   └── is_due → MessageQueue::dequeue_oldest
//!                  ├── WebhookTransport::send (main)
//!                  ├── ok   → record_sent → refill
//!                  └── fail → enqueue again + DebugChannel
//!
//! MessageQueue<S: QueueStore>
//!   └── JsonFileStore: messages.json, sent_messages.json
//! ```

pub mod dispatch;
pub mod notify;
pub mod occasion;
pub mod queue;
pub mod store;

pub use dispatch::{DebugChannel, WebhookTransport};
pub use notify::{Notification, NotifyLevel};
pub use occasion::{OccasionScheduler, OccasionState, parse_time_of_day};
pub use queue::{CleanupSummary, MessageQueue, QueueEntry, QueueReport, RecordIssue, SENT_HISTORY_CAP};
pub use store::{Collection, JsonFileStore, QueueStore};
