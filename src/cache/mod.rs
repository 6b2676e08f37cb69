//! Engagement cache
//!
//! Keeps per-post like counters and per-user like flags in a key-value backend
//! that sits beside the relational store:
//!
//! - **Backend**: hash primitives behind [`KvBackend`] (Redis in production,
//!   [`MemoryBackend`] for development and tests)
//! - **Lazy seeding**: a post without an aggregate is seeded to zero on first read
//! - **Batch decoration**: one pipelined round trip per listed page
//! - **Toggle**: flips one user's like, atomically or under a per-pair lock
//!
//! ## Key layout
//!
//! ```text
//! post:<post_id>:likes  total-likes  -> "<count>"
//! post:<post_id>:likes  <user_id>    -> "1"   (present only while liked)
//! ```

mod backend;
mod batch;
mod config;
mod engagement;
mod keys;
mod lazy;
mod lock;
mod memory;
mod retry;
mod service;
mod toggle;

pub use backend::{CacheError, FieldRef, KvBackend, ToggleReply};
pub use batch::BatchFetcher;
pub use config::{CacheConfig, ToggleStrategy};
pub use engagement::{EngagementCache, Lookup};
pub use keys::{AGGREGATE_FIELD, FLAG_LIKED, likes_key, parse_count, parse_flag};
pub use lazy::LazyInitializer;
pub use lock::{PairGuard, PairLocks};
pub use memory::MemoryBackend;
pub use retry::RetryPolicy;
pub use service::EngagementService;
pub use toggle::{ToggleEngine, ToggleError};

pub(crate) const METRIC_CACHE_OP_MS: &str = "likefeed_cache_op_ms";
pub(crate) const METRIC_CACHE_SEEDED: &str = "likefeed_cache_seeded_total";
pub(crate) const METRIC_CACHE_MALFORMED: &str = "likefeed_cache_malformed_total";
pub(crate) const METRIC_TOGGLE: &str = "likefeed_toggle_total";
pub(crate) const METRIC_TOGGLE_PARTIAL: &str = "likefeed_toggle_partial_total";
