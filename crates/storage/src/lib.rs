//! SQLite-backed usage ledger for Conduit.
//!
//! Every completed vendor call can be recorded here: which provider and
//! model served it, how many tokens it used, and how long it took. The
//! ledger answers two questions: what happened recently, and how much each
//! provider has been used overall.
//!
//! # Core Concepts
//!
//! ## UsageStore
//!
//! The [`UsageStore`] wraps a SQLite database. Records are append-only.
//!
//! ## UsageRecord
//!
//! A [`UsageRecord`] describes one call. `total_tokens` is always the sum of
//! the input and output counts.
//!
//! ## UsageSummary
//!
//! A [`UsageSummary`] holds ledger-wide totals plus a [`ProviderUsage`] row
//! per provider.
//!
//! # Example
//!
//! ```no_run
//! use storage::{UsageRecord, UsageStore};
//!
//! let store = UsageStore::open("usage.db")?;
//! store.append(&UsageRecord::new("openai", "gpt-4", 120, 45, 830.0))?;
//!
//! for record in store.recent(10)? {
//!     println!("{} {} {}", record.timestamp, record.provider, record.total_tokens);
//! }
//!
//! let summary = store.summary()?;
//! println!("{} requests", summary.total_requests);
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod record;
mod store;

pub use error::{Error, Result};
pub use record::{ProviderUsage, UsageRecord, UsageSummary};
pub use store::UsageStore;
