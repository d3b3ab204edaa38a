//! # Contribution Calendar Library
//!
//! `contrib_calendar` builds a year-long contribution calendar for an account
//! from the weekly per-contributor statistics a repository host exposes. It is
//! built to keep showing something useful under tight request quotas and
//! statistics that are still being computed upstream.
//!
//! ## Features
//!
//! - Cache-first fetching with stale-while-revalidate and a rate-limit latch
//! - Namespaced persistent cache with TTL classification and eviction
//! - Lenient folding of partial statistics into daily activity maps
//! - Fixed 52-week calendar grids with five contribution levels
//! - Contributor ranking and selection
//! - SVG rendering of calendars
//!
//! ## Example
//!
//! ```no_run
//! use contrib_calendar::{Config, Dashboard};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut config = Config::load(None)?;
//! config.owner = "octocat".to_string();
//! config.validate()?;
//!
//! let mut dashboard = Dashboard::from_config(&config)?;
//! dashboard.load(false).await;
//! let grid = dashboard.grid(contrib_calendar::utils::today_local());
//! println!("{} contributions", grid.total_contributions);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod plotting;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use app::{Dashboard, LoadReport};
pub use cache::{CachedPayload, FileStore, MemoryStore, PersistentCache};
pub use config::Config;
pub use error::{FetchError, RecordError, StorageError};
pub use fetch::{HttpTransport, MockTransport, ResilientFetcher};
pub use types::{CalendarGrid, ContributionLevel, Contributor, ContributorSelector};
