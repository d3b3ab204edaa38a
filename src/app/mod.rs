//! Session state behind the CLI: one owner, one aggregation, one selection.

mod state;

pub use state::{Dashboard, LoadReport};
