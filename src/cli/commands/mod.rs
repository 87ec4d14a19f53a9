//! CLI command implementations.

mod ask;
mod config;
mod ingest;
mod list;
mod reindex;
mod search;

pub use ask::run_ask;
pub use config::run_config;
pub use ingest::run_ingest;
pub use list::run_list;
pub use reindex::run_reindex;
pub use search::run_search;
