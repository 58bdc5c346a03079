//! CLI command implementations.

mod ask;
mod cache;
mod config;
mod languages;
mod search;
mod serve;
mod transcript;

pub use ask::run_ask;
pub use cache::run_cache;
pub use config::run_config;
pub use languages::run_languages;
pub use search::run_search;
pub use serve::run_serve;
pub use transcript::run_transcript;
