//! Cache command implementation.

use crate::cache::create_cache_store;
use crate::cli::{CacheAction, Output};
use crate::clock::SystemClock;
use crate::config::Settings;
use crate::engine::Engine;
use anyhow::Result;
use std::sync::Arc;

/// Run the cache command.
pub async fn run_cache(action: &CacheAction, settings: Settings) -> Result<()> {
    match action {
        CacheAction::Purge { video } => {
            let engine = Engine::new(settings)?;
            let video_id = engine.video_id(video)?;
            let deleted = engine.purge_video(&video_id).await?;
            Output::success(&format!("Deleted {} cache entries for {}", deleted, video_id));
        }

        CacheAction::PurgeExpired => {
            let cache = create_cache_store(&settings, Arc::new(SystemClock))?;
            let purged = cache.purge_expired().await?;
            Output::success(&format!("Purged {} expired entries", purged));
        }

        CacheAction::Stats => {
            let cache = create_cache_store(&settings, Arc::new(SystemClock))?;
            Output::header("Cache");
            Output::kv("Backend", &settings.cache.backend);
            if settings.cache.backend == "sqlite" {
                Output::kv("Path", &settings.cache_path().display().to_string());
            }
            Output::kv("Entries", &cache.len().await?.to_string());
        }
    }

    Ok(())
}
