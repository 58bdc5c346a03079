//! Languages command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::engine::Engine;
use anyhow::Result;
use console::style;

/// Run the languages command.
pub async fn run_languages(video: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Transcript, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let engine = Engine::new(settings)?;
    let video_id = engine.video_id(video)?;
    let languages = engine.available_languages(&video_id).await?;

    if languages.is_empty() {
        Output::warning(&format!("{} has no captions", video_id));
        return Ok(());
    }

    Output::header(&format!("Languages for {}", video_id));
    for language in &languages {
        let suffix = if language.is_translation {
            format!(" {}", style("(cached translation)").dim())
        } else {
            String::new()
        };
        Output::list_item(&format!("{}  {}{}", language.code, language.name, suffix));
    }

    Ok(())
}
