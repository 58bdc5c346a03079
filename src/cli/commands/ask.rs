//! Ask command implementation.

use crate::cli::output::timestamp_url;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::engine::{AnswerStatus, Engine};
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(video: &str, question: &str, language: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let engine = Engine::new(settings)?;
    let video_id = engine.video_id(video)?;

    let spinner = Output::spinner("Reading the video...");
    let result = engine.answer_question(&video_id, question, &[], language).await;
    spinner.finish_and_clear();

    let answer = match result {
        Ok(answer) => answer,
        Err(e) => {
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e.into());
        }
    };

    println!("\n{}\n", answer.answer);

    if answer.status == AnswerStatus::Unavailable {
        Output::warning("Generation failed after retry. Nothing was cached.");
        return Ok(());
    }

    if let Some(method) = answer.method {
        let mut detail = format!("via {} retrieval", method);
        if answer.escalated {
            detail.push_str(" (fallback)");
        }
        if answer.cached {
            detail.push_str(", cached");
        }
        Output::info(&detail);
    }

    if !answer.sources.is_empty() {
        Output::header("Sources");
        for source in &answer.sources {
            Output::list_item(&format!(
                "{}  {}",
                source.timestamp,
                timestamp_url(&video_id, source.start_time)
            ));
        }
    }

    Ok(())
}
