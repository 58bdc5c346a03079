//! Transcript command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::{Output, TranscriptFormat};
use crate::config::Settings;
use crate::engine::Engine;
use crate::transcript::is_english;
use anyhow::Result;

/// Run the transcript command.
pub async fn run_transcript(
    video: &str,
    languages: &[String],
    format: TranscriptFormat,
    settings: Settings,
) -> Result<()> {
    // Translation needs the API key on top of yt-dlp
    let wants_english = languages.is_empty() || languages.iter().any(|l| is_english(l));
    let operation = if wants_english {
        Operation::Ask
    } else {
        Operation::Transcript
    };
    if let Err(e) = preflight::check(operation, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let engine = Engine::new(settings)?;
    let video_id = engine.video_id(video)?;

    let spinner = Output::spinner("Fetching transcript...");
    let result = engine.resolve_transcript(&video_id, languages).await;
    spinner.finish_and_clear();

    let transcript = match result {
        Ok(transcript) => transcript,
        Err(e) => {
            Output::error(&format!("Failed to get transcript: {}", e));
            return Err(e.into());
        }
    };

    match format {
        TranscriptFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&transcript)?);
        }
        TranscriptFormat::Text => {
            let label = if transcript.is_generated() {
                format!("{} (AI translated)", transcript.language())
            } else {
                transcript.language().to_string()
            };
            Output::header(&format!("{} [{}]", video_id, label));
            println!("{}", transcript.format_with_timestamps());
        }
    }

    Ok(())
}
