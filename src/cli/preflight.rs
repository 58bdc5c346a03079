//! Pre-flight checks before commands that call external services.
//!
//! Fails fast when a required tool or key is missing, instead of after the
//! first network round trip.

use crate::config::Settings;
use crate::error::{Result, SporError};
use crate::openai::is_api_key_configured;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Fetching captions requires yt-dlp.
    Transcript,
    /// Answering may translate and generate, so it needs the API key too.
    Ask,
    /// Lexical search only needs captions.
    LexicalSearch,
    /// Semantic search also needs embeddings.
    SemanticSearch,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    let ytdlp = settings.transcript.ytdlp_path.as_str();
    match operation {
        Operation::Transcript | Operation::LexicalSearch => {
            check_tool(ytdlp)?;
        }
        Operation::Ask | Operation::SemanticSearch => {
            check_api_key()?;
            check_tool(ytdlp)?;
        }
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    if is_api_key_configured() {
        Ok(())
    } else {
        Err(SporError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        ))
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(SporError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SporError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(SporError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
