//! Search command implementation.

use crate::cli::output::timestamp_url;
use crate::cli::preflight::{self, Operation};
use crate::cli::{Output, SearchMethod};
use crate::config::Settings;
use crate::engine::Engine;
use crate::retrieval::RetrievalMethod;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    video: &str,
    query: &str,
    method: SearchMethod,
    limit: usize,
    language: &str,
    settings: Settings,
) -> Result<()> {
    let (method, operation) = match method {
        SearchMethod::Lexical => (RetrievalMethod::Lexical, Operation::LexicalSearch),
        SearchMethod::Semantic => (RetrievalMethod::Semantic, Operation::SemanticSearch),
    };
    if let Err(e) = preflight::check(operation, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let engine = Engine::new(settings)?;
    let video_id = engine.video_id(video)?;

    let spinner = Output::spinner("Searching...");
    let result = engine.search(&video_id, query, language, method, limit).await;
    spinner.finish_and_clear();

    let results = result?;
    if results.is_empty() {
        Output::warning("No matching content found.");
        return Ok(());
    }

    Output::header(&format!("{} results for \"{}\"", method, query));
    for (rank, (chunk, score)) in results.chunks.iter().zip(&results.scores).enumerate() {
        Output::search_result(
            rank + 1,
            &chunk.format_timestamp(),
            *score,
            &chunk.text,
            &timestamp_url(&video_id, chunk.start_time),
        );
    }

    Ok(())
}
