//! `weaver parse`: run the tag parser alone.

use anyhow::Context;
use serde_json::{json, Value};
use std::path::Path;
use weaver_core::{cumulative_chunks, Config, ParserEvent, ParserOptions, StreamingParser};

const TURN_ID: &str = "parse";

/// Parse a transcript file and print the result as JSON.
pub async fn handle_parse(config: &Config, file: &Path, chunk_size: usize) -> anyhow::Result<()> {
    let transcript = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let report = parse_transcript(config, &transcript, chunk_size);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Visible text plus every closed action, in order.
pub fn parse_transcript(config: &Config, transcript: &str, chunk_size: usize) -> Value {
    let mut parser = StreamingParser::new(ParserOptions::from_config(&config.parser));
    let mut events: Vec<ParserEvent> = Vec::new();

    let mut visible = String::new();
    for chunk in cumulative_chunks(transcript, chunk_size) {
        visible.push_str(&parser.parse(TURN_ID, chunk, &mut events));
    }
    visible.push_str(&parser.finish(TURN_ID, transcript, &mut events));

    let actions: Vec<Value> = events
        .iter()
        .filter_map(|event| match event {
            ParserEvent::Closed(action) => Some(json!({
                "id": action.id.to_string(),
                "action": action.to_action(),
            })),
            _ => None,
        })
        .collect();

    json!({
        "visible": visible,
        "actions": actions,
    })
}
