//! Ask command handler.

use crate::commands::build_assistant;
use atrium_core::{AppConfig, AppResult};
use clap::Args;

/// Ask a question against the document base
#[derive(Args, Debug)]
pub struct AskCommand {
    /// Query text
    pub query: String,

    /// Acting user identity
    #[arg(short, long, env = "ATRIUM_USER", default_value = "local")]
    pub user: String,

    /// Conversation id (continues the thread across invocations)
    #[arg(long, default_value = "default")]
    pub conversation: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Show retrieved chunks instead of generating an answer
    #[arg(long)]
    pub retrieve_only: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let assistant = build_assistant(config)?;
        let k = self.top_k.unwrap_or(config.top_k);

        if self.retrieve_only {
            let results = assistant.retrieve(&self.user, &self.query, k).await?;

            if self.json {
                let output: Vec<_> = results
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "chunkId": r.chunk.id,
                            "documentId": r.chunk.document_id,
                            "score": r.score,
                            "text": r.chunk.text,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).unwrap_or_default()
                );
            } else if results.is_empty() {
                println!("No matching documents.");
            } else {
                for result in &results {
                    println!("[{:.3}] {} — {}", result.score, result.chunk.id, result.chunk.text);
                }
            }
            return Ok(());
        }

        let answer = assistant
            .generate(&self.user, &self.conversation, &self.query)
            .await?;

        if self.json {
            let output = serde_json::json!({
                "answer": answer.text,
                "persona": answer.persona,
                "citedChunkIds": answer.cited_chunk_ids,
                "degraded": answer.degraded,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_default()
            );
        } else {
            println!("{}", answer.text);
            if !answer.cited_chunk_ids.is_empty() {
                println!();
                println!("Sources: {}", answer.cited_chunk_ids.join(", "));
            }
        }

        Ok(())
    }
}
