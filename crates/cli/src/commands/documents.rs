//! Documents command handler.

use crate::commands::build_assistant;
use atrium_core::{AppConfig, AppResult};
use clap::{Args, Subcommand};

/// Document management (list, delete, permissions, stats)
#[derive(Args, Debug)]
pub struct DocumentsCommand {
    #[command(subcommand)]
    pub action: DocumentsAction,
}

#[derive(Subcommand, Debug)]
pub enum DocumentsAction {
    /// List stored documents
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a document and its chunks
    Delete {
        /// Document id
        id: String,
    },

    /// Grant a user access to a document
    Grant {
        /// Document id
        id: String,

        /// User identity
        user: String,
    },

    /// Revoke a user's access to a document
    Revoke {
        /// Document id
        id: String,

        /// User identity
        user: String,
    },

    /// Show document and chunk counts
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl DocumentsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let assistant = build_assistant(config)?;

        match &self.action {
            DocumentsAction::List { json } => {
                let documents = assistant.list_documents()?;

                if *json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&documents).unwrap_or_default()
                    );
                } else if documents.is_empty() {
                    println!("No documents.");
                } else {
                    for doc in &documents {
                        println!(
                            "{}  {} ({}, {} chunks, visible to: {})",
                            doc.id,
                            doc.title,
                            doc.source.as_str(),
                            doc.chunk_count,
                            if doc.permissions.is_empty() {
                                "owner only".to_string()
                            } else {
                                doc.permissions.join(", ")
                            }
                        );
                    }
                }
            }

            DocumentsAction::Delete { id } => {
                assistant.delete_document(id)?;
                println!("Deleted '{}'", id);
            }

            DocumentsAction::Grant { id, user } => {
                assistant.grant(id, user)?;
                println!("Granted '{}' access to '{}'", user, id);
            }

            DocumentsAction::Revoke { id, user } => {
                assistant.revoke(id, user)?;
                println!("Revoked '{}' access to '{}'", user, id);
            }

            DocumentsAction::Stats { json } => {
                let stats = assistant.stats()?;

                if *json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&stats).unwrap_or_default()
                    );
                } else {
                    println!("Documents: {}", stats.documents);
                    println!("Chunks:    {}", stats.chunks);
                }
            }
        }

        Ok(())
    }
}
