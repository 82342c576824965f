//! Export command handler.

use crate::commands::build_assistant;
use atrium_core::{AppConfig, AppResult};
use clap::Args;
use std::path::PathBuf;

/// Export a conversation as JSON
#[derive(Args, Debug)]
pub struct ExportCommand {
    /// Conversation id
    #[arg(long, default_value = "default")]
    pub conversation: String,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ExportCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let assistant = build_assistant(config)?;
        let json = assistant.export_conversation(&self.conversation)?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, &json)?;
                println!("Exported conversation '{}' to {:?}", self.conversation, path);
            }
            None => println!("{}", json),
        }

        Ok(())
    }
}
