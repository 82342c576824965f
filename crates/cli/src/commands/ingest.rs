//! Ingest command handler.

use crate::commands::build_assistant;
use atrium_core::{AppConfig, AppError, AppResult};
use atrium_knowledge::{IngestReceipt, IngestRequest, IngestSource};
use clap::Args;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ingest documents from files or URLs
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(long)]
    pub path: Vec<PathBuf>,

    /// URLs to fetch and ingest
    #[arg(long)]
    pub url: Vec<String>,

    /// Explicit document id (single source only)
    #[arg(long)]
    pub id: Option<String>,

    /// Document title (defaults to file name or URL)
    #[arg(long)]
    pub title: Option<String>,

    /// Acting user identity (becomes the owner)
    #[arg(short, long, env = "ATRIUM_USER", default_value = "local")]
    pub user: String,

    /// Identities granted access (repeatable)
    #[arg(long = "allow")]
    pub permissions: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

const INGESTABLE_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "json", "html"];

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("md") | Some("markdown") => "text/markdown",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("html") => "text/html",
        _ => "text/plain",
    }
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let files = self.collect_files()?;
        if files.is_empty() && self.url.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "nothing to ingest: pass --path or --url".to_string(),
            ));
        }
        if self.id.is_some() && files.len() + self.url.len() > 1 {
            return Err(AppError::InvalidConfiguration(
                "--id applies to a single source".to_string(),
            ));
        }

        let assistant = build_assistant(config)?;
        let mut receipts = Vec::new();

        for file in files {
            let data = std::fs::read(&file)?;
            let title = self.title.clone().unwrap_or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string())
            });

            let receipt = assistant
                .ingest(IngestRequest {
                    document_id: self.id.clone(),
                    title,
                    source: IngestSource::Bytes {
                        data,
                        mime: mime_for(&file).to_string(),
                    },
                    owner: self.user.clone(),
                    permissions: self.permissions.clone(),
                })
                .await?;
            receipts.push(receipt);
        }

        for url in &self.url {
            let receipt = assistant
                .ingest(IngestRequest {
                    document_id: self.id.clone(),
                    title: self.title.clone().unwrap_or_else(|| url.clone()),
                    source: IngestSource::Url(url.clone()),
                    owner: self.user.clone(),
                    permissions: self.permissions.clone(),
                })
                .await?;
            receipts.push(receipt);
        }

        self.report(&receipts);
        Ok(())
    }

    /// Expand `--path` arguments: files pass through, directories are
    /// walked for ingestable extensions.
    fn collect_files(&self) -> AppResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        for path in &self.path {
            if path.is_file() {
                files.push(path.clone());
            } else if path.is_dir() {
                for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let ext = entry
                        .path()
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("");
                    if INGESTABLE_EXTENSIONS.contains(&ext) {
                        files.push(entry.path().to_path_buf());
                    }
                }
            } else {
                return Err(AppError::InvalidConfiguration(format!(
                    "no such file or directory: {:?}",
                    path
                )));
            }
        }

        files.sort();
        Ok(files)
    }

    fn report(&self, receipts: &[IngestReceipt]) {
        if self.json {
            let output: Vec<_> = receipts
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "documentId": r.document_id,
                        "chunkCount": r.chunk_count,
                        "byteCount": r.byte_count,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_default()
            );
        } else {
            for receipt in receipts {
                println!(
                    "Ingested '{}' ({} chunks, {} bytes)",
                    receipt.document_id, receipt.chunk_count, receipt.byte_count
                );
            }
        }
    }
}
