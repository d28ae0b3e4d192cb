use std::path::PathBuf;

use api_router::api_state::ApiState;
use clap::{Parser, Subcommand};
use common::{
    error::AppError,
    storage::types::SOURCE_KEY,
    utils::config::{get_config, AppConfig},
};
use ingestion_pipeline::loader::load_text_file;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Offline access to the stores: ingest text files or ask a single question.
#[derive(Debug, Parser)]
#[command(name = "ingest", version)]
struct Cli {
    /// Text files to load into both vector stores
    #[arg(long, num_args = 1..)]
    files: Vec<PathBuf>,

    /// Override the primary (SurrealDB) store directory
    #[arg(long, global = true)]
    primary_dir: Option<PathBuf>,

    /// Override the secondary (LanceDB) store directory
    #[arg(long, global = true)]
    secondary_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer one question end to end and print the cited sources
    Query {
        /// The question to ask
        question: String,
    },
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.primary_dir {
            config.primary_store_dir = Some(dir.display().to_string());
        }
        if let Some(dir) = &self.secondary_dir {
            config.secondary_store_dir = Some(dir.display().to_string());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let mut config = get_config()?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let state = ApiState::new(&config).await?;

    match cli.command {
        Some(Command::Query { question }) => run_query(&state, &question).await?,
        None => run_ingest(&state, &cli.files).await?,
    }

    Ok(())
}

async fn run_ingest(state: &ApiState, files: &[PathBuf]) -> Result<(), AppError> {
    if files.is_empty() {
        return Err(AppError::Validation(
            "pass at least one file with --files".into(),
        ));
    }

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        documents.push(load_text_file(path).await?);
    }

    let report = state.ingestion.ingest_documents(documents).await?;
    info!(
        documents = report.documents,
        chunks = report.chunks,
        primary = %state.primary.location().display(),
        secondary = %state.secondary.location().display(),
        "Ingestion complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_query(state: &ApiState, question: &str) -> Result<(), AppError> {
    let outcome = state.query.answer(question).await?;

    println!("Answer: {}", outcome.answer);
    let sources: Vec<&str> = outcome
        .sources
        .iter()
        .flatten()
        .map(|metadata| metadata.get(SOURCE_KEY).map_or("N/A", String::as_str))
        .collect();
    println!("Sources: {sources:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_ingest_arguments() {
        let cli = Cli::try_parse_from([
            "ingest",
            "--files",
            "docs/sox.txt",
            "docs/sec.txt",
            "--primary-dir",
            "/tmp/surreal",
        ])
        .expect("parse");

        assert_eq!(cli.files.len(), 2);
        assert!(cli.command.is_none());

        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.primary_store_path(), PathBuf::from("/tmp/surreal"));
        assert_eq!(
            config.secondary_store_path(),
            PathBuf::from("./data").join("lance_store")
        );
    }

    #[test]
    fn test_parses_query_subcommand_with_global_dirs() {
        let cli = Cli::try_parse_from([
            "ingest",
            "query",
            "What are key SOX controls?",
            "--secondary-dir",
            "/tmp/lance",
        ])
        .expect("parse");

        match &cli.command {
            Some(Command::Query { question }) => assert_eq!(question, "What are key SOX controls?"),
            None => panic!("expected query subcommand"),
        }
        assert_eq!(cli.secondary_dir, Some(PathBuf::from("/tmp/lance")));
    }
}
