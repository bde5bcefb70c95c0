use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::auth::Token;
use crate::github::GitHubClient;
use crate::metrics;
use crate::store::Store;
use crate::sync::SyncRunner;

#[derive(Parser)]
#[command(name = "shiplens")]
#[command(author, version, about = "Delivery Performance Insights Tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output file path (defaults to stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Pretty print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one incremental sync against GitHub
    Sync {
        /// GitHub API token (optional, required for private repositories
        /// and project boards)
        #[arg(short, long, env = "GH_TOKEN")]
        token: Option<String>,

        /// GitHub API base URL
        #[arg(short, long, default_value = "https://api.github.com")]
        url: String,

        /// Repository in owner/name form
        #[arg(short, long)]
        repo: String,

        /// Organization that owns the project board
        #[arg(short = 'O', long, env = "OWNER")]
        owner: String,

        /// Project board number carrying issue statuses
        #[arg(short = 'n', long, default_value_t = 3)]
        project: i64,

        /// SQLite database path
        #[arg(short, long, default_value = "metrics.db")]
        db: PathBuf,

        /// Snapshot export path
        #[arg(short, long, default_value = "metrics.json")]
        export: PathBuf,
    },

    /// Summarize delivery metrics from the local store
    Report {
        /// SQLite database path
        #[arg(short, long, default_value = "metrics.db")]
        db: PathBuf,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Sync {
                token,
                url,
                repo,
                owner,
                project,
                db,
                export,
            } => {
                info!("Syncing delivery metrics for repository: {repo}");

                let token = token.as_deref().map(Token::from);
                let client = GitHubClient::new(url, token)?;
                let mut store = Store::open(db)?;

                let runner =
                    SyncRunner::new(client, owner.clone(), repo.clone(), *project);
                let (report, snapshot) = runner.run(&mut store).await?;

                // Snapshot export always lands on disk; the report follows
                // the global output flags.
                let snapshot_json = self.to_json(&snapshot)?;
                std::fs::write(export, snapshot_json)?;
                info!("Snapshot exported to: {}", export.display());

                self.write_output(&self.to_json(&report)?)?;
                Ok(())
            }
            Commands::Report { db } => {
                let store = Store::open(db)?;
                let insights = metrics::delivery_insights(&store.snapshot()?, Utc::now());

                self.write_output(&self.to_json(&insights)?)?;
                Ok(())
            }
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(json)
    }

    fn write_output(&self, json: &str) -> Result<()> {
        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json)?;
            info!("Output written to: {}", output_path.display());
        } else {
            println!("{json}");
        }
        Ok(())
    }
}
