//! # Cardsmith CLI
//!
//! ```bash
//! # Serve the generation/search API
//! cardsmith serve --listen 0.0.0.0:3001 --pages-url http://localhost:3000
//!
//! # Render one card to disk
//! cardsmith generate --type work-anniversary -f name="Asha Rao" -f years=5 --out card.png
//!
//! # Look up employee records
//! AIRTABLE_TOKEN=... cardsmith search asha
//! ```

use anyhow::{anyhow, Context};
use cardsmith::card::{CardRequest, CardType};
use cardsmith::cdp::CdpLauncher;
use cardsmith::search::{AirtableConfig, AirtableSearch, RecordSearch};
use cardsmith::server::{self, AppState, ServerConfig};
use cardsmith::{CaptureConfig, Generator};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// Cardsmith - personalized greeting card renderer
#[derive(Parser, Debug)]
#[command(name = "cardsmith")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:3001", env = "CARDSMITH_LISTEN")]
        listen: String,

        #[command(flatten)]
        capture: CaptureArgs,

        #[command(flatten)]
        airtable: AirtableArgs,
    },

    /// Render a single card to a PNG file
    Generate {
        /// birthday, work-anniversary or onboarding
        #[arg(long = "type")]
        card_type: CardType,

        /// Field value as id=value (repeatable)
        #[arg(short = 'f', long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,

        #[arg(short, long, default_value = "card.png")]
        out: PathBuf,

        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Search employee records by name
    Search {
        query: String,

        #[command(flatten)]
        airtable: AirtableArgs,
    },
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Origin serving the card pages
    #[arg(long, default_value = "http://localhost:3000", env = "CARDSMITH_PAGES_URL")]
    pages_url: String,

    /// Concurrent browser contexts (defaults to the CPU count)
    #[arg(long, env = "CARDSMITH_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    #[arg(long, default_value_t = 30000, env = "CARDSMITH_NAV_TIMEOUT_MS")]
    navigation_timeout_ms: u64,

    /// Run Chrome with its sandbox enabled
    #[arg(long, env = "CARDSMITH_SANDBOX")]
    sandbox: bool,
}

impl CaptureArgs {
    fn to_config(&self) -> CaptureConfig {
        CaptureConfig {
            pages_base_url: self.pages_url.clone(),
            navigation_timeout_ms: self.navigation_timeout_ms,
            sandbox: self.sandbox,
            ..Default::default()
        }
    }

    fn generator(&self) -> cardsmith::Result<Generator<CdpLauncher>> {
        match self.max_concurrent {
            Some(n) => Generator::with_max_concurrent(CdpLauncher, self.to_config(), n),
            None => Generator::new(CdpLauncher, self.to_config()),
        }
    }
}

#[derive(Args, Debug)]
struct AirtableArgs {
    #[arg(long, default_value = "https://api.airtable.com/v0", env = "AIRTABLE_API_URL")]
    airtable_url: String,

    #[arg(long, default_value = "", env = "AIRTABLE_BASE", hide_env_values = true)]
    airtable_base: String,

    #[arg(long, default_value = "", env = "AIRTABLE_TABLE")]
    airtable_table: String,

    #[arg(long, default_value = "", env = "AIRTABLE_TOKEN", hide_env_values = true)]
    airtable_token: String,
}

impl AirtableArgs {
    fn search(&self) -> cardsmith::Result<AirtableSearch> {
        let config = AirtableConfig {
            api_url: self.airtable_url.clone(),
            base_id: self.airtable_base.clone(),
            table_id: self.airtable_table.clone(),
            token: self.airtable_token.clone(),
        };
        if !config.is_configured() {
            warn!("Airtable base, table or token not set; searches will fail");
        }
        AirtableSearch::new(config)
    }
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    let (id, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected id=value, got '{}'", s))?;
    if id.trim().is_empty() {
        return Err("field id is empty".to_string());
    }
    Ok((id.trim().to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            listen,
            capture,
            airtable,
        } => {
            let state = AppState::new(capture.generator()?, Arc::new(airtable.search()?));
            server::serve(ServerConfig { listen_addr: listen }, state).await?;
        }
        Commands::Generate {
            card_type,
            fields,
            out,
            capture,
        } => {
            let request = CardRequest {
                card_type: Some(card_type.to_string()),
                fields: fields
                    .into_iter()
                    .map(|(id, value)| (id, serde_json::Value::String(value)))
                    .collect(),
            };
            let png = capture.generator()?.generate_request(request).await?;
            std::fs::write(&out, &png).with_context(|| format!("writing {}", out.display()))?;
            info!("Wrote {} ({} bytes)", out.display(), png.len());
        }
        Commands::Search { query, airtable } => {
            let records = airtable.search()?.search(&query).await?;
            if records.is_empty() {
                return Err(anyhow!("no records match '{}'", query));
            }
            for record in records {
                println!(
                    "{}\t{}\t{}",
                    record.id,
                    record.fields.name,
                    record.photo_url().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}
