//! # scout — command-line contact search
//!
//! - `scout configure --endpoint <url>` — Write the config file and pull
//!   the queue/agent roster.
//! - `scout search ...` — Run one search and print a table (or JSON).
//!
//! Credentials come from the `SCOUT_API_TOKEN` environment variable and are
//! never written to disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scout_core::{ContactRecord, RawCriterion, RawSearchInput, ResultSet, SearchError};
use scout_engine::client::SearchApi;
use scout_engine::directory::Roster;
use scout_engine::fetch::{FetchCaps, RetryPolicy};
use scout_engine::http::{AuthToken, HttpVendorClient};
use scout_engine::translate::VendorLimits;
use scout_engine::{EngineConfig, SearchEngine};

#[derive(Parser)]
#[command(name = "scout", version, about, long_about = None)]
struct Cli {
    /// Path to the config file.
    #[arg(long, default_value = "scout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the config file and fetch the queue/agent roster.
    Configure {
        /// Vendor API base URL.
        #[arg(long)]
        endpoint: String,

        /// Skip the roster fetch (names won't resolve until one runs).
        #[arg(long)]
        skip_roster: bool,
    },

    /// Re-fetch the queue/agent roster.
    Roster,

    /// Search contacts.
    Search {
        /// Queue, by name or identifier.
        #[arg(long)]
        queue: Option<String>,

        /// Agent, by username or identifier.
        #[arg(long)]
        agent: Option<String>,

        /// Exact-match attribute criterion, as key=value. Repeatable.
        #[arg(long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,

        /// Substring attribute criterion, as key=value. Repeatable.
        #[arg(long = "contains", value_name = "KEY=VALUE")]
        contains: Vec<String>,

        /// Numeric range criterion, as key=lo..hi. Repeatable.
        #[arg(long = "range", value_name = "KEY=LO..HI")]
        ranges: Vec<String>,

        /// Start of the time window (RFC 3339, YYYY-MM-DD, or epoch millis).
        #[arg(long)]
        since: Option<String>,

        /// End of the time window.
        #[arg(long)]
        until: Option<String>,

        /// Stop after this many pages per sub-query.
        #[arg(long)]
        max_pages: Option<usize>,

        /// Stop after this many records per sub-query.
        #[arg(long)]
        max_results: Option<usize>,

        /// Override the configured deadline, in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Emit the raw result set as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

// =============================================================================
// Config
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Config {
    endpoint: String,
    #[serde(default = "default_page_size")]
    page_size: u32,
    #[serde(default = "default_concurrency")]
    concurrency: usize,
    #[serde(default = "default_deadline_secs")]
    deadline_secs: u64,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    retry_base_ms: u64,
    #[serde(default = "default_max_clauses")]
    max_clauses_per_call: usize,
    #[serde(default = "default_max_window_days")]
    max_window_days: i64,
    #[serde(default = "default_roster_path")]
    roster_path: PathBuf,
}

fn default_page_size() -> u32 {
    100
}
fn default_concurrency() -> usize {
    4
}
fn default_deadline_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    200
}
fn default_max_clauses() -> usize {
    1
}
fn default_max_window_days() -> i64 {
    7
}
fn default_roster_path() -> PathBuf {
    PathBuf::from("roster.json")
}

impl Config {
    fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            page_size: default_page_size(),
            concurrency: default_concurrency(),
            deadline_secs: default_deadline_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            max_clauses_per_call: default_max_clauses(),
            max_window_days: default_max_window_days(),
            roster_path: default_roster_path(),
        }
    }

    fn load(path: &PathBuf) -> Result<Config, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("bad config {}: {}", path.display(), e))
    }

    fn save(&self, path: &PathBuf) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("cannot serialize config: {}", e))?;
        std::fs::write(path, content)
            .map_err(|e| format!("cannot write config {}: {}", path.display(), e))
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            limits: VendorLimits {
                max_clauses_per_call: self.max_clauses_per_call,
                max_window_ms: self.max_window_days * 24 * 60 * 60 * 1000,
                page_size: self.page_size,
            },
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: Duration::from_millis(self.retry_base_ms),
            },
            caps: FetchCaps::default(),
            concurrency: self.concurrency,
            deadline: Duration::from_secs(self.deadline_secs),
        }
    }
}

fn api_token() -> Result<AuthToken, String> {
    std::env::var("SCOUT_API_TOKEN")
        .map(AuthToken::new)
        .map_err(|_| "SCOUT_API_TOKEN is not set".to_string())
}

// =============================================================================
// Output
// =============================================================================

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "CONTACT")]
    contact_id: String,
    #[tabled(rename = "INITIATED")]
    initiated: String,
    #[tabled(rename = "QUEUE")]
    queue: String,
    #[tabled(rename = "AGENT")]
    agent: String,
    #[tabled(rename = "ATTRIBUTES")]
    attributes: String,
}

impl Row {
    fn from_record(record: &ContactRecord, roster: Option<&Roster>) -> Row {
        let initiated = chrono::DateTime::from_timestamp_millis(record.initiated_at_ms)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| record.initiated_at_ms.to_string());
        let queue = record
            .queue
            .as_deref()
            .map(|id| decorate(id, roster.and_then(|r| r.queue_name(id))))
            .unwrap_or_default();
        let agent = record
            .agent
            .as_deref()
            .map(|id| decorate(id, roster.and_then(|r| r.agent_username(id))))
            .unwrap_or_default();
        let mut attrs: Vec<String> = record
            .attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        attrs.sort();
        Row {
            contact_id: record.contact_id.clone(),
            initiated,
            queue,
            agent,
            attributes: attrs.join(" "),
        }
    }
}

fn decorate(id: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{} ({})", name, id),
        None => id.to_string(),
    }
}

fn print_results(set: &ResultSet, roster: Option<&Roster>, json: bool) {
    if json {
        match serde_json::to_string_pretty(set) {
            Ok(raw) => println!("{}", raw),
            Err(e) => eprintln!("Error: cannot serialize results: {}", e),
        }
        return;
    }

    if set.records.is_empty() {
        println!("No contacts matched.");
    } else {
        let rows: Vec<Row> = set
            .records
            .iter()
            .map(|r| Row::from_record(r, roster))
            .collect();
        println!("{}", Table::new(rows));
    }
    println!(
        "{} contact(s), {} request(s), {} page(s), {} ms",
        set.total, set.requests_issued, set.pages_fetched, set.elapsed_ms
    );
}

// =============================================================================
// Input assembly
// =============================================================================

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_input(
    roster: Option<&Roster>,
    queue: Option<String>,
    agent: Option<String>,
    attrs: &[String],
    contains: &[String],
    ranges: &[String],
    since: Option<String>,
    until: Option<String>,
) -> Result<RawSearchInput, String> {
    let mut criteria = Vec::new();

    if let Some(reference) = queue {
        let id = roster
            .and_then(|r| r.resolve_queue(&reference))
            .map(str::to_string)
            .unwrap_or(reference);
        criteria.push(RawCriterion {
            attribute: "queue".into(),
            op: "equals".into(),
            value: id,
        });
    }
    if let Some(reference) = agent {
        let id = roster
            .and_then(|r| r.resolve_agent(&reference))
            .map(str::to_string)
            .unwrap_or(reference);
        criteria.push(RawCriterion {
            attribute: "agent".into(),
            op: "equals".into(),
            value: id,
        });
    }
    for raw in attrs {
        let (attribute, value) = parse_pair(raw)?;
        criteria.push(RawCriterion {
            attribute,
            op: "equals".into(),
            value,
        });
    }
    for raw in contains {
        let (attribute, value) = parse_pair(raw)?;
        criteria.push(RawCriterion {
            attribute,
            op: "contains".into(),
            value,
        });
    }
    for raw in ranges {
        let (attribute, value) = parse_pair(raw)?;
        criteria.push(RawCriterion {
            attribute,
            op: "in-range".into(),
            value,
        });
    }

    Ok(RawSearchInput {
        criteria,
        start: since,
        end: until,
    })
}

// =============================================================================
// Entry point
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "scout=info,scout_engine=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(message) = run(cli).await {
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Configure {
            endpoint,
            skip_roster,
        } => {
            let config = Config::new(endpoint);
            config.save(&cli.config)?;
            eprintln!("Config written to {}", cli.config.display());
            if !skip_roster {
                fetch_roster(&config).await?;
            }
            Ok(())
        }

        Commands::Roster => {
            let config = Config::load(&cli.config)?;
            fetch_roster(&config).await
        }

        Commands::Search {
            queue,
            agent,
            attrs,
            contains,
            ranges,
            since,
            until,
            max_pages,
            max_results,
            timeout_secs,
            json,
        } => {
            let config = Config::load(&cli.config)?;
            let roster = Roster::load(&config.roster_path).ok();
            if roster.is_none() && (queue.is_some() || agent.is_some()) {
                tracing::warn!(
                    "no roster at {}; queue/agent references are passed through verbatim",
                    config.roster_path.display()
                );
            }

            let input = build_input(
                roster.as_ref(),
                queue,
                agent,
                &attrs,
                &contains,
                &ranges,
                since,
                until,
            )?;

            let mut engine_config = config.engine_config();
            if let Some(pages) = max_pages {
                engine_config.caps.max_pages = pages;
            }
            if let Some(results) = max_results {
                engine_config.caps.max_results = results;
            }
            if let Some(secs) = timeout_secs {
                engine_config.deadline = Duration::from_secs(secs);
            }

            let client: Arc<dyn SearchApi> =
                Arc::new(HttpVendorClient::new(config.endpoint.clone(), api_token()?));
            let engine = SearchEngine::new(client, engine_config);

            match engine.search(input).await {
                Ok(set) => {
                    print_results(&set, roster.as_ref(), json);
                    Ok(())
                }
                Err(SearchError::Timeout { elapsed_ms, partial }) => {
                    eprintln!(
                        "Warning: deadline exceeded after {} ms; showing partial results",
                        elapsed_ms
                    );
                    print_results(&partial, roster.as_ref(), json);
                    Err("search timed out".into())
                }
                Err(err) => Err(err.to_string()),
            }
        }
    }
}

async fn fetch_roster(config: &Config) -> Result<(), String> {
    let client = HttpVendorClient::new(config.endpoint.clone(), api_token()?);
    let roster = Roster::fetch(&client).await?;
    roster.save(&config.roster_path)?;
    eprintln!(
        "Roster written to {} ({} queue(s), {} agent(s))",
        config.roster_path.display(),
        roster.queues.len(),
        roster.agents.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_engine::directory::{AgentSummary, QueueSummary};

    fn roster() -> Roster {
        Roster {
            queues: vec![QueueSummary {
                id: "q-123".into(),
                name: "Sales".into(),
            }],
            agents: vec![AgentSummary {
                id: "a-456".into(),
                username: "jdoe".into(),
            }],
            fetched_at: String::new(),
        }
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("tier=gold").unwrap(),
            ("tier".into(), "gold".into())
        );
        assert!(parse_pair("no-separator").is_err());
        assert!(parse_pair("=value").is_err());
    }

    #[test]
    fn test_build_input_resolves_names() {
        let input = build_input(
            Some(&roster()),
            Some("sales".into()),
            Some("JDOE".into()),
            &[],
            &[],
            &[],
            None,
            None,
        )
        .unwrap();
        assert_eq!(input.criteria[0].value, "q-123");
        assert_eq!(input.criteria[1].value, "a-456");
    }

    #[test]
    fn test_build_input_passes_unknown_references_through() {
        let input = build_input(
            None,
            Some("q-raw".into()),
            None,
            &["tier=gold".into()],
            &["note=vip".into()],
            &["wait_secs=10..20".into()],
            Some("2026-01-01".into()),
            None,
        )
        .unwrap();
        assert_eq!(input.criteria.len(), 4);
        assert_eq!(input.criteria[0].value, "q-raw");
        assert_eq!(input.criteria[1].op, "equals");
        assert_eq!(input.criteria[2].op, "contains");
        assert_eq!(input.criteria[3].op, "in-range");
        assert_eq!(input.start.as_deref(), Some("2026-01-01"));
    }
}
