//! rawread CLI
//!
//! Command-line interface for rawread:
//! - Run a raw read against a server
//! - Compile a filter locally and show the predicate tree
//! - Check server status
//! - Generate a default config file

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use rawread::api::dto::HealthResponse;
use rawread::config::generate_default_config;
use rawread::query::compile;
use rawread::remote::{decode_response, decompress, Compression, Format, ReadResponse};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rawread-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Raw reads from a time-series store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8086", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read raw series from the server
    Read {
        #[command(flatten)]
        filter: FilterArgs,
        /// Request protobuf instead of JSON
        #[arg(long)]
        protobuf: bool,
        /// Ask for an LZ4 compressed body
        #[arg(long)]
        lz4: bool,
    },

    /// Compile a filter locally and print the resulting read request
    Compile {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show server status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct FilterArgs {
    /// Database
    #[arg(short, long)]
    db: String,
    /// Retention policy (default: the server's default)
    #[arg(long, default_value = "")]
    rp: String,
    /// Measurement
    #[arg(short, long)]
    measurement: String,
    /// Field (default: value)
    #[arg(long, default_value = "")]
    field: String,
    /// Filter expression, e.g. "host = 'a' AND time > now() - 1h"
    #[arg(short, long = "where", default_value = "")]
    where_clause: String,
    /// Maximum number of series (0 = unlimited)
    #[arg(long, default_value = "0")]
    slimit: i64,
    /// Maximum number of samples (0 = unlimited)
    #[arg(long, default_value = "0")]
    limit: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Read {
            filter,
            protobuf,
            lz4,
        } => {
            let format = if protobuf { Format::Protobuf } else { Format::Json };
            let compression = if lz4 { Compression::Lz4 } else { Compression::None };

            let mut request = client
                .get(format!("{}/api/v1/raw", cli.api_url))
                .header(reqwest::header::ACCEPT, format.content_type())
                .query(&[
                    ("db", filter.db.as_str()),
                    ("rp", filter.rp.as_str()),
                    ("measurement", filter.measurement.as_str()),
                    ("field", filter.field.as_str()),
                    ("where", filter.where_clause.as_str()),
                ])
                .query(&[("slimit", filter.slimit), ("limit", filter.limit)]);
            if let Some(encoding) = compression.content_encoding() {
                request = request.header(reqwest::header::ACCEPT_ENCODING, encoding);
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("Cannot connect to rawread at {}", cli.api_url))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                bail!("Read failed ({}): {}", status, text);
            }

            let compressed = response
                .headers()
                .get(reqwest::header::CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(|v| Compression::from_accept_encoding(Some(v)))
                .unwrap_or_default();
            let body = response.bytes().await?;
            let body = decompress(&body, compressed)?;
            let data = decode_response(&body, format)?;

            match cli.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&data)?),
                _ => print_table(&data),
            }
        }

        Commands::Compile { filter } => {
            let request = compile(
                &filter.db,
                &filter.rp,
                &filter.measurement,
                &filter.field,
                &filter.where_clause,
                Utc::now(),
            )?;

            match cli.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&request)?),
                _ => {
                    println!("Database:  {}", request.source.database);
                    println!("Retention: {}", request.source.retention_policy);
                    println!("Start:     {}", format_nanos(request.range.start));
                    println!("End:       {}", format_nanos(request.range.end));
                    match &request.predicate {
                        Some(predicate) => println!("Predicate: {}", predicate),
                        None => println!("Predicate: (none)"),
                    }
                }
            }
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await
                .with_context(|| format!("Cannot connect to rawread at {}", cli.api_url))?;

            if !response.status().is_success() {
                bail!("API returned error: {}", response.status());
            }
            let health: HealthResponse = response.json().await?;

            println!("rawread v{}", health.version);
            println!();
            println!("API Status: {}", health.status);
            println!("Storage:    {}", health.storage);
            println!("Uptime:     {}", format_duration(health.uptime_seconds));
        }

        Commands::Config { output } => {
            let config = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, &config)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", config),
            }
        }
    }

    Ok(())
}

fn print_table(data: &ReadResponse) {
    let series = data.timeseries();
    if series.is_empty() {
        println!("No series matched");
        return;
    }

    for ts in series {
        let labels: Vec<String> = ts
            .labels
            .iter()
            .map(|l| format!("{}={}", l.name, l.value))
            .collect();
        println!("{{{}}}", labels.join(", "));
        println!("{:<26} | {}", "Time", "Value");
        println!("{}", "-".repeat(40));
        for sample in &ts.samples {
            let time = chrono::DateTime::from_timestamp_millis(sample.timestamp_ms)
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
                .unwrap_or_else(|| sample.timestamp_ms.to_string());
            println!("{:<26} | {}", time, sample.value);
        }
        println!();
    }

    println!(
        "{} series, {} samples",
        series.len(),
        data.sample_count()
    );
}

fn format_nanos(ns: i64) -> String {
    let dt = chrono::DateTime::from_timestamp(ns.div_euclid(1_000_000_000), ns.rem_euclid(1_000_000_000) as u32);
    match dt {
        Some(dt) => format!("{} ({})", dt.to_rfc3339(), ns),
        None => ns.to_string(),
    }
}

fn format_duration(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, secs % 60)
    }
}
