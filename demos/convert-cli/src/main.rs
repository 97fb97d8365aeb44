//! convert-cli - Interactive client for the tzlink conversion service
//!
//! A line-oriented stand-in for the original graphical form: connect and
//! disconnect drive the client state machine, convert issues requests,
//! and the supplementary feed prints asynchronously after a conversion.

mod feed;

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use tzlink_client::{ClientConfig, ConverterClient, SupplementaryFeed};
use tzlink_convert::{LocalConverter, TimeConversion, ZoneOffsetResolver};
use tzlink_core::{
    CivilTimestamp, ConversionRequest, ConversionResult, TzResult, ZoneId, DEFAULT_HOST,
    DEFAULT_REGISTRY_PORT,
};

use crate::feed::HttpFeed;

/// The remote service and the in-process converter implement the same
/// contract; this flag is the only place the choice is made.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    Remote,
    Local,
}

#[derive(Parser, Debug)]
#[command(
    name = "convert-cli",
    about = "Interactive time zone conversion client",
    version
)]
struct Args {
    /// Conversion backend
    #[arg(long, value_enum, default_value_t = Backend::Remote)]
    backend: Backend,

    /// Registry host for connect
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Registry port for connect
    #[arg(long, default_value_t = DEFAULT_REGISTRY_PORT)]
    port: u16,

    /// Skip the supplementary news/history feed
    #[arg(long)]
    no_feed: bool,
}

struct App {
    backend: Backend,
    client: ConverterClient,
    local: LocalConverter,
    feed: Option<Arc<HttpFeed>>,
    twelve_hour: bool,
    host: String,
    port: u16,
}

impl App {
    fn converter(&self) -> &dyn TimeConversion {
        match self.backend {
            Backend::Remote => &self.client,
            Backend::Local => &self.local,
        }
    }

    fn render(&self, result: &ConversionResult) -> String {
        if self.twelve_hour {
            result
                .timestamp
                .as_naive()
                .format("%Y-%m-%d %I:%M:%S %p")
                .to_string()
        } else {
            result.timestamp.to_string()
        }
    }

    async fn convert(&self, date: &str, time: &str, from: &str, to: &str) -> TzResult<String> {
        let timestamp = match CivilTimestamp::parse_lenient(&format!("{} {}", date, time)) {
            Ok(ts) => ts,
            Err(_) => {
                let date = date
                    .parse::<chrono::NaiveDate>()
                    .map_err(|_| tzlink_core::TzError::MalformedTimestamp(date.to_string()))?;
                CivilTimestamp::from_date_and_time_input(date, time)?
            }
        };
        let request = ConversionRequest::new(timestamp, ZoneId::new(from)?, ZoneId::new(to)?);

        let result = self.converter().convert(&request).await?;
        let rendered = self.render(&result);

        // Display-only: the feed runs on its own task and never blocks or
        // fails the conversion
        if let Some(feed) = &self.feed {
            let feed = Arc::clone(feed);
            let zone = request.to_zone.clone();
            let date = request.timestamp.date();
            tokio::spawn(async move {
                match feed.fetch(&zone, date).await {
                    Ok(text) => println!("\n{}", text),
                    Err(e) => println!("\n(feed unavailable: {})", e),
                }
            });
        }

        Ok(rendered)
    }
}

const HELP: &str = "commands:
  connect [host] [port]   connect to the conversion server
  disconnect              drop the connection
  status                  show connection state
  convert <date> <time> <from-zone> <to-zone>
                          e.g. convert 2023-01-01 14:30 America/Anchorage Pacific/Honolulu
  zones [filter]          list zone identifiers
  format 12|24            output format (default 12-hour)
  quit";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let mut app = App {
        backend: args.backend,
        client: ConverterClient::new(ClientConfig::default()),
        local: LocalConverter::new(),
        feed: (!args.no_feed).then(|| Arc::new(HttpFeed::new())),
        twelve_hour: true,
        host: args.host,
        port: args.port,
    };

    println!("tzlink convert-cli ({:?} backend)", app.backend);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt().await;
        let Ok(Some(line)) = lines.next_line().await else {
            break;
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["quit"] | ["exit"] => break,
            ["help"] => println!("{}", HELP),
            ["connect", rest @ ..] => {
                if app.backend == Backend::Local {
                    println!("local backend needs no connection");
                    continue;
                }
                if let Some(host) = rest.first() {
                    app.host = host.to_string();
                }
                if let Some(port) = rest.get(1).and_then(|p| p.parse().ok()) {
                    app.port = port;
                }
                match app.client.connect(&app.host, app.port).await {
                    Ok(()) => println!("connected to {}:{}", app.host, app.port),
                    Err(e) => println!("connect failed: {}", e),
                }
            }
            ["disconnect"] => {
                app.client.disconnect().await;
                println!("disconnected");
            }
            ["status"] => match app.backend {
                Backend::Local => println!("local backend (always ready)"),
                Backend::Remote => println!("{:?}", app.client.status().await),
            },
            ["convert", date, time_a, time_b, from, to] => {
                // 12-hour input arrives as two tokens: "2:30 PM"
                let time = format!("{} {}", time_a, time_b);
                report(app.convert(date, &time, from, to).await);
            }
            ["convert", date, time, from, to] => {
                report(app.convert(date, time, from, to).await);
            }
            ["zones", rest @ ..] => {
                let filter = rest.first().copied().unwrap_or("");
                let zones: Vec<&str> = ZoneOffsetResolver::available_zones()
                    .into_iter()
                    .filter(|z| z.contains(filter))
                    .collect();
                for zone in zones.iter().take(20) {
                    println!("  {}", zone);
                }
                if zones.len() > 20 {
                    println!("  ... and {} more", zones.len() - 20);
                }
            }
            ["format", "12"] => app.twelve_hour = true,
            ["format", "24"] => app.twelve_hour = false,
            _ => println!("unrecognized command, try: help"),
        }
    }
}

fn report(outcome: TzResult<String>) {
    match outcome {
        Ok(rendered) => println!("converted time: {}", rendered),
        Err(e) => println!("error: {}", e),
    }
}

async fn print_prompt() {
    let mut stdout = tokio::io::stdout();
    let _ = stdout.write_all(b"> ").await;
    let _ = stdout.flush().await;
}
