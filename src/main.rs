use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clicktrail::collector::{create_collector_router, CollectorState, TRACK_PATH};
use clicktrail::config::Config;
use clicktrail::page::{ClickEvent, Document, Element, PageContext};
use clicktrail::tracking::{
    build_listener, AnalyticsTag, ClickOutcome, DataLayer, NavigationOutcome, NavigationRequest,
    Navigator,
};

#[derive(Parser)]
#[command(name = "clicktrail")]
#[command(about = "Outbound affiliate click tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the first-party ingestion endpoint
    Serve,
    /// Replay a click on a single anchor through the tracking pipeline
    Track {
        /// URL of the page the click happens on (attribution is read from its query)
        #[arg(long)]
        page_url: String,
        /// Raw href of the clicked anchor
        #[arg(long)]
        href: String,
        /// Visible link text
        #[arg(long, default_value = "")]
        text: String,
        /// Anchor data attribute as key=value, without the `data-` prefix (repeatable)
        #[arg(long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,
        /// Mirror the event into an in-memory tag-manager data layer and print it
        #[arg(long)]
        data_layer: bool,
    },
}

/// Reports deferred navigations instead of opening anything
struct LogNavigator;

impl Navigator for LogNavigator {
    fn open(&self, request: NavigationRequest) {
        info!(
            url = %request.url,
            features = %request.features(),
            "opening destination in new context"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!("Loaded configuration");

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Track {
            page_url,
            href,
            text,
            data,
            data_layer,
        } => track(config, &page_url, &href, &text, &data, data_layer).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let server = &config.collector_server;
    let state = Arc::new(CollectorState::new(Duration::from_secs(
        server.dedup_ttl_secs,
    )));
    let router = create_collector_router(state);

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind collector on {addr}"))?;
    info!("🚀 Collector listening on http://{}{}", addr, TRACK_PATH);

    axum::serve(listener, router).await?;
    Ok(())
}

async fn track(
    config: Config,
    page_url: &str,
    href: &str,
    text: &str,
    data: &[String],
    with_data_layer: bool,
) -> Result<()> {
    let page = PageContext::parse(page_url)?;

    let mut anchor = Element::new("a").with_attr("href", href);
    for pair in data {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("--data expects KEY=VALUE, got '{pair}'");
        };
        anchor = anchor.with_attr(format!("data-{}", key.trim_start_matches("data-")), value);
    }

    let mut document = Document::new();
    let body = document.append_element(None, Element::new("body"));
    let anchor = document.append_element(Some(body), anchor);
    document.append_text(anchor, text);

    let layer = DataLayer::new();
    let mut tags: Vec<Arc<dyn AnalyticsTag>> = Vec::new();
    if with_data_layer {
        tags.push(Arc::new(layer.clone()));
    }

    let (listener, queue) = build_listener(&config.tracker, tags, Arc::new(LogNavigator));

    match listener.handle_click(&document, &ClickEvent::on(anchor), &page) {
        ClickOutcome::Ignored => {
            println!("Link is not trackable; no event composed.");
        }
        ClickOutcome::Tracked {
            event,
            report,
            navigation,
        } => {
            println!("{}", serde_json::to_string_pretty(&event)?);
            info!(
                primary = ?report.primary,
                tags = report.tags_attempted,
                tags_failed = report.tags_failed,
                prevents_default = navigation.prevents_default(),
                "click dispatched"
            );
            if with_data_layer {
                println!("{}", serde_json::to_string_pretty(&layer.entries())?);
            }
            if let NavigationOutcome::Deferred {
                timer: Some(timer), ..
            } = navigation
            {
                timer.await?;
            }
        }
    }

    // Drain queued beacons before the process exits.
    if let Some(queue) = queue {
        queue.shutdown().await;
    }
    Ok(())
}
