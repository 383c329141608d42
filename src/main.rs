mod checkpoint;
mod config;
mod crawler;
mod excel_writer;
mod images;
mod ledger;
mod models;
mod parser;
mod scraper;

use anyhow::Result;
use std::future::Future;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber;

use crate::config::Config;
use crate::crawler::Crawler;
use crate::scraper::StoreScraper;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting 24S catalog scraper");

    let config = Config::from_env();
    if !config.headless {
        info!("Running in headed mode (browser visible)");
    }

    let scraper = StoreScraper::new(&config).await?;

    let finished = run_sessions(
        config.session_attempts,
        || run_session(&config, &scraper),
        |prompt| wait_for_operator(prompt),
    )
    .await?;

    close_quietly(scraper.close()).await;

    if !finished {
        error!("All {} session attempts failed", config.session_attempts);
        wait_for_operator("Press Enter to close the script...").await?;
    }
    Ok(())
}

/// One pass from the saved checkpoint to the last listing page.
async fn run_session(config: &Config, scraper: &StoreScraper) -> Result<()> {
    let mut crawler = Crawler::new(config, scraper)?;
    let stats = crawler.run().await?;
    info!(
        "Scraping complete! {} pages, {} products ({} new rows), {} failed. Data saved to {} and {}",
        stats.pages,
        stats.products,
        stats.rows,
        stats.failed,
        config.ledger_path.display(),
        config.workbook_path.display()
    );
    Ok(())
}

/// Runs `session` until it succeeds or `attempts` are used up, pausing for
/// the operator between failed attempts. Returns whether a session finished.
async fn run_sessions<S, SF, P, PF>(attempts: u32, mut session: S, mut pause: P) -> Result<bool>
where
    S: FnMut() -> SF,
    SF: Future<Output = Result<()>>,
    P: FnMut(&'static str) -> PF,
    PF: Future<Output = Result<()>>,
{
    for attempt in 1..=attempts {
        match session().await {
            Ok(()) => return Ok(true),
            Err(e) => {
                error!("An unexpected error occurred (attempt {}/{}): {:?}", attempt, attempts, e);
                if attempt < attempts {
                    pause("Please check the error. Press Enter to continue the script or Ctrl+C to stop...").await?;
                }
            }
        }
    }
    Ok(false)
}

/// A browser that fails to shut down is logged, not fatal.
async fn close_quietly(close: impl Future<Output = Result<()>>) {
    if let Err(e) = close.await {
        error!("Failed to close browser: {:?}", e);
    }
}

async fn wait_for_operator(prompt: &str) -> Result<()> {
    info!("{}", prompt);
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(())
}
