use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use std::collections::HashSet;
use std::future::Future;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::excel_writer::export_workbook;
use crate::images::ImageDownloader;
use crate::ledger::{is_scraped, ProductLedger};
use crate::models::Product;
use crate::parser;
use crate::scraper::Storefront;

/// Totals for one crawl session.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub pages: u32,
    pub products: usize,
    pub rows: usize,
    pub failed: usize,
}

pub struct Crawler<'a, S> {
    config: &'a Config,
    scraper: &'a S,
    images: ImageDownloader,
    checkpoint: Checkpoint,
    ledger: ProductLedger,
    /// Loaded once per session from the ledger.
    scraped: HashSet<String>,
}

impl<'a, S: Storefront> Crawler<'a, S> {
    pub fn new(config: &'a Config, scraper: &'a S) -> Result<Self> {
        let ledger = ProductLedger::open(&config.ledger_path)?;
        let scraped = ledger.scraped_urls();
        info!(
            "Loaded {} rows ({} products) from {}",
            ledger.row_count(),
            scraped.len(),
            ledger.path().display()
        );
        export_workbook(&ledger.products()?, &config.workbook_path)?;

        Ok(Self {
            config,
            scraper,
            images: ImageDownloader::new(&config.image_dir)?,
            checkpoint: Checkpoint::new(&config.checkpoint_path),
            ledger,
            scraped,
        })
    }

    /// Walks listing pages after the checkpoint up to the last page.
    pub async fn run(&mut self) -> Result<CrawlStats> {
        let start = Url::parse(&self.config.start_url)
            .with_context(|| format!("Invalid start url {}", self.config.start_url))?;

        self.scraper.open(start.as_str()).await?;
        self.scraper.handle_popups().await;
        let html = self.scraper.html().await?;
        let total = parser::total_pages(&html)
            .ok_or_else(|| anyhow!("No page count on {}; the listing markup may have changed", start))?;

        let pages = pages_to_crawl(self.checkpoint.load()?, total)?;
        let mut stats = CrawlStats::default();
        if pages.is_empty() {
            info!("All {} pages already scraped", total);
            return Ok(stats);
        }

        for page in pages {
            info!("Scraping page {} of {}", page, total);
            self.scrape_listing_page(&start, page, &mut stats).await?;
            export_workbook(&self.ledger.products()?, &self.config.workbook_path)?;
            self.checkpoint.save(page)?;
            stats.pages += 1;
        }

        Ok(stats)
    }

    async fn scrape_listing_page(&mut self, start: &Url, page: u32, stats: &mut CrawlStats) -> Result<()> {
        let page_url = listing_page_url(start, page);
        self.scraper.open(&page_url).await?;
        self.scraper.handle_popups().await;
        let html = self.scraper.html().await?;

        let links = parser::product_links(&html, start);
        let pending = pending_urls(links, &self.scraped);
        info!("Found {} new products on page {}", pending.len(), page);

        for (idx, url) in pending.iter().enumerate() {
            info!("[{}/{}] Scraping: {}", idx + 1, pending.len(), url);
            let variants = scrape_with_retry(
                url,
                self.config.product_retries,
                self.config.retry_delay,
                || self.scrape_product(url),
            )
            .await;

            if variants.is_empty() {
                stats.failed += 1;
                continue;
            }
            let written = self.ledger.append(&variants)?;
            stats.products += 1;
            stats.rows += written;
        }
        Ok(())
    }

    /// Scrapes a product page into one record per color variant.
    async fn scrape_product(&self, url: &str) -> Result<Vec<Product>> {
        self.scraper.open(url).await?;
        let html = self.scraper.html().await?;
        let colors = parser::color_variants(&html);

        let mut variants: Vec<Product> = Vec::new();
        if colors.is_empty() {
            let images = self.download_gallery().await?;
            variants.push(parser::parse_product(&html, url, images));
            return Ok(variants);
        }

        for color in &colors {
            if !self.scraper.select_color(color).await? {
                warn!("Color '{}' not found on {}, skipping it", color, url);
                continue;
            }
            self.scraper.settle().await;

            let images = self.download_gallery().await?;
            let variant_url = self.scraper.current_url().await?;
            let variant_html = self.scraper.html().await?;
            keep_distinct(&mut variants, parser::parse_product(&variant_html, &variant_url, images));
        }
        Ok(variants)
    }

    async fn download_gallery(&self) -> Result<Vec<String>> {
        let srcs = self.scraper.gallery_image_urls().await?;
        let urls = parser::filter_gallery(&srcs);
        Ok(self.images.download_all(&urls).await)
    }
}

/// Listing pages still to visit after `checkpoint`; empty once it reaches
/// `total`.
pub fn pages_to_crawl(checkpoint: u32, total: u32) -> Result<RangeInclusive<u32>> {
    let first = checkpoint
        .checked_add(1)
        .ok_or_else(|| anyhow!("Checkpoint {} is past any listing page", checkpoint))?;
    Ok(first..=total)
}

/// Adds `product` unless an identical record was already collected.
pub fn keep_distinct(variants: &mut Vec<Product>, product: Product) {
    if !variants.contains(&product) {
        variants.push(product);
    }
}

pub fn listing_page_url(start: &Url, page: u32) -> String {
    let mut url = start.clone();
    url.set_query(Some(&format!("page={}", page)));
    url.to_string()
}

/// Listing URLs not yet present in the ledger.
pub fn pending_urls(links: Vec<String>, scraped: &HashSet<String>) -> Vec<String> {
    links.into_iter().filter(|url| !is_scraped(scraped, url)).collect()
}

/// Runs `attempt` up to `max_retries + 1` times with a fixed `delay` between
/// tries. Exhausting the retries logs the failure and yields an empty list.
pub async fn scrape_with_retry<F, Fut, T>(url: &str, max_retries: u32, delay: Duration, mut attempt: F) -> Vec<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Ok(items) => return items,
            Err(e) if retries < max_retries => {
                warn!(
                    "Error encountered: {:?}. Retrying ({} retries left)...",
                    e,
                    max_retries - retries
                );
                tokio::time::sleep(delay).await;
                retries += 1;
            }
            Err(e) => {
                error!("Failed to scrape {} after {} retries: {:?}", url, max_retries, e);
                return Vec::new();
            }
        }
    }
}
