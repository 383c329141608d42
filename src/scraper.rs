use anyhow::{anyhow, Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::parser::{GALLERY_SIZE, SWATCH_SELECTOR};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One browser session with a single tab that every navigation reuses.
pub struct StoreScraper {
    browser: Browser,
    page: Page,
    settle_delay: Duration,
    gallery_clicks: usize,
    consent_timeout: Duration,
    country_timeout: Duration,
}

impl StoreScraper {
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing browser");

        let mut builder = BrowserConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }
        builder = builder.window_size(1920, 1080);
        builder = builder.viewport(None);

        let browser_config = builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    error!("Browser handler error: {:?}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser tab")?;

        Ok(Self {
            browser,
            page,
            settle_delay: config.settle_delay,
            gallery_clicks: config.gallery_clicks,
            consent_timeout: config.consent_timeout,
            country_timeout: config.country_timeout,
        })
    }

    /// Accepts the cookie banner and confirms the shipping country when the
    /// site opens its country picker in a second window.
    async fn dismiss_popups(&self) -> Result<()> {
        if !click_when_present(&self.page, "#onetrust-accept-btn-handler", self.consent_timeout).await? {
            return Ok(());
        }
        info!("Accepted cookie banner");
        tokio::time::sleep(Duration::from_secs(1)).await;

        let pages = self.browser.pages().await?;
        if pages.len() > 1 {
            let picker = &pages[1];
            if click_when_present(picker, "#btn-current-country", self.country_timeout).await? {
                info!("Confirmed current country");
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}

/// The browser operations the crawler drives.
pub trait Storefront {
    /// Navigates and waits for the page to render.
    async fn open(&self, url: &str) -> Result<()>;
    async fn settle(&self);
    async fn html(&self) -> Result<String>;
    /// URL after client-side navigation; variant switches rewrite it.
    async fn current_url(&self) -> Result<String>;
    async fn handle_popups(&self);
    /// Clicks the variant button whose swatch image is labelled `color`.
    /// Returns false when the color selector has no such swatch.
    async fn select_color(&self, color: &str) -> Result<bool>;
    /// Image sources shown in the product gallery, unfiltered.
    async fn gallery_image_urls(&self) -> Result<Vec<String>>;
}

impl Storefront for StoreScraper {
    async fn open(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Failed to open {}", url))?;
        self.settle().await;
        Ok(())
    }

    async fn settle(&self) {
        tokio::time::sleep(self.settle_delay).await;
    }

    async fn html(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn current_url(&self) -> Result<String> {
        self.page
            .url()
            .await?
            .ok_or_else(|| anyhow!("Browser tab has no url"))
    }

    async fn handle_popups(&self) {
        if let Err(e) = self.dismiss_popups().await {
            warn!("Error handling popup windows: {:?}", e);
        }
    }

    async fn select_color(&self, color: &str) -> Result<bool> {
        let found = self
            .page
            .evaluate(swatch_script(color, "button.scrollIntoView(true);")?)
            .await?
            .into_value::<bool>()?;
        if !found {
            return Ok(false);
        }
        self.settle().await;

        self.page
            .evaluate(swatch_script(color, "button.click();")?)
            .await?;
        Ok(true)
    }

    async fn gallery_image_urls(&self) -> Result<Vec<String>> {
        let has_next = self
            .page
            .evaluate("document.querySelector('button.slick-next') !== null")
            .await?
            .into_value::<bool>()?;

        if !has_next {
            let visible = self
                .page
                .evaluate(format!(
                    r#"
                    Array.from(document.querySelectorAll("div.slick-slide.slick-active.slick-current img[src*='{GALLERY_SIZE}']"))
                        .map(img => img.src)
                        .slice(0, 1)
                    "#
                ))
                .await?
                .into_value::<Vec<String>>()?;
            return Ok(visible);
        }

        let mut srcs = Vec::new();
        for _ in 0..self.gallery_clicks {
            let shown = self
                .page
                .evaluate("Array.from(document.querySelectorAll('div.slick-track img[src]')).map(img => img.src)")
                .await?
                .into_value::<Vec<String>>()?;
            srcs.extend(shown);

            let clicked = self
                .page
                .evaluate(
                    r#"
                    (() => {
                        const next = document.querySelector('button.slick-next');
                        if (!next || next.disabled) return false;
                        next.click();
                        return true;
                    })()
                    "#,
                )
                .await?
                .into_value::<bool>()?;
            if !clicked {
                break;
            }
            self.settle().await;
        }
        Ok(srcs)
    }
}

/// Script that runs `action` on the color-selector button for `color`,
/// returning false when no swatch in the selector carries that label.
fn swatch_script(color: &str, action: &str) -> Result<String> {
    let swatch = serde_json::to_string(SWATCH_SELECTOR)?;
    let name = serde_json::to_string(color)?;
    Ok(format!(
        r#"
        (() => {{
            const img = Array.from(document.querySelectorAll({swatch})).find(i => i.alt === {name});
            const button = img ? img.closest('button') : null;
            if (!button) return false;
            {action}
            return true;
        }})()
        "#
    ))
}

/// Polls for `selector` until `timeout` and clicks it once present.
async fn click_when_present(page: &Page, selector: &str, timeout: Duration) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(element) = page.find_element(selector).await {
            element.click().await?;
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
