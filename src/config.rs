use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub struct Config {
    pub start_url: String,
    pub ledger_path: PathBuf,
    pub workbook_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub image_dir: PathBuf,
    pub headless: bool,
    /// Pause after every navigation or click so the page can render.
    pub settle_delay: Duration,
    pub product_retries: u32,
    pub retry_delay: Duration,
    /// How many times the gallery "next" arrow is clicked.
    pub gallery_clicks: usize,
    pub consent_timeout: Duration,
    pub country_timeout: Duration,
    pub session_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_url: "https://www.24s.com/en-us/women/ready-to-wear".to_string(),
            ledger_path: PathBuf::from("data/24s_products.csv"),
            workbook_path: PathBuf::from("data/24s_products.xlsx"),
            checkpoint_path: PathBuf::from("savepoint.txt"),
            image_dir: PathBuf::from("downloaded_images"),
            headless: true,
            settle_delay: Duration::from_secs(2),
            product_retries: 3,
            retry_delay: Duration::from_secs(5),
            gallery_clicks: 5,
            consent_timeout: Duration::from_secs(10),
            country_timeout: Duration::from_secs(3),
            session_attempts: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = Self::from_lookup(|key| env::var(key).ok());
        config.headless = !args.contains(&"--headed".to_string());
        config
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("SCRAPER_START_URL") {
            config.start_url = url;
        }
        if let Some(path) = lookup("SCRAPER_LEDGER") {
            config.ledger_path = path.into();
        }
        if let Some(path) = lookup("SCRAPER_WORKBOOK") {
            config.workbook_path = path.into();
        }
        if let Some(path) = lookup("SCRAPER_CHECKPOINT") {
            config.checkpoint_path = path.into();
        }
        if let Some(path) = lookup("SCRAPER_IMAGE_DIR") {
            config.image_dir = path.into();
        }
        config
    }
}
