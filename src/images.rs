use anyhow::{bail, Context, Result};
use reqwest::Client;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

pub struct ImageDownloader {
    client: Client,
    dir: PathBuf,
}

impl ImageDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36")
            .build()
            .context("Failed to build http client")?;
        Ok(Self {
            client,
            dir: dir.into(),
        })
    }

    /// Downloads `url` unless the target file already exists and returns the
    /// file name written to the product row.
    pub async fn download(&self, url: &str) -> Result<String> {
        let Some(name) = file_name_for(url) else {
            bail!("No file name in image url {}", url);
        };
        let target = self.dir.join(&name);
        if fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(name);
        }

        fs::create_dir_all(&self.dir).await?;
        let mut response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("Image request failed for {}", url))?;

        // Partial downloads must not look like finished files on the next run.
        let partial = self.dir.join(format!("{}.part", name));
        let mut file = fs::File::create(&partial).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);
        fs::rename(&partial, &target).await?;

        info!("Downloaded image {}", name);
        Ok(name)
    }

    /// Downloads every url, leaving failed ones out of the returned names.
    pub async fn download_all(&self, urls: &[String]) -> Vec<String> {
        let mut names = Vec::new();
        for url in urls {
            match self.download(url).await {
                Ok(name) => names.push(name),
                Err(e) => warn!("Skipping image {}: {:?}", url, e),
            }
        }
        names
    }
}

/// Last path segment of `url` with its extension replaced by `.jpg`.
pub fn file_name_for(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.rsplit('/').next()?;
    let stem = segment.split('.').next()?;
    if stem.is_empty() {
        return None;
    }
    Some(format!("{}.jpg", stem))
}
