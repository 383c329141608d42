use anyhow::{Context, Result};
use csv::{Reader, Writer, WriterBuilder};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::models::{normalize_url, Product, HEADERS};

/// Append-only CSV of every scraped row. The header is written once, when
/// the file is created, and each append is flushed before returning.
pub struct ProductLedger {
    path: PathBuf,
    writer: Writer<File>,
    keys: HashSet<(String, String)>,
}

impl ProductLedger {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let existing = read_products(&path)?;
        let is_new = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open ledger {}", path.display()))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(HEADERS)?;
            writer.flush()?;
        }

        let keys = existing.iter().map(Product::key).collect();
        Ok(Self { path, writer, keys })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn row_count(&self) -> usize {
        self.keys.len()
    }

    /// Normalized URLs of every product already in the ledger.
    pub fn scraped_urls(&self) -> HashSet<String> {
        self.keys.iter().map(|(url, _)| url.clone()).collect()
    }

    /// Writes the rows not yet present and returns how many were written.
    pub fn append(&mut self, products: &[Product]) -> Result<usize> {
        let mut written = 0;
        for product in products {
            if !self.keys.insert(product.key()) {
                continue;
            }
            self.writer.serialize(product)?;
            written += 1;
        }
        self.writer.flush()?;
        Ok(written)
    }

    pub fn products(&self) -> Result<Vec<Product>> {
        read_products(&self.path)
    }
}

pub fn read_products(path: &Path) -> Result<Vec<Product>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to read ledger {}", path.display()))?;
    let mut products = Vec::new();
    for row in reader.deserialize() {
        let product: Product = row.with_context(|| format!("Malformed row in {}", path.display()))?;
        products.push(product);
    }
    Ok(products)
}

/// Lookup form of the already-scraped set; `url` may carry a variant query.
pub fn is_scraped(scraped: &HashSet<String>, url: &str) -> bool {
    scraped.contains(normalize_url(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn product(url: &str, color: &str) -> Product {
        let mut product = Product::new(url);
        product.name = Some("Wool coat".to_string());
        product.brand = Some("Celine".to_string());
        product.color = color.to_string();
        product.images = vec!["coat_1.jpg".to_string(), "coat_2.jpg".to_string()];
        product
    }

    #[test]
    fn header_written_once_across_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");

        let mut ledger = ProductLedger::open(&path).unwrap();
        ledger.append(&[product("https://www.24s.com/coat_1", "Black")]).unwrap();
        drop(ledger);

        let mut ledger = ProductLedger::open(&path).unwrap();
        ledger.append(&[product("https://www.24s.com/coat_2", "Camel")]).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.matches("Product Name").count(), 1);
        assert_eq!(raw.lines().count(), 3);
    }

    #[test]
    fn duplicate_product_color_is_skipped() {
        let dir = tempdir().unwrap();
        let mut ledger = ProductLedger::open(dir.path().join("rows.csv")).unwrap();

        let written = ledger
            .append(&[
                product("https://www.24s.com/coat_1?color=black", "Black"),
                product("https://www.24s.com/coat_1?color=camel", "Camel"),
            ])
            .unwrap();
        assert_eq!(written, 2);

        let written = ledger
            .append(&[product("https://www.24s.com/coat_1", "Black")])
            .unwrap();
        assert_eq!(written, 0);
        assert_eq!(ledger.row_count(), 2);
    }

    #[test]
    fn rows_line_up_with_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let mut ledger = ProductLedger::open(&path).unwrap();
        ledger.append(&[product("https://www.24s.com/coat_1", "Black")]).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines[0], HEADERS.join(","));
        assert_eq!(
            lines[1],
            r#"Wool coat,Celine,https://www.24s.com/coat_1,,,,,,Black,,,,"coat_1.jpg, coat_2.jpg""#
        );
    }

    #[test]
    fn reload_recovers_rows_and_scraped_urls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("rows.csv");

        let mut ledger = ProductLedger::open(&path).unwrap();
        let mut original = product("https://www.24s.com/coat_1?color=black", "Black");
        original.category_1 = Some("Women".to_string());
        ledger.append(&[original.clone()]).unwrap();
        drop(ledger);

        let ledger = ProductLedger::open(&path).unwrap();
        let products = ledger.products().unwrap();
        assert_eq!(products, vec![original]);

        let scraped = ledger.scraped_urls();
        assert!(is_scraped(&scraped, "https://www.24s.com/coat_1"));
        assert!(!is_scraped(&scraped, "https://www.24s.com/coat_2"));
    }

    #[test]
    fn missing_ledger_reads_empty() {
        let dir = tempdir().unwrap();
        assert!(read_products(&dir.path().join("absent.csv")).unwrap().is_empty());
    }
}
