use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::models::{Product, NO_COLOR};

/// Only the 555x625 renditions are kept from the gallery.
pub const GALLERY_SIZE: &str = "555x625";

/// Swatch images inside the product's color selector.
pub const SWATCH_SELECTOR: &str = r#"ul[data-cy="pdp-color-selector"] li button span picture img"#;

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e}"))
}

/// Concatenated text of an element with runs of whitespace collapsed.
fn text_of(el: ElementRef) -> String {
    collapse(&el.text().collect::<String>())
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Reads "Page 1 of 42" from the listing pagination widget.
pub fn total_pages(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    let el = document.select(&selector("span.pagination_pageOf__vmVQq")).next()?;
    el.text()
        .collect::<String>()
        .split_whitespace()
        .last()?
        .parse()
        .ok()
}

/// Absolute product URLs on a listing page, in page order, without repeats.
pub fn product_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links: Vec<String> = Vec::new();
    for el in document.select(&selector("a.product_btn__QSoXG[href]")) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Ok(url) = base.join(href) else {
            continue;
        };
        let url = url.to_string();
        if !links.contains(&url) {
            links.push(url);
        }
    }
    links
}

/// Color names offered by the variant selector, if the product has one.
pub fn color_variants(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let swatch = selector(SWATCH_SELECTOR);
    let colors = document
        .select(&swatch)
        .filter_map(|img| img.value().attr("alt"))
        .map(str::to_string)
        .collect();
    colors
}

/// Keeps the full-size gallery renditions, first occurrence wins.
pub fn filter_gallery(srcs: &[String]) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for src in srcs {
        if src.contains(GALLERY_SIZE) && !kept.contains(src) {
            kept.push(src.clone());
        }
    }
    kept
}

pub fn parse_product(html: &str, url: &str, images: Vec<String>) -> Product {
    let document = Html::parse_document(html);
    let mut product = Product::new(url);
    product.images = images;

    product.name = document
        .select(&selector(r#"span[data-cy="pdp-product-name-text"]"#))
        .next()
        .map(text_of);
    product.brand = document
        .select(&selector(r#"a[data-cy="pdp-brand-anchor"]"#))
        .next()
        .map(text_of);

    // The first breadcrumb is the site root.
    let crumb = selector(".breadcrumb li a");
    let mut categories = document
        .select(&crumb)
        .skip(1)
        .map(|a| non_empty(text_of(a)));
    product.category_1 = categories.next().flatten();
    product.category_2 = categories.next().flatten();
    product.category_3 = categories.next().flatten();
    product.category_4 = categories.next().flatten();

    let mut color = None;
    if let Some(accordion) = document.select(&selector("div.accordion-text")).next() {
        let title_sel = selector("span.t-desc.accordion-list-item-title");
        let text_sel = selector("span.accordion-list-item-text");

        for li in accordion.select(&selector("li")) {
            let Some(title) = li.select(&title_sel).next() else {
                continue;
            };
            let title_raw = title.text().collect::<String>();
            let title_text = title_raw.trim().to_lowercase();
            let li_raw = li.text().collect::<String>();
            let body = || collapse(&li_raw.replacen(&title_raw, "", 1));

            if title_text.contains("description") {
                let parts: Vec<String> = li.select(&text_sel).map(text_of).collect();
                product.description = Some(parts.join(" "));
            } else if title_text.contains("material") {
                product.material = Some(body());
            } else if title_text.contains("color") {
                let value = li_raw.rsplit(':').next().unwrap_or_default().replace('_', " ");
                color = non_empty(collapse(&value));
            } else if title_text.contains("size & measurements") {
                let full = body();
                let cut = full.split("View size guide").next().unwrap_or_default();
                product.size_measurements = Some(cut.trim().to_string());
            } else if title_text.contains("country of manufacture") {
                product.country_of_manufacture = Some(body());
            }
        }
    }

    product.color = color
        .or_else(|| color_from_details(&document))
        .unwrap_or_else(|| NO_COLOR.to_string());
    product
}

/// `<span>Color</span><span>Black</span>` pairs in the detail table.
fn color_from_details(document: &Html) -> Option<String> {
    let label = document
        .select(&selector("span"))
        .find(|span| text_of(*span) == "Color")?;
    label
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "span")
        .map(text_of)
}
