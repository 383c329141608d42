use serde::{Deserialize, Serialize};

/// Column headers, in ledger and workbook order.
pub const HEADERS: [&str; 13] = [
    "Product Name",
    "Brand",
    "Product URL",
    "Category 1",
    "Category 2",
    "Category 3",
    "Category 4",
    "Description",
    "Color",
    "Material",
    "Size & Measurements",
    "Country of Manufacture",
    "Images",
];

/// One scraped product, or one color variant of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "Product Name")]
    pub name: Option<String>,
    #[serde(rename = "Brand")]
    pub brand: Option<String>,
    #[serde(rename = "Product URL")]
    pub url: String,
    #[serde(rename = "Category 1")]
    pub category_1: Option<String>,
    #[serde(rename = "Category 2")]
    pub category_2: Option<String>,
    #[serde(rename = "Category 3")]
    pub category_3: Option<String>,
    #[serde(rename = "Category 4")]
    pub category_4: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "Color")]
    pub color: String,
    #[serde(rename = "Material")]
    pub material: Option<String>,
    #[serde(rename = "Size & Measurements")]
    pub size_measurements: Option<String>,
    #[serde(rename = "Country of Manufacture")]
    pub country_of_manufacture: Option<String>,
    #[serde(rename = "Images", with = "image_list")]
    pub images: Vec<String>,
}

impl Product {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            name: None,
            brand: None,
            url: url.into(),
            category_1: None,
            category_2: None,
            category_3: None,
            category_4: None,
            description: None,
            color: NO_COLOR.to_string(),
            material: None,
            size_measurements: None,
            country_of_manufacture: None,
            images: Vec::new(),
        }
    }

    /// Row identity: one row per product page and color.
    pub fn key(&self) -> (String, String) {
        (normalize_url(&self.url).to_string(), self.color.clone())
    }

    /// Cell values in `HEADERS` order, absent fields as empty strings.
    pub fn cells(&self) -> [String; 13] {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        [
            opt(&self.name),
            opt(&self.brand),
            self.url.clone(),
            opt(&self.category_1),
            opt(&self.category_2),
            opt(&self.category_3),
            opt(&self.category_4),
            opt(&self.description),
            self.color.clone(),
            opt(&self.material),
            opt(&self.size_measurements),
            opt(&self.country_of_manufacture),
            self.images.join(", "),
        ]
    }
}

/// Color written when neither the accordion nor the detail spans name one.
pub const NO_COLOR: &str = "N/A";

/// Strips query string and fragment so variant URLs compare equal to the
/// listing URL of the same product.
pub fn normalize_url(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].trim_end_matches('/')
}

mod image_list {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(images: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&images.join(", "))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_query_and_fragment() {
        assert_eq!(
            normalize_url("https://www.24s.com/en-us/dress_ABC?color=black#top"),
            "https://www.24s.com/en-us/dress_ABC"
        );
        assert_eq!(normalize_url("https://www.24s.com/en-us/dress_ABC/"), "https://www.24s.com/en-us/dress_ABC");
    }

    #[test]
    fn key_ignores_variant_query() {
        let mut a = Product::new("https://www.24s.com/p_1?color=red");
        a.color = "Red".into();
        let mut b = Product::new("https://www.24s.com/p_1");
        b.color = "Red".into();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn cells_follow_header_order() {
        let mut product = Product::new("https://www.24s.com/p_1");
        product.name = Some("Silk shirt".into());
        product.images = vec!["a.jpg".into(), "b.jpg".into()];

        let cells = product.cells();
        assert_eq!(cells.len(), HEADERS.len());
        assert_eq!(cells[0], "Silk shirt");
        assert_eq!(cells[1], "");
        assert_eq!(cells[8], "N/A");
        assert_eq!(cells[12], "a.jpg, b.jpg");
    }
}
