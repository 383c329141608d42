use anyhow::{Context, Result};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook};
use std::fs;
use std::path::Path;

use crate::models::{Product, HEADERS};

const COLUMN_WIDTHS: [f64; 13] = [
    35.0, // Product Name
    20.0, // Brand
    50.0, // Product URL
    15.0, // Category 1
    15.0, // Category 2
    15.0, // Category 3
    15.0, // Category 4
    60.0, // Description
    15.0, // Color
    30.0, // Material
    40.0, // Size & Measurements
    20.0, // Country of Manufacture
    50.0, // Images
];

pub struct ExcelExporter {
    workbook: Workbook,
}

impl ExcelExporter {
    pub fn new() -> Self {
        Self {
            workbook: Workbook::new(),
        }
    }

    pub fn write_products(&mut self, products: &[Product]) -> Result<()> {
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name("Products")?;

        let header_format = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(0x000080))
            .set_font_color(Color::White)
            .set_border(FormatBorder::Thin);

        for (col, header) in HEADERS.iter().enumerate() {
            worksheet.write_with_format(0, col as u16, *header, &header_format)?;
        }
        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
        }
        worksheet.set_freeze_panes(1, 0)?;

        let cell_format = Format::new().set_border(FormatBorder::Thin);

        for (row_idx, product) in products.iter().enumerate() {
            let row = (row_idx + 1) as u32;
            for (col, value) in product.cells().iter().enumerate() {
                worksheet.write_with_format(row, col as u16, value, &cell_format)?;
            }
        }

        Ok(())
    }

    pub fn save(mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.workbook
            .save(path)
            .with_context(|| format!("Failed to save workbook {}", path.display()))?;
        Ok(())
    }
}

impl Default for ExcelExporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrites the whole workbook from `products`; header-only when empty.
pub fn export_workbook(products: &[Product], path: &Path) -> Result<()> {
    let mut exporter = ExcelExporter::new();
    exporter.write_products(products)?;
    exporter.save(path)
}
