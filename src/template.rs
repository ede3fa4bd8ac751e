//! Seed template and export generation.
//!
//! The grids produced here must round-trip through the ingestion core: header
//! cells use exactly the vocabulary the column mapper matches, group banners
//! use the strict `📦 GROUP <n>:` pattern the section scanner searches for,
//! and instructional rows stay on the classifier's denylist so re-ingesting a
//! template never turns guidance text into line items.

use crate::classify::GROUP_MARKER;
use crate::ingest::Grid;
use crate::model::{BomGroup, BomItem, ColumnVisibility};
use anyhow::{Context, Result};

/// Header row for a BOM sheet under the given visibility. The spellings are
/// the canonical ones the column mapper recognizes.
pub fn bom_header_row(visibility: &ColumnVisibility) -> Vec<String> {
    let mut cells = Vec::new();
    if visibility.no {
        cells.push("No.".to_string());
    }
    if visibility.part_number {
        cells.push("Part Number".to_string());
    }
    if visibility.product_description {
        cells.push("Product Description".to_string());
    }
    if visibility.qty {
        cells.push("QTY".to_string());
    }
    if visibility.unit_price {
        cells.push("Unit Price".to_string());
    }
    if visibility.total_price {
        cells.push("Total Price".to_string());
    }
    cells
}

fn bom_item_row(item: &BomItem, visibility: &ColumnVisibility) -> Vec<String> {
    let mut cells = Vec::new();
    if visibility.no {
        cells.push(item.no.to_string());
    }
    if visibility.part_number {
        cells.push(item.part_number.clone());
    }
    if visibility.product_description {
        cells.push(item.product_description.clone());
    }
    if visibility.qty {
        cells.push(item.quantity.to_string());
    }
    if visibility.unit_price {
        cells.push(item.unit_price.map(|p| format!("{}", p)).unwrap_or_default());
    }
    if visibility.total_price {
        cells.push(item.total_price.map(|p| format!("{}", p)).unwrap_or_default());
    }
    cells
}

fn banner_row(ordinal: usize, name: &str) -> Vec<String> {
    vec![format!("{} GROUP {}: {}", GROUP_MARKER, ordinal, name)]
}

/// Seed BOM template: instructions, one group banner, header and two starter
/// rows the user overwrites. Feeding this straight back into the parser
/// yields exactly the starter rows.
pub fn bom_template_grid(visibility: &ColumnVisibility) -> Grid {
    let mut grid: Grid = vec![
        vec!["=== How to use this template ===".to_string()],
        vec!["Enter your parts below, one row per part.".to_string()],
        vec![String::new()],
    ];
    grid.push(banner_row(1, "BOM 1"));
    grid.push(bom_header_row(visibility));

    let starters = [
        BomItem {
            no: 1,
            part_number: "PN-1001".to_string(),
            product_description: "Widget A".to_string(),
            quantity: 1,
            unit_price: visibility.unit_price.then_some(100.0),
            total_price: visibility.total_price.then_some(100.0),
        },
        BomItem {
            no: 2,
            part_number: "PN-1002".to_string(),
            product_description: "Widget B".to_string(),
            quantity: 2,
            unit_price: visibility.unit_price.then_some(25.5),
            total_price: visibility.total_price.then_some(51.0),
        },
    ];
    for item in &starters {
        grid.push(bom_item_row(item, visibility));
    }
    grid
}

/// Export existing groups as a grid in the same shape as the template.
pub fn bom_export_grid(groups: &[BomGroup], visibility: &ColumnVisibility) -> Grid {
    let mut grid: Grid = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            grid.push(vec![String::new()]);
        }
        grid.push(banner_row(i + 1, &group.name));
        grid.push(bom_header_row(visibility));
        for item in &group.items {
            grid.push(bom_item_row(item, visibility));
        }
    }
    grid
}

/// Seed quote-info sheet: the recognized field keys with blank values.
pub fn quote_info_template_grid() -> Grid {
    [
        ("Quote Subject", ""),
        ("Customer Company", ""),
        ("Sales Person Name", ""),
        ("Date", ""),
        ("Version", "1"),
        ("Payment Terms", ""),
        ("Currency", "USD"),
        ("BOM Enabled", "yes"),
        ("Costs Enabled", "yes"),
    ]
    .iter()
    .map(|(k, v)| vec![k.to_string(), v.to_string()])
    .collect()
}

/// Seed cost sheet header.
pub fn cost_template_grid() -> Grid {
    vec![vec![
        "Product Description".to_string(),
        "QTY".to_string(),
        "Unit Price".to_string(),
        "Total Price".to_string(),
        "Is Discount".to_string(),
    ]]
}

/// Encode a grid as CSV for download. Rows may have uneven widths.
pub fn grid_to_csv(grid: &Grid) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in grid {
        writer.write_record(row).context("Failed to encode CSV row")?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}
