//! Ingestion orchestration for the two recovery pipelines: whole-workbook
//! uploads and clipboard paste into a BOM grid.
//!
//! The orchestrator is pure and synchronous: grids of strings in, a
//! `ParsedResult` out. It never mutates caller state; the price auto-enable
//! policy comes back as a proposed `ColumnVisibility` for the caller to apply.

use crate::builder::{build_bom_item, build_cost_item};
use crate::classify::{classify_paste_line, classify_workbook_row, RowCtx, RowKind};
use crate::coerce::{coerce_bool, coerce_number, parse_positive_int};
use crate::model::{BomGroup, BomItem, ColumnVisibility, ParsedResult, QuoteInfo};
use crate::scan::scan_sections;
use tracing::debug;

/// One decoded sheet: name plus its cell grid.
pub type Grid = Vec<Vec<String>>;

/// Sheet name aliases, first match wins. Matching is exact, so the accepted
/// spellings are enumerated rather than lowercased.
const QUOTE_INFO_ALIASES: &[&str] = &["Quote Info", "quote info", "QuoteInfo"];
const BOM_ALIASES: &[&str] = &["BOM Items (Multi-Group)", "BOM Items", "bom items", "BOM", "bom"];
const COST_ALIASES: &[&str] = &["Cost Items", "cost items", "Cost", "cost"];

/// Options for workbook ingestion.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Reject BOM rows carrying neither part number nor description.
    pub validate_data: bool,
    /// Keep whatever was recovered when a sheet-level error occurs. With this
    /// off, any fatal error discards the partial data and only the error and
    /// warning lists survive.
    pub allow_partial_data: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            validate_data: true,
            allow_partial_data: true,
        }
    }
}

fn find_sheet<'a>(sheets: &'a [(String, Grid)], aliases: &[&str]) -> Option<&'a (String, Grid)> {
    aliases
        .iter()
        .find_map(|alias| sheets.iter().find(|(name, _)| name == alias))
}

/// Parse a decoded workbook into quote info, BOM groups and cost lines.
///
/// Sheets are located by alias; when none of the three categories matches,
/// the first sheet is parsed as BOM items with a warning. Fatal conditions
/// (a located sheet with no usable header) land in `errors`, everything
/// row-level in `warnings`.
pub fn parse_workbook(sheets: &[(String, Grid)], options: ParseOptions) -> ParsedResult {
    let mut result = ParsedResult::default();

    if sheets.is_empty() {
        result.errors.push("Workbook contains no sheets".to_string());
        return result;
    }

    let info_sheet = find_sheet(sheets, QUOTE_INFO_ALIASES);
    let bom_sheet = find_sheet(sheets, BOM_ALIASES);
    let cost_sheet = find_sheet(sheets, COST_ALIASES);

    let fallback;
    let bom_sheet = if info_sheet.is_none() && bom_sheet.is_none() && cost_sheet.is_none() {
        // Nothing recognizable: treat the first sheet as BOM items.
        fallback = &sheets[0];
        result.warnings.push(format!(
            "No recognized sheet names found, parsing first sheet \"{}\" as BOM items",
            fallback.0
        ));
        Some(fallback)
    } else {
        bom_sheet
    };

    if let Some((_, grid)) = info_sheet {
        result.quote_info = parse_quote_info_grid(grid);
    }

    if let Some((name, grid)) = bom_sheet {
        parse_bom_grid(name, grid, options.validate_data, &mut result);
    }

    if let Some((name, grid)) = cost_sheet {
        parse_cost_grid(name, grid, &mut result);
    }

    // Price auto-enable runs on the raw parsed prices, before any masking:
    // masking first would zero out the very signal being looked for.
    let price_detected = result
        .bom_groups
        .iter()
        .flat_map(|g| &g.items)
        .any(|item| item.unit_price.is_some_and(|p| p > 0.0));
    let visibility = if price_detected {
        ColumnVisibility::default().with_prices()
    } else {
        ColumnVisibility::default()
    };
    mask_prices(&mut result.bom_groups, &visibility);
    if price_detected {
        result.proposed_visibility = Some(visibility);
    }

    if !options.allow_partial_data && !result.errors.is_empty() {
        debug!("Discarding partial data: {} error(s)", result.errors.len());
        result.quote_info = QuoteInfo::default();
        result.bom_groups.clear();
        result.cost_items.clear();
    }

    result
}

/// Parse a BOM sheet grid into groups, appending to `result`.
fn parse_bom_grid(sheet_name: &str, grid: &[Vec<String>], validate: bool, result: &mut ParsedResult) {
    let outcome = scan_sections(grid);
    result.warnings.extend(outcome.warnings);

    if outcome.sections.is_empty() {
        result.errors.push(format!(
            "No header row found in BOM sheet \"{}\"",
            sheet_name
        ));
        return;
    }

    for section in &outcome.sections {
        let mut group = BomGroup::new(section.name.clone());
        for row_idx in section.start..section.end {
            let row = &grid[row_idx];
            let ctx = RowCtx::new(row);
            match classify_workbook_row(&ctx) {
                RowKind::Data => {
                    let position = (group.items.len() + 1) as u32;
                    if let Some(item) = build_bom_item(
                        row,
                        &section.columns,
                        position,
                        row_idx + 1,
                        validate,
                        &mut result.warnings,
                    ) {
                        group.items.push(item);
                    }
                }
                RowKind::Noise => {
                    // Blank separators are expected padding; only visible
                    // content earns a warning.
                    if !ctx.is_blank() {
                        result
                            .warnings
                            .push(format!("Row {}: skipped non-data row", row_idx + 1));
                    }
                }
                RowKind::Header | RowKind::GroupLabel => {
                    result
                        .warnings
                        .push(format!("Row {}: skipped non-data row", row_idx + 1));
                }
            }
        }
        // Numbering is positional within the group, whatever the sheet said.
        group.renumber();
        if group.items.is_empty() {
            debug!("Dropping empty group \"{}\"", group.name);
        } else {
            result.bom_groups.push(group);
        }
    }

    if result.bom_groups.is_empty() && result.errors.is_empty() {
        result.warnings.push(format!(
            "No data rows found in BOM sheet \"{}\"",
            sheet_name
        ));
    }
}

/// Parse a cost sheet grid, appending to `result`. Cost sheets are flat (no
/// group banners); the header is searched the same way as the BOM fallback.
fn parse_cost_grid(sheet_name: &str, grid: &[Vec<String>], result: &mut ParsedResult) {
    let outcome = scan_sections(grid);
    let Some(section) = outcome.sections.first() else {
        result.errors.push(format!(
            "No header row found in cost sheet \"{}\"",
            sheet_name
        ));
        return;
    };

    for row_idx in section.start..section.end {
        let row = &grid[row_idx];
        let ctx = RowCtx::new(row);
        match classify_workbook_row(&ctx) {
            RowKind::Data => {
                if let Some(item) =
                    build_cost_item(row, &section.columns, row_idx + 1, &mut result.warnings)
                {
                    result.cost_items.push(item);
                }
            }
            RowKind::Noise if ctx.is_blank() => {}
            _ => result
                .warnings
                .push(format!("Row {}: skipped non-data row", row_idx + 1)),
        }
    }
}

/// Strip price fields the visibility does not show, and re-derive totals.
fn mask_prices(groups: &mut [BomGroup], visibility: &ColumnVisibility) {
    for group in groups {
        for item in &mut group.items {
            if !visibility.unit_price {
                item.unit_price = None;
            }
            item.recompute_total(visibility);
        }
    }
}

/// Quote-info field keys matched case-insensitively against column 0.
const QUOTE_INFO_KEYS: &[&str] = &[
    "quote subject",
    "customer company",
    "sales person name",
    "date",
    "version",
    "payment terms",
    "currency",
    "bom enabled",
    "costs enabled",
];

/// Read a quote-info sheet as `(field, value)` pairs from columns 0/1.
/// Unrecognized keys are skipped; the enabled flags use boolean coercion with
/// enabled as the default.
pub fn parse_quote_info_grid(grid: &[Vec<String>]) -> QuoteInfo {
    let mut info = QuoteInfo::default();

    for row in grid {
        let key = row.first().map(|c| c.trim().to_lowercase()).unwrap_or_default();
        if key.is_empty() || !QUOTE_INFO_KEYS.contains(&key.as_str()) {
            continue;
        }
        let value = row.get(1).map(|c| c.trim()).unwrap_or("");
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "quote subject" => info.quote_subject = Some(value.to_string()),
            "customer company" => info.customer_company = Some(value.to_string()),
            "sales person name" => info.sales_person = Some(value.to_string()),
            "date" => info.date = Some(value.to_string()),
            "version" => info.version = Some(value.to_string()),
            "payment terms" => info.payment_terms = Some(value.to_string()),
            "currency" => info.currency = Some(value.to_string()),
            "bom enabled" => info.bom_enabled = Some(coerce_bool(value, true)),
            "costs enabled" => info.costs_enabled = Some(coerce_bool(value, true)),
            _ => {}
        }
    }

    info
}

/// Outcome of a clipboard paste parse.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PasteOutcome {
    pub items: Vec<BomItem>,
    pub warnings: Vec<String>,
    /// Visibility the caller should adopt; differs from the input only when
    /// price data triggered the auto-enable policy.
    pub visibility: ColumnVisibility,
}

/// Parse tab-separated rows pasted into a BOM grid.
///
/// Paste is always single-group; item numbering continues after the
/// `existing_item_count` rows already in the target group. Column order is
/// fixed: part number, description, quantity, then optionally unit price.
pub fn parse_clipboard_paste(
    raw_text: &str,
    existing_item_count: usize,
    visibility: ColumnVisibility,
) -> PasteOutcome {
    let mut items: Vec<BomItem> = Vec::new();
    let mut warnings = Vec::new();

    for line in raw_text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match classify_paste_line(line) {
            RowKind::Data => {}
            _ => {
                warnings.push(format!("Skipped non-data row: {:?}", truncate(line, 60)));
                continue;
            }
        }

        let cells: Vec<&str> = line.split('\t').collect();
        // Shape already validated by the classifier.
        let quantity = parse_positive_int(cells[2].trim()).unwrap_or(1);
        let unit_price = cells
            .get(3)
            .and_then(|c| coerce_number(c))
            .filter(|p| *p >= 0.0);

        items.push(BomItem {
            no: (existing_item_count + items.len() + 1) as u32,
            part_number: cells[0].trim().to_string(),
            product_description: cells[1].trim().to_string(),
            quantity,
            unit_price,
            total_price: None,
        });
    }

    // Auto-enable before masking, on the raw parsed prices.
    let price_detected = items.iter().any(|i| i.unit_price.is_some_and(|p| p > 0.0));
    let visibility = if price_detected && !visibility.shows_prices() {
        visibility.with_prices()
    } else {
        visibility
    };

    for item in &mut items {
        if !visibility.unit_price {
            item.unit_price = None;
        }
        item.recompute_total(&visibility);
    }

    debug!(
        "Paste parse: {} item(s), {} warning(s)",
        items.len(),
        warnings.len()
    );

    PasteOutcome {
        items,
        warnings,
        visibility,
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn bom_header() -> Vec<String> {
        row(&[
            "No.",
            "Part Number",
            "Product Description",
            "QTY",
            "Unit Price",
            "Total Price",
        ])
    }

    #[test]
    fn test_multi_group_workbook() {
        let grid = vec![
            row(&["\u{1F4E6} GROUP 1: Servers"]),
            bom_header(),
            row(&["1", "SRV-1", "Rack server", "2", "1000", ""]),
            row(&["2", "SRV-2", "Blade server", "1", "2500", ""]),
            row(&["3", "SRV-3", "Storage node", "1", "1800", ""]),
            row(&["\u{1F4E6} GROUP 2: Cabling"]),
            bom_header(),
            row(&["1", "CAB-1", "Cat6 cable", "40", "3", ""]),
            row(&["2", "CAB-2", "Fibre patch", "10", "12", ""]),
            row(&["3", "CAB-3", "Velcro ties", "100", "0.1", ""]),
        ];
        let sheets = vec![("BOM Items (Multi-Group)".to_string(), grid)];
        let result = parse_workbook(&sheets, ParseOptions::default());

        assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
        assert_eq!(result.bom_groups.len(), 2);
        for group in &result.bom_groups {
            let nos: Vec<u32> = group.items.iter().map(|i| i.no).collect();
            assert_eq!(nos, vec![1, 2, 3]);
        }
        assert_eq!(result.bom_groups[0].name, "Servers");
        assert_eq!(result.bom_groups[1].name, "Cabling");
    }

    #[test]
    fn test_unrecognized_sheet_falls_back_to_first() {
        let grid = vec![
            bom_header(),
            row(&["1", "P-1", "Widget", "5", "", ""]),
        ];
        let sheets = vec![("Sheet1".to_string(), grid)];
        let result = parse_workbook(&sheets, ParseOptions::default());

        let fallback_warnings: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| w.contains("No recognized sheet names found"))
            .collect();
        assert_eq!(fallback_warnings.len(), 1);
        assert!(result.errors.is_empty());
        assert_eq!(result.bom_groups.len(), 1);
        assert_eq!(result.bom_groups[0].name, "Imported Items");
        assert_eq!(result.bom_groups[0].items.len(), 1);
    }

    #[test]
    fn test_blank_separator_rows_skip_silently() {
        let grid = vec![
            bom_header(),
            row(&["1", "P-1", "Widget", "2", "", ""]),
            row(&["", "", "", "", "", ""]),
            row(&["Note: decorative spacer follows"]),
            row(&["2", "P-2", "Gadget", "1", "", ""]),
        ];
        let sheets = vec![("BOM Items".to_string(), grid)];
        let result = parse_workbook(&sheets, ParseOptions::default());

        assert_eq!(result.bom_groups[0].items.len(), 2);
        let skip_warnings: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| w.contains("skipped non-data row"))
            .collect();
        // Only the visible note row warns; the blank separator stays quiet
        assert_eq!(skip_warnings.len(), 1);
        assert!(skip_warnings[0].contains("Row 4"));
    }

    #[test]
    fn test_bom_sheet_without_header_is_fatal() {
        let grid = vec![row(&["just", "text"]), row(&["more", "text"])];
        let sheets = vec![("BOM Items".to_string(), grid)];
        let result = parse_workbook(&sheets, ParseOptions::default());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("No header row found"));
        assert!(result.bom_groups.is_empty());
    }

    #[test]
    fn test_all_or_nothing_discards_partial_data() {
        let bom = vec![row(&["no header here"])];
        let costs = vec![
            row(&["Product Description", "QTY", "Unit Price", "Total Price", "Is Discount"]),
            row(&["Install", "1", "500", "", ""]),
        ];
        let sheets = vec![
            ("BOM Items".to_string(), bom),
            ("Cost Items".to_string(), costs),
        ];
        let options = ParseOptions {
            allow_partial_data: false,
            ..Default::default()
        };
        let result = parse_workbook(&sheets, options);
        assert!(!result.errors.is_empty());
        assert!(result.cost_items.is_empty());
    }

    #[test]
    fn test_empty_labeled_group_dropped_silently() {
        let grid = vec![
            row(&["\u{1F4E6} GROUP 1: Empty"]),
            bom_header(),
            row(&["\u{1F4E6} GROUP 2: Real"]),
            bom_header(),
            row(&["1", "P-1", "Widget", "2", "", ""]),
        ];
        let sheets = vec![("BOM Items".to_string(), grid)];
        let result = parse_workbook(&sheets, ParseOptions::default());
        assert_eq!(result.bom_groups.len(), 1);
        assert_eq!(result.bom_groups[0].name, "Real");
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_workbook_price_auto_enable_proposed() {
        let grid = vec![
            bom_header(),
            row(&["1", "P-1", "Widget", "2", "$150.00", ""]),
        ];
        let sheets = vec![("BOM Items".to_string(), grid)];
        let result = parse_workbook(&sheets, ParseOptions::default());
        let visibility = result.proposed_visibility.expect("prices detected");
        assert!(visibility.unit_price && visibility.total_price);
        let item = &result.bom_groups[0].items[0];
        assert_eq!(item.unit_price, Some(150.0));
        assert_eq!(item.total_price, Some(300.0));
    }

    #[test]
    fn test_workbook_without_prices_masks_and_proposes_nothing() {
        let grid = vec![
            bom_header(),
            row(&["1", "P-1", "Widget", "2", "", ""]),
        ];
        let sheets = vec![("BOM Items".to_string(), grid)];
        let result = parse_workbook(&sheets, ParseOptions::default());
        assert!(result.proposed_visibility.is_none());
        assert_eq!(result.bom_groups[0].items[0].unit_price, None);
        assert_eq!(result.bom_groups[0].items[0].total_price, None);
    }

    #[test]
    fn test_quote_info_grid() {
        let grid = vec![
            row(&["Quote Subject", "Data centre refresh"]),
            row(&["Customer Company", "Acme Pty Ltd"]),
            row(&["Sales Person Name", "R. Alvarez"]),
            row(&["Date", "2026-08-01"]),
            row(&["Version", "v2"]),
            row(&["Payment Terms", "Net 30"]),
            row(&["Currency", "USD"]),
            row(&["BOM Enabled", "yes"]),
            row(&["Costs Enabled", "no"]),
            row(&["Favourite colour", "green"]),
        ];
        let info = parse_quote_info_grid(&grid);
        assert_eq!(info.quote_subject.as_deref(), Some("Data centre refresh"));
        assert_eq!(info.customer_company.as_deref(), Some("Acme Pty Ltd"));
        assert_eq!(info.sales_person.as_deref(), Some("R. Alvarez"));
        assert_eq!(info.date.as_deref(), Some("2026-08-01"));
        assert_eq!(info.version.as_deref(), Some("v2"));
        assert_eq!(info.payment_terms.as_deref(), Some("Net 30"));
        assert_eq!(info.currency.as_deref(), Some("USD"));
        assert_eq!(info.bom_enabled, Some(true));
        assert_eq!(info.costs_enabled, Some(false));
    }

    #[test]
    fn test_cost_sheet_parsing() {
        let costs = vec![
            row(&["Product Description", "QTY", "Unit Price", "Total Price", "Is Discount"]),
            row(&["Installation", "2", "300", "", "no"]),
            row(&["Volume discount", "1", "100", "", "yes"]),
        ];
        let sheets = vec![("Cost Items".to_string(), costs)];
        let result = parse_workbook(&sheets, ParseOptions::default());
        assert_eq!(result.cost_items.len(), 2);
        assert!(result.cost_items[1].is_discount);
        assert_eq!(crate::model::cost_grand_total(&result.cost_items), 500.0);
    }

    #[test]
    fn test_paste_noise_heavy() {
        let text = "Part Number\tProduct Description\tQTY\n\
                    A-1\tWidget\t2\n\
                    Note: enter one part per row\n\
                    Part Number\tProduct Description\tQTY\n\
                    B-2\tGadget\t3\n";
        let outcome = parse_clipboard_paste(text, 0, ColumnVisibility::default());
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.warnings.len(), 3);
        assert_eq!(outcome.items[0].part_number, "A-1");
        assert_eq!(outcome.items[1].part_number, "B-2");
    }

    #[test]
    fn test_paste_auto_enable_keeps_parsed_price() {
        let outcome = parse_clipboard_paste(
            "A-1\tWidget\t2\t150.00\n",
            0,
            ColumnVisibility::default(),
        );
        assert!(outcome.visibility.unit_price);
        assert!(outcome.visibility.total_price);
        assert_eq!(outcome.items[0].unit_price, Some(150.0));
        assert_eq!(outcome.items[0].total_price, Some(300.0));
    }

    #[test]
    fn test_paste_numbering_continues_after_existing_items() {
        let outcome = parse_clipboard_paste(
            "A-1\tWidget\t2\nB-2\tGadget\t1\n",
            4,
            ColumnVisibility::default(),
        );
        let nos: Vec<u32> = outcome.items.iter().map(|i| i.no).collect();
        assert_eq!(nos, vec![5, 6]);
    }

    #[test]
    fn test_paste_empty_cells_never_become_data() {
        for bad in ["\tWidget\t2", "A-1\t\t2", "  \tWidget\t2"] {
            let outcome = parse_clipboard_paste(bad, 0, ColumnVisibility::default());
            assert!(outcome.items.is_empty(), "input {:?}", bad);
        }
    }

    #[test]
    fn test_paste_negative_price_stays_unset() {
        let outcome = parse_clipboard_paste(
            "A-1\tWidget\t2\t-40\n",
            0,
            ColumnVisibility::default(),
        );
        assert_eq!(outcome.items[0].unit_price, None);
        assert!(!outcome.visibility.unit_price);
    }
}
