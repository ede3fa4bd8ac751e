//! Section scanning for workbook BOM sheets.
//!
//! Finds group banner rows and their header rows, then partitions the grid
//! into contiguous item sections. Row-by-row record building happens in the
//! orchestrator; this module only decides where each section starts and ends
//! and which columns it carries.

use crate::classify::{is_primary_header, GROUP_MARKER};
use crate::columns::{map_columns, ColumnMap};
use regex::Regex;
use std::sync::OnceLock;

/// Rows to look ahead for a header after a group banner.
const HEADER_LOOKAHEAD: usize = 4;

/// Rows searched for a header when no banner exists anywhere in the sheet.
const FALLBACK_HEADER_SCAN: usize = 25;

/// Strict banner pattern: `📦 GROUP <n>: <name>`.
fn banner_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"{}\s*GROUP\s*(\d+):\s*(.+)", GROUP_MARKER))
            .expect("banner pattern is valid")
    })
}

/// Extract the group name from a banner cell, if the strict pattern matches.
pub fn parse_banner(cell: &str) -> Option<String> {
    banner_regex()
        .captures(cell.trim())
        .map(|caps| caps[2].trim().to_string())
}

/// One contiguous item section of a sheet.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub columns: ColumnMap,
    /// Grid row range of the section body, header excluded.
    pub start: usize,
    pub end: usize,
}

/// Result of scanning a sheet for sections. Empty `sections` with empty
/// `warnings` means no header was found anywhere the scanner looked, which
/// callers treat as fatal for a sheet that was supposed to hold BOM data.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub sections: Vec<Section>,
    pub warnings: Vec<String>,
}

/// Partition a sheet grid into item sections.
///
/// Search phase looks for strict `GROUP <n>:` banners, each followed within
/// four rows by a header row. When the sheet has no banners at all, the first
/// 25 rows are scanned for a bare header and the whole sheet becomes one
/// implicit section.
pub fn scan_sections(grid: &[Vec<String>]) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();

    // (banner row, group name, header row)
    let mut anchors: Vec<(usize, String, usize)> = Vec::new();
    let mut banner_rows: Vec<usize> = Vec::new();

    for (row_idx, row) in grid.iter().enumerate() {
        let Some(name) = row.iter().find_map(|cell| parse_banner(cell)) else {
            continue;
        };
        banner_rows.push(row_idx);

        let lookahead_end = (row_idx + 1 + HEADER_LOOKAHEAD).min(grid.len());
        let header = (row_idx + 1..lookahead_end).find(|&i| is_primary_header(&grid[i]));
        match header {
            Some(header_idx) => anchors.push((row_idx, name, header_idx)),
            None => outcome.warnings.push(format!(
                "Group \"{}\": no header row found after its banner, group skipped",
                name
            )),
        }
    }

    if banner_rows.is_empty() {
        // Fallback: one implicit group headed by the first recognizable header.
        let scan_end = FALLBACK_HEADER_SCAN.min(grid.len());
        if let Some(header_idx) = (0..scan_end).find(|&i| is_primary_header(&grid[i])) {
            outcome.sections.push(Section {
                name: "Imported Items".to_string(),
                columns: map_columns(&grid[header_idx]),
                start: header_idx + 1,
                end: grid.len(),
            });
        }
        return outcome;
    }

    for (_, name, header_idx) in &anchors {
        // Section runs until the next banner row, or end of sheet. Banners
        // whose own header was missing still terminate the previous section.
        let end = banner_rows
            .iter()
            .find(|&&b| b > *header_idx)
            .copied()
            .unwrap_or(grid.len());
        outcome.sections.push(Section {
            name: name.clone(),
            columns: map_columns(&grid[*header_idx]),
            start: header_idx + 1,
            end: end.max(header_idx + 1),
        });
    }

    outcome
}
