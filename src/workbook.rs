//! Workbook decoding for CSV and Excel (.xlsx/.xlsm/.xlsb) uploads.
//!
//! This is the I/O boundary in front of the ingestion core: bytes in, named
//! grids of strings out. Header discovery and row classification happen in
//! the core, so grids are emitted raw, decorative rows and all.

use crate::ingest::Grid;
use anyhow::{Context, Result};
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx, Xlsb};
use std::io::Cursor;

/// Dispatch file decoding by extension.
pub fn decode_file(filename: &str, data: &[u8]) -> Result<Vec<(String, Grid)>> {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();

    match ext.as_str() {
        "csv" => decode_csv(filename, data),
        "xlsx" | "xlsm" => decode_xlsx(data),
        "xlsb" => decode_xlsb(data),
        _ => anyhow::bail!(
            "Unsupported file type: .{}. Supported: .csv, .xlsx, .xlsm, .xlsb",
            ext
        ),
    }
}

/// Decode a CSV file into a single sheet named after the file.
fn decode_csv(filename: &str, data: &[u8]) -> Result<Vec<(String, Grid)>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(data);

    let mut grid: Grid = Vec::new();
    for record in reader.records() {
        let record = record.context("Failed to read CSV record")?;
        grid.push(record.iter().map(|f| f.to_string()).collect());
    }

    if grid.is_empty() {
        anyhow::bail!("CSV file is empty");
    }

    let name = filename
        .rsplit('/')
        .next()
        .unwrap_or(filename)
        .rsplit('\\')
        .next()
        .unwrap_or(filename)
        .trim_end_matches(".csv")
        .to_string();

    Ok(vec![(name, grid)])
}

/// Decode an xlsx/xlsm file. Every worksheet becomes a named grid.
fn decode_xlsx(data: &[u8]) -> Result<Vec<(String, Grid)>> {
    let cursor = Cursor::new(data);
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(cursor).context("Failed to open Excel workbook")?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::new();

    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping sheet '{}': {}", name, e);
                continue;
            }
        };
        if let Some(grid) = range_to_grid(&range) {
            sheets.push((name.clone(), grid));
        }
    }

    if sheets.is_empty() {
        anyhow::bail!("No sheets with data found in workbook");
    }

    Ok(sheets)
}

/// Decode an xlsb file.
fn decode_xlsb(data: &[u8]) -> Result<Vec<(String, Grid)>> {
    let cursor = Cursor::new(data);
    let mut workbook: Xlsb<_> =
        open_workbook_from_rs(cursor).context("Failed to open Excel workbook")?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::new();

    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping sheet '{}': {}", name, e);
                continue;
            }
        };
        if let Some(grid) = range_to_grid(&range) {
            sheets.push((name.clone(), grid));
        }
    }

    if sheets.is_empty() {
        anyhow::bail!("No sheets with data found in workbook");
    }

    Ok(sheets)
}

/// Convert a calamine Range into a raw grid. Sheets with no visible content
/// at all are dropped; everything else passes through untouched so the core
/// sees the decorative rows it is built to classify.
fn range_to_grid(range: &calamine::Range<Data>) -> Option<Grid> {
    let grid: Grid = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    if grid
        .iter()
        .all(|row| row.iter().all(|c| c.trim().is_empty()))
    {
        return None;
    }
    Some(grid)
}

/// Convert a calamine cell to a string representation.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Avoid trailing ".0" for whole numbers
            if *f == (*f as i64) as f64 && f.abs() < i64::MAX as f64 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_string(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{:?}", e),
    }
}

/// Convert an Excel serial date number to a human-readable string.
/// Excel epoch: 1899-12-30 (with the 1900 leap year bug — day 60 is "Feb 29, 1900" which doesn't exist).
fn excel_serial_to_string(serial: f64) -> String {
    let days = serial as i64;
    let frac = serial - days as f64;

    // Adjust for Excel's 1900 leap year bug (serial > 59 means after fake Feb 29, 1900)
    let adjusted_days = if days > 59 { days - 1 } else { days };

    let base = 25569i64; // days from 1899-12-30 to 1970-01-01
    let unix_days = adjusted_days - base;
    let total_secs = unix_days * 86400 + (frac * 86400.0) as i64;

    let days_since_epoch = total_secs / 86400;
    let time_of_day = (total_secs % 86400 + 86400) % 86400;

    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let mut year = 1970i32;
    let mut remaining = days_since_epoch as i32;

    if remaining >= 0 {
        loop {
            let diy = if is_leap(year) { 366 } else { 365 };
            if remaining < diy {
                break;
            }
            remaining -= diy;
            year += 1;
        }
    } else {
        loop {
            year -= 1;
            let diy = if is_leap(year) { 366 } else { 365 };
            remaining += diy;
            if remaining >= 0 {
                break;
            }
        }
    }

    let dim: [i32; 12] = if is_leap(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for d in dim {
        if remaining < d {
            break;
        }
        remaining -= d;
        month += 1;
    }
    let day = remaining + 1;

    if hours == 0 && minutes == 0 && seconds == 0 {
        format!("{:04}-{:02}-{:02}", year, month, day)
    } else {
        format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            year, month, day, hours, minutes, seconds
        )
    }
}

fn is_leap(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
