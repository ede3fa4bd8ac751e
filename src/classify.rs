//! Row classification for semi-structured spreadsheet content.
//!
//! Human-authored sheets carry repeated headers, instructional text, banner
//! rows and blank padding between the actual data. Each row gets exactly one
//! tag; precedence is an explicit ordered rule table so the tie-breaks are
//! visible and testable. Ambiguity is resolved toward `Noise`: dropping a
//! legitimate row costs a warning, fabricating a record from garbage corrupts
//! a total.

use crate::coerce::parse_positive_int;

/// Glyph prefixing group banner rows, both in generated templates and in
/// uploads we re-ingest.
pub const GROUP_MARKER: char = '\u{1F4E6}'; // 📦

/// Header keywords counted when deciding whether a row names columns.
const HEADER_KEYWORDS: &[&str] = &[
    "part number",
    "product description",
    "qty",
    "quantity",
    "unit price",
    "total price",
    "no.",
];

/// Substrings marking instructional/decorative rows.
const NOISE_MARKERS: &[&str] = &[
    "===",
    "how to use",
    "column order",
    "note:",
    "example",
    "template",
    "instructions",
    "enter your",
    "please",
    "sample",
    "total:",
    "subtotal",
];

/// Tag assigned to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Banner starting a new BOM sub-section.
    GroupLabel,
    /// Names the columns of the rows below it.
    Header,
    /// Instructional text, separators, or anything failing the shape tests.
    Noise,
    /// A line item to hand to the record builder.
    Data,
}

/// Precomputed view of one row shared by all predicates.
pub struct RowCtx<'a> {
    pub cells: &'a [String],
    /// All cells joined with spaces, lowercased.
    pub joined: String,
}

impl<'a> RowCtx<'a> {
    pub fn new(cells: &'a [String]) -> Self {
        let joined = cells
            .iter()
            .map(|c| c.trim())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        Self { cells, joined }
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// Ordered rules for rows inside an identified workbook section. First match
/// wins; rows matching nothing fall through to `Noise`.
static WORKBOOK_RULES: &[(RowKind, fn(&RowCtx) -> bool)] = &[
    (RowKind::GroupLabel, is_group_label),
    (RowKind::Header, looks_like_header),
    (RowKind::Noise, is_noise_text),
    (RowKind::Data, is_workbook_data),
];

/// Classify a row from a workbook BOM/cost sheet.
pub fn classify_workbook_row(ctx: &RowCtx) -> RowKind {
    for (kind, predicate) in WORKBOOK_RULES {
        if predicate(ctx) {
            return *kind;
        }
    }
    RowKind::Noise
}

/// Banner rows carry the marker glyph together with the token "group".
/// The strict `GROUP <n>: <name>` pattern lives in the section scanner; this
/// looser test also catches malformed banners so they don't become data.
pub fn is_group_label(ctx: &RowCtx) -> bool {
    ctx.joined.contains(GROUP_MARKER) && ctx.joined.contains("group")
}

/// A row naming at least two known column keywords reads as a header.
pub fn looks_like_header(ctx: &RowCtx) -> bool {
    let hits = HEADER_KEYWORDS
        .iter()
        .filter(|kw| {
            ctx.cells
                .iter()
                .any(|c| c.trim().to_lowercase().contains(*kw))
        })
        .count();
    hits >= 2
}

/// Strict header test used when *searching* for the header row of a section:
/// one of the identifying columns plus a quantity column must both be present.
pub fn is_primary_header(cells: &[String]) -> bool {
    let lower: Vec<String> = cells.iter().map(|c| c.trim().to_lowercase()).collect();
    let has_ident = lower
        .iter()
        .any(|c| c.contains("part number") || c.contains("description"));
    let has_qty = lower.iter().any(|c| c.contains("qty") || c.contains("quantity"));
    has_ident && has_qty
}

fn is_noise_text(ctx: &RowCtx) -> bool {
    NOISE_MARKERS.iter().any(|m| ctx.joined.contains(m))
}

/// Shape test for workbook data rows. Rejects blank rows and wrapped prose
/// that drifted into the data region: when the first three cells are all
/// non-numeric and every word in them runs past 15 characters, the row is
/// almost certainly flowed text, not a part line. The word-length cutoff can
/// misfire on legitimately verbose descriptions; see the test pinning it.
fn is_workbook_data(ctx: &RowCtx) -> bool {
    if ctx.is_blank() {
        return false;
    }
    let leading: Vec<&str> = ctx.cells.iter().take(3).map(|c| c.trim()).collect();
    let any_numeric = leading
        .iter()
        .any(|c| crate::coerce::coerce_number(c).is_some());
    if !any_numeric {
        let words: Vec<&str> = leading.iter().flat_map(|c| c.split_whitespace()).collect();
        if !words.is_empty() && words.iter().all(|w| w.len() > 15) {
            return false;
        }
    }
    true
}

/// Classify one pasted line (tab-separated). Paste is always single-group, so
/// there is no banner rule; the data shape is stricter than the workbook one
/// because there is no surrounding header to anchor columns.
pub fn classify_paste_line(line: &str) -> RowKind {
    let cells: Vec<String> = line.split('\t').map(|c| c.to_string()).collect();
    let ctx = RowCtx::new(&cells);
    if looks_like_header(&ctx) {
        return RowKind::Header;
    }
    if is_noise_text(&ctx) {
        return RowKind::Noise;
    }
    if is_paste_data(&cells) {
        return RowKind::Data;
    }
    RowKind::Noise
}

/// Paste data shape: at least part number, description and a positive integer
/// quantity, in that fixed column order.
fn is_paste_data(cells: &[String]) -> bool {
    if cells.len() < 3 {
        return false;
    }
    if cells[0].trim().is_empty() || cells[1].trim().is_empty() {
        return false;
    }
    parse_positive_int(cells[2].trim()).is_some()
}
