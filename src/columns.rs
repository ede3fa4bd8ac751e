//! Header-cell to canonical-field mapping.
//!
//! Headers come from human-authored spreadsheets, so matching is substring and
//! keyword based rather than exact. A field absent from the map means "column
//! not present in this sheet", which callers must keep distinct from "cell
//! empty".

/// Canonical BOM/cost columns the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    No,
    PartNumber,
    ProductDescription,
    Quantity,
    UnitPrice,
    TotalPrice,
    IsDiscount,
}

/// Column index per canonical field, `None` when the header row had no match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub no: Option<usize>,
    pub part_number: Option<usize>,
    pub product_description: Option<usize>,
    pub quantity: Option<usize>,
    pub unit_price: Option<usize>,
    pub total_price: Option<usize>,
    pub is_discount: Option<usize>,
}

impl ColumnMap {
    /// A map that can't address at least a part number or a description is
    /// useless for record building.
    pub fn is_usable(&self) -> bool {
        self.part_number.is_some() || self.product_description.is_some()
    }
}

/// Classify one lowercased header cell. First rule wins; cells that match
/// nothing return `None` and the column is ignored.
fn match_header_cell(cell: &str) -> Option<Field> {
    // "no" is checked first: a price header qualified like "unit price (no
    // vat)" is a numbering cell, not a price cell, under this ruleset. The
    // part guard keeps "Part Number" / "Part No." out of the numbering slot.
    if cell.contains("no") && !cell.contains("part") {
        return Some(Field::No);
    }
    if cell.contains("part number") || cell == "part" || cell == "pn" {
        return Some(Field::PartNumber);
    }
    if cell.contains("product description") || cell.contains("description") {
        return Some(Field::ProductDescription);
    }
    if cell == "qty" || cell == "quantity" {
        return Some(Field::Quantity);
    }
    if cell.contains("unit price") {
        return Some(Field::UnitPrice);
    }
    if cell.contains("total price") {
        return Some(Field::TotalPrice);
    }
    if cell.contains("discount") {
        return Some(Field::IsDiscount);
    }
    None
}

/// Map a header row's cells to canonical fields. Each cell is evaluated
/// independently; the first cell claiming a field keeps it.
pub fn map_columns(header_cells: &[String]) -> ColumnMap {
    let mut map = ColumnMap::default();
    for (idx, raw) in header_cells.iter().enumerate() {
        let cell = raw.trim().to_lowercase();
        if cell.is_empty() {
            continue;
        }
        let slot = match match_header_cell(&cell) {
            Some(Field::No) => &mut map.no,
            Some(Field::PartNumber) => &mut map.part_number,
            Some(Field::ProductDescription) => &mut map.product_description,
            Some(Field::Quantity) => &mut map.quantity,
            Some(Field::UnitPrice) => &mut map.unit_price,
            Some(Field::TotalPrice) => &mut map.total_price,
            Some(Field::IsDiscount) => &mut map.is_discount,
            None => continue,
        };
        if slot.is_none() {
            *slot = Some(idx);
        }
    }
    map
}
