//! Record building: one classified data row plus a column map in, one typed
//! record (or a warning) out. Never fails — rejections and corrections are
//! reported through the shared warnings list.

use crate::coerce::{coerce_bool, coerce_number, coerce_quantity, parse_positive_int};
use crate::columns::ColumnMap;
use crate::model::{BomItem, CostItem};

/// Fetch a trimmed cell by mapped column, treating an absent column and an
/// out-of-range row the same way: no value.
fn cell<'a>(row: &'a [String], idx: Option<usize>) -> Option<&'a str> {
    idx.and_then(|i| row.get(i)).map(|c| c.trim())
}

/// Build a BOM item from a data row.
///
/// `position` is the item's 1-based position within its group and doubles as
/// the fallback for a missing or uncoercible `no` cell. `row_number` is the
/// 1-based sheet row, used only in warning messages. With `validate` off,
/// rows with neither part number nor description are kept as-is.
pub fn build_bom_item(
    row: &[String],
    columns: &ColumnMap,
    position: u32,
    row_number: usize,
    validate: bool,
    warnings: &mut Vec<String>,
) -> Option<BomItem> {
    let part_number = cell(row, columns.part_number).unwrap_or("").to_string();
    let product_description = cell(row, columns.product_description)
        .unwrap_or("")
        .to_string();

    if validate && part_number.is_empty() && product_description.is_empty() {
        warnings.push(format!(
            "Row {}: skipped, needs a part number or a product description",
            row_number
        ));
        return None;
    }

    let no = cell(row, columns.no)
        .and_then(parse_positive_int)
        .unwrap_or(position);

    let quantity = match cell(row, columns.quantity) {
        Some(raw) => {
            let (qty, clamped) = coerce_quantity(raw);
            if clamped {
                warnings.push(format!(
                    "Row {}: invalid quantity {:?}, corrected to 1",
                    row_number, raw
                ));
            }
            qty
        }
        None => 1,
    };

    let unit_price = cell(row, columns.unit_price).and_then(coerce_number);
    // Missing prices are legitimate (price columns are optional), never a
    // reason to reject the row.
    let total_price = unit_price.map(|p| quantity as f64 * p);

    Some(BomItem {
        no,
        part_number,
        product_description,
        quantity,
        unit_price,
        total_price,
    })
}

/// Build a cost line from a data row. Costs are always priced, so missing
/// price cells default to zero instead of staying unset.
pub fn build_cost_item(
    row: &[String],
    columns: &ColumnMap,
    row_number: usize,
    warnings: &mut Vec<String>,
) -> Option<CostItem> {
    let product_description = cell(row, columns.product_description)
        .unwrap_or("")
        .to_string();
    if product_description.is_empty() {
        warnings.push(format!(
            "Row {}: skipped cost line without a description",
            row_number
        ));
        return None;
    }

    let quantity = match cell(row, columns.quantity) {
        Some(raw) => {
            let (qty, clamped) = coerce_quantity(raw);
            if clamped {
                warnings.push(format!(
                    "Row {}: invalid quantity {:?}, corrected to 1",
                    row_number, raw
                ));
            }
            qty
        }
        None => 1,
    };

    let unit_price = cell(row, columns.unit_price)
        .and_then(coerce_number)
        .unwrap_or(0.0);
    let is_discount = coerce_bool(cell(row, columns.is_discount).unwrap_or(""), false);

    Some(CostItem {
        product_description,
        quantity,
        unit_price,
        total_price: quantity as f64 * unit_price,
        is_discount,
    })
}
