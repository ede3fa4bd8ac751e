//! Quote data model: BOM items/groups, cost lines, column visibility and the
//! ingestion result type everything else hangs off.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate ISO8601 timestamp for current time.
pub fn now_iso8601() -> String {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let days_since_epoch = secs / 86400;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let mut year = 1970i32;
    let mut remaining_days = days_since_epoch as i32;

    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let days_in_months: [i32; 12] = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for days in days_in_months {
        if remaining_days < days {
            break;
        }
        remaining_days -= days;
        month += 1;
    }
    let day = remaining_days + 1;

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year, month, day, hours, minutes, seconds
    )
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// One line in a bill of materials.
///
/// `no` is the 1-based display position within its group and is re-assigned on
/// every structural mutation, so it never drifts from the item's actual index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomItem {
    pub no: u32,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub product_description: String,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
}

impl BomItem {
    /// Recompute `total_price` from `quantity * unit_price`. While the total
    /// column is active the stored total is never independently authoritative.
    pub fn recompute_total(&mut self, visibility: &ColumnVisibility) {
        self.total_price = if visibility.total_price {
            self.unit_price.map(|p| self.quantity as f64 * p)
        } else {
            None
        };
    }
}

/// A named, ordered collection of BOM items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<BomItem>,
}

impl BomGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: format!("grp_{}", Uuid::new_v4().simple()),
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Re-assign `no` so it equals each item's 1-based position.
    pub fn renumber(&mut self) {
        for (i, item) in self.items.iter_mut().enumerate() {
            item.no = (i + 1) as u32;
        }
    }

    /// Remove the item at `index` (ignored if out of range) and renumber.
    pub fn remove_item(&mut self, index: usize) {
        if index < self.items.len() {
            self.items.remove(index);
            self.renumber();
        }
    }

    /// Sum of the defined total prices in this group.
    pub fn subtotal(&self) -> f64 {
        self.items.iter().filter_map(|i| i.total_price).sum()
    }
}

/// Renumber default group names ("BOM 1", "BOM 2", ...) by position. Only
/// groups still carrying a default-style name are renamed; user-named groups
/// keep their names.
pub fn renumber_groups(groups: &mut [BomGroup]) {
    for (i, group) in groups.iter_mut().enumerate() {
        if group.name.starts_with("BOM ") && group.name[4..].parse::<u32>().is_ok() {
            group.name = format!("BOM {}", i + 1);
        }
    }
}

/// A line in the cost/discount breakdown. Unlike BOM items, costs are always
/// priced: missing prices default to zero rather than staying unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostItem {
    pub product_description: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
    #[serde(default)]
    pub is_discount: bool,
}

impl CostItem {
    pub fn recompute_total(&mut self) {
        self.total_price = self.quantity as f64 * self.unit_price;
    }
}

/// Grand total over a cost breakdown: discounts subtract, everything else adds.
pub fn cost_grand_total(items: &[CostItem]) -> f64 {
    items.iter().fold(0.0, |acc, item| {
        if item.is_discount {
            acc - item.total_price
        } else {
            acc + item.total_price
        }
    })
}

/// Flags controlling which BOM columns are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnVisibility {
    pub no: bool,
    pub part_number: bool,
    pub product_description: bool,
    pub qty: bool,
    pub unit_price: bool,
    pub total_price: bool,
}

impl Default for ColumnVisibility {
    fn default() -> Self {
        Self {
            no: true,
            part_number: true,
            product_description: true,
            qty: true,
            unit_price: false,
            total_price: false,
        }
    }
}

impl ColumnVisibility {
    /// Both price columns on. Used when imported data carries prices.
    pub fn with_prices(mut self) -> Self {
        self.unit_price = true;
        self.total_price = true;
        self
    }

    pub fn shows_prices(&self) -> bool {
        self.unit_price && self.total_price
    }
}

/// Recompute `total_price` for every item in every group. Called after a price
/// column is toggled on so existing items get backfilled.
pub fn backfill_totals(groups: &mut [BomGroup], visibility: &ColumnVisibility) {
    for group in groups {
        for item in &mut group.items {
            item.recompute_total(visibility);
        }
    }
}

/// Header fields of a quote. All optional so a partially-filled quote-info
/// sheet merges cleanly into existing form state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_terms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bom_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub costs_enabled: Option<bool>,
}

impl QuoteInfo {
    /// True when no field was recovered at all.
    pub fn is_empty(&self) -> bool {
        self.quote_subject.is_none()
            && self.customer_company.is_none()
            && self.sales_person.is_none()
            && self.date.is_none()
            && self.version.is_none()
            && self.payment_terms.is_none()
            && self.currency.is_none()
            && self.bom_enabled.is_none()
            && self.costs_enabled.is_none()
    }

    /// Overlay `other` onto `self`, keeping existing values where `other` has none.
    pub fn merge(&mut self, other: QuoteInfo) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(quote_subject);
        take!(customer_company);
        take!(sales_person);
        take!(date);
        take!(version);
        take!(payment_terms);
        take!(currency);
        take!(bom_enabled);
        take!(costs_enabled);
    }
}

/// Output of one ingestion call (workbook or paste). Transient: derived fresh
/// per call and merged into form state by the caller.
///
/// Zero items plus zero quote-info fields but some warnings means "nothing
/// usable found", which is distinct from a hard error in `errors`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedResult {
    #[serde(default)]
    pub quote_info: QuoteInfo,
    #[serde(default)]
    pub bom_groups: Vec<BomGroup>,
    #[serde(default)]
    pub cost_items: Vec<CostItem>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Visibility the caller should adopt (price auto-enable). The parser
    /// never mutates caller state; applying this is the caller's decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_visibility: Option<ColumnVisibility>,
}

impl ParsedResult {
    pub fn is_usable(&self) -> bool {
        !self.bom_groups.is_empty() || !self.cost_items.is_empty() || !self.quote_info.is_empty()
    }

    /// Merge recovered content into an existing quote. Imported groups replace
    /// a quote whose only group is still empty, otherwise they append; the
    /// proposed visibility is adopted and totals backfilled when it turns the
    /// price columns on.
    pub fn merge_into(&self, quote: &mut Quote) {
        quote.info.merge(self.quote_info.clone());

        if !self.bom_groups.is_empty() {
            let pristine =
                quote.groups.len() == 1 && quote.groups[0].items.is_empty();
            if pristine {
                quote.groups = self.bom_groups.clone();
            } else {
                quote.groups.extend(self.bom_groups.iter().cloned());
            }
            renumber_groups(&mut quote.groups);
        }

        quote.cost_items.extend(self.cost_items.iter().cloned());

        if let Some(visibility) = self.proposed_visibility {
            if visibility.shows_prices() && !quote.visibility.shows_prices() {
                quote.visibility = quote.visibility.with_prices();
                backfill_totals(&mut quote.groups, &quote.visibility);
            }
        }
    }
}

/// A stored quote: header info plus BOM groups, costs and column settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: String,
    #[serde(default)]
    pub info: QuoteInfo,
    #[serde(default)]
    pub groups: Vec<BomGroup>,
    #[serde(default)]
    pub cost_items: Vec<CostItem>,
    #[serde(default)]
    pub visibility: ColumnVisibility,
    pub created_at: String,
    pub updated_at: String,
}

impl Quote {
    pub fn new() -> Self {
        let now = now_iso8601();
        Self {
            id: format!("qt_{}", Uuid::new_v4().simple()),
            info: QuoteInfo::default(),
            groups: vec![BomGroup::new("BOM 1")],
            cost_items: Vec::new(),
            visibility: ColumnVisibility::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Remove a group by id, then renumber the default group names.
    pub fn remove_group(&mut self, group_id: &str) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| g.id != group_id);
        let removed = self.groups.len() != before;
        if removed {
            renumber_groups(&mut self.groups);
        }
        removed
    }

    pub fn cost_total(&self) -> f64 {
        cost_grand_total(&self.cost_items)
    }

    /// Re-derive every computed field from the quote's source data: group
    /// numbering, BOM total prices, and cost-line totals. Run after accepting
    /// a client-supplied quote body, whose derived fields are untrusted.
    pub fn recalculate(&mut self) {
        renumber_groups(&mut self.groups);
        for group in &mut self.groups {
            group.renumber();
        }
        backfill_totals(&mut self.groups, &self.visibility);
        for item in &mut self.cost_items {
            item.recompute_total();
        }
    }
}

impl Default for Quote {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(no: u32, part: &str, qty: u32, price: Option<f64>) -> BomItem {
        BomItem {
            no,
            part_number: part.to_string(),
            product_description: format!("{} desc", part),
            quantity: qty,
            unit_price: price,
            total_price: None,
        }
    }

    #[test]
    fn test_renumber_after_remove_any_index() {
        for remove_at in 0..4 {
            let mut group = BomGroup::new("BOM 1");
            group.items = (1..=4).map(|n| item(n, "P", 1, None)).collect();
            group.remove_item(remove_at);
            let positions: Vec<u32> = group.items.iter().map(|i| i.no).collect();
            assert_eq!(positions, vec![1, 2, 3]);
        }
    }

    #[test]
    fn test_total_price_derivation() {
        let visibility = ColumnVisibility::default().with_prices();
        let mut it = item(1, "X-1", 3, Some(12.5));
        it.recompute_total(&visibility);
        assert_eq!(it.total_price, Some(37.5));

        // total column off masks the derived value
        let hidden = ColumnVisibility::default();
        it.recompute_total(&hidden);
        assert_eq!(it.total_price, None);
    }

    #[test]
    fn test_backfill_recompute_across_groups() {
        let mut groups = vec![BomGroup::new("BOM 1"), BomGroup::new("BOM 2")];
        groups[0].items.push(item(1, "A", 2, Some(10.0)));
        groups[1].items.push(item(1, "B", 4, Some(2.5)));
        backfill_totals(&mut groups, &ColumnVisibility::default().with_prices());
        assert_eq!(groups[0].items[0].total_price, Some(20.0));
        assert_eq!(groups[1].items[0].total_price, Some(10.0));
        assert_eq!(groups[0].subtotal(), 20.0);
    }

    #[test]
    fn test_group_renumber_on_remove() {
        let mut quote = Quote::new();
        quote.groups.push(BomGroup::new("BOM 2"));
        quote.groups.push(BomGroup::new("BOM 3"));
        let middle = quote.groups[1].id.clone();
        assert!(quote.remove_group(&middle));
        let names: Vec<&str> = quote.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["BOM 1", "BOM 2"]);
    }

    #[test]
    fn test_custom_group_names_survive_renumber() {
        let mut groups = vec![BomGroup::new("Rack hardware"), BomGroup::new("BOM 2")];
        renumber_groups(&mut groups);
        assert_eq!(groups[0].name, "Rack hardware");
        assert_eq!(groups[1].name, "BOM 2");
    }

    #[test]
    fn test_cost_grand_total_discount_sign() {
        let items = vec![
            CostItem {
                product_description: "Install".into(),
                quantity: 2,
                unit_price: 100.0,
                total_price: 200.0,
                is_discount: false,
            },
            CostItem {
                product_description: "Freight".into(),
                quantity: 1,
                unit_price: 50.0,
                total_price: 50.0,
                is_discount: false,
            },
            CostItem {
                product_description: "Loyalty discount".into(),
                quantity: 1,
                unit_price: 30.0,
                total_price: 30.0,
                is_discount: true,
            },
        ];
        assert_eq!(cost_grand_total(&items), 220.0);

        let mut quote = Quote::new();
        quote.cost_items = items;
        assert_eq!(quote.cost_total(), 220.0);
    }

    #[test]
    fn test_quote_info_merge_keeps_existing() {
        let mut base = QuoteInfo {
            quote_subject: Some("Servers".into()),
            currency: Some("USD".into()),
            ..Default::default()
        };
        base.merge(QuoteInfo {
            customer_company: Some("Acme".into()),
            currency: Some("EUR".into()),
            ..Default::default()
        });
        assert_eq!(base.quote_subject.as_deref(), Some("Servers"));
        assert_eq!(base.customer_company.as_deref(), Some("Acme"));
        assert_eq!(base.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_merge_into_pristine_quote_replaces_default_group() {
        let mut quote = Quote::new();
        let mut imported = BomGroup::new("Servers");
        imported.items.push(item(1, "SRV-1", 2, Some(100.0)));
        let result = ParsedResult {
            bom_groups: vec![imported],
            proposed_visibility: Some(ColumnVisibility::default().with_prices()),
            ..Default::default()
        };
        result.merge_into(&mut quote);
        assert_eq!(quote.groups.len(), 1);
        assert_eq!(quote.groups[0].name, "Servers");
        assert!(quote.visibility.shows_prices());
        assert_eq!(quote.groups[0].items[0].total_price, Some(200.0));
    }

    #[test]
    fn test_merge_into_populated_quote_appends() {
        let mut quote = Quote::new();
        quote.groups[0].items.push(item(1, "EXIST-1", 1, None));
        let result = ParsedResult {
            bom_groups: vec![BomGroup::new("Imported Items")],
            ..Default::default()
        };
        result.merge_into(&mut quote);
        assert_eq!(quote.groups.len(), 2);
        assert_eq!(quote.groups[0].items[0].part_number, "EXIST-1");
        assert_eq!(quote.groups[1].name, "Imported Items");
    }

    #[test]
    fn test_empty_result_with_warnings_is_not_usable() {
        let result = ParsedResult {
            warnings: vec!["Row 3: skipped non-data row".into()],
            ..Default::default()
        };
        assert!(!result.is_usable());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_unset_prices_are_omitted_from_json() {
        let unpriced = serde_json::to_value(item(1, "P-1", 2, None)).unwrap();
        assert!(unpriced.get("unit_price").is_none());
        assert!(unpriced.get("total_price").is_none());

        let mut priced = item(1, "P-1", 2, Some(10.0));
        priced.recompute_total(&ColumnVisibility::default().with_prices());
        let priced = serde_json::to_value(priced).unwrap();
        assert_eq!(priced["unit_price"], serde_json::json!(10.0));
        assert_eq!(priced["total_price"], serde_json::json!(20.0));
    }

    #[test]
    fn test_recalculate_rederives_totals_and_numbering() {
        let mut quote = Quote::new();
        quote.visibility = quote.visibility.with_prices();
        quote.groups[0].items.push(item(7, "P-1", 3, Some(5.0)));
        quote.groups[0].items[0].total_price = Some(999.0);
        quote.cost_items.push(CostItem {
            product_description: "Shipping".into(),
            quantity: 2,
            unit_price: 40.0,
            total_price: 999.0,
            is_discount: false,
        });

        quote.recalculate();

        assert_eq!(quote.groups[0].items[0].no, 1);
        assert_eq!(quote.groups[0].items[0].total_price, Some(15.0));
        assert_eq!(quote.cost_items[0].total_price, 80.0);
    }
}
