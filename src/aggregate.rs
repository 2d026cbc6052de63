//! Cross-cellar aggregation.
//!
//! The same wine can sit in several cellars as separate rows with separate
//! ids. For list views those rows are folded into one [`AggregatedRow`] per
//! wine: quantities are summed and the contributing cellars collected.
//! Identity comes from descriptive content, never from the record id.
//!
//! ```rust,ignore
//! use cellar_client::aggregate::{aggregate, BottleRecord};
//!
//! let rows = aggregate([
//!     (cellar_a, bottles_a),
//!     (cellar_b, bottles_b),
//! ]);
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use crate::models::Bottle;
use crate::types::CellarId;

/// Content-derived identity used to decide whether two records are the same item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Hex SHA-256 over the parts, separated by U+001F so that
    /// `("ab", "c")` and `("a", "bc")` stay distinct.
    #[must_use]
    pub fn from_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut hasher = Sha256::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                hasher.update([0x1f]);
            }
            hasher.update(part.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A child record that can be folded across parents.
pub trait Aggregable {
    fn identity_key(&self) -> IdentityKey;

    /// Quantity contributed to the merged row. Unknown quantities count as 0.
    fn quantity(&self) -> u64;
}

/// One merged row per distinct identity.
///
/// `record` is the first record seen for the identity; its non-identity
/// fields (id, price, notes) stand in for the whole row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRow<R, P> {
    pub key: IdentityKey,
    pub record: R,
    pub quantity: u64,
    /// Parents that hold the item, in first-seen order, without duplicates.
    pub parent_ids: Vec<P>,
}

/// Incremental accumulator behind [`aggregate`].
///
/// Feed parents as their records arrive; the result is the same as a single
/// [`aggregate`] call over the same sequence.
#[derive(Debug, Clone)]
pub struct Aggregator<R, P> {
    rows: Vec<AggregatedRow<R, P>>,
    index: HashMap<IdentityKey, usize>,
}

impl<R, P> Default for Aggregator<R, P> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<R: Aggregable, P: Clone + PartialEq> Aggregator<R, P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds all of one parent's records, in order.
    pub fn push(&mut self, parent: P, records: impl IntoIterator<Item = R>) {
        for record in records {
            self.push_record(&parent, record);
        }
    }

    pub fn push_record(&mut self, parent: &P, record: R) {
        let key = record.identity_key();
        let quantity = record.quantity();

        if let Some(&i) = self.index.get(&key) {
            let row = &mut self.rows[i];
            row.quantity = row.quantity.saturating_add(quantity);
            if !row.parent_ids.contains(parent) {
                row.parent_ids.push(parent.clone());
            }
            return;
        }

        self.index.insert(key.clone(), self.rows.len());
        self.rows.push(AggregatedRow {
            key,
            record,
            quantity,
            parent_ids: vec![parent.clone()],
        });
    }

    #[must_use]
    pub fn rows(&self) -> &[AggregatedRow<R, P>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.rows
            .iter()
            .fold(0u64, |sum, row| sum.saturating_add(row.quantity))
    }

    #[must_use]
    pub fn finish(self) -> Vec<AggregatedRow<R, P>> {
        self.rows
    }
}

/// Merges records from several parents into rows in first-appearance order.
///
/// Parents are visited in order, and records within a parent in order. Pure
/// and deterministic.
#[must_use]
pub fn aggregate<R, P, I, Rs>(parents: I) -> Vec<AggregatedRow<R, P>>
where
    R: Aggregable,
    P: Clone + PartialEq,
    I: IntoIterator<Item = (P, Rs)>,
    Rs: IntoIterator<Item = R>,
{
    let mut aggregator = Aggregator::new();
    for (parent, records) in parents {
        aggregator.push(parent, records);
    }
    aggregator.finish()
}

/// Bottle as seen by the aggregation: every field present, defaults for the
/// missing or malformed ones.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BottleRecord {
    pub id: String,
    pub name: String,
    pub vintage: String,
    pub wine_type: String,
    pub region: String,
    pub country: String,
    pub price: f64,
    pub quantity: u64,
    pub notes: String,
}

pub type BottleRow = AggregatedRow<BottleRecord, CellarId>;

impl BottleRecord {
    /// Builds a record from one element of a bottle list.
    ///
    /// Returns `None` only for non-object values. Missing or non-text
    /// descriptive fields become `""`; a quantity that is missing,
    /// non-numeric or negative becomes 0.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        let object = value.as_object()?;
        let text = |field: &str| object.get(field).map(lenient_text).unwrap_or_default();

        Some(Self {
            id: text("id"),
            name: text("name"),
            vintage: text("vintage"),
            wine_type: text("wine_type"),
            region: text("region"),
            country: text("country"),
            price: object.get("price").map_or(0.0, lenient_price),
            quantity: object.get("quantity").map_or(0, lenient_quantity),
            notes: text("notes"),
        })
    }

    /// Parses a bottle list body, skipping elements that are not objects.
    #[must_use]
    pub fn list_from_json(value: &JsonValue) -> Vec<Self> {
        let Some(items) = value.as_array() else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let record = Self::from_json(item);
                if record.is_none() {
                    tracing::debug!(item = %item, "skipping non-object bottle entry");
                }
                record
            })
            .collect()
    }
}

impl From<&Bottle> for BottleRecord {
    fn from(bottle: &Bottle) -> Self {
        Self {
            id: bottle.id.to_string(),
            name: bottle.name.clone(),
            vintage: bottle.vintage.to_string(),
            wine_type: bottle.wine_type.clone(),
            region: bottle.region.clone().unwrap_or_default(),
            country: bottle.country.clone().unwrap_or_default(),
            price: bottle.price.unwrap_or(0.0),
            quantity: u64::try_from(bottle.quantity).unwrap_or(0),
            notes: bottle.notes.clone().unwrap_or_default(),
        }
    }
}

impl Aggregable for BottleRecord {
    fn identity_key(&self) -> IdentityKey {
        IdentityKey::from_parts([
            self.name.as_str(),
            self.vintage.as_str(),
            self.wine_type.as_str(),
            self.region.as_str(),
            self.country.as_str(),
        ])
    }

    fn quantity(&self) -> u64 {
        self.quantity
    }
}

fn lenient_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        // `2015.0` must key the same as `2015`.
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        _ => String::new(),
    }
}

fn lenient_price(value: &JsonValue) -> f64 {
    let price = match value {
        JsonValue::Number(n) => n.as_f64().unwrap_or(0.0),
        JsonValue::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if price.is_finite() { price } else { 0.0 }
}

fn lenient_quantity(value: &JsonValue) -> u64 {
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 1.0)
            .map_or(0, |f| f.trunc() as u64),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn bottle(name: &str, vintage: i64, quantity: JsonValue) -> JsonValue {
        json!({
            "id": format!("{name}-{vintage}"),
            "name": name,
            "vintage": vintage,
            "wine_type": "Rouge",
            "region": "Bordeaux",
            "country": "France",
            "price": 30.0,
            "quantity": quantity,
        })
    }

    fn records(values: &[JsonValue]) -> Vec<BottleRecord> {
        values.iter().filter_map(BottleRecord::from_json).collect()
    }

    fn cellar(id: &str) -> CellarId {
        CellarId::from(id)
    }

    #[test]
    fn same_wine_in_two_cellars_merges() {
        let rows = aggregate([
            (cellar("A"), records(&[bottle("Margaux", 2015, json!(2))])),
            (cellar("B"), records(&[bottle("Margaux", 2015, json!(3))])),
        ]);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 5);
        assert_eq!(rows[0].parent_ids, vec![cellar("A"), cellar("B")]);
        assert_eq!(rows[0].record.id, "Margaux-2015");
    }

    #[test]
    fn same_parent_twice_adds_quantity_not_parent() {
        let rows = aggregate([(
            cellar("A"),
            records(&[
                bottle("Margaux", 2015, json!(1)),
                bottle("Margaux", 2015, json!(4)),
            ]),
        )]);

        assert_eq!(rows[0].quantity, 5);
        assert_eq!(rows[0].parent_ids, vec![cellar("A")]);
    }

    #[test]
    fn any_identity_field_difference_splits_rows() {
        let base = bottle("Margaux", 2015, json!(1));
        let mut other_region = base.clone();
        other_region["region"] = json!("Médoc");
        let mut other_type = base.clone();
        other_type["wine_type"] = json!("Blanc");

        let rows = aggregate([(
            cellar("A"),
            records(&[base, bottle("Margaux", 2016, json!(1)), other_region, other_type]),
        )]);

        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn non_identity_fields_come_from_first_record() {
        let mut first = bottle("Margaux", 2015, json!(1));
        first["price"] = json!(10.0);
        first["notes"] = json!("first");
        let mut second = bottle("Margaux", 2015, json!(1));
        second["price"] = json!(99.0);
        second["notes"] = json!("second");
        second["id"] = json!("other-id");

        let rows = aggregate([(cellar("A"), records(&[first])), (cellar("B"), records(&[second]))]);

        assert_eq!(rows[0].record.price, 10.0);
        assert_eq!(rows[0].record.notes, "first");
        assert_eq!(rows[0].record.id, "Margaux-2015");
    }

    #[test]
    fn output_is_in_first_seen_order() {
        let rows = aggregate([
            (
                cellar("A"),
                records(&[bottle("Zinfandel", 2010, json!(1)), bottle("Alsace", 2012, json!(1))]),
            ),
            (
                cellar("B"),
                records(&[bottle("Margaux", 2015, json!(1)), bottle("Zinfandel", 2010, json!(1))]),
            ),
        ]);

        let names: Vec<_> = rows.iter().map(|r| r.record.name.as_str()).collect();
        assert_eq!(names, ["Zinfandel", "Alsace", "Margaux"]);
        assert_eq!(rows[0].parent_ids, vec![cellar("A"), cellar("B")]);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let input = || {
            (0..20)
                .map(|i| {
                    let bottles = (0..10)
                        .map(|j| bottle(&format!("wine-{}", (i * 7 + j) % 13), 2000 + j, json!(j)))
                        .collect::<Vec<_>>();
                    (cellar(&format!("c{i}")), records(&bottles))
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(aggregate(input()), aggregate(input()));
    }

    #[test]
    fn quantities_are_conserved() {
        let input = vec![
            (
                cellar("A"),
                records(&[
                    bottle("Margaux", 2015, json!(2)),
                    bottle("Chablis", 2019, json!("4")),
                    bottle("Chablis", 2019, json!(null)),
                ]),
            ),
            (
                cellar("B"),
                records(&[
                    bottle("Margaux", 2015, json!("abc")),
                    bottle("Pomerol", 2010, json!(6)),
                    bottle("Chablis", 2019, json!(1)),
                ]),
            ),
        ];
        let input_total: u64 = input
            .iter()
            .flat_map(|(_, records)| records.iter().map(Aggregable::quantity))
            .sum();

        let rows = aggregate(input);

        assert_eq!(input_total, 13);
        assert_eq!(rows.iter().map(|r| r.quantity).sum::<u64>(), input_total);
    }

    #[test]
    fn bad_quantity_still_contributes_parent() {
        let rows = aggregate([
            (cellar("A"), records(&[bottle("Margaux", 2015, json!(2))])),
            (cellar("B"), records(&[bottle("Margaux", 2015, json!("n/a"))])),
            (cellar("C"), records(&[bottle("Margaux", 2015, json!(-3))])),
        ]);

        assert_eq!(rows[0].quantity, 2);
        assert_eq!(rows[0].parent_ids.len(), 3);
    }

    #[test]
    fn malformed_records_degrade_instead_of_failing() {
        let values = [
            json!({"quantity": 1}),
            json!({"name": null, "vintage": [], "quantity": 2}),
            json!("not an object"),
            json!({"name": "Margaux", "vintage": "2015"}),
        ];
        let list = BottleRecord::list_from_json(&JsonValue::Array(values.to_vec()));

        assert_eq!(list.len(), 3);
        let rows = aggregate([(cellar("A"), list)]);

        // The two nameless records share the all-empty identity.
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].quantity, 3);
        assert_eq!(rows[0].record.name, "");
        assert_eq!(rows[1].record.vintage, "2015");
        assert_eq!(rows[1].quantity, 0);
    }

    #[test]
    fn numeric_and_text_vintage_share_identity() {
        let a = BottleRecord::from_json(&bottle("Margaux", 2015, json!(1))).unwrap();
        let mut b_json = bottle("Margaux", 2015, json!(1));
        b_json["vintage"] = json!("2015");
        let b = BottleRecord::from_json(&b_json).unwrap();

        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn integral_float_vintage_shares_identity() {
        let a = BottleRecord::from_json(&bottle("Margaux", 2015, json!(1))).unwrap();
        let mut b_json = bottle("Margaux", 2015, json!(1));
        b_json["vintage"] = json!(2015.0);
        let b = BottleRecord::from_json(&b_json).unwrap();

        assert_eq!(b.vintage, "2015");
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn fractional_quantities_truncate() {
        let quantity = |q: JsonValue| {
            BottleRecord::from_json(&bottle("Margaux", 2015, q))
                .unwrap()
                .quantity
        };

        assert_eq!(quantity(json!("3.7")), 3);
        assert_eq!(quantity(json!(" 2 ")), 2);
        assert_eq!(quantity(json!(4.9)), 4);
        assert_eq!(quantity(json!("-2.5")), 0);
        assert_eq!(quantity(json!("0.4")), 0);
    }

    #[test]
    fn identity_key_separates_parts() {
        assert_ne!(
            IdentityKey::from_parts(["ab", "c"]),
            IdentityKey::from_parts(["a", "bc"])
        );
        assert_eq!(IdentityKey::from_parts(["x"]).as_str().len(), 64);
    }

    #[test]
    fn incremental_feeding_matches_batch() {
        let parents = vec![
            (cellar("A"), records(&[bottle("Margaux", 2015, json!(1)), bottle("Chablis", 2019, json!(2))])),
            (cellar("B"), records(&[bottle("Chablis", 2019, json!(5))])),
        ];

        let mut aggregator = Aggregator::new();
        for (parent, records) in parents.clone() {
            for record in records {
                aggregator.push_record(&parent, record);
            }
        }

        assert_eq!(aggregator.len(), 2);
        assert_eq!(aggregator.total_quantity(), 8);
        assert_eq!(aggregator.finish(), aggregate(parents));
    }

    #[test]
    fn empty_input() {
        let rows: Vec<BottleRow> = aggregate(Vec::<(CellarId, Vec<BottleRecord>)>::new());
        assert!(rows.is_empty());
        assert!(Aggregator::<BottleRecord, CellarId>::new().is_empty());
    }

    #[test]
    fn typed_bottle_converts() {
        let bottle: Bottle = serde_json::from_value(json!({
            "id": "b1", "name": "Margaux", "vintage": 2015, "wine_type": "Rouge",
            "region": "Bordeaux", "country": "France", "quantity": 2
        }))
        .unwrap();
        let record = BottleRecord::from(&bottle);
        let from_json = BottleRecord::from_json(&json!({
            "id": "b1", "name": "Margaux", "vintage": 2015, "wine_type": "Rouge",
            "region": "Bordeaux", "country": "France", "quantity": 2
        }))
        .unwrap();

        assert_eq!(record, from_json);
    }
}
