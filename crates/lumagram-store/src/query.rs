//! Filtered, ordered reads over one collection.

use std::cmp::Ordering;

use serde_json::Value;

use lumagram_shared::Fields;

use crate::document::Document;
use crate::path::CollectionRef;

/// Sort direction of an order-by clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
struct FieldFilter {
    field: String,
    equals: Value,
}

#[derive(Debug, Clone)]
struct OrderBy {
    field: String,
    direction: Direction,
}

/// A query over a single collection: equality filters plus an optional
/// order-by clause.
#[derive(Debug, Clone)]
pub struct Query {
    collection: CollectionRef,
    filters: Vec<FieldFilter>,
    order_by: Option<OrderBy>,
}

impl Query {
    pub fn collection(collection: CollectionRef) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
        }
    }

    /// Keeps only documents whose field equals the value exactly.
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.to_owned(),
            equals: value.into(),
        });
        self
    }

    /// Orders results by a field.  Documents missing the field sort as JSON
    /// null, which ranks below every other value.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_owned(),
            direction,
        });
        self
    }

    pub fn collection_ref(&self) -> &CollectionRef {
        &self.collection
    }

    /// Whether a document of this query's collection passes every filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters
            .iter()
            .all(|filter| fields.get(&filter.field).unwrap_or(&Value::Null) == &filter.equals)
    }

    /// Applies the order-by clause in place.  The sort is stable, so ties
    /// keep the backend's path order.
    pub fn sort(&self, docs: &mut [Document]) {
        let Some(order) = &self.order_by else {
            return;
        };
        docs.sort_by(|a, b| {
            let left = a.fields.get(&order.field).unwrap_or(&Value::Null);
            let right = b.fields.get(&order.field).unwrap_or(&Value::Null);
            match order.direction {
                Direction::Ascending => compare_values(left, right),
                Direction::Descending => compare_values(left, right).reverse(),
            }
        });
    }
}

/// Deterministic order across JSON values:
/// null < bool < number < string < array < object.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xv, yv) in x.iter().zip(y.iter()) {
                let ord = compare_values(xv, yv);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => rank(a).cmp(&rank(b)),
    }
}
