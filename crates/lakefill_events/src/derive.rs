//! Derived UserEvent fields.
//!
//! Every function here works column-at-a-time on arrays already aligned with
//! InvoiceLine. Only `is_trial_user` needs a second pass, which is why it is
//! split into [`SpendSummary::aggregate`] and [`SpendSummary::broadcast`].

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Float64Builder, Int64Array, Int64Builder,
    StringArray, StringBuilder,
};
use arrow::error::ArrowError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::warn;

use crate::join::{to_float64, to_utf8};

/// `event_type` of every row.
pub const EVENT_TYPE_PURCHASE: &str = "purchase";

/// Lifetime spend below this marks a trial user.
pub const DEFAULT_TRIAL_THRESHOLD: f64 = 5.0;

pub const INVOICE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const EVENT_DATE_FORMAT: &str = "%Y-%m-%d";

/// `%.f` also matches a missing fraction.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a legacy invoice timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.fff]`, the same with a `T` separator,
/// RFC 3339 with an offset (kept as wall-clock time in that offset) and a bare `YYYY-MM-DD`
/// (midnight). Returns `None` for anything else.
pub fn parse_invoice_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_local());
    }

    NaiveDate::parse_from_str(value, EVENT_DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Quantity column plus the exact factors used for `total_amount`.
#[derive(Debug)]
pub struct Quantities {
    /// Output `quantity`; never null.
    pub values: Int64Array,
    /// Quantity as read, before narrowing to an integer. Null only where the
    /// stored value is not a number.
    pub factors: Float64Array,
    /// Numeric values with a fractional part, truncated in `values`.
    pub fractional: usize,
    /// Non-null values that are not numbers at all.
    pub unparsable: usize,
}

/// Quantity per row.
///
/// 1 where the column is absent or the value is null. Text is parsed as a
/// number. A value that is not a number keeps quantity 1 but has no factor,
/// so its `total_amount` is null.
pub fn quantities(column: Option<&ArrayRef>, rows: usize) -> Result<Quantities, ArrowError> {
    let Some(column) = column else {
        return Ok(Quantities {
            values: Int64Array::from(vec![1; rows]),
            factors: Float64Array::from(vec![1.0; rows]),
            fractional: 0,
            unparsable: 0,
        });
    };

    let numeric = if column.data_type().is_numeric() {
        Some(to_float64(column)?)
    } else {
        None
    };
    let text = match numeric {
        Some(_) => None,
        None => Some(to_utf8(column)?),
    };

    let mut values = Int64Builder::with_capacity(rows);
    let mut factors = Float64Builder::with_capacity(rows);
    let mut fractional = 0;
    let mut unparsable = 0;
    let mut first_bad: Option<String> = None;

    for row in 0..column.len() {
        if column.is_null(row) {
            values.append_value(1);
            factors.append_value(1.0);
            continue;
        }
        let parsed = match (&numeric, &text) {
            (Some(numeric), _) => numeric.is_valid(row).then(|| numeric.value(row)),
            (None, Some(text)) => text.value(row).trim().parse::<f64>().ok(),
            (None, None) => None,
        };
        match parsed.filter(|q| q.is_finite()) {
            Some(q) => {
                if q.fract() != 0.0 {
                    fractional += 1;
                }
                values.append_value(q.trunc() as i64);
                factors.append_value(q);
            }
            None => {
                unparsable += 1;
                if let Some(text) = &text {
                    first_bad.get_or_insert_with(|| text.value(row).to_string());
                }
                values.append_value(1);
                factors.append_null();
            }
        }
    }

    if fractional > 0 {
        warn!(fractional, "Fractional quantities truncated in the quantity column");
    }
    if unparsable > 0 {
        warn!(
            unparsable,
            example = first_bad.as_deref().unwrap_or(""),
            "Non-numeric quantities; total_amount set to null"
        );
    }

    Ok(Quantities {
        values: values.finish(),
        factors: factors.finish(),
        fractional,
        unparsable,
    })
}

/// `quantity * unit_price` in floating point; null where either is null.
pub fn total_amounts(quantity: &Float64Array, unit_price: &Float64Array) -> Float64Array {
    quantity
        .iter()
        .zip(unit_price.iter())
        .map(|(q, price)| match (q, price) {
            (Some(q), Some(price)) => Some(q * price),
            _ => None,
        })
        .collect()
}

/// Normalized `invoice_date` and `event_date` columns.
#[derive(Debug)]
pub struct InvoiceDates {
    pub invoice_date: StringArray,
    pub event_date: StringArray,
    /// Non-null inputs that did not parse.
    pub unparsable: usize,
}

/// Parse raw invoice dates and render both output date columns.
///
/// Unparsable values become null in both columns and are counted; a null
/// input is simply null and not counted.
pub fn normalize_invoice_dates(raw: &ArrayRef) -> Result<InvoiceDates, ArrowError> {
    let raw = to_utf8(raw)?;
    let mut invoice_date = StringBuilder::with_capacity(raw.len(), raw.len() * 19);
    let mut event_date = StringBuilder::with_capacity(raw.len(), raw.len() * 10);
    let mut unparsable = 0;
    let mut first_bad: Option<String> = None;

    for value in raw.iter() {
        let parsed = match value {
            None => None,
            Some(text) => {
                let parsed = parse_invoice_timestamp(text);
                if parsed.is_none() {
                    unparsable += 1;
                    first_bad.get_or_insert_with(|| text.to_string());
                }
                parsed
            }
        };

        match parsed {
            Some(ts) => {
                invoice_date.append_value(ts.format(INVOICE_DATE_FORMAT).to_string());
                event_date.append_value(ts.date().format(EVENT_DATE_FORMAT).to_string());
            }
            None => {
                invoice_date.append_null();
                event_date.append_null();
            }
        }
    }

    if let Some(example) = first_bad {
        warn!(
            unparsable,
            example = %example,
            "Unparsable invoice dates replaced with null"
        );
    }

    Ok(InvoiceDates {
        invoice_date: invoice_date.finish(),
        event_date: event_date.finish(),
        unparsable,
    })
}

/// `"{invoice_id}-{user_id}"`; a null operand renders as an empty string.
pub fn session_ids(invoice_ids: &Int64Array, user_ids: &Int64Array) -> StringArray {
    let mut builder = StringBuilder::with_capacity(invoice_ids.len(), invoice_ids.len() * 8);
    for (invoice, user) in invoice_ids.iter().zip(user_ids.iter()) {
        let invoice = invoice.map(|v| v.to_string()).unwrap_or_default();
        let user = user.map(|v| v.to_string()).unwrap_or_default();
        builder.append_value(format!("{}-{}", invoice, user));
    }
    builder.finish()
}

/// Lifetime spend per user, the first phase of `is_trial_user`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpendSummary {
    spend: HashMap<i64, f64>,
}

impl SpendSummary {
    /// Sum `amounts` per user over every row.
    ///
    /// Each non-null user gets an entry even when all of their amounts are
    /// null; rows without a user are skipped.
    pub fn aggregate(users: &Int64Array, amounts: &Float64Array) -> Self {
        let mut spend: HashMap<i64, f64> = HashMap::new();
        for (user, amount) in users.iter().zip(amounts.iter()) {
            if let Some(user) = user {
                let total = spend.entry(user).or_insert(0.0);
                if let Some(amount) = amount {
                    *total += amount;
                }
            }
        }
        Self { spend }
    }

    pub fn lifetime_spend(&self, user: i64) -> Option<f64> {
        self.spend.get(&user).copied()
    }

    /// Number of distinct users seen.
    pub fn users(&self) -> usize {
        self.spend.len()
    }

    pub fn is_trial(&self, user: i64, threshold: f64) -> bool {
        self.lifetime_spend(user)
            .map(|spend| spend < threshold)
            .unwrap_or(false)
    }

    pub fn trial_users(&self, threshold: f64) -> usize {
        self.spend.values().filter(|spend| **spend < threshold).count()
    }

    /// Second phase: the per-user flag for every row. Null users are `false`.
    pub fn broadcast(&self, users: &Int64Array, threshold: f64) -> BooleanArray {
        users
            .iter()
            .map(|user| Some(user.map(|u| self.is_trial(u, threshold)).unwrap_or(false)))
            .collect()
    }
}
