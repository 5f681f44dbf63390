//! Left-join chain from InvoiceLine outward.
//!
//! Each dimension table is indexed by its key. A join step turns a key column
//! aligned with InvoiceLine into a nullable row-index vector into the
//! dimension table; a null index is an unmatched row. Output columns are then
//! gathered with `take`, so unmatched rows come out null and the row count
//! never changes.

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray, UInt64Array};
use arrow::compute::{cast, take};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::error::ArrowError;
use lakefill_source::{SchemaMismatch, SourceTable};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extract::SourceTables;
use crate::mapping::{EventMapping, PriceBinding, SourceKind};

/// Integer view of a column. Values that are not whole numbers become null
/// rather than being truncated, so a key of `1.7` never matches row `1`.
pub(crate) fn to_int64(array: &ArrayRef) -> std::result::Result<Int64Array, ArrowError> {
    let data_type = array.data_type();
    if data_type.is_integer() {
        return Ok(cast(array, &DataType::Int64)?.as_primitive::<Int64Type>().clone());
    }
    if data_type.is_floating() {
        return Ok(to_float64(array)?.iter().map(|v| v.and_then(whole_number)).collect());
    }
    Ok(to_utf8(array)?
        .iter()
        .map(|v| v.and_then(parse_whole_number))
        .collect())
}

/// `v` as an integer when it has no fractional part and fits in i64.
pub(crate) fn whole_number(v: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (v.is_finite() && v.fract() == 0.0 && (-LIMIT..LIMIT).contains(&v)).then(|| v as i64)
}

fn parse_whole_number(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().and_then(whole_number))
}

pub(crate) fn to_float64(array: &ArrayRef) -> std::result::Result<Float64Array, ArrowError> {
    Ok(cast(array, &DataType::Float64)?
        .as_primitive::<Float64Type>()
        .clone())
}

pub(crate) fn to_utf8(array: &ArrayRef) -> std::result::Result<StringArray, ArrowError> {
    Ok(cast(array, &DataType::Utf8)?.as_string::<i32>().clone())
}

/// Key value -> first row holding it.
#[derive(Debug)]
pub(crate) struct KeyIndex {
    rows: HashMap<i64, u64>,
    duplicates: usize,
}

impl KeyIndex {
    pub(crate) fn build(table: &SourceTable, key_column: &str) -> Result<Self> {
        let keys = to_int64(table.column(key_column)?)?;
        let mut rows = HashMap::with_capacity(keys.len());
        let mut duplicates = 0;

        for (row, key) in keys.iter().enumerate() {
            if let Some(key) = key {
                match rows.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(row as u64);
                    }
                    Entry::Occupied(_) => duplicates += 1,
                }
            }
        }

        if duplicates > 0 {
            warn!(
                table = table.name(),
                key = key_column,
                duplicates,
                "Duplicate join keys; keeping the first row for each key"
            );
        }

        Ok(Self { rows, duplicates })
    }

    pub(crate) fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Row positions for `keys`; null where the key is null or unmatched.
    pub(crate) fn lookup(&self, keys: &Int64Array) -> UInt64Array {
        keys.iter()
            .map(|key| key.and_then(|k| self.rows.get(&k).copied()))
            .collect()
    }
}

/// Matched/unmatched counts for one join step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    pub table: SourceKind,
    pub matched: usize,
    pub unmatched: usize,
    /// Dimension rows shadowed by an earlier row with the same key.
    pub duplicate_keys: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub steps: Vec<JoinStep>,
}

impl JoinStats {
    pub fn step(&self, table: SourceKind) -> Option<&JoinStep> {
        self.steps.iter().find(|s| s.table == table)
    }
}

impl fmt::Display for JoinStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .steps
            .iter()
            .map(|s| {
                let mut part =
                    format!("{}: {} matched, {} unmatched", s.table, s.matched, s.unmatched);
                if s.duplicate_keys > 0 {
                    part.push_str(&format!(", {} duplicate keys", s.duplicate_keys));
                }
                part
            })
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// One denormalized row per InvoiceLine row, as row positions per table.
pub struct JoinedEvents<'a> {
    tables: &'a SourceTables,
    invoice_rows: UInt64Array,
    customer_rows: UInt64Array,
    track_rows: UInt64Array,
    album_rows: UInt64Array,
    artist_rows: UInt64Array,
    stats: JoinStats,
}

impl<'a> JoinedEvents<'a> {
    /// Run the fixed chain: Invoice, Customer, Track, Album, Artist.
    pub fn join(tables: &'a SourceTables, mapping: &EventMapping) -> Result<Self> {
        let line = &tables.invoice_line;
        let mut stats = JoinStats::default();

        let invoice_index = KeyIndex::build(&tables.invoice, &mapping.invoice.id)?;
        let invoice_keys = to_int64(line.column(&mapping.invoice_line.invoice_id)?)?;
        let invoice_rows = invoice_index.lookup(&invoice_keys);
        record_step(&mut stats, SourceKind::Invoice, &invoice_index, &invoice_rows);

        let customer_index = KeyIndex::build(&tables.customer, &mapping.customer.id)?;
        let customer_keys = to_int64(&gather(
            &tables.invoice,
            &mapping.invoice.customer_id,
            &invoice_rows,
        )?)?;
        let customer_rows = customer_index.lookup(&customer_keys);
        record_step(&mut stats, SourceKind::Customer, &customer_index, &customer_rows);

        let track_index = KeyIndex::build(&tables.track, &mapping.track.id)?;
        let track_keys = to_int64(line.column(&mapping.invoice_line.track_id)?)?;
        let track_rows = track_index.lookup(&track_keys);
        record_step(&mut stats, SourceKind::Track, &track_index, &track_rows);

        let album_index = KeyIndex::build(&tables.album, &mapping.album.id)?;
        let album_keys = to_int64(&gather(&tables.track, &mapping.track.album_id, &track_rows)?)?;
        let album_rows = album_index.lookup(&album_keys);
        record_step(&mut stats, SourceKind::Album, &album_index, &album_rows);

        let artist_index = KeyIndex::build(&tables.artist, &mapping.artist.id)?;
        let artist_keys =
            to_int64(&gather(&tables.album, &mapping.album.artist_id, &album_rows)?)?;
        let artist_rows = artist_index.lookup(&artist_keys);
        record_step(&mut stats, SourceKind::Artist, &artist_index, &artist_rows);

        info!(rows = line.num_rows(), joins = %stats, "Joined invoice lines");

        Ok(Self {
            tables,
            invoice_rows,
            customer_rows,
            track_rows,
            album_rows,
            artist_rows,
            stats,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.tables.invoice_line.num_rows()
    }

    pub fn stats(&self) -> &JoinStats {
        &self.stats
    }

    /// Row positions into `kind`'s table; `None` for InvoiceLine itself.
    pub fn rows(&self, kind: SourceKind) -> Option<&UInt64Array> {
        match kind {
            SourceKind::InvoiceLine => None,
            SourceKind::Invoice => Some(&self.invoice_rows),
            SourceKind::Customer => Some(&self.customer_rows),
            SourceKind::Track => Some(&self.track_rows),
            SourceKind::Album => Some(&self.album_rows),
            SourceKind::Artist => Some(&self.artist_rows),
        }
    }

    /// A column of any joined table, aligned with InvoiceLine.
    pub fn column(&self, kind: SourceKind, name: &str) -> Result<ArrayRef> {
        let table = self.tables.get(kind);
        match self.rows(kind) {
            None => Ok(table.column(name)?.clone()),
            Some(rows) => gather(table, name, rows),
        }
    }
}

fn gather(table: &SourceTable, column: &str, rows: &UInt64Array) -> Result<ArrayRef> {
    Ok(take(table.column(column)?.as_ref(), rows, None)?)
}

fn record_step(stats: &mut JoinStats, table: SourceKind, index: &KeyIndex, rows: &UInt64Array) {
    let unmatched = rows.null_count();
    let step = JoinStep {
        table,
        matched: rows.len() - unmatched,
        unmatched,
        duplicate_keys: index.duplicates(),
    };
    debug!(
        table = %step.table,
        matched = step.matched,
        unmatched = step.unmatched,
        duplicate_keys = step.duplicate_keys,
        "Left join step"
    );
    stats.steps.push(step);
}

/// Column bound to `unit_price`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSource {
    pub table: SourceKind,
    pub column: String,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Resolve the price binding against the extracted tables.
pub fn resolve_price(
    tables: &SourceTables,
    binding: &PriceBinding,
) -> std::result::Result<PriceSource, SchemaMismatch> {
    match binding {
        PriceBinding::FirstMatch { pattern } => {
            let needle = pattern.to_ascii_lowercase();
            for (kind, table) in tables.in_join_order() {
                if let Some(column) = table
                    .column_names()
                    .into_iter()
                    .find(|name| name.to_ascii_lowercase().contains(&needle))
                {
                    return Ok(PriceSource { table: kind, column });
                }
            }

            let available = tables
                .in_join_order()
                .flat_map(|(_, table)| {
                    table
                        .column_names()
                        .into_iter()
                        .map(move |name| format!("{}.{}", table.name(), name))
                })
                .collect();
            Err(SchemaMismatch::column(
                format!("*{}*", pattern),
                available,
            ))
        }
        PriceBinding::Declared { source, column } => {
            let table = tables.get(*source);
            match table.position(column) {
                Some((_, exact)) => Ok(PriceSource {
                    table: *source,
                    column: exact,
                }),
                None => Err(SchemaMismatch::column(
                    format!("{}.{}", table.name(), column),
                    table.column_names(),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::RecordBatch;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn table(name: &str, columns: Vec<(&str, ArrayRef)>) -> SourceTable {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(n, a)| Field::new(*n, a.data_type().clone(), true))
            .collect();
        let arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, a)| a).collect();
        SourceTable::new(
            name,
            RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap(),
        )
    }

    fn ints(values: Vec<Option<i64>>) -> ArrayRef {
        Arc::new(Int64Array::from(values))
    }

    fn prices(values: Vec<f64>) -> ArrayRef {
        Arc::new(Float64Array::from(values))
    }

    fn strings(values: Vec<&str>) -> ArrayRef {
        Arc::new(StringArray::from(values))
    }

    fn fixture() -> SourceTables {
        SourceTables {
            invoice_line: table(
                "InvoiceLine",
                vec![
                    ("InvoiceLineId", ints(vec![Some(1), Some(2), Some(3)])),
                    ("InvoiceId", ints(vec![Some(10), Some(99), Some(10)])),
                    ("TrackId", ints(vec![Some(100), Some(100), None])),
                    ("UnitPrice", prices(vec![0.99, 1.99, 0.99])),
                ],
            ),
            invoice: table(
                "Invoice",
                vec![
                    ("InvoiceId", ints(vec![Some(10)])),
                    ("CustomerId", ints(vec![Some(1)])),
                    ("InvoiceDate", strings(vec!["2009-01-01 00:00:00"])),
                ],
            ),
            customer: table(
                "Customer",
                vec![
                    ("CustomerId", ints(vec![Some(1), Some(1)])),
                    ("Country", strings(vec!["USA", "Duplicate"])),
                    ("City", strings(vec!["NYC", "Duplicate"])),
                ],
            ),
            track: table(
                "Track",
                vec![
                    ("TrackId", ints(vec![Some(100)])),
                    ("AlbumId", ints(vec![Some(7)])),
                    ("UnitPrice", prices(vec![5.0])),
                ],
            ),
            album: table(
                "Album",
                vec![
                    ("AlbumId", ints(vec![Some(7)])),
                    ("ArtistId", ints(vec![Some(3)])),
                ],
            ),
            artist: table("Artist", vec![("ArtistId", ints(vec![Some(4)]))]),
        }
    }

    #[test]
    fn test_key_index_keeps_first_duplicate() {
        let tables = fixture();
        let index = KeyIndex::build(&tables.customer, "CustomerId").unwrap();
        assert_eq!(index.duplicates(), 1);
        let rows = index.lookup(&Int64Array::from(vec![Some(1), None, Some(2)]));
        assert_eq!(rows.value(0), 0);
        assert!(rows.is_null(1));
        assert!(rows.is_null(2));
    }

    #[test]
    fn test_key_index_on_text_keys() {
        let t = table("Invoice", vec![("InvoiceId", strings(vec!["10", "x"]))]);
        let index = KeyIndex::build(&t, "invoiceid").unwrap();
        let rows = index.lookup(&Int64Array::from(vec![Some(10)]));
        assert_eq!(rows.value(0), 0);
        assert_eq!(index.duplicates(), 0);
    }

    #[test]
    fn test_join_preserves_row_count_and_nulls_unmatched() {
        let tables = fixture();
        let joined = JoinedEvents::join(&tables, &EventMapping::default()).unwrap();
        assert_eq!(joined.num_rows(), 3);

        let customers = to_int64(&joined.column(SourceKind::Invoice, "CustomerId").unwrap()).unwrap();
        assert_eq!(customers.value(0), 1);
        assert!(customers.is_null(1), "invoice 99 does not exist");
        assert_eq!(customers.value(2), 1);

        let country = to_utf8(&joined.column(SourceKind::Customer, "Country").unwrap()).unwrap();
        assert_eq!(country.value(0), "USA");
        assert!(country.is_null(1));

        let album = to_int64(&joined.column(SourceKind::Track, "AlbumId").unwrap()).unwrap();
        assert_eq!(album.value(1), 7);
        assert!(album.is_null(2), "null TrackId cannot match");

        let stats = joined.stats();
        assert_eq!(stats.step(SourceKind::Invoice).unwrap().unmatched, 1);
        assert_eq!(stats.step(SourceKind::Track).unwrap().matched, 2);
        // Album 7 points at artist 3, which does not exist
        assert_eq!(stats.step(SourceKind::Artist).unwrap().matched, 0);
    }

    #[test]
    fn test_join_missing_key_column() {
        let mut tables = fixture();
        tables.album = table("Album", vec![("Id", ints(vec![Some(7)]))]);
        let err = match JoinedEvents::join(&tables, &EventMapping::default()) {
            Ok(_) => panic!("expected schema mismatch"),
            Err(err) => err,
        };
        let mismatch = err.schema_mismatch().expect("schema mismatch");
        assert_eq!(mismatch.missing, "Album.AlbumId");
        assert_eq!(mismatch.available, vec!["Id"]);
    }

    #[test]
    fn test_join_stats_report_duplicate_keys() {
        let tables = fixture();
        let joined = JoinedEvents::join(&tables, &EventMapping::default()).unwrap();
        let stats = joined.stats();
        assert_eq!(stats.step(SourceKind::Customer).unwrap().duplicate_keys, 1);
        assert_eq!(stats.step(SourceKind::Invoice).unwrap().duplicate_keys, 0);
        assert!(stats.to_string().contains("Customer: 2 matched, 1 unmatched, 1 duplicate keys"));
    }

    #[test]
    fn test_to_int64_nulls_fractional_values() {
        let floats: ArrayRef = Arc::new(Float64Array::from(vec![
            Some(1.0),
            Some(1.7),
            Some(f64::NAN),
            None,
            Some(-3.0),
        ]));
        let ints = to_int64(&floats).unwrap();
        assert_eq!(ints.value(0), 1);
        assert!(ints.is_null(1));
        assert!(ints.is_null(2));
        assert!(ints.is_null(3));
        assert_eq!(ints.value(4), -3);

        let text = strings(vec!["7", " 8 ", "9.0", "9.5", "nine"]);
        let ints = to_int64(&text).unwrap();
        assert_eq!(ints.value(0), 7);
        assert_eq!(ints.value(1), 8);
        assert_eq!(ints.value(2), 9);
        assert!(ints.is_null(3));
        assert!(ints.is_null(4));
    }

    #[test]
    fn test_fractional_foreign_key_is_unmatched() {
        let mut tables = fixture();
        tables.invoice = table(
            "Invoice",
            vec![
                ("InvoiceId", ints(vec![Some(10)])),
                ("CustomerId", prices(vec![1.7])),
                ("InvoiceDate", strings(vec!["2009-01-01 00:00:00"])),
            ],
        );
        let joined = JoinedEvents::join(&tables, &EventMapping::default()).unwrap();

        let users = to_int64(&joined.column(SourceKind::Invoice, "CustomerId").unwrap()).unwrap();
        assert!(users.is_null(0), "1.7 is not customer 1");
        let country = to_utf8(&joined.column(SourceKind::Customer, "Country").unwrap()).unwrap();
        assert!(country.is_null(0));
        assert_eq!(joined.stats().step(SourceKind::Customer).unwrap().matched, 0);
    }

    #[test]
    fn test_fractional_dimension_key_is_not_indexed() {
        let t = table("Customer", vec![("CustomerId", prices(vec![1.5, 2.0]))]);
        let index = KeyIndex::build(&t, "CustomerId").unwrap();
        let rows = index.lookup(&Int64Array::from(vec![Some(1), Some(2)]));
        assert!(rows.is_null(0));
        assert_eq!(rows.value(1), 1);
    }

    #[test]
    fn test_first_match_prefers_invoice_line() {
        let tables = fixture();
        let price = resolve_price(&tables, &PriceBinding::default()).unwrap();
        assert_eq!(
            price,
            PriceSource {
                table: SourceKind::InvoiceLine,
                column: "UnitPrice".into()
            }
        );
    }

    #[test]
    fn test_first_match_falls_through_join_order() {
        let mut tables = fixture();
        tables.invoice_line = table(
            "InvoiceLine",
            vec![
                ("InvoiceLineId", ints(vec![Some(1)])),
                ("InvoiceId", ints(vec![Some(10)])),
                ("TrackId", ints(vec![Some(100)])),
            ],
        );
        let price = resolve_price(&tables, &PriceBinding::default()).unwrap();
        assert_eq!(price.table, SourceKind::Track);
    }

    #[test]
    fn test_first_match_is_case_insensitive() {
        let mut tables = fixture();
        tables.invoice_line = table(
            "InvoiceLine",
            vec![
                ("InvoiceLineId", ints(vec![Some(1)])),
                ("UNIT_PRICE", prices(vec![1.0])),
                ("list_unitprice_eur", prices(vec![2.0])),
            ],
        );
        let price = resolve_price(&tables, &PriceBinding::default()).unwrap();
        assert_eq!(price.column, "list_unitprice_eur");
    }

    #[test]
    fn test_no_price_column_anywhere() {
        let mut tables = fixture();
        tables.invoice_line = table("InvoiceLine", vec![("InvoiceLineId", ints(vec![Some(1)]))]);
        tables.track = table("Track", vec![("TrackId", ints(vec![Some(100)]))]);

        let err = resolve_price(&tables, &PriceBinding::default()).unwrap_err();
        assert_eq!(err.missing, "*unitprice*");
        assert!(err.available.contains(&"Invoice.InvoiceDate".to_string()));
        assert!(err.available.contains(&"Track.TrackId".to_string()));
    }

    #[test]
    fn test_declared_price_binding() {
        let tables = fixture();
        let binding: PriceBinding = "Track.unitprice".parse().unwrap();
        let price = resolve_price(&tables, &binding).unwrap();
        assert_eq!(price.to_string(), "Track.UnitPrice");

        let missing: PriceBinding = "Invoice.UnitPrice".parse().unwrap();
        let err = resolve_price(&tables, &missing).unwrap_err();
        assert_eq!(err.missing, "Invoice.UnitPrice");
        assert_eq!(err.available, vec!["InvoiceId", "CustomerId", "InvoiceDate"]);
    }
}
