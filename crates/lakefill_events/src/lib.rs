//! Event normalization for lakefill.
//!
//! Joins the legacy invoice tables into the denormalized `user_events` record
//! set: one row per InvoiceLine row, left-joined outward through Invoice,
//! Customer, Track, Album and Artist, with derived amounts, normalized dates,
//! a pseudo-session key and a per-customer trial flag.
//!
//! ```rust,ignore
//! use lakefill_events::{normalize, NormalizeOptions, SourceTables};
//!
//! let options = NormalizeOptions::default();
//! let tables = SourceTables::extract(&db, &options.mapping)?;
//! let events = normalize(&tables, &options)?;
//! println!("{} events", events.batch.num_rows());
//! ```

mod derive;
mod error;
mod extract;
mod join;
mod mapping;
mod project;

pub use derive::{
    normalize_invoice_dates, parse_invoice_timestamp, quantities, session_ids, total_amounts,
    InvoiceDates, Quantities, SpendSummary, DEFAULT_TRIAL_THRESHOLD, EVENT_DATE_FORMAT, EVENT_TYPE_PURCHASE,
    INVOICE_DATE_FORMAT,
};
pub use error::{EventsError, Result};
pub use extract::SourceTables;
pub use join::{resolve_price, JoinStats, JoinStep, JoinedEvents, PriceSource};
pub use mapping::{
    AlbumColumns, ArtistColumns, CustomerColumns, EventMapping, InvoiceColumns,
    InvoiceLineColumns, PriceBinding, SourceKind, TrackColumns,
};
pub use project::{user_events_schema, DATASET_NAME};

/// Output column names.
pub mod columns {
    pub use crate::project::{
        ALBUM_ID, ARTIST_ID, CITY, COUNTRY, EVENT_DATE, EVENT_ID, EVENT_TYPE, INVOICE_DATE,
        INVOICE_ID, IS_TRIAL_USER, QUANTITY, SESSION_ID, TOTAL_AMOUNT, TRACK_ID, UNIT_PRICE,
        USER_ID,
    };
}

use arrow::array::{ArrayRef, RecordBatch, StringArray};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::join::{to_float64, to_int64, to_utf8};

/// Knobs for one normalization run.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub mapping: EventMapping,
    /// Lifetime spend strictly below this marks a trial user.
    pub trial_threshold: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            mapping: EventMapping::default(),
            trial_threshold: DEFAULT_TRIAL_THRESHOLD,
        }
    }
}

/// Counters reported after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeStats {
    pub rows: usize,
    pub users: usize,
    pub trial_users: usize,
    pub unparsable_dates: usize,
    /// Quantities with a fractional part, truncated in the output column.
    pub fractional_quantities: usize,
    /// Quantities that are not numbers; their totals are null.
    pub unparsable_quantities: usize,
    pub duplicate_event_ids: usize,
    pub price_source: PriceSource,
    pub joins: JoinStats,
}

/// The normalized record set.
#[derive(Debug, Clone)]
pub struct UserEvents {
    pub batch: RecordBatch,
    pub stats: NormalizeStats,
}

/// Build `user_events` from the extracted tables.
///
/// Fails only on a missing table or column. Bad data (unparsable dates,
/// unmatched keys, null prices) degrades to nulls.
pub fn normalize(tables: &SourceTables, options: &NormalizeOptions) -> Result<UserEvents> {
    let mapping = &options.mapping;
    let line = &tables.invoice_line;
    let rows = line.num_rows();

    let price_source = resolve_price(tables, &mapping.price)?;
    info!(price = %price_source, binding = %mapping.price, "Bound unit_price");

    let joined = JoinedEvents::join(tables, mapping)?;

    let event_id = to_int64(line.column(&mapping.invoice_line.id)?)?;
    let invoice_id = to_int64(line.column(&mapping.invoice_line.invoice_id)?)?;
    let track_id = to_int64(line.column(&mapping.invoice_line.track_id)?)?;
    let user_id = to_int64(&joined.column(SourceKind::Invoice, &mapping.invoice.customer_id)?)?;
    let album_id = to_int64(&joined.column(SourceKind::Track, &mapping.track.album_id)?)?;
    let artist_id = to_int64(&joined.column(SourceKind::Album, &mapping.album.artist_id)?)?;
    let unit_price = to_float64(&joined.column(price_source.table, &price_source.column)?)?;

    let quantity = quantities(line.find_column(&mapping.invoice_line.quantity), rows)?;
    let total_amount = total_amounts(&quantity.factors, &unit_price);

    let dates = normalize_invoice_dates(
        &joined.column(SourceKind::Invoice, &mapping.invoice.invoice_date)?,
    )?;
    let country = to_utf8(&joined.column(SourceKind::Customer, &mapping.customer.country)?)?;
    let city = to_utf8(&joined.column(SourceKind::Customer, &mapping.customer.city)?)?;
    let session_id = session_ids(&invoice_id, &user_id);

    let spend = SpendSummary::aggregate(&user_id, &total_amount);
    let is_trial_user = spend.broadcast(&user_id, options.trial_threshold);

    let duplicate_event_ids = count_duplicates(&event_id);
    if duplicate_event_ids > 0 {
        warn!(
            duplicates = duplicate_event_ids,
            column = %mapping.invoice_line.id,
            "Duplicate event ids in source; rows kept as-is"
        );
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(event_id),
        Arc::new(user_id),
        Arc::new(StringArray::from(vec![EVENT_TYPE_PURCHASE; rows])),
        Arc::new(track_id),
        Arc::new(album_id),
        Arc::new(artist_id),
        Arc::new(unit_price),
        Arc::new(quantity.values),
        Arc::new(total_amount),
        Arc::new(invoice_id),
        Arc::new(dates.invoice_date),
        Arc::new(dates.event_date),
        Arc::new(country),
        Arc::new(city),
        Arc::new(session_id),
        Arc::new(is_trial_user),
    ];
    let batch = RecordBatch::try_new(user_events_schema(), columns)?;

    let stats = NormalizeStats {
        rows,
        users: spend.users(),
        trial_users: spend.trial_users(options.trial_threshold),
        unparsable_dates: dates.unparsable,
        fractional_quantities: quantity.fractional,
        unparsable_quantities: quantity.unparsable,
        duplicate_event_ids,
        price_source,
        joins: joined.stats().clone(),
    };

    info!(
        rows = stats.rows,
        users = stats.users,
        trial_users = stats.trial_users,
        unparsable_dates = stats.unparsable_dates,
        "Normalized user events"
    );

    Ok(UserEvents { batch, stats })
}

fn count_duplicates(ids: &arrow::array::Int64Array) -> usize {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().flatten().filter(|id| !seen.insert(*id)).count()
}
