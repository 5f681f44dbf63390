//! The `user_events` output schema.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

/// Dataset name of the cleaned partition.
pub const DATASET_NAME: &str = "user_events";

pub const EVENT_ID: &str = "event_id";
pub const USER_ID: &str = "user_id";
pub const EVENT_TYPE: &str = "event_type";
pub const TRACK_ID: &str = "track_id";
pub const ALBUM_ID: &str = "album_id";
pub const ARTIST_ID: &str = "artist_id";
pub const UNIT_PRICE: &str = "unit_price";
pub const QUANTITY: &str = "quantity";
pub const TOTAL_AMOUNT: &str = "total_amount";
pub const INVOICE_ID: &str = "invoice_id";
pub const INVOICE_DATE: &str = "invoice_date";
pub const EVENT_DATE: &str = "event_date";
pub const COUNTRY: &str = "country";
pub const CITY: &str = "city";
pub const SESSION_ID: &str = "session_id";
pub const IS_TRIAL_USER: &str = "is_trial_user";

/// The sixteen output columns, in output order.
pub fn user_events_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        // Nullable: keys come from a dynamically typed store
        Field::new(EVENT_ID, DataType::Int64, true),
        Field::new(USER_ID, DataType::Int64, true),
        Field::new(EVENT_TYPE, DataType::Utf8, false),
        Field::new(TRACK_ID, DataType::Int64, true),
        Field::new(ALBUM_ID, DataType::Int64, true),
        Field::new(ARTIST_ID, DataType::Int64, true),
        Field::new(UNIT_PRICE, DataType::Float64, true),
        Field::new(QUANTITY, DataType::Int64, false),
        Field::new(TOTAL_AMOUNT, DataType::Float64, true),
        Field::new(INVOICE_ID, DataType::Int64, true),
        Field::new(INVOICE_DATE, DataType::Utf8, true),
        Field::new(EVENT_DATE, DataType::Utf8, true),
        Field::new(COUNTRY, DataType::Utf8, true),
        Field::new(CITY, DataType::Utf8, true),
        Field::new(SESSION_ID, DataType::Utf8, false),
        Field::new(IS_TRIAL_USER, DataType::Boolean, false),
    ]))
}
