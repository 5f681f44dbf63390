//! SQLite value columns to Arrow arrays.
//!
//! SQLite is dynamically typed, so the declared column type says little about
//! what is actually stored. Types are inferred from the values instead:
//!
//! | stored values            | Arrow type |
//! |--------------------------|------------|
//! | integers only            | Int64      |
//! | integers and/or reals    | Float64    |
//! | any text                 | Utf8       |
//! | blobs only               | Binary     |
//! | blobs mixed with numbers | Utf8       |
//! | nothing but NULL         | Utf8       |

use arrow::array::{ArrayRef, BinaryArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use rusqlite::types::Value;
use std::sync::Arc;

pub(crate) fn infer_data_type(values: &[Value]) -> DataType {
    let mut saw_int = false;
    let mut saw_real = false;
    let mut saw_text = false;
    let mut saw_blob = false;

    for value in values {
        match value {
            Value::Null => {}
            Value::Integer(_) => saw_int = true,
            Value::Real(_) => saw_real = true,
            Value::Text(_) => saw_text = true,
            Value::Blob(_) => saw_blob = true,
        }
    }

    if saw_text || (saw_blob && (saw_int || saw_real)) {
        DataType::Utf8
    } else if saw_blob {
        DataType::Binary
    } else if saw_real {
        DataType::Float64
    } else if saw_int {
        DataType::Int64
    } else {
        DataType::Utf8
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(v) => Some(v.to_string()),
        Value::Real(v) => Some(v.to_string()),
        Value::Text(v) => Some(v.clone()),
        Value::Blob(v) => Some(String::from_utf8_lossy(v).into_owned()),
    }
}

pub(crate) fn build_array(values: &[Value], data_type: &DataType) -> ArrayRef {
    match data_type {
        DataType::Int64 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(*i as f64),
                    Value::Real(r) => Some(*r),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        DataType::Binary => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Blob(b) => Some(b.as_slice()),
                    _ => None,
                })
                .collect::<BinaryArray>(),
        ),
        _ => Arc::new(values.iter().map(value_to_string).collect::<StringArray>()),
    }
}

/// Assemble column-major SQLite values into a record batch.
pub(crate) fn columns_to_batch(
    names: &[String],
    columns: &[Vec<Value>],
) -> Result<RecordBatch, ArrowError> {
    let mut fields = Vec::with_capacity(names.len());
    let mut arrays = Vec::with_capacity(names.len());

    for (name, values) in names.iter().zip(columns) {
        let data_type = infer_data_type(values);
        arrays.push(build_array(values, &data_type));
        fields.push(Field::new(name, data_type, true));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
}
