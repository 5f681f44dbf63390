//! Landing, normalization, upload and inspection against a seeded store.

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::datatypes::Int64Type;
use lakefill::upload::local_store;
use lakefill::{
    inspect_partition, land_all, run_normalize, upload_tree, InspectError, LakeConfig,
    OutputFormat, RunDate,
};
use lakefill_events::{user_events_schema, NormalizeOptions};
use lakefill_source::SourceDb;
use lakefill_test_utils::{sample_db, LegacyDb};
use object_store::path::Path as ObjectPath;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn run_date() -> RunDate {
    "2024-01-15".parse().unwrap()
}

fn read_parquet(path: &Path) -> Vec<RecordBatch> {
    let file = File::open(path).unwrap();
    ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn config_for(db: &LegacyDb, lake: &Path) -> LakeConfig {
    LakeConfig {
        source_db: db.path().to_path_buf(),
        lake_root: lake.to_path_buf(),
        ..LakeConfig::default()
    }
}

fn normalize_into(db: &LegacyDb, config: &LakeConfig) -> PathBuf {
    let source = SourceDb::open(db.path()).unwrap();
    run_normalize(
        &source,
        &config.cleaned_root(),
        run_date(),
        config.format,
        &NormalizeOptions::default(),
    )
    .unwrap()
    .artifact
    .path
}

#[test]
fn test_land_all_writes_every_table() {
    let db = sample_db().unwrap();
    let lake = TempDir::new().unwrap();
    let config = config_for(&db, lake.path());
    let source = SourceDb::open(db.path()).unwrap();

    let artifacts = land_all(&source, &config.raw_root(), run_date(), OutputFormat::Parquet).unwrap();

    let landed: Vec<(&str, u64)> = artifacts.iter().map(|a| (a.dataset.as_str(), a.rows)).collect();
    assert_eq!(
        landed,
        vec![
            ("Album", 2),
            ("Artist", 2),
            ("Customer", 3),
            ("Genre", 1),
            ("Invoice", 4),
            ("InvoiceLine", 5),
            ("MediaType", 1),
            ("Track", 3),
        ]
    );

    let invoice_path = lake.path().join("raw/Invoice/2024-01-15/Invoice.parquet");
    assert_eq!(artifacts[4].path, invoice_path);
    let batches = read_parquet(&invoice_path);
    let total: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(total, 4);
    // Landing is a raw copy: the garbled date is kept as-is
    let dates = batches[0].column_by_name("InvoiceDate").unwrap().as_string::<i32>();
    assert_eq!(dates.value(3), "not a date");
}

#[test]
fn test_land_csv_and_empty_table() {
    let db = sample_db().unwrap();
    db.execute("CREATE TABLE Playlist (PlaylistId INTEGER PRIMARY KEY, Name TEXT)").unwrap();
    let lake = TempDir::new().unwrap();
    let source = SourceDb::open(db.path()).unwrap();

    let artifacts = land_all(&source, &lake.path().join("raw"), run_date(), OutputFormat::Csv).unwrap();
    let playlist = artifacts.iter().find(|a| a.dataset == "Playlist").unwrap();
    assert_eq!(playlist.rows, 0);

    let csv = fs::read_to_string(&playlist.path).unwrap();
    assert_eq!(csv.trim(), "PlaylistId,Name");
    let artist = fs::read_to_string(lake.path().join("raw/Artist/2024-01-15/Artist.csv")).unwrap();
    assert!(artist.contains("AC/DC"));
}

#[test]
fn test_normalize_writes_cleaned_partition() {
    let db = sample_db().unwrap();
    let lake = TempDir::new().unwrap();
    let config = config_for(&db, lake.path());

    let path = normalize_into(&db, &config);
    assert_eq!(
        path,
        lake.path().join("cleaned/user_events/2024-01-15/user_events.parquet")
    );

    let batches = read_parquet(&path);
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 5);
    assert_eq!(batch.schema(), user_events_schema());

    let trial: Vec<bool> = batch
        .column_by_name("is_trial_user")
        .unwrap()
        .as_boolean()
        .iter()
        .map(|v| v.unwrap())
        .collect();
    assert_eq!(trial, vec![true, false, false, false, true]);

    let no_temp_files = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .all(|e| !e.unwrap().file_name().to_string_lossy().ends_with(".tmp"));
    assert!(no_temp_files);
}

#[test]
fn test_rerun_same_day_is_byte_identical() {
    let db = sample_db().unwrap();
    let lake = TempDir::new().unwrap();
    let config = config_for(&db, lake.path());

    let path = normalize_into(&db, &config);
    let first = fs::read(&path).unwrap();
    let path_again = normalize_into(&db, &config);
    assert_eq!(path, path_again);
    assert_eq!(first, fs::read(&path).unwrap());
}

#[test]
fn test_rerun_replaces_partition() {
    let db = sample_db().unwrap();
    let lake = TempDir::new().unwrap();
    let config = config_for(&db, lake.path());

    normalize_into(&db, &config);
    db.invoice_line(6, 10, 101, 0.99, Some(1)).unwrap();
    let path = normalize_into(&db, &config);

    let batches = read_parquet(&path);
    assert_eq!(batches[0].num_rows(), 6);
}

#[test]
fn test_unwritable_lake_fails() {
    let db = sample_db().unwrap();
    let lake = TempDir::new().unwrap();
    let blocker = lake.path().join("cleaned");
    fs::write(&blocker, b"not a directory").unwrap();

    let source = SourceDb::open(db.path()).unwrap();
    let err = run_normalize(
        &source,
        &blocker,
        run_date(),
        OutputFormat::Parquet,
        &NormalizeOptions::default(),
    )
    .unwrap_err();
    let sink_err = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<lakefill_sinks::SinkError>())
        .expect("sink error in chain");
    assert!(matches!(sink_err, lakefill_sinks::SinkError::Unwritable { .. }));
}

#[tokio::test]
async fn test_upload_tree_to_local_store() {
    let db = sample_db().unwrap();
    let lake = TempDir::new().unwrap();
    let config = config_for(&db, lake.path());
    let source = SourceDb::open(db.path()).unwrap();
    land_all(&source, &config.raw_root(), run_date(), OutputFormat::Parquet).unwrap();
    normalize_into(&db, &config);
    fs::write(
        lake.path().join("cleaned/user_events/2024-01-15/.user_events.parquet.tmp"),
        b"partial",
    )
    .unwrap();

    let dest = TempDir::new().unwrap();
    let store = local_store(dest.path()).unwrap();
    let report = upload_tree(store.as_ref(), lake.path()).await.unwrap();

    assert_eq!(report.objects.len(), 9);
    assert_eq!(report.skipped.len(), 1);
    let keys: Vec<&str> = report.objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys[0], "cleaned/user_events/2024-01-15/user_events.parquet");
    assert!(keys.contains(&"raw/InvoiceLine/2024-01-15/InvoiceLine.parquet"));

    for object in &report.objects {
        let copied = fs::read(dest.path().join(&object.key)).unwrap();
        assert_eq!(copied, fs::read(&object.local_path).unwrap(), "{}", object.key);
        assert_eq!(copied.len() as u64, object.bytes);
    }
    assert_eq!(
        report.total_bytes(),
        report.objects.iter().map(|o| o.bytes).sum::<u64>()
    );
}

#[tokio::test]
async fn test_reupload_overwrites() {
    let lake = TempDir::new().unwrap();
    let file = lake.path().join("raw/Artist/2024-01-15/Artist.csv");
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(&file, b"ArtistId,Name\n1,AC/DC\n").unwrap();

    let dest = TempDir::new().unwrap();
    let store = local_store(dest.path()).unwrap();
    upload_tree(store.as_ref(), lake.path()).await.unwrap();

    fs::write(&file, b"ArtistId,Name\n1,AC/DC\n2,Accept\n").unwrap();
    upload_tree(store.as_ref(), lake.path()).await.unwrap();

    let copied = fs::read_to_string(dest.path().join("raw/Artist/2024-01-15/Artist.csv")).unwrap();
    assert!(copied.contains("Accept"));
}

#[tokio::test]
async fn test_reported_key_is_the_stored_key() {
    let lake = TempDir::new().unwrap();
    let file = lake.path().join("raw/Odd \"Name\"/2024-01-15/Odd \"Name\".csv");
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(&file, b"Id\n1\n").unwrap();

    let dest = TempDir::new().unwrap();
    let store = local_store(dest.path()).unwrap();
    let report = upload_tree(store.as_ref(), lake.path()).await.unwrap();

    let object = &report.objects[0];
    assert_eq!(object.key, "raw/Odd %22Name%22/2024-01-15/Odd %22Name%22.csv");
    let location = ObjectPath::parse(&object.key).unwrap();
    let stored = store.get(&location).await.unwrap().bytes().await.unwrap();
    assert_eq!(stored.as_ref(), b"Id\n1\n");
}

#[test]
fn test_inspect_partition() {
    let db = sample_db().unwrap();
    let lake = TempDir::new().unwrap();
    let path = normalize_into(&db, &config_for(&db, lake.path()));

    let preview = inspect_partition(&path, 10, &[]).unwrap();
    assert_eq!(preview.total_rows, 5);
    assert_eq!(preview.columns.len(), 16);
    assert_eq!(preview.columns[0].name, "event_id");
    assert_eq!(preview.columns[0].data_type, "Int64");
    assert_eq!(preview.rows.len(), 5);

    let columns: Vec<String> = ["event_id", "USER_ID", "invoice_id", "invoice_date"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let narrow = inspect_partition(&path, 2, &columns).unwrap();
    assert_eq!(narrow.headers, vec!["event_id", "user_id", "invoice_id", "invoice_date"]);
    assert_eq!(narrow.rows.len(), 2);
    assert_eq!(narrow.rows[0], vec!["1", "1", "10", "2009-01-01 00:00:00"]);
    assert_eq!(narrow.total_rows, 5);

    let with_null = inspect_partition(&path, 5, &["invoice_date".to_string()]).unwrap();
    assert_eq!(with_null.rows[4], vec!["null"]);
}

#[test]
fn test_inspect_errors() {
    let db = sample_db().unwrap();
    let lake = TempDir::new().unwrap();
    let path = normalize_into(&db, &config_for(&db, lake.path()));

    let missing = inspect_partition(&lake.path().join("nope.parquet"), 10, &[]).unwrap_err();
    assert!(matches!(missing, InspectError::NotFound { .. }));

    let unknown = inspect_partition(&path, 10, &["revenue".to_string()]).unwrap_err();
    match unknown {
        InspectError::UnknownColumn { column, available } => {
            assert_eq!(column, "revenue");
            assert!(available.contains(&"total_amount".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }

    let not_parquet = lake.path().join("bad.parquet");
    fs::write(&not_parquet, b"definitely not parquet").unwrap();
    let err = inspect_partition(&not_parquet, 10, &[]).unwrap_err();
    assert!(matches!(err, InspectError::Parquet { .. }));
}

#[test]
fn test_event_ids_survive_round_trip() {
    let db = sample_db().unwrap();
    let lake = TempDir::new().unwrap();
    let path = normalize_into(&db, &config_for(&db, lake.path()));

    let batches = read_parquet(&path);
    let ids = batches[0].column_by_name("event_id").unwrap().as_primitive::<Int64Type>();
    assert_eq!(ids.null_count(), 0);
    assert_eq!(ids.values().to_vec(), vec![1, 2, 3, 4, 5]);
}
