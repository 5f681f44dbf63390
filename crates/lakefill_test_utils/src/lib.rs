//! Lakefill Test Utilities
//!
//! Builds throwaway SQLite databases with the legacy Chinook table layout so
//! extraction, normalization and landing can be tested end to end.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lakefill_test_utils::LegacyDb;
//!
//! let db = LegacyDb::temp().unwrap();
//! db.customer(1, "USA", "NYC").unwrap();
//! db.invoice(10, Some(1), "2009-01-01 00:00:00").unwrap();
//! db.invoice_line(1, 10, 100, 0.99, Some(1)).unwrap();
//!
//! let source = lakefill_source::SourceDb::open(db.path()).unwrap();
//! ```

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Chinook table layout, trimmed to the columns the tests exercise.
///
/// Track keeps its own `UnitPrice` and Invoice its `Total` and billing
/// columns so price and location bindings are tested against the same
/// collisions the real store has.
pub const CHINOOK_SCHEMA: &str = r#"
CREATE TABLE Artist (
    ArtistId INTEGER NOT NULL PRIMARY KEY,
    Name NVARCHAR(120)
);
CREATE TABLE Album (
    AlbumId INTEGER NOT NULL PRIMARY KEY,
    Title NVARCHAR(160) NOT NULL,
    ArtistId INTEGER NOT NULL
);
CREATE TABLE Genre (
    GenreId INTEGER NOT NULL PRIMARY KEY,
    Name NVARCHAR(120)
);
CREATE TABLE MediaType (
    MediaTypeId INTEGER NOT NULL PRIMARY KEY,
    Name NVARCHAR(120)
);
CREATE TABLE Track (
    TrackId INTEGER NOT NULL PRIMARY KEY,
    Name NVARCHAR(200) NOT NULL,
    AlbumId INTEGER,
    MediaTypeId INTEGER,
    GenreId INTEGER,
    Milliseconds INTEGER,
    UnitPrice NUMERIC(10,2)
);
CREATE TABLE Customer (
    CustomerId INTEGER NOT NULL PRIMARY KEY,
    FirstName NVARCHAR(40),
    LastName NVARCHAR(20),
    City NVARCHAR(40),
    Country NVARCHAR(40),
    Email NVARCHAR(60)
);
CREATE TABLE Invoice (
    InvoiceId INTEGER NOT NULL PRIMARY KEY,
    CustomerId INTEGER,
    InvoiceDate DATETIME,
    BillingCity NVARCHAR(40),
    BillingCountry NVARCHAR(40),
    Total NUMERIC(10,2)
);
CREATE TABLE InvoiceLine (
    InvoiceLineId INTEGER NOT NULL PRIMARY KEY,
    InvoiceId INTEGER,
    TrackId INTEGER,
    UnitPrice NUMERIC(10,2),
    Quantity INTEGER
);
"#;

/// A legacy database on disk, removed when dropped.
pub struct LegacyDb {
    conn: Connection,
    path: PathBuf,
    _dir: Option<TempDir>,
}

impl LegacyDb {
    /// Create the Chinook layout in a fresh temp directory.
    pub fn temp() -> rusqlite::Result<Self> {
        let dir = tempfile::tempdir().map_err(|e| {
            rusqlite::Error::InvalidPath(PathBuf::from(format!("tempdir: {}", e)))
        })?;
        let path = dir.path().join("Chinook_Sqlite.sqlite");
        let mut db = Self::create(&path)?;
        db._dir = Some(dir);
        Ok(db)
    }

    /// Create the Chinook layout at `path`.
    pub fn create(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(CHINOOK_SCHEMA)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            _dir: None,
        })
    }

    /// Open a database without creating any tables.
    pub fn empty(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            _dir: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Escape hatch for schema edits and odd rows.
    pub fn execute(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(sql)
    }

    pub fn artist(&self, id: i64, name: &str) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO Artist (ArtistId, Name) VALUES (?1, ?2)",
            params![id, name],
        )?;
        Ok(())
    }

    pub fn album(&self, id: i64, title: &str, artist_id: i64) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO Album (AlbumId, Title, ArtistId) VALUES (?1, ?2, ?3)",
            params![id, title, artist_id],
        )?;
        Ok(())
    }

    pub fn track(&self, id: i64, name: &str, album_id: i64, unit_price: f64) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO Track (TrackId, Name, AlbumId, MediaTypeId, GenreId, Milliseconds, UnitPrice)
             VALUES (?1, ?2, ?3, 1, 1, 343719, ?4)",
            params![id, name, album_id, unit_price],
        )?;
        Ok(())
    }

    pub fn customer(&self, id: i64, country: &str, city: &str) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO Customer (CustomerId, FirstName, LastName, City, Country, Email)
             VALUES (?1, 'First', 'Last', ?2, ?3, 'someone@example.com')",
            params![id, city, country],
        )?;
        Ok(())
    }

    /// Billing location is deliberately different from the customer's.
    pub fn invoice(&self, id: i64, customer_id: Option<i64>, invoice_date: &str) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO Invoice (InvoiceId, CustomerId, InvoiceDate, BillingCity, BillingCountry, Total)
             VALUES (?1, ?2, ?3, 'Billing City', 'Billing Country', 0)",
            params![id, customer_id, invoice_date],
        )?;
        Ok(())
    }

    pub fn invoice_line(
        &self,
        id: i64,
        invoice_id: i64,
        track_id: i64,
        unit_price: f64,
        quantity: Option<i64>,
    ) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO InvoiceLine (InvoiceLineId, InvoiceId, TrackId, UnitPrice, Quantity)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, invoice_id, track_id, unit_price, quantity],
        )?;
        Ok(())
    }

    /// Small store covering the interesting cases.
    ///
    /// | customer | lines                          | lifetime spend | trial |
    /// |----------|--------------------------------|----------------|-------|
    /// | 1 (USA)  | 1 x 0.99                       | 0.99           | yes   |
    /// | 2 (DE)   | 2 x 0.99, 1 x 1.99, 1 x 1.99   | 5.96           | no    |
    /// | 3 (BR)   | 3 x 0.99, invoice date garbled | 2.97           | yes   |
    pub fn seed_sample(&self) -> rusqlite::Result<()> {
        self.artist(1, "AC/DC")?;
        self.artist(2, "Accept")?;
        self.album(1, "For Those About To Rock We Salute You", 1)?;
        self.album(2, "Balls to the Wall", 2)?;
        self.track(100, "For Those About To Rock (We Salute You)", 1, 0.99)?;
        self.track(101, "Balls to the Wall", 2, 0.99)?;
        self.track(102, "Fast As a Shark", 2, 1.99)?;
        self.execute("INSERT INTO Genre VALUES (1, 'Rock'); INSERT INTO MediaType VALUES (1, 'MPEG audio file');")?;

        self.customer(1, "USA", "NYC")?;
        self.customer(2, "Germany", "Stuttgart")?;
        self.customer(3, "Brazil", "São José dos Campos")?;

        self.invoice(10, Some(1), "2009-01-01 00:00:00")?;
        self.invoice(11, Some(2), "2009-01-02 00:00:00")?;
        self.invoice(12, Some(2), "2009-01-03T14:30:00")?;
        self.invoice(13, Some(3), "not a date")?;

        self.invoice_line(1, 10, 100, 0.99, Some(1))?;
        self.invoice_line(2, 11, 101, 0.99, Some(2))?;
        self.invoice_line(3, 11, 102, 1.99, Some(1))?;
        self.invoice_line(4, 12, 102, 1.99, Some(1))?;
        self.invoice_line(5, 13, 100, 0.99, Some(3))?;
        Ok(())
    }
}

/// Fresh temp database with [`LegacyDb::seed_sample`] already applied.
pub fn sample_db() -> rusqlite::Result<LegacyDb> {
    let db = LegacyDb::temp()?;
    db.seed_sample()?;
    Ok(db)
}
