//! Declared column bindings for the six source tables.
//!
//! Every key and attribute the transform reads is named here, per table,
//! instead of being inferred from whatever columns happen to exist. Defaults
//! are the Chinook names. Name matching is case-insensitive everywhere.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Role a source table plays in the join chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    InvoiceLine,
    Invoice,
    Customer,
    Track,
    Album,
    Artist,
}

impl SourceKind {
    /// InvoiceLine first, then each table in the order it is joined.
    pub const JOIN_ORDER: [SourceKind; 6] = [
        SourceKind::InvoiceLine,
        SourceKind::Invoice,
        SourceKind::Customer,
        SourceKind::Track,
        SourceKind::Album,
        SourceKind::Artist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::InvoiceLine => "InvoiceLine",
            SourceKind::Invoice => "Invoice",
            SourceKind::Customer => "Customer",
            SourceKind::Track => "Track",
            SourceKind::Album => "Album",
            SourceKind::Artist => "Artist",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::JOIN_ORDER
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown source table '{}' (expected one of: InvoiceLine, Invoice, Customer, Track, Album, Artist)",
                    s
                )
            })
    }
}

/// Which column supplies `unit_price`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceBinding {
    /// First column, scanning tables in join order and each table in column
    /// order, whose lowercased name contains `pattern`.
    ///
    /// Heuristic kept for parity with the legacy job. It silently rebinds if
    /// an earlier table grows a matching column.
    FirstMatch { pattern: String },
    /// Exactly this column of this table.
    Declared { source: SourceKind, column: String },
}

impl PriceBinding {
    pub const DEFAULT_PATTERN: &'static str = "unitprice";
}

impl Default for PriceBinding {
    fn default() -> Self {
        PriceBinding::FirstMatch {
            pattern: Self::DEFAULT_PATTERN.to_string(),
        }
    }
}

impl FromStr for PriceBinding {
    type Err = String;

    /// Parses `Table.Column`, e.g. `InvoiceLine.UnitPrice`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (table, column) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| format!("Invalid price column '{}': expected TABLE.COLUMN", s))?;
        if column.is_empty() {
            return Err(format!("Invalid price column '{}': empty column name", s));
        }
        Ok(PriceBinding::Declared {
            source: table.parse()?,
            column: column.to_string(),
        })
    }
}

impl fmt::Display for PriceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceBinding::FirstMatch { pattern } => write!(f, "first column matching '{}'", pattern),
            PriceBinding::Declared { source, column } => write!(f, "{}.{}", source, column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InvoiceLineColumns {
    pub table: String,
    pub id: String,
    pub invoice_id: String,
    pub track_id: String,
    /// Optional; rows default to quantity 1 when the column is absent.
    pub quantity: String,
}

impl Default for InvoiceLineColumns {
    fn default() -> Self {
        Self {
            table: "InvoiceLine".into(),
            id: "InvoiceLineId".into(),
            invoice_id: "InvoiceId".into(),
            track_id: "TrackId".into(),
            quantity: "Quantity".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InvoiceColumns {
    pub table: String,
    pub id: String,
    pub customer_id: String,
    pub invoice_date: String,
}

impl Default for InvoiceColumns {
    fn default() -> Self {
        Self {
            table: "Invoice".into(),
            id: "InvoiceId".into(),
            customer_id: "CustomerId".into(),
            invoice_date: "InvoiceDate".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CustomerColumns {
    pub table: String,
    pub id: String,
    pub country: String,
    pub city: String,
}

impl Default for CustomerColumns {
    fn default() -> Self {
        Self {
            table: "Customer".into(),
            id: "CustomerId".into(),
            country: "Country".into(),
            city: "City".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrackColumns {
    pub table: String,
    pub id: String,
    pub album_id: String,
}

impl Default for TrackColumns {
    fn default() -> Self {
        Self {
            table: "Track".into(),
            id: "TrackId".into(),
            album_id: "AlbumId".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AlbumColumns {
    pub table: String,
    pub id: String,
    pub artist_id: String,
}

impl Default for AlbumColumns {
    fn default() -> Self {
        Self {
            table: "Album".into(),
            id: "AlbumId".into(),
            artist_id: "ArtistId".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArtistColumns {
    pub table: String,
    pub id: String,
}

impl Default for ArtistColumns {
    fn default() -> Self {
        Self {
            table: "Artist".into(),
            id: "ArtistId".into(),
        }
    }
}

/// Full set of bindings the transform reads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct EventMapping {
    pub invoice_line: InvoiceLineColumns,
    pub invoice: InvoiceColumns,
    pub customer: CustomerColumns,
    pub track: TrackColumns,
    pub album: AlbumColumns,
    pub artist: ArtistColumns,
    #[serde(skip)]
    pub price: PriceBinding,
}

impl EventMapping {
    /// Source table name bound to a role.
    pub fn table_name(&self, kind: SourceKind) -> &str {
        match kind {
            SourceKind::InvoiceLine => &self.invoice_line.table,
            SourceKind::Invoice => &self.invoice.table,
            SourceKind::Customer => &self.customer.table,
            SourceKind::Track => &self.track.table,
            SourceKind::Album => &self.album.table,
            SourceKind::Artist => &self.artist.table,
        }
    }

    pub fn with_price(mut self, price: PriceBinding) -> Self {
        self.price = price;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_parse_ignores_case() {
        assert_eq!("invoiceline".parse::<SourceKind>().unwrap(), SourceKind::InvoiceLine);
        assert_eq!(" TRACK ".parse::<SourceKind>().unwrap(), SourceKind::Track);
        assert!("Genre".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_price_binding_parse() {
        assert_eq!(
            "InvoiceLine.UnitPrice".parse::<PriceBinding>().unwrap(),
            PriceBinding::Declared {
                source: SourceKind::InvoiceLine,
                column: "UnitPrice".into()
            }
        );
        assert!("UnitPrice".parse::<PriceBinding>().is_err());
        assert!("Track.".parse::<PriceBinding>().is_err());
        assert!("Playlist.UnitPrice".parse::<PriceBinding>().is_err());
    }

    #[test]
    fn test_default_mapping_is_chinook() {
        let mapping = EventMapping::default();
        assert_eq!(mapping.table_name(SourceKind::InvoiceLine), "InvoiceLine");
        assert_eq!(mapping.invoice.invoice_date, "InvoiceDate");
        assert_eq!(mapping.customer.city, "City");
        assert_eq!(mapping.price, PriceBinding::default());
    }
}
