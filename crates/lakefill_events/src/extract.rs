//! Extraction of the six tables the transform reads.

use lakefill_source::{SourceDb, SourceTable};
use tracing::info;

use crate::error::Result;
use crate::mapping::{EventMapping, SourceKind};

/// The six source tables, fully materialized.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub invoice_line: SourceTable,
    pub invoice: SourceTable,
    pub customer: SourceTable,
    pub track: SourceTable,
    pub album: SourceTable,
    pub artist: SourceTable,
}

impl SourceTables {
    /// Read every table named by `mapping` in full.
    pub fn extract(db: &SourceDb, mapping: &EventMapping) -> Result<Self> {
        let read = |kind: SourceKind| -> Result<SourceTable> {
            let table = db.read_table(mapping.table_name(kind))?;
            info!(
                role = %kind,
                table = table.name(),
                rows = table.num_rows(),
                "Extracted source table"
            );
            Ok(table)
        };

        Ok(Self {
            invoice_line: read(SourceKind::InvoiceLine)?,
            invoice: read(SourceKind::Invoice)?,
            customer: read(SourceKind::Customer)?,
            track: read(SourceKind::Track)?,
            album: read(SourceKind::Album)?,
            artist: read(SourceKind::Artist)?,
        })
    }

    pub fn get(&self, kind: SourceKind) -> &SourceTable {
        match kind {
            SourceKind::InvoiceLine => &self.invoice_line,
            SourceKind::Invoice => &self.invoice,
            SourceKind::Customer => &self.customer,
            SourceKind::Track => &self.track,
            SourceKind::Album => &self.album,
            SourceKind::Artist => &self.artist,
        }
    }

    /// Tables in join order, InvoiceLine first.
    pub fn in_join_order(&self) -> impl Iterator<Item = (SourceKind, &SourceTable)> + '_ {
        SourceKind::JOIN_ORDER
            .into_iter()
            .map(move |kind| (kind, self.get(kind)))
    }
}
