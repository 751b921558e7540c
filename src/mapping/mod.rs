//! Header-to-field mapping: alias tables, resolution and defensive normalization.

mod affiliation;
mod aliases;
mod header;
mod normalizer;
mod resolver;

pub use affiliation::derive_affiliation;
pub use aliases::{AliasTable, Field, FieldAliases};
pub use header::{expand_colspan, normalize_header, parse_colspan, HeaderIndex};
pub use normalizer::{normalize, DataWarning, Normalized};
pub use resolver::{locate_column, resolve, resolve_with_index, PartialRecord};

use crate::models::{CanonicalRecord, RawRow, RecordKind};

/// Canonical records for a batch of raw rows plus recovery bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<CanonicalRecord>,
    pub recoveries: usize,
    pub warnings: Vec<DataWarning>,
}

/// Resolve and normalize every non-blank row of one kind.
pub fn normalize_rows(kind: RecordKind, rows: &[RawRow]) -> NormalizedBatch {
    let table = AliasTable::for_kind(kind);
    let mut batch = NormalizedBatch::default();
    for row in rows.iter().filter(|r| !r.is_blank()) {
        let out = normalize(resolve(row, table), row);
        if out.recovered {
            batch.recoveries += 1;
        }
        batch.warnings.extend(out.warnings);
        batch.records.push(out.record);
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rows_skips_blank_rows() {
        let rows: Vec<RawRow> = vec![
            [("Nombre", "Ana"), ("RUT", "12.345.678-9")].into_iter().collect(),
            [("Nombre", " "), ("RUT", "")].into_iter().collect(),
            [("Nombre", "Luis"), ("RUT", "$ 300.000"), ("Otro", "11.111.111-1")]
                .into_iter()
                .collect(),
        ];
        let batch = normalize_rows(RecordKind::Honorarium, &rows);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.recoveries, 1);
        assert_eq!(batch.records[1].identifier(), Some("11.111.111-1"));
    }
}
