//! Header/column resolver: raw row + alias table to a partial record.

use std::collections::BTreeMap;

use super::aliases::{AliasTable, Field};
use super::header::HeaderIndex;
use crate::candidates::CandidateList;
use crate::models::{RawRow, RecordKind};

/// Resolved cell text per canonical field, before any typing or recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRecord {
    pub kind: RecordKind,
    fields: BTreeMap<Field, String>,
}

impl PartialRecord {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Resolved text for a field. Empty cells count as absent.
    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields
            .get(&field)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, value.trim().to_string());
        }
    }

    pub fn clear(&mut self, field: Field) {
        self.fields.remove(&field);
    }

    pub fn take(&mut self, field: Field) -> Option<String> {
        self.fields.remove(&field).filter(|v| !v.is_empty())
    }
}

/// Find the column supplying `aliases`.
///
/// Three passes over the whole alias list: exact header match, alias inside
/// a header, then header (longer than 2 chars) inside an alias. Within a
/// pass, earlier aliases win.
pub fn locate_column(index: &HeaderIndex, aliases: &[&str]) -> Option<usize> {
    let list = CandidateList::new("header alias", aliases);
    list.first(|alias| index.exact(alias))
        .or_else(|| list.first(|alias| index.containing(alias)))
        .or_else(|| list.first(|alias| index.contained_in(alias)))
}

/// Resolve every field in `table` against one raw row.
pub fn resolve(row: &RawRow, table: &AliasTable) -> PartialRecord {
    let index = HeaderIndex::build(row.headers());
    resolve_with_index(row, &index, table)
}

/// Same as [`resolve`] with a prebuilt index, for rows sharing one header set.
pub fn resolve_with_index(row: &RawRow, index: &HeaderIndex, table: &AliasTable) -> PartialRecord {
    let mut partial = PartialRecord::new(table.kind);
    for (field, aliases) in table.fields {
        if let Some(value) = locate_column(index, aliases).and_then(|col| row.value_at(col)) {
            partial.set(*field, value);
        }
    }
    partial
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells.iter().map(|(h, v)| (*h, *v)).collect()
    }

    #[test]
    fn test_resolve_basic_honorarium() {
        let raw = row(&[
            ("Nombre", "Juan Pérez"),
            ("RUT", "12.345.678-9"),
            ("Rem. Bruta", "$ 1.200.000"),
            ("Rem. Líquida", "$ 950.000"),
        ]);
        let partial = resolve(&raw, AliasTable::for_kind(RecordKind::Honorarium));
        assert_eq!(partial.get(Field::Name), Some("Juan Pérez"));
        assert_eq!(partial.get(Field::Identifier), Some("12.345.678-9"));
        assert_eq!(partial.get(Field::GrossAmount), Some("$ 1.200.000"));
        assert_eq!(partial.get(Field::NetAmount), Some("$ 950.000"));
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let a = row(&[("RUT", "11.222.333-4"), ("Cargo", "Director"), ("Nombre", "Ana")]);
        let b = row(&[("Nombre", "Ana"), ("RUT", "11.222.333-4"), ("Cargo", "Director")]);
        let table = AliasTable::for_kind(RecordKind::Staff);
        let (ra, rb) = (resolve(&a, table), resolve(&b, table));
        assert_eq!(ra.get(Field::Name), rb.get(Field::Name));
        assert_eq!(ra.get(Field::Role), Some("Director"));
        assert_eq!(rb.get(Field::Identifier), Some("11.222.333-4"));
    }

    #[test]
    fn test_exact_match_beats_earlier_substring() {
        // "Remuneración bruta anual" substring-matches the first gross alias,
        // but "Bruto" exactly matches a later one.
        let raw = row(&[
            ("Nombre", "Ana"),
            ("Remuneración bruta anual", "$ 9.000.000"),
            ("Bruto", "$ 750.000"),
        ]);
        let partial = resolve(&raw, AliasTable::for_kind(RecordKind::Contract));
        assert_eq!(partial.get(Field::GrossAmount), Some("$ 750.000"));
    }

    #[test]
    fn test_short_header_inside_alias() {
        let index = HeaderIndex::build(["No", "Grado"]);
        assert_eq!(locate_column(&index, &["grado eus"]), Some(1));
        assert_eq!(locate_column(&index, &["nombre completo"]), None);
    }

    #[test]
    fn test_duplicate_headers_first_wins() {
        let raw = row(&[("RUT", "11.111.111-1"), ("Nombre", "Ana"), ("rut", "22.222.222-2")]);
        let partial = resolve(&raw, AliasTable::for_kind(RecordKind::Honorarium));
        assert_eq!(partial.get(Field::Identifier), Some("11.111.111-1"));
    }

    #[test]
    fn test_blank_cells_are_absent() {
        let raw = row(&[("Nombre", "  "), ("RUT", "12.345.678-9")]);
        let partial = resolve(&raw, AliasTable::for_kind(RecordKind::Honorarium));
        assert_eq!(partial.get(Field::Name), None);
    }
}
