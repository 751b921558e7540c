//! Record kinds, raw rows and canonical record shapes.

use serde::{Deserialize, Serialize};

/// Personnel category published by the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Personas naturales contratadas a honorarios.
    Honorarium,
    /// Personal a contrata.
    Contract,
    /// Personal de planta.
    Staff,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [Self::Honorarium, Self::Contract, Self::Staff];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Honorarium => "honorarium",
            Self::Contract => "contract",
            Self::Staff => "staff",
        }
    }

    /// Accepts the English names and the portal's Spanish ones.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "honorarium" | "honorarios" => Some(Self::Honorarium),
            "contract" | "contrata" => Some(Self::Contract),
            "staff" | "planta" => Some(Self::Staff),
            _ => None,
        }
    }

    /// Spanish slug used in diagnostics file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Honorarium => "honorarios",
            Self::Contract => "contrata",
            Self::Staff => "planta",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of raw tabular data: header text paired with cell text, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair headers with cells positionally. Extra cells beyond the header count are dropped.
    pub fn from_columns(headers: &[String], cells: &[String]) -> Self {
        Self {
            cells: headers
                .iter()
                .zip(cells.iter())
                .map(|(h, c)| (h.clone(), c.trim().to_string()))
                .collect(),
        }
    }

    pub fn push(&mut self, header: impl Into<String>, value: impl Into<String>) {
        self.cells.push((header.into(), value.into()));
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(h, _)| h.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(_, v)| v.as_str())
    }

    /// Cell at a column position.
    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True if every cell is blank.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

impl<H: Into<String>, V: Into<String>> FromIterator<(H, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (H, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(h, v)| (h.into(), v.into()))
                .collect(),
        }
    }
}

/// Honorarium (fee-based) personnel record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HonorariumRecord {
    pub name: Option<String>,
    pub identifier: Option<String>,
    pub role: Option<String>,
    pub qualification: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub gross_amount: Option<f64>,
    pub net_amount: Option<f64>,
    pub total_amount: Option<f64>,
    pub per_diem: Option<f64>,
    pub currency_unit: Option<String>,
    pub notes: Option<String>,
    /// Program/agreement tag derived from the notes.
    pub affiliation: Option<String>,
}

/// Contract or permanent-staff personnel record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffRecord {
    pub name: Option<String>,
    pub identifier: Option<String>,
    pub grade: Option<String>,
    pub role: Option<String>,
    pub qualification: Option<String>,
    pub region: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub allowances: Option<f64>,
    pub gross_amount: Option<f64>,
    pub net_amount: Option<f64>,
    pub hours: Option<String>,
    pub notes: Option<String>,
}

/// Normalized output record, one shape per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalRecord {
    Honorarium(HonorariumRecord),
    Contract(StaffRecord),
    Staff(StaffRecord),
}

impl CanonicalRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Honorarium(_) => RecordKind::Honorarium,
            Self::Contract(_) => RecordKind::Contract,
            Self::Staff(_) => RecordKind::Staff,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Honorarium(r) => r.identifier.as_deref(),
            Self::Contract(r) | Self::Staff(r) => r.identifier.as_deref(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Honorarium(r) => r.name.as_deref(),
            Self::Contract(r) | Self::Staff(r) => r.name.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_spanish() {
        assert_eq!(RecordKind::from_str("Honorarios"), Some(RecordKind::Honorarium));
        assert_eq!(RecordKind::from_str("contrata"), Some(RecordKind::Contract));
        assert_eq!(RecordKind::from_str("staff"), Some(RecordKind::Staff));
        assert_eq!(RecordKind::from_str("escalas"), None);
    }

    #[test]
    fn test_raw_row_from_columns_truncates() {
        let headers = vec!["Nombre".to_string(), "RUT".to_string()];
        let cells = vec![" Ana ".to_string(), "1-9".to_string(), "extra".to_string()];
        let row = RawRow::from_columns(&headers, &cells);
        assert_eq!(row.len(), 2);
        assert_eq!(row.value_at(0), Some("Ana"));
        assert!(!row.is_blank());
    }

    #[test]
    fn test_canonical_serializes_with_kind_tag() {
        let record = CanonicalRecord::Contract(StaffRecord {
            name: Some("Ana".into()),
            ..Default::default()
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "contract");
        assert_eq!(json["name"], "Ana");
    }
}
