//! Defensive normalizer: typing, column-shift recovery and data-quality checks.

use tracing::{debug, warn};

use super::affiliation::derive_affiliation;
use super::aliases::Field;
use super::resolver::PartialRecord;
use crate::models::{CanonicalRecord, HonorariumRecord, RawRow, RecordKind, StaffRecord};
use crate::values::{find_identifier, is_identifier, looks_like_money, parse_money};

/// Non-fatal data-quality condition found while normalizing one row.
#[derive(Debug, Clone, PartialEq)]
pub enum DataWarning {
    /// The identifier slot held a money value; it was moved and the row rescanned.
    ColumnShift {
        misplaced: String,
        identifier: Option<String>,
    },
    /// Contract/staff row with a net amount but no gross amount.
    GrossMissing,
}

impl std::fmt::Display for DataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnShift {
                misplaced,
                identifier,
            } => write!(
                f,
                "column shift: identifier slot held '{}', recovered {}",
                misplaced,
                identifier.as_deref().unwrap_or("nothing")
            ),
            Self::GrossMissing => f.write_str("gross amount empty while net amount present"),
        }
    }
}

/// Outcome of normalizing one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub record: CanonicalRecord,
    pub recovered: bool,
    pub warnings: Vec<DataWarning>,
}

/// Where a misplaced money value belongs for each kind.
fn shift_target(kind: RecordKind) -> Field {
    match kind {
        RecordKind::Honorarium => Field::TotalAmount,
        RecordKind::Contract | RecordKind::Staff => Field::GrossAmount,
    }
}

/// First identifier among the row's cells, strict format first, then loose.
fn scan_for_identifier(row: &RawRow, skip: &str) -> Option<String> {
    let others = || row.values().map(str::trim).filter(|v| *v != skip);
    others()
        .find(|v| is_identifier(v))
        .or_else(|| others().find_map(find_identifier))
        .map(str::to_string)
}

/// Repair a column shift in place. Returns the warning when one was repaired.
fn recover_column_shift(partial: &mut PartialRecord, row: &RawRow) -> Option<DataWarning> {
    let misplaced = partial.get(Field::Identifier)?.to_string();
    if is_identifier(&misplaced) {
        return None;
    }
    if !looks_like_money(&misplaced) {
        debug!("Identifier '{}' is malformed but not money-shaped", misplaced);
        return None;
    }

    let target = shift_target(partial.kind);
    let target_is_money = partial.get(target).map(looks_like_money).unwrap_or(false);
    if !target_is_money {
        partial.set(target, misplaced.clone());
    }

    let identifier = scan_for_identifier(row, &misplaced);
    match &identifier {
        Some(found) => partial.set(Field::Identifier, found.clone()),
        None => partial.clear(Field::Identifier),
    }

    warn!(
        "{}: identifier slot held money value '{}', recovered identifier {:?}",
        partial.kind, misplaced, identifier
    );
    Some(DataWarning::ColumnShift {
        misplaced,
        identifier,
    })
}

fn money(partial: &PartialRecord, field: Field) -> Option<f64> {
    partial.get(field).and_then(parse_money)
}

/// Turn a resolved partial record into a typed canonical record.
///
/// Never fails: bad amounts become `None`, column shifts are repaired and
/// reported through [`Normalized::warnings`].
pub fn normalize(mut partial: PartialRecord, row: &RawRow) -> Normalized {
    let mut warnings = Vec::new();
    if let Some(shift) = recover_column_shift(&mut partial, row) {
        warnings.push(shift);
    }
    let recovered = !warnings.is_empty();

    let record = match partial.kind {
        RecordKind::Honorarium => {
            let gross_amount = money(&partial, Field::GrossAmount);
            let total_amount = money(&partial, Field::TotalAmount).or(gross_amount);
            let net_amount = money(&partial, Field::NetAmount);
            let per_diem = money(&partial, Field::PerDiem);
            let notes = partial.take(Field::Notes);
            CanonicalRecord::Honorarium(HonorariumRecord {
                name: partial.take(Field::Name),
                identifier: partial.take(Field::Identifier),
                role: partial.take(Field::Role),
                qualification: partial.take(Field::Qualification),
                start_date: partial.take(Field::StartDate),
                end_date: partial.take(Field::EndDate),
                gross_amount,
                net_amount,
                total_amount,
                per_diem,
                currency_unit: partial.take(Field::CurrencyUnit),
                affiliation: notes.as_deref().and_then(derive_affiliation),
                notes,
            })
        }
        kind @ (RecordKind::Contract | RecordKind::Staff) => {
            let gross_amount = money(&partial, Field::GrossAmount);
            let net_amount = money(&partial, Field::NetAmount);
            if gross_amount.is_none() && net_amount.is_some() {
                warn!(
                    "{}: gross amount empty but net amount present, check header mapping",
                    kind
                );
                warnings.push(DataWarning::GrossMissing);
            }
            let allowances = money(&partial, Field::Allowances);
            let record = StaffRecord {
                name: partial.take(Field::Name),
                identifier: partial.take(Field::Identifier),
                grade: partial.take(Field::Grade),
                role: partial.take(Field::Role),
                qualification: partial.take(Field::Qualification),
                region: partial.take(Field::Region),
                start_date: partial.take(Field::StartDate),
                end_date: partial.take(Field::EndDate),
                allowances,
                gross_amount,
                net_amount,
                hours: partial.take(Field::Hours),
                notes: partial.take(Field::Notes),
            };
            if kind == RecordKind::Contract {
                CanonicalRecord::Contract(record)
            } else {
                CanonicalRecord::Staff(record)
            }
        }
    };

    Normalized {
        record,
        recovered,
        warnings,
    }
}
