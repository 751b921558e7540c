//! Static alias tables: canonical field to ordered, pre-normalized header aliases.
//!
//! Aliases are tried in order, so the most specific/most certain spelling goes
//! first. All strings are already in [`normalize_header`](super::normalize_header)
//! form (lowercase, no accents, no dots).

use crate::models::RecordKind;

/// A canonical field any record kind may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Name,
    Identifier,
    Role,
    Qualification,
    StartDate,
    EndDate,
    GrossAmount,
    NetAmount,
    TotalAmount,
    Notes,
    PerDiem,
    CurrencyUnit,
    Grade,
    Region,
    Allowances,
    Hours,
}

/// One canonical field with its aliases.
pub type FieldAliases = (Field, &'static [&'static str]);

/// Alias table for one record kind.
#[derive(Debug, Clone, Copy)]
pub struct AliasTable {
    pub kind: RecordKind,
    pub fields: &'static [FieldAliases],
}

impl AliasTable {
    /// The static table for a record kind.
    pub fn for_kind(kind: RecordKind) -> &'static AliasTable {
        match kind {
            RecordKind::Honorarium => &HONORARIUM,
            RecordKind::Contract => &CONTRACT,
            RecordKind::Staff => &STAFF,
        }
    }

    pub fn aliases(&self, field: Field) -> Option<&'static [&'static str]> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, aliases)| *aliases)
    }
}

const NAME: &[&str] = &[
    "nombre",
    "nombre completo",
    "nombre funcionario",
    "nombre persona",
    "persona",
    "nombre y apellido",
    "apellido nombre",
    "funcionario",
    "prestador",
    "nombre prestador",
    "nombre proveedor",
    "proveedor",
];

const IDENTIFIER: &[&str] = &[
    "rut",
    "rut funcionario",
    "rut prestador",
    "rut proveedor",
    "run",
    "cedula",
    "cedula identidad",
];

const NOTES: &[&str] = &["observaciones", "observacion", "detalle", "notas", "glosa"];

const HON_ROLE: &[&str] = &[
    "descripcion de la funcion",
    "descripcion funcion",
    "funcion",
    "cargo",
    "actividad",
];

const HON_QUALIFICATION: &[&str] = &[
    "calificacion profesional",
    "calificacion",
    "profesion",
    "titulo profesional",
    "titulo",
    "formacion",
];

const HON_START: &[&str] = &[
    "fecha de inicio",
    "fecha inicio",
    "inicio contrato",
    "fecha inicio contrato",
    "desde",
];

const HON_END: &[&str] = &[
    "fecha de termino",
    "fecha termino",
    "termino contrato",
    "fecha termino contrato",
    "hasta",
];

const HON_TOTAL: &[&str] = &[
    "monto total",
    "monto bruto",
    "monto",
    "total",
    "honorarios",
    "honorario",
    "honorario total bruto mensualizado",
    "honorario bruto mensual",
    "pago bruto",
    "pago",
    "monto pago",
    "remuneracion bruta mensualizada",
];

const HON_GROSS: &[&str] = &[
    "remuneracion bruta",
    "rem bruta",
    "renta bruta",
    "total haberes",
    "total imponible",
    "haberes",
    "bruto",
    "sueldo bruto",
];

const HON_NET: &[&str] = &[
    "remuneracion liquida",
    "rem liquida",
    "renta liquida",
    "liquido",
    "liquido a pago",
    "sueldo liquido",
    "neto",
];

const HON_PER_DIEM: &[&str] = &["viatico", "viaticos", "asignacion viatico"];

const HON_CURRENCY: &[&str] = &["unidad monetaria", "moneda", "tipo moneda"];

const CP_GRADE: &[&str] = &["grado eus", "grado", "grado e u s", "escala", "nivel"];

const CP_ROLE: &[&str] = &["cargo", "cargo o funcion", "funcion", "puesto"];

const CP_QUALIFICATION: &[&str] = &[
    "calificacion profesional",
    "calificacion",
    "profesion",
    "titulo",
    "formacion",
];

const CP_REGION: &[&str] = &["region", "comuna", "localidad", "lugar desempeno"];

const CP_ALLOWANCES: &[&str] = &[
    "asignaciones",
    "asignacion",
    "otras asignaciones",
    "bonos",
    "total asignaciones",
];

const CP_GROSS: &[&str] = &[
    "remuneracion bruta",
    "rem bruta",
    "remuneracion bruta mensualizada",
    "renta bruta",
    "total haberes",
    "total imponible",
    "haberes",
    "bruto",
    "sueldo bruto",
];

const CP_NET: &[&str] = &[
    "remuneracion liquida",
    "rem liquida",
    "remuneracion liquida mensualizada",
    "renta liquida",
    "liquido",
    "liquido a pago",
    "sueldo liquido",
    "neto",
];

const CP_START: &[&str] = &[
    "fecha de inicio",
    "fecha inicio",
    "inicio",
    "fecha ingreso",
    "desde",
];

const CP_END: &[&str] = &[
    "fecha de termino",
    "fecha termino",
    "termino",
    "fecha egreso",
    "hasta",
];

const CP_HOURS: &[&str] = &[
    "horas",
    "horas semanales",
    "jornada",
    "tipo jornada",
    "horas contrato",
];

const CONTRACT_STAFF_FIELDS: &[FieldAliases] = &[
    (Field::Name, NAME),
    (Field::Identifier, IDENTIFIER),
    (Field::Grade, CP_GRADE),
    (Field::Role, CP_ROLE),
    (Field::Qualification, CP_QUALIFICATION),
    (Field::Region, CP_REGION),
    (Field::Allowances, CP_ALLOWANCES),
    (Field::GrossAmount, CP_GROSS),
    (Field::NetAmount, CP_NET),
    (Field::StartDate, CP_START),
    (Field::EndDate, CP_END),
    (Field::Notes, NOTES),
    (Field::Hours, CP_HOURS),
];

static HONORARIUM: AliasTable = AliasTable {
    kind: RecordKind::Honorarium,
    fields: &[
        (Field::Name, NAME),
        (Field::Identifier, IDENTIFIER),
        (Field::Role, HON_ROLE),
        (Field::Qualification, HON_QUALIFICATION),
        (Field::StartDate, HON_START),
        (Field::EndDate, HON_END),
        (Field::GrossAmount, HON_GROSS),
        (Field::NetAmount, HON_NET),
        (Field::TotalAmount, HON_TOTAL),
        (Field::Notes, NOTES),
        (Field::PerDiem, HON_PER_DIEM),
        (Field::CurrencyUnit, HON_CURRENCY),
    ],
};

static CONTRACT: AliasTable = AliasTable {
    kind: RecordKind::Contract,
    fields: CONTRACT_STAFF_FIELDS,
};

static STAFF: AliasTable = AliasTable {
    kind: RecordKind::Staff,
    fields: CONTRACT_STAFF_FIELDS,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::normalize_header;

    #[test]
    fn test_aliases_are_pre_normalized() {
        for kind in RecordKind::ALL {
            for (field, aliases) in AliasTable::for_kind(kind).fields {
                for alias in aliases.iter() {
                    assert_eq!(&normalize_header(alias), alias, "{kind} {field:?}");
                }
            }
        }
    }

    #[test]
    fn test_total_only_for_honorarium() {
        assert!(AliasTable::for_kind(RecordKind::Honorarium)
            .aliases(Field::TotalAmount)
            .is_some());
        assert!(AliasTable::for_kind(RecordKind::Staff)
            .aliases(Field::TotalAmount)
            .is_none());
        assert!(AliasTable::for_kind(RecordKind::Contract)
            .aliases(Field::Grade)
            .is_some());
    }
}
