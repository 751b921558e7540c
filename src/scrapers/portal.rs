//! Portal Transparencia URL model: section codes, month names and the
//! direct-access URL patterns tried at ladder level 0.

use crate::models::RecordKind;

/// Transparencia Activa section codes under "Personal y remuneraciones".
pub mod section {
    pub const STAFF: &str = "4.1.1";
    pub const CONTRACT: &str = "4.1.2";
    pub const HONORARIUM: &str = "4.1.3";
    /// Pay scales. Archived as files only, never extracted as records.
    pub const PAY_SCALES: &str = "4.1.4";
}

const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Spanish month name as the portal spells it. `None` outside 1..=12.
pub fn month_name(month: u32) -> Option<&'static str> {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
}

pub fn section_code(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Staff => section::STAFF,
        RecordKind::Contract => section::CONTRACT,
        RecordKind::Honorarium => section::HONORARIUM,
    }
}

/// Header keywords that identify the right table for a kind.
pub fn table_keywords(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Honorarium => &[
            "nombre",
            "rut",
            "remuneración",
            "remuneracion",
            "honorario",
            "función",
            "funcion",
        ],
        RecordKind::Contract | RecordKind::Staff => &[
            "nombre",
            "rut",
            "grado",
            "cargo",
            "remuneración",
            "remuneracion",
            "brut",
        ],
    }
}

/// One kind/month section of one organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionTarget {
    pub org_code: String,
    pub area: String,
    pub year: i32,
    pub month: u32,
    pub kind: RecordKind,
}

impl SectionTarget {
    pub fn new(org_code: &str, kind: RecordKind, area: &str, year: i32, month: u32) -> Self {
        Self {
            org_code: org_code.to_string(),
            area: area.to_string(),
            year,
            month,
            kind,
        }
    }

    /// Stable label for logs and diagnostics file names.
    pub fn label(&self) -> String {
        format!("{}_{}_{:02}", self.kind.slug(), self.year, self.month)
    }

    /// Direct-access URL candidates, most specific first.
    pub fn direct_urls(&self, base: &str) -> Vec<String> {
        let base = base.trim_end_matches('/');
        let code = section_code(self.kind);
        let area = urlencoding::encode(self.area.trim());
        let section_root = format!(
            "{}/-/ta/{}/{}/A/{}/{}",
            base, self.org_code, self.year, area, code
        );

        let mut urls = Vec::with_capacity(4);
        if let Some(name) = month_name(self.month) {
            urls.push(format!("{}/{}", section_root, name));
        }
        urls.push(section_root.clone());
        urls.push(format!("{}/{}", section_root, self.month));
        urls.push(format!(
            "{}?codOrganismo={}&anio={}&mes={}&seccion={}",
            base, self.org_code, self.year, self.month, code
        ));
        urls
    }

    /// Organization landing page used when no direct URL has data.
    pub fn landing_url(&self, base: &str) -> String {
        landing_url(base, &self.org_code)
    }
}

pub fn landing_url(base: &str, org_code: &str) -> String {
    format!("{}?codOrganismo={}", base.trim_end_matches('/'), org_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.portaltransparencia.cl/PortalPdT/pdtta";

    #[test]
    fn test_month_names() {
        assert_eq!(month_name(1), Some("Enero"));
        assert_eq!(month_name(9), Some("Septiembre"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);
    }

    #[test]
    fn test_direct_urls_order() {
        let target = SectionTarget::new("MU280", RecordKind::Honorarium, "Salud", 2024, 3);
        let urls = target.direct_urls(BASE);
        assert_eq!(
            urls,
            vec![
                format!("{}/-/ta/MU280/2024/A/Salud/4.1.3/Marzo", BASE),
                format!("{}/-/ta/MU280/2024/A/Salud/4.1.3", BASE),
                format!("{}/-/ta/MU280/2024/A/Salud/4.1.3/3", BASE),
                format!("{}?codOrganismo=MU280&anio=2024&mes=3&seccion=4.1.3", BASE),
            ]
        );
        assert_eq!(target.landing_url(BASE), format!("{}?codOrganismo=MU280", BASE));
        assert_eq!(target.label(), "honorarios_2024_03");
    }

    #[test]
    fn test_area_is_encoded() {
        let target = SectionTarget::new("MU001", RecordKind::Staff, "Educación Municipal", 2023, 12);
        assert!(target.direct_urls(BASE)[0].contains("/A/Educaci%C3%B3n%20Municipal/4.1.1/Diciembre"));
    }
}
