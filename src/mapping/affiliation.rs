//! Program/agreement ("convenio") tag derived from honorarium notes.
//!
//! The portal writes notes like "Honorarios Sapu Barrancas" or
//! "Honorarios Convenio Programa Estrategias de Salud Bucal". Known programs
//! map to a fixed tag; anything else falls through to generic captures.

use std::sync::LazyLock;

use regex::Regex;

use crate::candidates::CandidateList;

const TAG_CAP: usize = 200;

#[derive(Debug)]
struct AffiliationRule {
    pattern: Regex,
    /// Fixed tag, or `None` to use capture group 1.
    tag: Option<&'static str>,
}

const RULE_SOURCES: &[(&str, Option<&str>)] = &[
    (r"(?i)\bSENAMEF\b", Some("SENAMEF")),
    (r"(?i)\bSENAME\b", Some("SENAME")),
    (r"(?i)\bMEJOR\s*NI[ÑN]EZ\b", Some("MEJOR NIÑEZ")),
    (r"(?i)\bCHILE\s*CRECE\b", Some("CHILE CRECE CONTIGO")),
    (r"(?i)\bSEPJ\b", Some("SEPJ")),
    (r"(?i)\bCOSAM\b", Some("COSAM")),
    (r"(?i)\bCECOF\b", Some("CECOF")),
    (r"(?i)\bCESFAM\b", Some("CESFAM")),
    (r"(?i)\bSAR\b", Some("SAR")),
    (r"(?i)\bSAPU\b", Some("SAPU")),
    (r"(?i)\bAIDIA\b", Some("AIDIA")),
    (r"(?i)\bPROGRAMA\s+DE\s+SALUD\s+MENTAL\b", Some("SALUD MENTAL")),
    (r"(?i)\bSALUD\s*MENTAL\b", Some("SALUD MENTAL")),
    (r"(?i)\bSSR\b", Some("SSR")),
    (r"(?i)\bPROGRAMA\s+CARDIOVASCULAR\b", Some("CARDIOVASCULAR")),
    (r"(?i)\bCARDIOVASCULAR\b", Some("CARDIOVASCULAR")),
    (r"(?i)\bPROGRAMA\s+ODONTOL[ÓO]GICO\b", Some("ODONTOLOGICO")),
    (r"(?i)\bSALUD\s*BUCAL\b", Some("SALUD BUCAL")),
    (r"(?i)\bESTRATEGIAS?\s+DE\s+SALUD\s+BUCAL\b", Some("SALUD BUCAL")),
    (r"(?i)\bPROGRAMA\s+RESPIRATORIO\b", Some("RESPIRATORIO")),
    (r"(?i)\bIRA[\s/-]*ERA\b", Some("IRA-ERA")),
    (r"(?i)\bPROGRAMA\s+EPILEPSIA\b", Some("EPILEPSIA")),
    (r"(?i)\bEPILEPSIA\b", Some("EPILEPSIA")),
    (r"(?i)\bPROGRAMA\s+POSTRADO\b", Some("POSTRADOS")),
    (r"(?i)\bPOSTRADOS?\b", Some("POSTRADOS")),
    (r"(?i)\bGES\b", Some("GES")),
    (r"(?i)\bPERCAP\b", Some("PER CAPITA")),
    (r"(?i)\bPER\s*C[AÁ]PITA\b", Some("PER CAPITA")),
    (r"(?i)\bSUBVENCI[OÓ]N\b", Some("SUBVENCION")),
    (r"(?i)\bPROGRAMA\s+DROGAS\b", Some("DROGAS")),
    (r"(?i)\bSENDA\b", Some("SENDA")),
    (r"(?i)\bPROGRAMA\s+VIH\b", Some("VIH")),
    (r"(?i)\bTBC\b", Some("TBC")),
    (r"(?i)\bHOSPICIO\b", Some("HOSPICIO")),
    (r"(?i)\bLEY\s*SEP\b", Some("LEY SEP")),
    (r"(?i)\bFLEXIFOND[OI]\b", Some("FLEXIFONDO")),
    (r"(?i)\bRESIDENCIA\b", Some("RESIDENCIA")),
    (r"(?i)\bDEPENDENCIA\b", Some("DEPENDENCIA")),
    (r"(?i)\bREHABILITACI[OÓ]N\b", Some("REHABILITACION")),
    (r"(?i)\bPALIATIVOS?\b", Some("PALIATIVOS")),
    (r"(?i)\bURGENCIA\b", Some("URGENCIA")),
    (r"(?i)\bPROGRAMA\s+PRAIS\b", Some("PRAIS")),
    (r"(?i)\bPRAIS\b", Some("PRAIS")),
    (r"(?i)\bPESPI\b", Some("PESPI")),
    (r"(?i)\bRESOLUCI[OÓ]N\b", Some("RESOLUCION")),
    // Generic captures, most specific first.
    (r"(?i)\bHonorarios\s+Convenio\s+Programa\s+(.+?)$", None),
    (r"(?i)\bHonorarios\s+Convenio\s+(.+?)$", None),
    (r"(?i)\bHonorarios\s+Programa\s+(.+?)$", None),
    (r"(?i)\bHonorarios\s+(.+?)$", None),
    (r"(?i)\bConvenio\s+(.+?)(?:\.|$)", None),
];

static RULES: LazyLock<Vec<AffiliationRule>> = LazyLock::new(|| {
    RULE_SOURCES
        .iter()
        .map(|(source, tag)| AffiliationRule {
            pattern: Regex::new(source).expect("valid affiliation regex"),
            tag: *tag,
        })
        .collect()
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

fn clean_capture(captured: &str) -> Option<String> {
    let collapsed = WHITESPACE.replace_all(captured.trim(), " ").to_uppercase();
    let trimmed = collapsed.trim_end_matches(['.', ',', ';', ':']);
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(TAG_CAP).collect())
}

/// Derive the affiliation tag from a notes cell. First matching rule wins.
pub fn derive_affiliation(notes: &str) -> Option<String> {
    let text = notes.trim();
    if text.is_empty() {
        return None;
    }
    CandidateList::new("affiliation rule", RULES.as_slice()).first(|rule| {
        let caps = rule.pattern.captures(text)?;
        match rule.tag {
            Some(tag) => Some(tag.to_string()),
            None => caps.get(1).and_then(|m| clean_capture(m.as_str())),
        }
    })
}
