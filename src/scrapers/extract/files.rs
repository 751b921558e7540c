//! Exported file parsing: delimited text and xlsx workbooks.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::{debug, info};
use zip::ZipArchive;

use super::downloads::is_spreadsheet;
use super::tables::parse_best_table;
use super::ParsedTable;
use crate::error::ExtractError;
use crate::models::RecordKind;
use crate::scrapers::encoding::ENCODING_LADDER;

/// Exports smaller than this are error pages or empty stubs.
pub const MIN_EXPORT_BYTES: usize = 100;

const DELIMITERS: [u8; 3] = [b';', b',', b'\t'];
const UTF8_BOM: &str = "\u{feff}";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Parse delimited text, trying each encoding of the ladder and each of
/// `;`, `,` and tab. The first combination giving more than one column and
/// at least one row wins.
pub fn parse_delimited(bytes: &[u8]) -> Option<ParsedTable> {
    for encoding in ENCODING_LADDER {
        let Some(text) = encoding.decode(bytes) else {
            continue;
        };
        let text = text.strip_prefix(UTF8_BOM).unwrap_or(&text);
        for delimiter in DELIMITERS {
            if let Some(table) = read_delimited(text, delimiter) {
                info!(
                    "Parsed delimited export ({:?}, '{}'): {} rows",
                    encoding,
                    delimiter as char,
                    table.rows.len()
                );
                return Some(table);
            }
        }
    }
    None
}

fn read_delimited(text: &str, delimiter: u8) -> Option<ParsedTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .ok()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.len() <= 1 {
        return None;
    }

    let rows: Vec<Vec<String>> = reader
        .records()
        .filter_map(Result::ok)
        .map(|r| r.iter().map(|c| c.trim().to_string()).collect())
        .collect();
    (!rows.is_empty()).then_some(ParsedTable { headers, rows })
}

fn xml_error(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Structural(format!("xlsx XML parse error: {}", e))
}

/// Shared string table. Phonetic `<rPh>` runs are not part of the text.
fn shared_strings(xml: &str) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic = 0u32;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = phonetic == 0,
                b"rPh" => phonetic += 1,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(e) if in_text => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&e.unescape().map_err(xml_error)?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_text = false,
                b"rPh" => phonetic = phonetic.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// One worksheet cell while its children are read.
struct Cell {
    column: usize,
    kind: Option<String>,
    value: String,
    inline: String,
}

impl Cell {
    fn start(e: &BytesStart<'_>, position: usize) -> Self {
        let mut cell = Self {
            column: position,
            kind: None,
            value: String::new(),
            inline: String::new(),
        };
        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value);
            match attr.key.local_name().as_ref() {
                b"r" => {
                    let letters: String = value.chars().take_while(char::is_ascii_uppercase).collect();
                    if !letters.is_empty() {
                        cell.column = column_index(&letters);
                    }
                }
                b"t" => cell.kind = Some(value.into_owned()),
                _ => {}
            }
        }
        cell
    }

    fn resolve(self, shared: &[String]) -> String {
        let value = match self.kind.as_deref() {
            Some("s") => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared.get(i).cloned())
                .unwrap_or_default(),
            Some("inlineStr") => self.inline,
            _ => self.value,
        };
        value.trim().to_string()
    }
}

fn dense_row(cells: BTreeMap<usize, String>) -> Vec<String> {
    let width = cells.keys().next_back().map(|k| k + 1).unwrap_or(0);
    let mut line = vec![String::new(); width];
    for (column, value) in cells {
        line[column] = value;
    }
    line
}

/// Worksheet rows as dense string grids, blank cells filled in.
fn worksheet_rows(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut grid = Vec::new();
    let mut cells: Option<BTreeMap<usize, String>> = None;
    let mut cell: Option<Cell> = None;
    let mut position = 0;
    let mut in_value = false;
    let mut in_text = false;
    let mut phonetic = 0u32;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    cells = Some(BTreeMap::new());
                    position = 0;
                }
                b"c" => cell = Some(Cell::start(&e, position)),
                b"v" => in_value = true,
                b"t" => in_text = phonetic == 0,
                b"rPh" => phonetic += 1,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => grid.push(Vec::new()),
                b"c" => position = Cell::start(&e, position).column + 1,
                _ => {}
            },
            Event::Text(e) if in_value || in_text => {
                if let Some(cell) = cell.as_mut() {
                    let text = e.unescape().map_err(xml_error)?;
                    if in_value {
                        cell.value.push_str(&text);
                    } else {
                        cell.inline.push_str(&text);
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_text = false,
                b"rPh" => phonetic = phonetic.saturating_sub(1),
                b"c" => {
                    if let Some(done) = cell.take() {
                        let column = done.column;
                        position = column + 1;
                        let value = done.resolve(shared);
                        if let Some(cells) = cells.as_mut() {
                            cells.insert(column, value);
                        }
                    }
                }
                b"row" => {
                    if let Some(done) = cells.take() {
                        grid.push(dense_row(done));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(grid)
}

/// Zero-based column index from a cell reference's letters (`A` -> 0, `AB` -> 27).
fn column_index(letters: &str) -> usize {
    letters
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
        .saturating_sub(1)
}

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ExtractError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ExtractError::Structural(format!("xlsx entry {}: {}", name, e))),
    };
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(Some(content))
}

/// Parse the first worksheet of an xlsx workbook. The first non-empty row
/// is taken as the header row.
pub fn parse_xlsx(bytes: &[u8]) -> Result<ParsedTable, ExtractError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::Structural(format!("Not an xlsx workbook: {}", e)))?;

    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => shared_strings(&xml)?,
        None => Vec::new(),
    };

    let mut sheet_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/") && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    sheet_names.sort_by_key(|n| (n != "xl/worksheets/sheet1.xml", n.clone()));
    let sheet_name = sheet_names
        .first()
        .ok_or_else(|| ExtractError::Structural("xlsx workbook has no worksheets".into()))?
        .clone();
    let sheet = read_entry(&mut archive, &sheet_name)?.unwrap_or_default();

    let grid = worksheet_rows(&sheet, &shared)?;

    let mut rows = grid.into_iter().skip_while(|r| r.iter().all(String::is_empty));
    let headers = rows
        .next()
        .ok_or_else(|| ExtractError::Structural("xlsx worksheet is empty".into()))?;
    let rows: Vec<Vec<String>> = rows.filter(|r| r.iter().any(|c| !c.is_empty())).collect();
    debug!("Parsed xlsx sheet {}: {} rows", sheet_name, rows.len());
    Ok(ParsedTable { headers, rows })
}

/// Parse a downloaded export, choosing the reader from content type, URL
/// and magic bytes.
pub fn parse_export(
    kind: RecordKind,
    bytes: &[u8],
    content_type: &str,
    url: &str,
) -> Result<ParsedTable, ExtractError> {
    if bytes.len() < MIN_EXPORT_BYTES {
        return Err(ExtractError::Structural(format!(
            "Export too small ({} bytes): {}",
            bytes.len(),
            url
        )));
    }

    let table = if bytes.starts_with(ZIP_MAGIC) {
        Some(parse_xlsx(bytes)?)
    } else if bytes.starts_with(OLE_MAGIC) {
        return Err(ExtractError::Structural(format!(
            "Legacy binary .xls is not supported: {}",
            url
        )));
    } else {
        let lower = String::from_utf8_lossy(&bytes[..bytes.len().min(4096)]).to_lowercase();
        if lower.contains("<table") {
            // Some portals serve an HTML table with a spreadsheet extension.
            let (text, _) = crate::scrapers::encoding::decode_text(bytes, None);
            parse_best_table(&text, kind)
        } else if is_spreadsheet(content_type, url) && !lower.contains(';') && !lower.contains(',') {
            None
        } else {
            parse_delimited(bytes)
        }
    };

    table
        .filter(|t| t.headers.len() > 1 && !t.rows.is_empty())
        .ok_or_else(|| ExtractError::Structural(format!("No tabular data in export: {}", url)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn xlsx(sheet: &str, shared: &str) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("xl/sharedStrings.xml", options).unwrap();
            writer.write_all(shared.as_bytes()).unwrap();
            writer.start_file("xl/worksheets/sheet1.xml", options).unwrap();
            writer.write_all(sheet.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_semicolon_latin1() {
        let bytes = b"Nombre;RUT;Remuneraci\xf3n Bruta\nANA;12.345.678-9;$ 500.000\nLUIS;9.876.543-2;$ 600.000\n";
        let table = parse_delimited(bytes).unwrap();
        assert_eq!(table.headers[2], "Remuneración Bruta");
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_comma_after_semicolon_fails() {
        let bytes = "\u{feff}Nombre,Grado,Cargo\nANA,10,Administrativo\n".as_bytes();
        let table = parse_delimited(bytes).unwrap();
        assert_eq!(table.headers, vec!["Nombre", "Grado", "Cargo"]);
    }

    #[test]
    fn test_single_column_rejected() {
        assert!(parse_delimited(b"solo una columna\nvalor\n").is_none());
    }

    #[test]
    fn test_xlsx_shared_and_inline_strings() {
        let shared = r#"<sst><si><t>Nombre</t></si><si><r><t>R</t></r><r><t xml:space="preserve">UT</t></r></si><si><t>ANA &amp; CIA</t></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="inlineStr"><is><t>Monto</t></is></c></row>
            <row r="2"><c r="A2" t="s"><v>2</v></c><c r="C2"><v>450000</v></c></row>
        </sheetData></worksheet>"#;
        let table = parse_xlsx(&xlsx(sheet, shared)).unwrap();
        assert_eq!(table.headers, vec!["Nombre", "RUT", "Monto"]);
        assert_eq!(table.rows, vec![vec!["ANA & CIA", "", "450000"]]);
    }

    #[test]
    fn test_xlsx_skips_phonetic_runs_and_empty_rows() {
        let shared = r#"<sst><si><t>Nombre</t><rPh sb="0" eb="1"><t>x</t></rPh></si><si><t>Grado</t></si><si/><si><t>ROSA</t></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
            <row r="2"/>
            <row r="3"><c r="A3" t="s"><v>3</v></c><c r="B3"/><c r="C3"><v>12</v></c></row>
        </sheetData></worksheet>"#;
        let table = parse_xlsx(&xlsx(sheet, shared)).unwrap();
        assert_eq!(table.headers, vec!["Nombre", "Grado"]);
        assert_eq!(table.rows, vec![vec!["ROSA", "", "12"]]);
    }

    #[test]
    fn test_cells_without_reference_follow_previous_column() {
        let sheet = r#"<worksheet><sheetData><row><c t="inlineStr"><is><t>A</t></is></c><c r="C1"><v>3</v></c><c><v>4</v></c></row></sheetData></worksheet>"#;
        let rows = worksheet_rows(sheet, &[]).unwrap();
        assert_eq!(rows, vec![vec!["A", "", "3", "4"]]);
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A"), 0);
        assert_eq!(column_index("Z"), 25);
        assert_eq!(column_index("AB"), 27);
    }

    #[test]
    fn test_export_too_small() {
        let err = parse_export(RecordKind::Honorarium, b"a;b\n1;2", "text/csv", "x.csv").unwrap_err();
        assert!(matches!(err, ExtractError::Structural(_)));
    }

    #[test]
    fn test_html_table_served_as_xls() {
        let html = format!(
            "<html><table><tr><th>Nombre</th><th>RUT</th></tr><tr><td>ANA</td><td>1-9</td></tr></table>{}</html>",
            " ".repeat(100)
        );
        let table = parse_export(
            RecordKind::Honorarium,
            html.as_bytes(),
            "application/vnd.ms-excel",
            "https://x/planilla.xls",
        )
        .unwrap();
        assert_eq!(table.headers, vec!["Nombre", "RUT"]);
    }
}
