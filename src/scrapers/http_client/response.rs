//! HTTP response wrapper.

use std::collections::HashMap;

use reqwest::StatusCode;

use crate::scrapers::encoding::decode_html;

/// Fully-read HTTP response. The body is buffered so retries and the
/// extraction ladder can look at it more than once.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    /// URL after redirects. Relative links resolve against this.
    pub url: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Lowercased Content-Type, empty when absent.
    pub fn content_type_lower(&self) -> String {
        self.content_type().unwrap_or_default().to_ascii_lowercase()
    }

    /// Get the filename from Content-Disposition header.
    pub fn content_disposition_filename(&self) -> Option<String> {
        self.headers
            .get("content-disposition")
            .and_then(|h| parse_content_disposition_filename(h))
    }

    /// Body decoded with the header charset, the meta charset, then the
    /// UTF-8/Latin-1/CP1252 ladder.
    pub fn text(&self) -> String {
        decode_html(&self.body, self.content_type())
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Parse filename from Content-Disposition header value.
/// Parses both `filename="name.csv"` and `filename*=UTF-8''name.csv` formats.
pub fn parse_content_disposition_filename(header: &str) -> Option<String> {
    // Try filename*= first (RFC 5987 encoded)
    if let Some(start) = header.find("filename*=") {
        let rest = &header[start + 10..];
        if let Some(quote_start) = rest.find("''") {
            let encoded = rest[quote_start + 2..].split([';', ' ']).next()?;
            if let Ok(decoded) = urlencoding::decode(encoded) {
                let filename = decoded.trim().to_string();
                if !filename.is_empty() {
                    return Some(filename);
                }
            }
        }
    }

    if let Some(start) = header.find("filename=") {
        let rest = &header[start + 9..];
        let filename = if let Some(quoted) = rest.strip_prefix('"') {
            quoted.split('"').next()
        } else {
            rest.split([';', ' ']).next()
        };

        if let Some(name) = filename {
            let name = name.trim().to_string();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content_type: &str, body: &[u8]) -> HttpResponse {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        headers.insert(
            "content-disposition".to_string(),
            "attachment; filename*=UTF-8''honorarios%20enero.csv".to_string(),
        );
        HttpResponse {
            status: StatusCode::OK,
            headers,
            url: "https://example.cl/export".to_string(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_text_uses_header_charset() {
        let resp = response("text/html; charset=windows-1252", b"Vi\xe1tico \x80");
        assert_eq!(resp.text(), "Viático €");
        assert!(resp.is_success());
    }

    #[test]
    fn test_content_disposition_from_headers() {
        let resp = response("text/csv", b"a;b");
        assert_eq!(
            resp.content_disposition_filename().as_deref(),
            Some("honorarios enero.csv")
        );
    }

    #[test]
    fn test_parse_content_disposition_quoted() {
        let header = r#"attachment; filename="planta.xlsx""#;
        assert_eq!(
            parse_content_disposition_filename(header),
            Some("planta.xlsx".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_unquoted() {
        let header = "attachment; filename=planta.csv";
        assert_eq!(
            parse_content_disposition_filename(header),
            Some("planta.csv".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_none() {
        assert_eq!(parse_content_disposition_filename("attachment"), None);
        assert_eq!(parse_content_disposition_filename("inline"), None);
    }
}
