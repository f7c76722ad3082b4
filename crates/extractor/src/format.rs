/// File format as detected from MIME type, magic bytes, or extension —
/// consulted in that order since upstream OParl servers frequently omit the
/// MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    Pdf,
    Html,
    Plaintext,
    Unknown,
}

const PDF_MAGIC: &[u8] = b"%PDF-";

pub fn is_skipped_mime(mime_type: Option<&str>) -> bool {
    match mime_type {
        Some(m) => {
            let m = m.to_ascii_lowercase();
            m.starts_with("image/") || m.starts_with("video/") || m.starts_with("audio/")
        }
        None => false,
    }
}

pub fn detect(mime_type: Option<&str>, file_name: Option<&str>, bytes: &[u8]) -> DetectedFormat {
    if let Some(mime) = mime_type {
        let mime = mime.to_ascii_lowercase();
        if mime == "application/pdf" || mime == "application/x-pdf" {
            return DetectedFormat::Pdf;
        }
        if mime == "text/html" {
            return DetectedFormat::Html;
        }
        if mime.starts_with("text/") {
            return DetectedFormat::Plaintext;
        }
    }

    if bytes.starts_with(PDF_MAGIC) {
        return DetectedFormat::Pdf;
    }

    if let Some(name) = file_name {
        if name.to_ascii_lowercase().ends_with(".pdf") {
            return DetectedFormat::Pdf;
        }
    }

    DetectedFormat::Unknown
}

/// Decodes bytes as UTF-8, falling back to Latin-1 (every byte maps to a
/// codepoint, so this never fails) when the bytes aren't valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Minimal tag stripping for `text/html` bodies: drops `<script>`/`<style>`
/// contents entirely, then replaces remaining tags with whitespace.
pub fn strip_html(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_by_mime() {
        assert_eq!(detect(Some("application/pdf"), None, b""), DetectedFormat::Pdf);
    }

    #[test]
    fn detects_pdf_by_magic_bytes_when_mime_absent() {
        assert_eq!(detect(None, None, b"%PDF-1.4 ..."), DetectedFormat::Pdf);
    }

    #[test]
    fn detects_pdf_by_extension_as_last_resort() {
        assert_eq!(detect(None, Some("document.pdf"), b"not really a pdf"), DetectedFormat::Pdf);
    }

    #[test]
    fn unknown_mime_without_hints_is_unknown() {
        assert_eq!(detect(Some("application/octet-stream"), None, b"\x00\x01"), DetectedFormat::Unknown);
    }

    #[test]
    fn image_mime_is_skipped() {
        assert!(is_skipped_mime(Some("image/png")));
        assert!(!is_skipped_mime(Some("application/pdf")));
        assert!(!is_skipped_mime(None));
    }

    #[test]
    fn strip_html_drops_tags() {
        let html = "<html><body><p>Hello <b>World</b></p></body></html>";
        assert_eq!(strip_html(html), "Hello World");
    }
}
