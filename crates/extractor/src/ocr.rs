use std::process::Command;

use tempfile::TempDir;

/// Renders a PDF's pages to images with `pdftoppm` (poppler-utils) at 300
/// DPI and runs `tesseract` over each page with German language data. Falls
/// back to this only when the PDF's own text layer is empty (scanned paper
/// records are common in council archives).
pub fn ocr_pdf(bytes: &[u8]) -> Result<String, String> {
    let dir = TempDir::new().map_err(|e| e.to_string())?;
    let pdf_path = dir.path().join("source.pdf");
    std::fs::write(&pdf_path, bytes).map_err(|e| e.to_string())?;

    let page_prefix = dir.path().join("page");
    let status = Command::new("pdftoppm")
        .arg("-r")
        .arg("300")
        .arg("-png")
        .arg(&pdf_path)
        .arg(&page_prefix)
        .status()
        .map_err(|e| format!("pdftoppm not installed: {e}"))?;

    if !status.success() {
        return Err(format!("pdftoppm exited with {status}"));
    }

    let mut pages: Vec<_> = std::fs::read_dir(dir.path())
        .map_err(|e| e.to_string())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
        .collect();
    pages.sort();

    let mut text = String::new();
    for page in pages {
        let output = Command::new("tesseract")
            .arg(&page)
            .arg("stdout")
            .arg("-l")
            .arg("deu")
            .output()
            .map_err(|e| format!("tesseract not installed: {e}"))?;

        text.push_str(&String::from_utf8_lossy(&output.stdout));
        text.push('\n');
    }

    Ok(text.trim().to_string())
}
