//! Document loading: turns a file on disk into pages of plain text.
//!
//! Dispatch is by extension (case-insensitive):
//!
//! | Extension | Pages |
//! |-----------|-------|
//! | `.txt`, `.md` | one page (0), UTF-8 with lossy decoding |
//! | `.docx` | one page (0), text of `word/document.xml` |
//! | `.pptx` | one page per slide, in slide order |
//! | `.pdf` | one page per PDF page |
//!
//! Anything else is unsupported and yields `Ok(None)`. Extraction never
//! panics; malformed input comes back as [`ExtractError`].

use std::io::Read;
use std::path::Path;

use docsync_core::models::ContentUnit;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Load `path` into pages tagged with `source`.
///
/// Returns `Ok(None)` for unsupported file types.
pub fn load_document(path: &Path, source: &str) -> Result<Option<Vec<ContentUnit>>, ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let pages = match ext.as_str() {
        "txt" | "md" => {
            let bytes = std::fs::read(path)?;
            vec![String::from_utf8_lossy(&bytes).into_owned()]
        }
        "docx" => vec![extract_docx(&std::fs::read(path)?)?],
        "pptx" => extract_pptx(&std::fs::read(path)?)?,
        "pdf" => extract_pdf(&std::fs::read(path)?)?,
        _ => return Ok(None),
    };

    Ok(Some(
        pages
            .into_iter()
            .enumerate()
            .map(|(page, content)| ContentUnit {
                source_path: Some(source.to_string()),
                page: page as u32,
                content,
            })
            .collect(),
    ))
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry.take(max_bytes).read_to_end(&mut out)?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    extract_text_runs(&xml, b"p", "\n")
}

fn extract_pptx(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut slides = Vec::with_capacity(slide_names.len());
    for name in slide_names {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        slides.push(extract_text_runs(&xml, b"p", "\n")?);
    }
    Ok(slides)
}

/// Collect the text of every `<t>` element (`w:t` in Word, `a:t` in
/// DrawingML), inserting `separator` at the end of each `block` element.
fn extract_text_runs(xml: &[u8], block: &[u8], separator: &str) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"t" {
                    in_text = false;
                } else if name.as_ref() == block && !out.ends_with(separator) && !out.is_empty() {
                    out.push_str(separator);
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn text_files_are_single_page() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Notes.MD");
        fs::write(&path, "# Title\n\nbody").unwrap();

        let pages = load_document(&path, "/src/Notes.MD").unwrap().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page, 0);
        assert_eq!(pages[0].source_path.as_deref(), Some("/src/Notes.MD"));
        assert!(pages[0].content.contains("body"));
    }

    #[test]
    fn unsupported_extension_is_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image.png");
        fs::write(&path, [0u8, 1, 2]).unwrap();
        assert!(load_document(&path, "/src/image.png").unwrap().is_none());
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.pdf");
        fs::write(&path, "not a pdf").unwrap();
        assert!(matches!(
            load_document(&path, "/src/bad.pdf"),
            Err(ExtractError::Pdf(_))
        ));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.docx");
        fs::write(&path, "not a zip").unwrap();
        assert!(matches!(
            load_document(&path, "/src/bad.docx"),
            Err(ExtractError::Ooxml(_))
        ));
    }

    #[test]
    fn word_paragraphs_become_lines() {
        let xml = br#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
            <w:p><w:r><w:t>Second</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = extract_text_runs(xml, b"p", "\n").unwrap();
        assert_eq!(text, "Hello world\nSecond");
    }
}
