//! Page-level document loading

use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{PageSegment, SourceMetadata};

/// Whole-document extraction can hang on broken fonts
const PDF_EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Reads a file from local disk into ordered page segments
pub trait DocumentLoader: Send + Sync {
    /// Whether this loader handles the file at `path`
    fn supports(&self, path: &Path) -> bool;

    /// Load the file into page segments, in page order
    fn load(&self, path: &Path) -> Result<Vec<PageSegment>>;
}

/// PDF loader producing one segment per page with text
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a PDF from memory; `source` becomes the segments' source metadata
    pub fn load_bytes(&self, source: &str, data: &[u8]) -> Result<Vec<PageSegment>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::load(source, format!("not a valid PDF: {}", e)))?;

        let mut segments = Vec::new();
        for (page_number, page_id) in doc.get_pages() {
            let text = match doc.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!("lopdf text extraction failed on page {}: {}", page_number, e);
                    doc.get_page_content(page_id)
                        .map(|content| extract_text_from_content(&content))
                        .unwrap_or_default()
                }
            };

            let text = cleanup_pdf_text(&text);
            if text.is_empty() {
                continue;
            }

            // lopdf numbers pages from 1
            let page = page_number.saturating_sub(1);
            segments.push(PageSegment::new(text, SourceMetadata::new(source, page)));
        }

        if segments.is_empty() {
            tracing::warn!("No per-page text in {}, trying whole-document extraction", source);
            let text = cleanup_pdf_text(&extract_pdf_with_timeout(source, data)?);
            if text.is_empty() {
                return Err(Error::load(
                    source,
                    "no extractable text; the PDF may be image-based or encrypted",
                ));
            }
            segments.push(PageSegment::new(text, SourceMetadata::new(source, 0)));
        }

        Ok(segments)
    }
}

impl DocumentLoader for PdfLoader {
    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
    }

    fn load(&self, path: &Path) -> Result<Vec<PageSegment>> {
        let source = path.to_string_lossy().to_string();
        if !path.is_file() {
            return Err(Error::load(source, "file does not exist"));
        }

        let data = std::fs::read(path).map_err(|e| Error::load(&source, e.to_string()))?;
        let segments = self.load_bytes(&source, &data)?;

        tracing::debug!("Loaded {} pages from {}", segments.len(), source);
        Ok(segments)
    }
}

/// Run pdf-extract on a helper thread so a hang cannot block the caller forever
fn extract_pdf_with_timeout(source: &str, data: &[u8]) -> Result<String> {
    let data = data.to_vec();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let result = pdf_extract::extract_text_from_mem(&data);
        let _ = tx.send(result);
    });

    match rx.recv_timeout(PDF_EXTRACT_TIMEOUT) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(Error::load(source, format!("text extraction failed: {}", e))),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::load(
            source,
            format!("text extraction timed out after {}s", PDF_EXTRACT_TIMEOUT.as_secs()),
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(Error::load(source, "text extraction thread crashed"))
        }
    }
}

/// Pull literal strings out of `Tj`/`TJ` operators inside BT/ET blocks
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content_str.lines() {
        let line = line.trim();

        match line {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                text.push('\n');
            }
            _ if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) => {
                if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
                    if start < end {
                        let decoded = line[start + 1..end]
                            .replace("\\(", "(")
                            .replace("\\)", ")")
                            .replace("\\\\", "\\");
                        text.push_str(&decoded);
                    }
                }
            }
            _ => {}
        }
    }

    text
}

/// Normalize ligatures and whitespace, drop NULs and blank lines
fn cleanup_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build small PDFs for tests
#[cfg(test)]
pub(crate) mod test_pdf {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// One page per entry in `pages`, Helvetica text
    pub fn build(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save pdf");
        out
    }
}
