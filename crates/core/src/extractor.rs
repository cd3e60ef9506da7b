use crate::error::ExtractionError;
use lopdf::Document;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractionError> {
        let bytes = std::fs::read(path)?;
        self.extract_pages_from_bytes(&bytes)
    }

    pub fn extract_pages_from_bytes(&self, bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
        let document =
            Document::load_mem(bytes).map_err(|error| ExtractionError::PdfParse(error.to_string()))?;
        Ok(pages_of(&document))
    }
}

impl TextExtractor for LopdfExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        info!(path = %path.display(), "extracting text from pdf");
        let pages = self.extract_pages(path).inspect_err(|error| {
            warn!(path = %path.display(), %error, "pdf extraction failed");
        })?;
        let text = join_pages(&pages);
        let numbers: Vec<u32> = pages.iter().map(|page| page.number).collect();
        info!(path = %path.display(), pages = ?numbers, chars = text.len(), "extracted pdf text");
        Ok(text)
    }
}

fn pages_of(document: &Document) -> Vec<PageText> {
    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        match document.extract_text(&[page_no]) {
            Ok(text) if !text.trim().is_empty() => pages.push(PageText {
                number: page_no,
                text: text.trim().to_string(),
            }),
            Ok(_) => debug!(page = page_no, "page has no extractable text"),
            Err(error) => debug!(page = page_no, %error, "page text could not be decoded"),
        }
    }
    pages
}

pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| page.text.as_str())
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use std::fs;
    use tempfile::tempdir;

    fn page_content(line: Option<&str>) -> Result<Vec<u8>, lopdf::Error> {
        let operations = match line {
            Some(line) => vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
            None => vec![],
        };
        Content { operations }.encode()
    }

    fn three_page_pdf(lines: [Option<&str>; 3]) -> Result<Vec<u8>, lopdf::Error> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for line in lines {
            let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(line)?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }

    #[test]
    fn blank_middle_page_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = three_page_pdf([
            Some("The sky is blue."),
            None,
            Some("Birds fly south in winter."),
        ])?;

        let pages = LopdfExtractor.extract_pages_from_bytes(&bytes)?;
        let numbers: Vec<u32> = pages.iter().map(|page| page.number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(
            join_pages(&pages),
            "The sky is blue.\nBirds fly south in winter."
        );
        Ok(())
    }

    #[test]
    fn pdf_on_disk_is_read_through_the_trait() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("sky.pdf");
        fs::write(&path, three_page_pdf([Some("The sky is blue."), None, None])?)?;

        assert_eq!(LopdfExtractor.extract_text(&path)?, "The sky is blue.");
        Ok(())
    }

    #[test]
    fn pages_are_joined_in_order_and_blank_pages_skipped() {
        let pages = vec![
            PageText {
                number: 1,
                text: "First page.".to_string(),
            },
            PageText {
                number: 2,
                text: "   ".to_string(),
            },
            PageText {
                number: 3,
                text: "Third page.".to_string(),
            },
        ];

        assert_eq!(join_pages(&pages), "First page.\nThird page.");
    }

    #[test]
    fn unparseable_pdf_is_an_extraction_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let result = LopdfExtractor.extract_text(&path);
        assert!(matches!(result, Err(ExtractionError::PdfParse(_))));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_io_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = LopdfExtractor.extract_text(&dir.path().join("absent.pdf"));
        assert!(matches!(result, Err(ExtractionError::Io(_))));
        Ok(())
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let result = LopdfExtractor.extract_pages_from_bytes(b"definitely not a pdf");
        assert!(matches!(result, Err(ExtractionError::PdfParse(_))));
    }
}
