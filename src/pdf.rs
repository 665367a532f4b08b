//! Single-page extraction from payslip PDFs.
//!
//! Works on in-memory buffers only. The output keeps the requested page and
//! the objects it references; every other page is removed and orphaned
//! objects are pruned before the document is serialised again.

use lopdf::{Document, Object};

use crate::error::{PayslipError, Result};

/// Outcome of a page extraction that parsed successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageExtract {
    /// A standalone one-page document.
    Extracted(Vec<u8>),
    /// The source has fewer than `page_index + 1` pages.
    NotEnoughPages { page_count: usize },
}

impl PageExtract {
    /// Converts the "too few pages" signal into [`PayslipError::NotEnoughPages`].
    pub fn into_result(self, page_index: u32) -> Result<Vec<u8>> {
        match self {
            Self::Extracted(bytes) => Ok(bytes),
            Self::NotEnoughPages { page_count } => Err(PayslipError::NotEnoughPages {
                requested: page_index,
                available: page_count,
            }),
        }
    }
}

/// Extracts the page at the 0-based `page_index` into a new document.
///
/// # Errors
///
/// Returns [`PayslipError::MalformedDocument`] if the input cannot be parsed
/// or the trimmed document cannot be written back.
pub fn extract_page(document: &[u8], page_index: u32) -> Result<PageExtract> {
    let mut doc =
        Document::load_mem(document).map_err(|e| PayslipError::MalformedDocument(e.to_string()))?;

    let pages = doc.get_pages();
    let page_count = pages.len();
    let wanted = page_index.saturating_add(1);

    if (page_count as u64) < u64::from(wanted) {
        return Ok(PageExtract::NotEnoughPages { page_count });
    }

    // Page numbers from get_pages are 1-based.
    let to_delete: Vec<u32> = pages.keys().copied().filter(|n| *n != wanted).collect();
    if !to_delete.is_empty() {
        doc.delete_pages(&to_delete);
    }
    set_root_page_count(&mut doc, 1);

    doc.prune_objects();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PayslipError::MalformedDocument(format!("Save failed: {e}")))?;

    Ok(PageExtract::Extracted(buffer))
}

/// Keeps `/Count` of the root page tree consistent after pages were removed.
fn set_root_page_count(doc: &mut Document, count: i64) {
    let pages_id = doc
        .catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"Pages").ok())
        .and_then(|pages| pages.as_reference().ok());

    if let Some(pages_id) = pages_id {
        if let Ok(Object::Dictionary(pages)) = doc.get_object_mut(pages_id) {
            pages.set("Count", Object::Integer(count));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, page_texts};

    fn extracted(result: Result<PageExtract>) -> Vec<u8> {
        match result.unwrap() {
            PageExtract::Extracted(bytes) => bytes,
            other => panic!("expected an extracted page, got {other:?}"),
        }
    }

    #[test]
    fn test_extracts_second_page() {
        let pdf = create_test_pdf(3);
        let page = extracted(extract_page(&pdf, 1));

        let texts = page_texts(&page);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("(Page 2)"), "unexpected content: {}", texts[0]);
    }

    #[test]
    fn test_extracts_last_page() {
        let pdf = create_test_pdf(4);
        let page = extracted(extract_page(&pdf, 3));

        let texts = page_texts(&page);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("(Page 4)"));
    }

    #[test]
    fn test_single_page_document_has_no_second_page() {
        let pdf = create_test_pdf(1);
        assert_eq!(
            extract_page(&pdf, 1).unwrap(),
            PageExtract::NotEnoughPages { page_count: 1 }
        );
    }

    #[test]
    fn test_first_page_of_single_page_document() {
        let pdf = create_test_pdf(1);
        let page = extracted(extract_page(&pdf, 0));
        assert_eq!(page_texts(&page).len(), 1);
    }

    #[test]
    fn test_extraction_is_reproducible() {
        let pdf = create_test_pdf(2);
        let first = extracted(extract_page(&pdf, 1));
        let second = extracted(extract_page(&pdf, 1));
        assert_eq!(first, second);
    }

    #[test]
    fn test_garbage_input_is_malformed() {
        let err = extract_page(b"definitely not a pdf", 1).unwrap_err();
        assert!(matches!(err, PayslipError::MalformedDocument(_)));
    }

    #[test]
    fn test_into_result_maps_missing_page() {
        let err = PageExtract::NotEnoughPages { page_count: 1 }
            .into_result(1)
            .unwrap_err();
        assert!(matches!(
            err,
            PayslipError::NotEnoughPages {
                requested: 1,
                available: 1
            }
        ));
    }
}
