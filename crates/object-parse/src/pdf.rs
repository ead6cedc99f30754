//! PDF page text extraction

use crate::{Format, ParseError};
use log::debug;
use lopdf::Document;

/// One string per page in page order. A page whose text cannot be
/// extracted (images only, no content stream, unsupported font encoding)
/// yields an empty string so page positions stay aligned.
pub(crate) fn parse_pdf(bytes: &[u8]) -> Result<Vec<String>, ParseError> {
    let document = Document::load_mem(bytes).map_err(|e| ParseError::malformed(Format::Pdf, e))?;

    let pages = document.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        let text = match document.extract_text(&[*page_number]) {
            Ok(text) => text,
            Err(e) => {
                debug!("pdf_page_text_missing: page={} error={}", page_number, e);
                String::new()
            }
        };
        texts.push(text);
    }

    Ok(texts)
}
