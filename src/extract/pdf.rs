//! PDF text extraction using `pdf-extract`.

use super::ExtractionError;

const PAGE_BREAK: char = '\u{c}';

/// Extract the text of each page, in page order.
///
/// Pages without extractable text are kept as empty strings so page numbers stay aligned with
/// the source document. This call is CPU bound; run it on a blocking thread.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|error| ExtractionError::Pdf(error.to_string()))?;
    Ok(split_pages(&text))
}

/// Split extracted text on form feeds and tidy each page.
pub(crate) fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split(PAGE_BREAK).map(clean_text).collect();
    // A trailing form feed closes the last page rather than opening a new one.
    while pages.len() > 1 && pages.last().is_some_and(|page| page.is_empty()) {
        pages.pop();
    }
    pages
}

/// Trim lines and collapse runs of blank lines into a single paragraph break.
fn clean_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .fold(Vec::new(), |mut acc: Vec<&str>, line| {
            if !line.is_empty() || acc.last().is_some_and(|prev| !prev.is_empty()) {
                acc.push(line);
            }
            acc
        })
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_form_feeds() {
        let pages = split_pages("Intro\n\u{c}Body text\n\u{c}");
        assert_eq!(pages, vec!["Intro".to_string(), "Body text".to_string()]);
    }

    #[test]
    fn keeps_blank_pages_in_the_middle() {
        let pages = split_pages("one\u{c}\u{c}three");
        assert_eq!(pages.len(), 3);
        assert!(pages[1].is_empty());
    }

    #[test]
    fn text_without_breaks_is_one_page() {
        let pages = split_pages("  first line  \n\n\n\nsecond line\n");
        assert_eq!(pages, vec!["first line\n\nsecond line".to_string()]);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let error = extract_pages(b"definitely not a pdf").unwrap_err();
        assert!(matches!(error, ExtractionError::Pdf(_)));
    }
}
