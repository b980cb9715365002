//! Formatting retrieved reviews as context for the answer model.

use crate::store::IndexedDocument;

/// Default number of characters shown per review.
pub const DEFAULT_MAX_CHARS: usize = 200;

/// Appended to a review cut short.
pub const ELLIPSIS: &str = "...";

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}{ELLIPSIS}", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Render one numbered block per review, separated by blank lines.
///
/// ```text
/// Review 1 (Rating: 5/5, Date: 2024-03-01):
/// Great crust. Thin and crispy...
/// ```
pub fn format_reviews(documents: &[IndexedDocument], max_chars: usize) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let rating = doc
                .metadata
                .rating
                .map_or_else(|| "N/A".to_string(), |r| r.to_string());
            let date = doc.metadata.date.as_deref().unwrap_or("N/A");
            format!(
                "Review {} (Rating: {rating}/5, Date: {date}):\n{}",
                i + 1,
                truncate(&doc.text, max_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
