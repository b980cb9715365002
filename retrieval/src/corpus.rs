//! Review corpus loading.
//!
//! The corpus is a CSV file with a header row. Only the `Title`, `Review`,
//! `Rating` and `Date` columns are read; any other columns are ignored and
//! column order does not matter. Row position defines the record id.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, RetrievalError};

const TITLE_COLUMN: &str = "Title";
const REVIEW_COLUMN: &str = "Review";
const RATING_COLUMN: &str = "Rating";
const DATE_COLUMN: &str = "Date";

/// A single customer review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// 0-based row position, as a string.
    pub id: String,

    /// Review headline.
    pub title: String,

    /// Review text.
    pub body: String,

    /// Star rating from 1 to 5.
    pub rating: Option<u8>,

    /// Date as written in the corpus.
    pub date: Option<String>,
}

impl ReviewRecord {
    /// Text that gets embedded for this review.
    pub fn document_text(&self) -> String {
        format!("{}. {}", self.title, self.body)
    }

    /// Metadata stored next to the embedding.
    pub fn metadata(&self) -> ReviewMetadata {
        ReviewMetadata {
            rating: self.rating,
            date: self.date.clone(),
            title: (!self.title.is_empty()).then(|| self.title.clone()),
        }
    }
}

/// Review attributes kept alongside an indexed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewMetadata {
    pub rating: Option<u8>,
    pub date: Option<String>,
    pub title: Option<String>,
}

struct ColumnIndexes {
    title: usize,
    review: usize,
    rating: usize,
    date: usize,
}

impl ColumnIndexes {
    fn from_headers(path: &Path, headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| {
                    RetrievalError::malformed(path, format!("missing required column '{name}'"))
                })
        };

        Ok(Self {
            title: find(TITLE_COLUMN)?,
            review: find(REVIEW_COLUMN)?,
            rating: find(RATING_COLUMN)?,
            date: find(DATE_COLUMN)?,
        })
    }
}

/// Load every review from a CSV file.
pub fn load_corpus(path: impl AsRef<Path>) -> Result<Vec<ReviewRecord>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(RetrievalError::CorpusNotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| RetrievalError::malformed(path, e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| RetrievalError::malformed(path, format!("unreadable header: {e}")))?
        .clone();
    let columns = ColumnIndexes::from_headers(path, &headers)?;

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let line = row + 1;
        let record = result
            .map_err(|e| RetrievalError::malformed(path, format!("row {line}: {e}")))?;
        let field = |index: usize| record.get(index).map(str::trim).unwrap_or_default();

        let rating = parse_rating(field(columns.rating))
            .map_err(|reason| RetrievalError::malformed(path, format!("row {line}: {reason}")))?;
        let date = Some(field(columns.date))
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        records.push(ReviewRecord {
            id: row.to_string(),
            title: field(columns.title).to_string(),
            body: field(columns.review).to_string(),
            rating,
            date,
        });
    }

    debug!("Parsed {} rows from {}", records.len(), path.display());
    info!("Loaded {} reviews from {}", records.len(), path.display());
    Ok(records)
}

/// Parse a rating cell. Spreadsheet exports write whole numbers as `4.0`,
/// so integral floats are accepted.
fn parse_rating(value: &str) -> std::result::Result<Option<u8>, String> {
    if value.is_empty() {
        return Ok(None);
    }

    let rating = match value.parse::<i64>() {
        Ok(n) => n,
        Err(_) => match value.parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && f.is_finite() => f as i64,
            _ => return Err(format!("rating '{value}' is not a whole number")),
        },
    };

    if (1..=5).contains(&rating) {
        Ok(Some(rating as u8))
    } else {
        Err(format!("rating {rating} is outside 1-5"))
    }
}
