use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy for ingestion, filtering, derived columns and export
// ---------------------------------------------------------------------------

/// A user action was rejected before any computation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("enter a value to search for")]
    EmptySearch,
    #[error("the search input contains no usable terms")]
    NoSearchTerms,
    #[error("no data loaded, open a file first")]
    EmptyDataset,
    #[error("select at least one column first")]
    NoColumnsSelected,
    #[error("the new column needs a name")]
    EmptyColumnName,
    #[error("there are no rows to export")]
    NoRowsToExport,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("the file is empty (0 bytes)")]
    EmptyFile,

    #[error("the file is too large ({size} bytes, limit is {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("could not decode the text with any known encoding (tried {tried})")]
    EncodingUnresolved { tried: String },

    #[error("the document is empty or contains only blank lines")]
    EmptyDocument,

    #[error("the document needs a header line and at least one data row")]
    NoDataRows,

    #[error("the header line could not be parsed: {0}")]
    MalformedHeader(String),

    /// Per-line failure; callers skip the line and keep going.
    #[error("line {line}: {reason}")]
    LineParse { line: usize, reason: String },

    #[error(transparent)]
    Precondition(#[from] Precondition),

    #[error("a column named '{0}' already exists")]
    DuplicateColumnName(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("'{0}' is not a derived column")]
    NotDerived(String),

    #[error("could not write CSV: {0}")]
    CsvWrite(String),
}

impl DataError {
    /// Remediation text for document-level failures, shown under the message.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            DataError::EncodingUnresolved { .. } => Some(
                "Open the file in Excel and use Save As → \"CSV UTF-8 (comma delimited)\", \
                 or re-save it from a text editor with UTF-8 encoding.",
            ),
            DataError::EmptyDocument | DataError::NoDataRows | DataError::MalformedHeader(_) => {
                Some(
                    "Make sure the first line holds the column titles, the file is saved as \
                     UTF-8 and it contains no control characters.",
                )
            }
            DataError::FileTooLarge { .. } => Some("Split the file or export a smaller range."),
            DataError::EmptyFile => Some("The file has no content; check that it was saved."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_converts_into_data_error() {
        let err: DataError = Precondition::NoColumnsSelected.into();
        assert_eq!(err, DataError::Precondition(Precondition::NoColumnsSelected));
        assert_eq!(err.to_string(), "select at least one column first");
    }

    #[test]
    fn test_document_errors_carry_hints() {
        assert!(DataError::NoDataRows.hint().is_some());
        assert!(DataError::EncodingUnresolved { tried: "UTF-8".into() }
            .hint()
            .unwrap()
            .contains("UTF-8"));
        assert!(DataError::DuplicateColumnName("x".into()).hint().is_none());
    }
}
