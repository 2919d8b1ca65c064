use serde::{Deserialize, Serialize};

use super::error::{DataError, Precondition};
use super::model::{Dataset, Row};

// ---------------------------------------------------------------------------
// Filter predicate: search text, match mode and term logic
// ---------------------------------------------------------------------------

/// How one cell is compared with one search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchMode {
    /// Trimmed equality.
    #[default]
    Exact,
    /// Trimmed, case-folded equality.
    ExactIgnoreCase,
    /// Substring.
    Contains,
    /// Case-folded substring.
    ContainsIgnoreCase,
}

impl MatchMode {
    pub const ALL: [MatchMode; 4] = [
        MatchMode::Exact,
        MatchMode::ExactIgnoreCase,
        MatchMode::Contains,
        MatchMode::ContainsIgnoreCase,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MatchMode::Exact => "Exact match",
            MatchMode::ExactIgnoreCase => "Exact match (ignore case)",
            MatchMode::Contains => "Contains",
            MatchMode::ContainsIgnoreCase => "Contains (ignore case)",
        }
    }
}

/// How several terms combine (multi-term searches only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogicMode {
    /// Any term in any selected column.
    #[default]
    Or,
    /// Every term in at least one selected column.
    And,
}

impl LogicMode {
    pub fn label(self) -> &'static str {
        match self {
            LogicMode::Or => "OR (any term)",
            LogicMode::And => "AND (all terms)",
        }
    }
}

/// Everything the UI supplies for one filter run, apart from the selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterQuery {
    pub search: String,
    pub match_mode: MatchMode,
    pub multi_term: bool,
    pub logic: LogicMode,
}

impl FilterQuery {
    /// Search terms: split on `,` / `，` in multi-term mode, otherwise the
    /// whole trimmed input.
    pub fn terms(&self) -> Vec<String> {
        if self.multi_term {
            self.search
                .split([',', '，'])
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            let term = self.search.trim();
            if term.is_empty() {
                Vec::new()
            } else {
                vec![term.to_string()]
            }
        }
    }

    /// The logic actually applied: AND only makes sense with several terms.
    pub fn effective_logic(&self) -> LogicMode {
        if self.multi_term {
            self.logic
        } else {
            LogicMode::Or
        }
    }

    /// One-line summary for the status bar.
    pub fn describe(&self) -> String {
        let terms = self.terms().join(", ");
        if self.multi_term {
            format!(
                "terms [{terms}], {}, {}",
                self.logic.label(),
                self.match_mode.label()
            )
        } else {
            format!("\"{terms}\", {}", self.match_mode.label())
        }
    }
}

/// Compare one cell with one term.
pub fn matches(cell: &str, term: &str, mode: MatchMode) -> bool {
    match mode {
        MatchMode::Exact => cell.trim() == term.trim(),
        MatchMode::ExactIgnoreCase => cell.trim().to_lowercase() == term.trim().to_lowercase(),
        MatchMode::Contains => cell.contains(term),
        MatchMode::ContainsIgnoreCase => cell.to_lowercase().contains(&term.to_lowercase()),
    }
}

fn cell_matches(row: &Row, column: &str, term: &str, mode: MatchMode) -> bool {
    match row.get(column) {
        Some(cell) if !cell.is_empty() => matches(cell, term, mode),
        _ => false,
    }
}

/// Return indices of rows that pass the query, in dataset order.
///
/// * [`LogicMode::Or`] – some selected column matches some term.
/// * [`LogicMode::And`] – every term matches some selected column.
///
/// Empty or absent cells never match.
pub fn filtered_indices(
    dataset: &Dataset,
    columns: &[String],
    query: &FilterQuery,
) -> Result<Vec<usize>, DataError> {
    if query.search.trim().is_empty() {
        return Err(Precondition::EmptySearch.into());
    }
    if dataset.is_empty() {
        return Err(Precondition::EmptyDataset.into());
    }
    if columns.is_empty() {
        return Err(Precondition::NoColumnsSelected.into());
    }
    let terms = query.terms();
    if terms.is_empty() {
        return Err(Precondition::NoSearchTerms.into());
    }

    let mode = query.match_mode;
    let logic = query.effective_logic();
    log::debug!("Filtering {} rows: {}", dataset.len(), query.describe());

    let indices = dataset
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| match logic {
            LogicMode::Or => columns
                .iter()
                .any(|col| terms.iter().any(|t| cell_matches(row, col, t, mode))),
            LogicMode::And => terms
                .iter()
                .all(|t| columns.iter().any(|col| cell_matches(row, col, t, mode))),
        })
        .map(|(i, _)| i)
        .collect();
    Ok(indices)
}
