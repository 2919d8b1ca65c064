use serde::{Deserialize, Serialize};

use super::error::{DataError, Precondition};
use super::model::{Dataset, Row};

/// Stored in place of a result when the divisor is zero.
pub const DIVISION_ERROR: &str = "除零错误";

// ---------------------------------------------------------------------------
// Formula
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivedKind {
    Numeric,
    Text,
}

/// How the two operand columns are combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// `a / b × 100`, two decimals, `%` suffix.
    Percentage,
    /// Text join; the separator is inserted only when non-empty.
    Concat { separator: String },
}

impl Operation {
    /// Numeric operations in the order the calculator offers them.
    pub const NUMERIC: [Operation; 5] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
        Operation::Percentage,
    ];

    pub fn concat(separator: impl Into<String>) -> Self {
        Operation::Concat {
            separator: separator.into(),
        }
    }

    pub fn kind(&self) -> DerivedKind {
        match self {
            Operation::Concat { .. } => DerivedKind::Text,
            _ => DerivedKind::Numeric,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Add | Operation::Concat { .. } => "+",
            Operation::Subtract => "-",
            Operation::Multiply => "×",
            Operation::Divide => "÷",
            Operation::Percentage => "%",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operation::Add => "Add (+)",
            Operation::Subtract => "Subtract (-)",
            Operation::Multiply => "Multiply (×)",
            Operation::Divide => "Divide (÷)",
            Operation::Percentage => "Percentage (A/B×100)",
            Operation::Concat { .. } => "Join text",
        }
    }

    /// Combine two raw cell values.
    pub fn apply(&self, a: &str, b: &str) -> String {
        match self {
            Operation::Add => format_number(to_number(a) + to_number(b)),
            Operation::Subtract => format_number(to_number(a) - to_number(b)),
            Operation::Multiply => format_number(to_number(a) * to_number(b)),
            Operation::Divide => {
                let divisor = to_number(b);
                if divisor == 0.0 {
                    DIVISION_ERROR.to_string()
                } else {
                    format_number(to_number(a) / divisor)
                }
            }
            Operation::Percentage => {
                let divisor = to_number(b);
                if divisor == 0.0 {
                    DIVISION_ERROR.to_string()
                } else {
                    format!("{:.2}%", to_number(a) / divisor * 100.0)
                }
            }
            Operation::Concat { separator } => {
                let mut out = String::with_capacity(a.len() + separator.len() + b.len());
                out.push_str(a);
                out.push_str(separator);
                out.push_str(b);
                out
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DerivedColumnSpec
// ---------------------------------------------------------------------------

/// A named formula over two existing columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedColumnSpec {
    pub name: String,
    pub source_a: String,
    pub source_b: String,
    pub operation: Operation,
}

impl DerivedColumnSpec {
    pub fn new(
        name: impl Into<String>,
        source_a: impl Into<String>,
        source_b: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            source_a: source_a.into(),
            source_b: source_b.into(),
            operation,
        }
    }

    pub fn kind(&self) -> DerivedKind {
        self.operation.kind()
    }

    /// Human-readable formula, e.g. `单价 × 数量` or `省 + "-" + 市`.
    pub fn formula(&self) -> String {
        match &self.operation {
            Operation::Concat { separator } if !separator.is_empty() => {
                format!("{} + \"{}\" + {}", self.source_a, separator, self.source_b)
            }
            op => format!("{} {} {}", self.source_a, op.symbol(), self.source_b),
        }
    }

    /// Value of the derived column for one row. Absent cells count as empty.
    pub fn evaluate(&self, row: &Row) -> String {
        let a = row.get(&self.source_a).map(String::as_str).unwrap_or("");
        let b = row.get(&self.source_b).map(String::as_str).unwrap_or("");
        self.operation.apply(a, b)
    }
}

// ---------------------------------------------------------------------------
// Lenient number handling
// ---------------------------------------------------------------------------

/// Length in bytes of the leading decimal literal of `s` (sign, digits,
/// fraction, exponent), or `None` when there is no digit.
fn numeric_prefix_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            i = j;
        }
    }
    if digits == 0 {
        return None;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    Some(i)
}

/// Parse the leading number of a cell (`"12kg"` → 12), if any.
pub fn parse_leading_number(cell: &str) -> Option<f64> {
    let s = cell.trim();
    let len = numeric_prefix_len(s)?;
    s[..len].parse().ok()
}

/// Operand coercion: blank or non-numeric cells count as 0.
pub fn to_number(cell: &str) -> f64 {
    parse_leading_number(cell).unwrap_or(0.0)
}

/// Render a result the way a spreadsheet shows it: no trailing `.0`, no `-0`.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Operand candidates
// ---------------------------------------------------------------------------

/// A column counts as numeric when more than half of the first `sample` rows
/// hold a parseable number. Only the leading rows are looked at.
pub fn is_numeric_column(rows: &[Row], column: &str, sample: usize) -> bool {
    let sampled = &rows[..rows.len().min(sample)];
    if sampled.is_empty() {
        return false;
    }
    let numeric = sampled
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|v| !v.is_empty() && parse_leading_number(v).is_some())
        .count();
    numeric * 2 > sampled.len()
}

/// Columns offered in the numeric operand pickers.
pub fn numeric_candidates(dataset: &Dataset, sample: usize) -> Vec<String> {
    dataset
        .columns()
        .iter()
        .filter(|c| is_numeric_column(dataset.rows(), c, sample))
        .cloned()
        .collect()
}

/// Columns offered in the text operand pickers: all of them.
pub fn text_candidates(dataset: &Dataset) -> Vec<String> {
    dataset.columns().to_vec()
}

// ---------------------------------------------------------------------------
// Validation & preview
// ---------------------------------------------------------------------------

/// Checks shared by preview and commit.
pub fn validate(dataset: &Dataset, spec: &DerivedColumnSpec) -> Result<(), DataError> {
    if spec.name.trim().is_empty() {
        return Err(Precondition::EmptyColumnName.into());
    }
    if dataset.has_column(&spec.name) || dataset.is_derived(&spec.name) {
        return Err(DataError::DuplicateColumnName(spec.name.clone()));
    }
    for source in [&spec.source_a, &spec.source_b] {
        if !dataset.has_column(source) {
            return Err(DataError::UnknownColumn(source.clone()));
        }
    }
    Ok(())
}

/// Compute the first `sample_size` results without touching the dataset.
/// Each preview row holds the two operands and the new value.
pub fn preview(
    dataset: &Dataset,
    spec: &DerivedColumnSpec,
    sample_size: usize,
) -> Result<Vec<Row>, DataError> {
    validate(dataset, spec)?;
    Ok(dataset
        .rows()
        .iter()
        .take(sample_size)
        .map(|row| {
            let mut out = Row::new();
            for source in [&spec.source_a, &spec.source_b] {
                out.insert(source.clone(), row.get(source).cloned().unwrap_or_default());
            }
            out.insert(spec.name.clone(), spec.evaluate(row));
            out
        })
        .collect())
}
