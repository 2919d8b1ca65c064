use std::collections::BTreeMap;

use super::classify::{self, ColumnCategory};
use super::derive::{self, DerivedColumnSpec};
use super::error::DataError;
use super::parser::ParsedTable;

// ---------------------------------------------------------------------------
// Row – one record of the loaded table
// ---------------------------------------------------------------------------

/// Column name → cell text. Numbers and dates are stringified on ingestion.
pub type Row = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Dataset – the single owner of table state
// ---------------------------------------------------------------------------

/// The loaded table, its known columns, the user's column selection and the
/// registry of derived columns.
///
/// Every row holds a value for every name in `columns`. All mutation goes
/// through the methods below so the invariant holds after each call.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<Row>,
    columns: Vec<String>,
    selection: Vec<String>,
    derived: Vec<DerivedColumnSpec>,
}

impl Dataset {
    /// Build a dataset straight from parser output.
    pub fn from_table(table: ParsedTable) -> Self {
        let mut dataset = Self::default();
        dataset.populate(table);
        dataset
    }

    /// Replace everything with a freshly parsed table. Selection and derived
    /// columns from the previous file are discarded.
    pub fn populate(&mut self, table: ParsedTable) {
        let ParsedTable { columns, rows, .. } = table;
        self.rows = rows;
        self.columns = columns;
        self.selection.clear();
        self.derived.clear();
    }

    /// Drop all data (a new ingestion is starting).
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// All known columns, original first, derived in creation order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn derived(&self) -> &[DerivedColumnSpec] {
        &self.derived
    }

    pub fn is_derived(&self, name: &str) -> bool {
        self.derived.iter().any(|d| d.name == name)
    }

    /// Columns worth pre-selecting, with their category.
    pub fn recommended(&self) -> Vec<(String, ColumnCategory)> {
        classify::recommend(&self.columns)
    }

    // -- Selection --

    /// Selected columns in the order they were picked.
    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn is_selected(&self, column: &str) -> bool {
        self.selection.iter().any(|c| c == column)
    }

    /// Add or remove `column` from the selection. Unknown names are ignored.
    pub fn set_selected(&mut self, column: &str, selected: bool) {
        if selected {
            if self.has_column(column) && !self.is_selected(column) {
                self.selection.push(column.to_string());
            }
        } else {
            self.selection.retain(|c| c != column);
        }
    }

    pub fn select_all(&mut self) {
        self.selection = self.columns.clone();
    }

    pub fn select_none(&mut self) {
        self.selection.clear();
    }

    pub fn select_recommended(&mut self) {
        self.selection = self.recommended().into_iter().map(|(c, _)| c).collect();
    }

    // -- Derived columns --

    /// Materialize `spec` into every row and register it.
    ///
    /// Fails without touching the dataset when the name is empty or taken, or
    /// an operand column is unknown.
    pub fn commit_derived(&mut self, spec: DerivedColumnSpec) -> Result<(), DataError> {
        derive::validate(self, &spec)?;

        let values: Vec<String> = self.rows.iter().map(|row| spec.evaluate(row)).collect();
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(spec.name.clone(), value);
        }
        self.columns.push(spec.name.clone());

        log::info!(
            "Created derived column '{}' = {} over {} rows",
            spec.name,
            spec.formula(),
            self.rows.len()
        );
        self.derived.push(spec);
        Ok(())
    }

    /// Delete a derived column from every row, the column list, the selection
    /// and the registry.
    pub fn remove_derived(&mut self, name: &str) -> Result<DerivedColumnSpec, DataError> {
        let pos = self
            .derived
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| DataError::NotDerived(name.to_string()))?;

        let spec = self.derived.remove(pos);
        for row in &mut self.rows {
            row.remove(name);
        }
        self.columns.retain(|c| c != name);
        self.selection.retain(|c| c != name);

        log::info!("Removed derived column '{name}'");
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::derive::Operation;
    use crate::data::parser::parse_document;

    fn sample() -> Dataset {
        Dataset::from_table(parse_document("城市,数量,备注\n上海,3,a\n北京,5,b\n").unwrap())
    }

    #[test]
    fn test_populate_resets_state() {
        let mut ds = sample();
        ds.select_all();
        ds.commit_derived(DerivedColumnSpec::new("double", "数量", "数量", Operation::Add))
            .unwrap();

        ds.populate(parse_document("x\n1\n").unwrap());
        assert_eq!(ds.columns(), ["x"]);
        assert!(ds.selection().is_empty());
        assert!(ds.derived().is_empty());
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_selection_keeps_pick_order_and_ignores_unknown() {
        let mut ds = sample();
        ds.set_selected("备注", true);
        ds.set_selected("城市", true);
        ds.set_selected("城市", true);
        ds.set_selected("nope", true);
        assert_eq!(ds.selection(), ["备注", "城市"]);
        ds.set_selected("备注", false);
        assert_eq!(ds.selection(), ["城市"]);
    }

    #[test]
    fn test_select_recommended() {
        let mut ds = sample();
        ds.select_recommended();
        assert_eq!(ds.selection(), ["城市", "数量"]);
    }

    #[test]
    fn test_commit_materializes_every_row() {
        let mut ds = sample();
        ds.commit_derived(DerivedColumnSpec::new("合计", "数量", "数量", Operation::Multiply))
            .unwrap();
        assert_eq!(ds.columns().last().unwrap(), "合计");
        assert_eq!(ds.rows()[0]["合计"], "9");
        assert_eq!(ds.rows()[1]["合计"], "25");
        assert!(ds.is_derived("合计"));
    }

    #[test]
    fn test_duplicate_name_leaves_dataset_unchanged() {
        let mut ds = sample();
        let before_rows = ds.rows().to_vec();
        let before_cols = ds.columns().to_vec();

        let err = ds
            .commit_derived(DerivedColumnSpec::new("备注", "城市", "数量", Operation::concat("-")))
            .unwrap_err();
        assert_eq!(err, DataError::DuplicateColumnName("备注".into()));
        assert_eq!(ds.rows(), before_rows.as_slice());
        assert_eq!(ds.columns(), before_cols.as_slice());
        assert!(ds.derived().is_empty());

        ds.commit_derived(DerivedColumnSpec::new("x", "城市", "数量", Operation::concat("")))
            .unwrap();
        let err = ds
            .commit_derived(DerivedColumnSpec::new("x", "城市", "数量", Operation::Add))
            .unwrap_err();
        assert_eq!(err, DataError::DuplicateColumnName("x".into()));
        assert_eq!(ds.derived().len(), 1);
    }

    #[test]
    fn test_unknown_operand_is_rejected() {
        let mut ds = sample();
        let err = ds
            .commit_derived(DerivedColumnSpec::new("y", "城市", "missing", Operation::Add))
            .unwrap_err();
        assert_eq!(err, DataError::UnknownColumn("missing".into()));
    }

    #[test]
    fn test_remove_derived_cleans_everywhere() {
        let mut ds = sample();
        ds.commit_derived(DerivedColumnSpec::new("标签", "城市", "备注", Operation::concat("/")))
            .unwrap();
        ds.set_selected("标签", true);
        assert_eq!(ds.rows()[0]["标签"], "上海/a");

        let spec = ds.remove_derived("标签").unwrap();
        assert_eq!(spec.name, "标签");
        assert!(!ds.has_column("标签"));
        assert!(!ds.is_selected("标签"));
        assert!(ds.rows().iter().all(|r| !r.contains_key("标签")));
        assert!(ds.derived().is_empty());
    }

    #[test]
    fn test_only_derived_columns_can_be_removed() {
        let mut ds = sample();
        assert_eq!(
            ds.remove_derived("城市").unwrap_err(),
            DataError::NotDerived("城市".into())
        );
        assert!(ds.has_column("城市"));
    }
}
