use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use crate::config::Settings;
use crate::data::derive::{self, DerivedColumnSpec, DerivedKind, Operation};
use crate::data::error::DataError;
use crate::data::export;
use crate::data::filter::{self, FilterQuery};
use crate::data::loader::{self, IngestSummary, LoadedTable};
use crate::data::model::{Dataset, Row};

// ---------------------------------------------------------------------------
// Status line
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Derived-column form
// ---------------------------------------------------------------------------

/// What the calculator panel is currently set to.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveForm {
    pub kind: DerivedKind,
    pub source_a: String,
    pub source_b: String,
    /// Used when `kind` is numeric.
    pub operation: Operation,
    /// Used when `kind` is text.
    pub separator: String,
    pub name: String,
}

impl Default for DeriveForm {
    fn default() -> Self {
        Self {
            kind: DerivedKind::Numeric,
            source_a: String::new(),
            source_b: String::new(),
            operation: Operation::Add,
            separator: String::new(),
            name: String::new(),
        }
    }
}

impl DeriveForm {
    pub fn spec(&self) -> DerivedColumnSpec {
        let operation = match self.kind {
            DerivedKind::Numeric => self.operation.clone(),
            DerivedKind::Text => Operation::concat(self.separator.clone()),
        };
        DerivedColumnSpec::new(
            self.name.clone(),
            self.source_a.clone(),
            self.source_b.clone(),
            operation,
        )
    }
}

/// Result of the last successful preview, kept with the spec it was made for.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedPreview {
    pub spec: DerivedColumnSpec,
    pub rows: Vec<Row>,
}

// ---------------------------------------------------------------------------
// Background ingestion
// ---------------------------------------------------------------------------

/// Result of one background load, tagged with the token it was started with.
struct LoadMessage {
    token: u64,
    path: PathBuf,
    result: anyhow::Result<LoadedTable>,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub settings: Settings,

    /// Loaded table; empty until a file has been ingested.
    pub dataset: Dataset,

    /// Row indices passing the active filter. `None` means no filter is
    /// active; `Some(vec![])` means the filter matched nothing.
    pub visible: Option<Vec<usize>>,

    /// Search text and modes bound to the filter form.
    pub filter: FilterQuery,

    pub derive_form: DeriveForm,

    pub preview: Option<DerivedPreview>,

    /// Custom export file name (may be empty).
    pub export_name: String,

    /// Status / error message shown in the UI.
    pub status: Option<StatusMessage>,

    /// Report of the last successful ingestion.
    pub last_summary: Option<IngestSummary>,

    /// Whether a file loading operation is in progress.
    pub loading: bool,

    load_token: u64,
    load_tx: Sender<LoadMessage>,
    load_rx: Receiver<LoadMessage>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let (load_tx, load_rx) = mpsc::channel();
        Self {
            settings,
            dataset: Dataset::default(),
            visible: None,
            filter: FilterQuery::default(),
            derive_form: DeriveForm::default(),
            preview: None,
            export_name: String::new(),
            status: None,
            last_summary: None,
            loading: false,
            load_token: 0,
            load_tx,
            load_rx,
        }
    }

    // -- Ingestion --

    /// Drop the current table and start loading `path` on a worker thread.
    /// Any load still in flight becomes stale.
    pub fn begin_load(&mut self, path: PathBuf) {
        let token = self.reset_for_load();
        self.set_status(
            StatusKind::Info,
            format!("Loading {}…", path.display()),
        );
        log::info!("Loading {} (load #{token})", path.display());

        let tx = self.load_tx.clone();
        let settings = self.settings.clone();
        std::thread::spawn(move || {
            let result = loader::load_file(&path, &settings);
            // The receiver lives as long as the app; a send error only
            // happens during shutdown.
            let _ = tx.send(LoadMessage {
                token,
                path,
                result,
            });
        });
    }

    /// Apply any finished background loads. Returns true when the state
    /// changed.
    pub fn poll_load(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.load_rx.try_recv() {
            changed |= self.finish_load(message.token, &message.path, message.result);
        }
        changed
    }

    fn reset_for_load(&mut self) -> u64 {
        self.load_token += 1;
        self.dataset.clear();
        self.visible = None;
        self.preview = None;
        self.derive_form = DeriveForm::default();
        self.last_summary = None;
        self.loading = true;
        self.load_token
    }

    fn finish_load(
        &mut self,
        token: u64,
        path: &Path,
        result: anyhow::Result<LoadedTable>,
    ) -> bool {
        if token != self.load_token {
            log::debug!(
                "Discarding stale load #{token} of {} (current is #{})",
                path.display(),
                self.load_token
            );
            return false;
        }
        self.loading = false;
        match result {
            Ok(loaded) => self.ingest(loaded),
            Err(e) => self.report_error("Failed to load file", &e),
        }
        true
    }

    /// Replace the dataset with a freshly loaded table.
    pub fn ingest(&mut self, loaded: LoadedTable) {
        let summary = loaded.summary();
        self.dataset.populate(loaded.table);
        self.visible = None;
        self.preview = None;
        self.derive_form = DeriveForm::default();

        log::info!(
            "Loaded {} rows with columns {:?}",
            self.dataset.len(),
            self.dataset.columns()
        );
        let recommended = self.dataset.recommended().len();
        self.set_status(
            StatusKind::Success,
            format!("{summary}; {recommended} recommended columns"),
        );
        self.last_summary = Some(summary);
    }

    // -- View --

    pub fn filter_active(&self) -> bool {
        self.visible.is_some()
    }

    /// Number of rows the table shows.
    pub fn visible_count(&self) -> usize {
        match &self.visible {
            Some(indices) => indices.len(),
            None => self.dataset.len(),
        }
    }

    /// The `n`th row of the table.
    pub fn visible_row(&self, n: usize) -> Option<&Row> {
        match &self.visible {
            Some(indices) => indices.get(n).and_then(|&i| self.dataset.row(i)),
            None => self.dataset.row(n),
        }
    }

    // -- Filter --

    /// Run the filter form against the selected columns.
    pub fn apply_filter(&mut self) {
        match filter::filtered_indices(&self.dataset, self.dataset.selection(), &self.filter) {
            Ok(indices) => {
                let text = format!(
                    "Found {} of {} rows in {} columns ({})",
                    indices.len(),
                    self.dataset.len(),
                    self.dataset.selection().len(),
                    self.filter.describe()
                );
                log::info!("{text}");
                let kind = if indices.is_empty() {
                    StatusKind::Info
                } else {
                    StatusKind::Success
                };
                self.visible = Some(indices);
                self.set_status(kind, text);
            }
            Err(e) => self.report_data_error("Cannot filter", &e),
        }
    }

    /// Show every row again and empty the search box.
    pub fn clear_filter(&mut self) {
        self.visible = None;
        self.filter.search.clear();
        if !self.dataset.is_empty() {
            self.set_status(
                StatusKind::Info,
                format!("Filter cleared, showing all {} rows", self.dataset.len()),
            );
        }
    }

    // -- Column selection --

    pub fn set_column_selected(&mut self, column: &str, selected: bool) {
        self.dataset.set_selected(column, selected);
    }

    pub fn select_all_columns(&mut self) {
        self.dataset.select_all();
    }

    pub fn select_no_columns(&mut self) {
        self.dataset.select_none();
    }

    pub fn select_recommended_columns(&mut self) {
        self.dataset.select_recommended();
    }

    // -- Derived columns --

    /// Operand choices for the current calculator kind.
    pub fn operand_candidates(&self) -> Vec<String> {
        match self.derive_form.kind {
            DerivedKind::Numeric => {
                derive::numeric_candidates(&self.dataset, self.settings.numeric_sample_rows)
            }
            DerivedKind::Text => derive::text_candidates(&self.dataset),
        }
    }

    pub fn preview_derived(&mut self) {
        let spec = self.derive_form.spec();
        match derive::preview(&self.dataset, &spec, self.settings.preview_rows) {
            Ok(rows) => {
                self.set_status(
                    StatusKind::Info,
                    format!("Preview of '{}' = {}", spec.name, spec.formula()),
                );
                self.preview = Some(DerivedPreview { spec, rows });
            }
            Err(e) => {
                self.preview = None;
                self.report_data_error("Cannot preview column", &e);
            }
        }
    }

    pub fn commit_derived(&mut self) {
        let spec = self.derive_form.spec();
        let name = spec.name.clone();
        let formula = spec.formula();
        match self.dataset.commit_derived(spec) {
            Ok(()) => {
                self.preview = None;
                self.derive_form.name.clear();
                self.set_status(
                    StatusKind::Success,
                    format!("Created column '{name}' = {formula}"),
                );
            }
            Err(e) => self.report_data_error("Cannot create column", &e),
        }
    }

    /// Remove a derived column. An active filter that searched it is re-run.
    pub fn remove_derived(&mut self, name: &str) {
        let was_selected = self.dataset.is_selected(name);
        match self.dataset.remove_derived(name) {
            Ok(spec) => {
                self.set_status(
                    StatusKind::Success,
                    format!("Removed column '{}' ({})", spec.name, spec.formula()),
                );
                if was_selected && self.filter_active() {
                    self.refilter();
                }
            }
            Err(e) => self.report_data_error("Cannot remove column", &e),
        }
    }

    /// Recompute the active filter silently; drop it if it no longer applies.
    fn refilter(&mut self) {
        self.visible =
            filter::filtered_indices(&self.dataset, self.dataset.selection(), &self.filter).ok();
    }

    // -- Export --

    /// File name proposed in the save dialog.
    pub fn suggested_export_name(&self) -> String {
        let has_results = self.visible.as_ref().is_some_and(|v| !v.is_empty());
        export::export_file_name(&self.export_name, &self.filter.search, has_results)
    }

    /// Serialize the visible rows, or report why there is nothing to export.
    pub fn prepare_export(&mut self) -> Option<String> {
        match export::export_rows(&self.dataset, self.visible.as_deref()) {
            Ok(text) => Some(text),
            Err(e) => {
                self.report_data_error("Cannot export", &e);
                None
            }
        }
    }

    pub fn save_export(&mut self, path: &Path, text: &str) {
        match export::write_export(path, text) {
            Ok(()) => {
                let text = format!(
                    "Exported {} rows × {} columns to {}",
                    self.visible_count(),
                    self.dataset.selection().len(),
                    path.display()
                );
                log::info!("{text}");
                self.set_status(StatusKind::Success, text);
            }
            Err(e) => self.report_error("Export failed", &e),
        }
    }

    // -- Status --

    fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind,
            text: text.into(),
        });
    }

    fn report_error(&mut self, action: &str, err: &anyhow::Error) {
        let hint = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<DataError>())
            .and_then(DataError::hint);
        log::error!("{action}: {err:#}");
        self.set_status(StatusKind::Error, with_hint(format!("{action}: {err:#}"), hint));
    }

    fn report_data_error(&mut self, action: &str, err: &DataError) {
        log::warn!("{action}: {err}");
        self.set_status(
            StatusKind::Error,
            with_hint(format!("{action}: {err}"), err.hint()),
        );
    }
}

fn with_hint(message: String, hint: Option<&str>) -> String {
    match hint {
        Some(hint) => format!("{message}\n{hint}"),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::MatchMode;
    use crate::data::loader::SourceFormat;
    use crate::data::parser::parse_document;

    fn loaded(csv: &str) -> LoadedTable {
        LoadedTable {
            file_name: "test.csv".into(),
            format: SourceFormat::Csv {
                encoding: "UTF-8".into(),
            },
            table: parse_document(csv).unwrap(),
        }
    }

    fn state_with(csv: &str) -> AppState {
        let mut state = AppState::default();
        state.ingest(loaded(csv));
        state
    }

    fn status_kind(state: &AppState) -> Option<StatusKind> {
        state.status.as_ref().map(|s| s.kind)
    }

    #[test]
    fn test_stale_load_is_discarded() {
        let mut state = AppState::default();
        let first = state.reset_for_load();
        let second = state.reset_for_load();
        assert!(state.loading);

        let path = Path::new("old.csv");
        assert!(!state.finish_load(first, path, Ok(loaded("a\nold\n"))));
        assert!(state.dataset.is_empty());
        assert!(state.loading);

        assert!(state.finish_load(second, Path::new("new.csv"), Ok(loaded("a\nnew\n"))));
        assert!(!state.loading);
        assert_eq!(state.dataset.rows()[0]["a"], "new");
    }

    #[test]
    fn test_failed_load_reports_hint() {
        let mut state = AppState::default();
        let token = state.reset_for_load();
        let err = anyhow::Error::from(DataError::EmptyFile).context("reading x.csv");
        state.finish_load(token, Path::new("x.csv"), Err(err));

        let status = state.status.clone().unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert!(status.text.contains("empty"));
        assert!(status.text.contains("check that it was saved"));
    }

    #[test]
    fn test_begin_load_resets_previous_dataset() {
        let mut state = state_with("城市,数量\n上海,3\n");
        state.select_all_columns();
        state.filter.search = "上海".into();
        state.apply_filter();
        assert!(state.filter_active());

        let dir = tempfile::tempdir().unwrap();
        state.begin_load(dir.path().join("missing.csv"));
        assert!(state.dataset.is_empty());
        assert!(!state.filter_active());
        assert!(state.loading);
    }

    #[test]
    fn test_filter_then_clear() {
        let mut state = state_with("城市,数量\n上海,3\n北京,5\n上海,7\n");
        state.filter.search = "上海".into();
        state.apply_filter();
        assert_eq!(status_kind(&state), Some(StatusKind::Error));
        assert!(!state.filter_active());

        state.set_column_selected("城市", true);
        state.apply_filter();
        assert_eq!(state.visible, Some(vec![0, 2]));
        assert_eq!(state.visible_count(), 2);
        assert_eq!(state.visible_row(1).unwrap()["数量"], "7");

        state.clear_filter();
        assert!(!state.filter_active());
        assert!(state.filter.search.is_empty());
        assert_eq!(state.visible_count(), 3);
    }

    #[test]
    fn test_derived_column_visible_through_active_filter() {
        let mut state = state_with("城市,单价,数量\n上海,2,3\n北京,4,5\n");
        state.set_column_selected("城市", true);
        state.filter.search = "北京".into();
        state.apply_filter();

        state.derive_form = DeriveForm {
            source_a: "单价".into(),
            source_b: "数量".into(),
            operation: Operation::Multiply,
            name: "总价".into(),
            ..DeriveForm::default()
        };
        state.preview_derived();
        assert_eq!(state.preview.as_ref().unwrap().rows[1]["总价"], "20");

        state.commit_derived();
        assert!(state.preview.is_none());
        assert!(state.derive_form.name.is_empty());
        assert_eq!(state.visible_row(0).unwrap()["总价"], "20");

        state.derive_form.name = "总价".into();
        state.commit_derived();
        assert_eq!(status_kind(&state), Some(StatusKind::Error));
    }

    #[test]
    fn test_text_form_builds_concat() {
        let form = DeriveForm {
            kind: DerivedKind::Text,
            source_a: "省".into(),
            source_b: "市".into(),
            separator: "-".into(),
            name: "地址".into(),
            ..DeriveForm::default()
        };
        assert_eq!(form.spec().operation, Operation::concat("-"));
    }

    #[test]
    fn test_removing_searched_column_refilters() {
        let mut state = state_with("A,B\nx,1\ny,2\n");
        state.derive_form = DeriveForm {
            kind: DerivedKind::Text,
            source_a: "A".into(),
            source_b: "B".into(),
            name: "AB".into(),
            ..DeriveForm::default()
        };
        state.commit_derived();
        state.set_column_selected("AB", true);
        state.filter.search = "x1".into();
        state.apply_filter();
        assert_eq!(state.visible, Some(vec![0]));

        state.remove_derived("AB");
        assert!(!state.dataset.has_column("AB"));
        // Nothing is selected any more, so the filter no longer applies.
        assert!(!state.filter_active());

        state.remove_derived("A");
        assert_eq!(status_kind(&state), Some(StatusKind::Error));
        assert!(state.dataset.has_column("A"));
    }

    #[test]
    fn test_export_follows_view() {
        let mut state = state_with("城市,数量\n上海,3\n北京,5\n");
        assert!(state.prepare_export().is_none());

        state.set_column_selected("数量", true);
        state.set_column_selected("城市", true);
        state.filter.search = "北京".into();
        state.filter.match_mode = MatchMode::Contains;
        state.apply_filter();
        assert_eq!(state.suggested_export_name(), "北京_筛选数据.csv");

        let text = state.prepare_export().unwrap();
        assert_eq!(text, "\u{FEFF}数量,城市\n5,北京\n");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(state.suggested_export_name());
        state.save_export(&path, &text);
        assert_eq!(status_kind(&state), Some(StatusKind::Success));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);

        state.filter.search = "广州".into();
        state.apply_filter();
        assert!(state.prepare_export().is_none());
        assert_eq!(state.suggested_export_name(), "数据导出.csv");
    }
}
