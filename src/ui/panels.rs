use std::collections::BTreeSet;

use eframe::egui::{self, Color32, RichText, ScrollArea, TextEdit, Ui};

use crate::data::classify;
use crate::data::derive::{DerivedKind, Operation};
use crate::data::export::ExportFlavor;
use crate::data::filter::{LogicMode, MatchMode};
use crate::data::loader::{CSV_EXTENSIONS, SPREADSHEET_EXTENSIONS};
use crate::state::{AppState, StatusKind};

const RECOMMENDED_GREEN: Color32 = Color32::from_rgb(76, 175, 80);

// ---------------------------------------------------------------------------
// Left side panel – columns, filter, calculator, export
// ---------------------------------------------------------------------------

/// Render the left control panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    if state.dataset.is_empty() {
        ui.heading("Columns");
        ui.separator();
        if state.loading {
            ui.horizontal(|ui: &mut Ui| {
                ui.spinner();
                ui.label("Loading…");
            });
        } else {
            ui.label("No dataset loaded.");
        }
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            egui::CollapsingHeader::new(RichText::new("Columns").heading())
                .default_open(true)
                .show(ui, |ui: &mut Ui| column_selector(ui, state));
            ui.separator();

            egui::CollapsingHeader::new(RichText::new("Filter").heading())
                .default_open(true)
                .show(ui, |ui: &mut Ui| filter_form(ui, state));
            ui.separator();

            egui::CollapsingHeader::new(RichText::new("Calculated columns").heading())
                .default_open(false)
                .show(ui, |ui: &mut Ui| calculator(ui, state));
            ui.separator();

            egui::CollapsingHeader::new(RichText::new("Export").heading())
                .default_open(true)
                .show(ui, |ui: &mut Ui| export_form(ui, state));
        });
}

fn column_selector(ui: &mut Ui, state: &mut AppState) {
    // Clone what we need so we can mutate state inside the loop.
    let columns = state.dataset.columns().to_vec();
    let recommended: BTreeSet<String> = state
        .dataset
        .recommended()
        .into_iter()
        .map(|(column, _)| column)
        .collect();

    ui.horizontal(|ui: &mut Ui| {
        if ui.small_button("All").clicked() {
            state.select_all_columns();
        }
        if ui.small_button("None").clicked() {
            state.select_no_columns();
        }
        if ui
            .add_enabled(!recommended.is_empty(), egui::Button::new("Recommended").small())
            .clicked()
        {
            state.select_recommended_columns();
        }
    });
    ui.label(
        RichText::new(format!(
            "{} of {} selected",
            state.dataset.selection().len(),
            columns.len()
        ))
        .weak(),
    );

    for (category, members) in classify::group_by_category(&columns) {
        if members.is_empty() {
            continue;
        }
        let n_selected = members
            .iter()
            .filter(|c| state.dataset.is_selected(c))
            .count();
        let header_text = format!(
            "{} {}  ({n_selected}/{})",
            category.icon(),
            category.label(),
            members.len()
        );

        egui::CollapsingHeader::new(RichText::new(header_text).strong())
            .id_salt(category.label())
            .default_open(true)
            .show(ui, |ui: &mut Ui| {
                for column in &members {
                    ui.horizontal(|ui: &mut Ui| {
                        let mut checked = state.dataset.is_selected(column);
                        if ui.checkbox(&mut checked, column.as_str()).changed() {
                            state.set_column_selected(column, checked);
                        }
                        if recommended.contains(column) {
                            ui.label(RichText::new("recommended").small().color(RECOMMENDED_GREEN));
                        }
                        if state.dataset.is_derived(column) {
                            ui.label(RichText::new("calculated").small().italics());
                        }
                    });
                }
            });
    }
}

fn filter_form(ui: &mut Ui, state: &mut AppState) {
    let hint = if state.filter.multi_term {
        "e.g. 上海, 北京"
    } else {
        "Value to search for"
    };
    let response = ui.add(
        TextEdit::singleline(&mut state.filter.search)
            .hint_text(hint)
            .desired_width(f32::INFINITY),
    );
    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
        state.apply_filter();
    }

    ui.checkbox(&mut state.filter.multi_term, "Several terms (comma separated)");

    ui.label("Match");
    for mode in MatchMode::ALL {
        ui.radio_value(&mut state.filter.match_mode, mode, mode.label());
    }

    ui.add_enabled_ui(state.filter.multi_term, |ui: &mut Ui| {
        ui.label("Combine terms");
        ui.horizontal(|ui: &mut Ui| {
            for logic in [LogicMode::Or, LogicMode::And] {
                ui.radio_value(&mut state.filter.logic, logic, logic.label());
            }
        });
    });

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Filter").clicked() {
            state.apply_filter();
        }
        if ui
            .add_enabled(state.filter_active(), egui::Button::new("Clear"))
            .clicked()
        {
            state.clear_filter();
        }
    });
}

fn calculator(ui: &mut Ui, state: &mut AppState) {
    let before = state.derive_form.kind;
    ui.horizontal(|ui: &mut Ui| {
        ui.radio_value(&mut state.derive_form.kind, DerivedKind::Numeric, "Numeric");
        ui.radio_value(&mut state.derive_form.kind, DerivedKind::Text, "Text");
    });
    if state.derive_form.kind != before {
        state.derive_form.source_a.clear();
        state.derive_form.source_b.clear();
        state.preview = None;
    }

    let candidates = state.operand_candidates();
    if candidates.is_empty() {
        ui.label(RichText::new("No numeric columns found").weak());
    } else {
        derive_form(ui, state, &candidates);
    }

    if !state.dataset.derived().is_empty() {
        ui.separator();
        let existing: Vec<(String, String, DerivedKind)> = state
            .dataset
            .derived()
            .iter()
            .map(|d| (d.name.clone(), d.formula(), d.kind()))
            .collect();
        let mut remove = None;
        for (name, formula, kind) in &existing {
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("Remove").clicked() {
                    remove = Some(name.clone());
                }
                let icon = match kind {
                    DerivedKind::Numeric => "🔢",
                    DerivedKind::Text => "🔤",
                };
                ui.label(RichText::new(format!("{icon} {name}")).strong());
                ui.label(RichText::new(formula).weak());
            });
        }
        if let Some(name) = remove {
            state.remove_derived(&name);
        }
    }
}

fn derive_form(ui: &mut Ui, state: &mut AppState, candidates: &[String]) {
    operand_picker(ui, "derive_a", "Column A", &mut state.derive_form.source_a, candidates);
    match state.derive_form.kind {
        DerivedKind::Numeric => {
            egui::ComboBox::from_id_salt("derive_op")
                .selected_text(state.derive_form.operation.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for op in Operation::NUMERIC {
                        let label = op.label();
                        ui.selectable_value(&mut state.derive_form.operation, op, label);
                    }
                });
        }
        DerivedKind::Text => {
            ui.horizontal(|ui: &mut Ui| {
                ui.label("Separator");
                ui.add(
                    TextEdit::singleline(&mut state.derive_form.separator)
                        .hint_text("none")
                        .desired_width(60.0),
                );
            });
        }
    }
    operand_picker(ui, "derive_b", "Column B", &mut state.derive_form.source_b, candidates);

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Name");
        ui.add(TextEdit::singleline(&mut state.derive_form.name).hint_text("New column"));
    });

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Preview").clicked() {
            state.preview_derived();
        }
        if ui.button("Create").clicked() {
            state.commit_derived();
        }
    });

    if let Some(preview) = &state.preview {
        let spec = &preview.spec;
        ui.label(RichText::new(format!("{} = {}", spec.name, spec.formula())).strong());
        egui::Grid::new("derive_preview")
            .striped(true)
            .show(ui, |ui: &mut Ui| {
                let headers = [&spec.source_a, &spec.source_b, &spec.name];
                for h in headers {
                    ui.strong(h.as_str());
                }
                ui.end_row();
                for row in &preview.rows {
                    for h in headers {
                        ui.label(row.get(h).map(String::as_str).unwrap_or(""));
                    }
                    ui.end_row();
                }
            });
    }
}

fn operand_picker(ui: &mut Ui, id: &str, label: &str, value: &mut String, candidates: &[String]) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(label);
        let shown = if value.is_empty() { "Choose…" } else { value.as_str() };
        egui::ComboBox::from_id_salt(id)
            .selected_text(shown.to_string())
            .show_ui(ui, |ui: &mut Ui| {
                for candidate in candidates {
                    ui.selectable_value(&mut *value, candidate.clone(), candidate.as_str());
                }
            });
    });
}

fn export_form(ui: &mut Ui, state: &mut AppState) {
    let suggested = state.suggested_export_name();
    ui.horizontal(|ui: &mut Ui| {
        ui.label("File name");
        ui.add(TextEdit::singleline(&mut state.export_name).hint_text(suggested));
    });
    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Export CSV…").clicked() {
            export_file_dialog(state, ExportFlavor::Csv);
        }
        if ui.button("Export Excel CSV…").clicked() {
            export_file_dialog(state, ExportFlavor::ExcelCsv);
        }
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Export CSV…").clicked() {
                export_file_dialog(state, ExportFlavor::Csv);
                ui.close_menu();
            }
            if ui.button("Export Excel CSV…").clicked() {
                export_file_dialog(state, ExportFlavor::ExcelCsv);
                ui.close_menu();
            }
        });

        ui.separator();

        if state.loading {
            ui.spinner();
        }

        if let Some(summary) = &state.last_summary {
            ui.label(RichText::new(&summary.file_name).strong());
        }

        if !state.dataset.is_empty() {
            let mut stats = format!(
                "{} rows, {} columns, {} selected",
                state.dataset.len(),
                state.dataset.columns().len(),
                state.dataset.selection().len()
            );
            if state.filter_active() {
                stats.push_str(&format!(", {} visible", state.visible_count()));
            }
            ui.label(stats);
        }
    });
}

// ---------------------------------------------------------------------------
// Bottom status bar
// ---------------------------------------------------------------------------

pub fn status_bar(ui: &mut Ui, state: &AppState) {
    match &state.status {
        Some(status) => {
            let color = match status.kind {
                StatusKind::Info => ui.visuals().text_color(),
                StatusKind::Success => RECOMMENDED_GREEN,
                StatusKind::Error => Color32::RED,
            };
            ui.label(RichText::new(&status.text).color(color));
        }
        None => {
            ui.label(RichText::new("Ready").weak());
        }
    }
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let supported: Vec<&str> = CSV_EXTENSIONS
        .iter()
        .chain(SPREADSHEET_EXTENSIONS.iter())
        .copied()
        .collect();
    let file = rfd::FileDialog::new()
        .set_title("Open table")
        .add_filter("Supported files", supported.as_slice())
        .add_filter("CSV", CSV_EXTENSIONS.as_slice())
        .add_filter("Spreadsheet", SPREADSHEET_EXTENSIONS.as_slice())
        .pick_file();

    if let Some(path) = file {
        state.begin_load(path);
    }
}

pub fn export_file_dialog(state: &mut AppState, flavor: ExportFlavor) {
    let Some(text) = state.prepare_export() else {
        return;
    };
    let file = rfd::FileDialog::new()
        .set_title(flavor.dialog_title())
        .set_file_name(state.suggested_export_name())
        .add_filter(flavor.filter_name(), &["csv"])
        .save_file();

    if let Some(path) = file {
        state.save_export(&path, &text);
    }
}
