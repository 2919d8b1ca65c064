use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::state::AppState;

const ROW_HEIGHT: f32 = 20.0;
const COLUMN_WIDTH: f32 = 140.0;

// ---------------------------------------------------------------------------
// Data table (central panel)
// ---------------------------------------------------------------------------

/// Render the visible rows across every column. Only on-screen rows are laid
/// out, so large tables stay responsive.
pub fn data_table(ui: &mut Ui, state: &AppState) {
    if state.dataset.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            if state.loading {
                ui.spinner();
            } else {
                ui.heading("Open a CSV or spreadsheet to get started  (File → Open…)");
            }
        });
        return;
    }

    if state.visible_count() == 0 {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No rows match the current filter");
        });
        return;
    }

    let columns = state.dataset.columns();

    ScrollArea::horizontal()
        .id_salt("data_table_hscroll")
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            let max_h = ui.available_height();
            TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
                .min_scrolled_height(0.0)
                .max_scroll_height(max_h)
                .column(Column::auto().at_least(40.0))
                .columns(
                    Column::initial(COLUMN_WIDTH).at_least(40.0).clip(true),
                    columns.len(),
                )
                .header(ROW_HEIGHT + 2.0, |mut header| {
                    header.col(|ui| {
                        ui.strong("#");
                    });
                    for name in columns {
                        header.col(|ui| {
                            let mut text = RichText::new(name).strong();
                            if state.dataset.is_selected(name) {
                                text = text.color(Color32::from_rgb(76, 175, 80));
                            }
                            if state.dataset.is_derived(name) {
                                text = text.italics();
                            }
                            ui.label(text);
                        });
                    }
                })
                .body(|body| {
                    body.rows(ROW_HEIGHT, state.visible_count(), |mut row| {
                        let n = row.index();
                        let Some(record) = state.visible_row(n) else {
                            return;
                        };
                        row.col(|ui| {
                            ui.label(RichText::new((n + 1).to_string()).weak());
                        });
                        for name in columns {
                            row.col(|ui| {
                                let cell = record.get(name).map(String::as_str).unwrap_or("");
                                ui.label(cell);
                            });
                        }
                    });
                });
        });
}
