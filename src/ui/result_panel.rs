use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use egui::{Color32, RichText};
use egui_extras::{Column, TableBuilder};

use crate::{
    editor::{editor_types::DetectionBox, session::SessionPhase},
    ui::ui_types::App,
};

pub fn format_confidence(confidence: f32) -> String {
    format!("({:.2}%)", confidence * 100.0)
}

pub fn format_corners(b: &DetectionBox) -> String {
    let [x1, y1, x2, y2] = b.corners();
    format!("[{x1:.2}, {y1:.2}, {x2:.2}, {y2:.2}]")
}

/// Natural-language summary of a detection set, grouped by class in first
/// appearance order: "The image contains 2 fractures (87%, 65% confidence)".
pub fn format_detection_summary(boxes: &[DetectionBox]) -> String {
    if boxes.is_empty() {
        return "No detection found".to_string();
    }

    let mut groups: Vec<(String, Vec<f32>)> = Vec::new();
    for b in boxes {
        match groups.iter_mut().find(|(class, _)| class == &b.class) {
            Some((_, confs)) => confs.push(b.confidence),
            None => groups.push((b.class.clone(), vec![b.confidence])),
        }
    }

    let parts: Vec<String> = groups
        .iter()
        .map(|(class, confs)| {
            let pcts: Vec<String> = confs
                .iter()
                .map(|c| format!("{:.0}%", c * 100.0))
                .collect();
            let plural = if confs.len() == 1 { "" } else { "s" };
            format!(
                "{} {}{} ({} confidence)",
                confs.len(),
                class,
                plural,
                pcts.join(", ")
            )
        })
        .collect();

    let joined = match parts.len() {
        1 => parts[0].clone(),
        2 => format!("{} and {}", parts[0], parts[1]),
        _ => format!(
            "{} and {}",
            parts[..parts.len() - 1].join(", "),
            parts[parts.len() - 1]
        ),
    };
    format!("The image contains {joined}")
}

/// result panel
impl App {
    pub fn result_panel(&mut self, ui: &mut egui::Ui) {
        self.errors_section(ui);
        self.notices_section(ui);

        if self.session.phase() == SessionPhase::InferenceRunning {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Running inference...");
            });
            return;
        }
        if self.session.results.is_empty() {
            return;
        }

        ui.heading("Results");

        // Model tabs.
        let model_names: Vec<String> = self
            .session
            .results
            .iter()
            .map(|run| run.model_name.clone())
            .collect();
        ui.horizontal_wrapped(|ui| {
            let mut selected = self.session.selected_result.clone();
            for name in &model_names {
                let label = match self.session.results.iter().find(|r| r.model_name == *name) {
                    Some(run) if run.saved => format!("{name} ✔"),
                    _ => name.clone(),
                };
                ui.selectable_value(&mut selected, Some(name.clone()), label);
            }
            if selected != self.session.selected_result {
                if let Some(name) = &selected {
                    self.session.set_selected_result(name, &mut self.geometry);
                }
            }
        });
        ui.separator();

        let Some(run) = self.session.selected_run() else {
            return;
        };

        if let Some(error) = &run.error {
            ui.label(
                RichText::new(format!("Model failed: {error}"))
                    .color(Color32::from_rgb(255, 100, 100)),
            );
            return;
        }

        let summary = format_detection_summary(self.geometry.detections());
        ui.label(&summary);
        if ui.button("Copy Result").clicked() {
            let mut text = summary.clone();
            for b in self.geometry.detections() {
                text.push_str(&format!(
                    "\n{} {} {}",
                    b.class,
                    format_confidence(b.confidence),
                    format_corners(b)
                ));
            }
            ui.ctx().copy_text(text);
        }
        ui.separator();

        self.detection_table(ui);

        let any_checked = !self.geometry.checked().is_empty();
        if ui
            .add_enabled(any_checked, egui::Button::new("Delete Selected"))
            .clicked()
        {
            let n = self.geometry.delete_checked();
            self.notices.push(format!("Deleted {n} detection(s)"));
        }
        ui.separator();

        self.rating_section(ui);
    }

    fn detection_table(&mut self, ui: &mut egui::Ui) {
        let entries: Vec<(String, String, f32, String, bool)> = self
            .geometry
            .detections()
            .iter()
            .map(|b| {
                (
                    b.id.clone(),
                    b.class.clone(),
                    b.confidence,
                    format_corners(b),
                    self.geometry.checked().contains(&b.id),
                )
            })
            .collect();

        TableBuilder::new(ui)
            .striped(true)
            .column(Column::exact(24.))
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::remainder())
            .header(20., |mut header| {
                header.col(|_| {});
                header.col(|ui| {
                    ui.strong("Class");
                });
                header.col(|ui| {
                    ui.strong("Confidence");
                });
                header.col(|ui| {
                    ui.strong("Box");
                });
            })
            .body(|mut body| {
                for (id, class, confidence, corners, was_checked) in entries {
                    body.row(18., |mut row| {
                        row.col(|ui| {
                            let mut checked = was_checked;
                            if ui.checkbox(&mut checked, "").changed() {
                                self.geometry.set_checked(&id, checked);
                            }
                        });
                        row.col(|ui| {
                            ui.label(class);
                        });
                        row.col(|ui| {
                            ui.label(format_confidence(confidence));
                        });
                        row.col(|ui| {
                            ui.label(corners);
                        });
                    });
                }
            });
    }

    fn rating_section(&mut self, ui: &mut egui::Ui) {
        let Some(run) = self.session.selected_run_mut() else {
            return;
        };

        ui.horizontal(|ui| {
            ui.label("Rating:");
            for star in 1..=5u8 {
                let symbol = if run.rating >= star { "★" } else { "☆" };
                if ui.button(symbol).clicked() {
                    run.rating = star;
                }
            }
        });
        ui.label("Comment:");
        ui.text_edit_multiline(&mut run.comment);

        let saved = run.saved;
        if ui
            .add_enabled(!saved, egui::Button::new("Save Result"))
            .clicked()
        {
            self.save_result();
        }
    }

    fn errors_section(&mut self, ui: &mut egui::Ui) {
        if self.errors.is_empty() {
            return;
        }
        ui.heading("Errors");
        ui.horizontal(|ui| {
            if ui.button("Clear All").clicked() {
                self.errors.clear();
            }

            let error_count = self.errors.len();
            ui.label(format!(
                "({} error{})",
                error_count,
                if error_count == 1 { "" } else { "s" }
            ));
        });

        egui::ScrollArea::vertical()
            .max_height(200.0)
            .show(ui, |ui| {
                // Newest first.
                for error in self.errors.iter().rev() {
                    ui.label(RichText::new(error).color(Color32::from_rgb(255, 100, 100)));
                    ui.separator();
                }
            });

        ui.separator();
    }

    fn notices_section(&mut self, ui: &mut egui::Ui) {
        if self.notices.is_empty() {
            return;
        }
        ui.horizontal(|ui| {
            if ui.button("Dismiss").clicked() {
                self.notices.clear();
            }
            ui.label("Notices");
        });
        for notice in self.notices.iter().rev() {
            ui.label(RichText::new(notice).color(Color32::from_rgb(120, 200, 120)));
        }
        ui.separator();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(class: &str, confidence: f32) -> DetectionBox {
        DetectionBox {
            id: "inference_0".to_string(),
            x: 10.0,
            y: 20.0,
            width: 50.0,
            height: 70.0,
            class: class.to_string(),
            confidence,
        }
    }

    #[test]
    fn confidence_shows_two_decimals_of_percent() {
        assert_eq!(format_confidence(0.87), "(87.00%)");
        assert_eq!(format_confidence(0.6549), "(65.49%)");
    }

    #[test]
    fn corners_show_xyxy_at_two_decimals() {
        assert_eq!(format_corners(&b("fracture", 0.87)), "[10.00, 20.00, 60.00, 90.00]");
    }

    #[test]
    fn empty_summary_reports_no_detection() {
        assert_eq!(format_detection_summary(&[]), "No detection found");
    }

    #[test]
    fn summary_groups_by_class_with_counts() {
        let boxes = vec![b("fracture", 0.87), b("fracture", 0.65)];
        assert_eq!(
            format_detection_summary(&boxes),
            "The image contains 2 fractures (87%, 65% confidence)"
        );
    }

    #[test]
    fn summary_singular_has_no_plural_s() {
        let boxes = vec![b("fracture", 0.9)];
        assert_eq!(
            format_detection_summary(&boxes),
            "The image contains 1 fracture (90% confidence)"
        );
    }

    #[test]
    fn summary_joins_classes_in_first_appearance_order() {
        let boxes = vec![b("fracture", 0.8), b("lesion", 0.7), b("fracture", 0.6)];
        assert_eq!(
            format_detection_summary(&boxes),
            "The image contains 2 fractures (80%, 60% confidence) and 1 lesion (70% confidence)"
        );
    }
}
