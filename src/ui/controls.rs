use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use egui::{Color32, RichText};

use crate::{
    editor::{editor_types::Tool, session::ImageRecord, session::SessionPhase},
    ui::ui_types::App,
};

/// controls
impl App {
    pub fn controls(&mut self, ui: &mut egui::Ui) {
        /// tools
        ui.horizontal(|ui| {
            let button = egui::Button::new(RichText::new("Bounding Box").size(16.));
            let button = if self.geometry.tool == Tool::BoundingBox {
                button.fill(Color32::from_rgb(50, 158, 244))
            } else {
                button
            };
            if ui.add(button).clicked() {
                self.geometry.tool = if self.geometry.tool == Tool::BoundingBox {
                    Tool::Select
                } else {
                    Tool::BoundingBox
                };
            }

            if ui.button(RichText::new("Clear All").size(16.)).clicked() {
                self.geometry.clear_rectangles();
            }
        });
        ui.separator();

        self.model_select(ui);
        ui.separator();

        /// confidence threshold
        ui.horizontal(|ui| {
            ui.label("Confidence: ");
            let mut percent = self.options.confidence_threshold * 100.0;
            if ui
                .add(egui::Slider::new(&mut percent, 0.0..=100.0).suffix("%"))
                .changed()
            {
                self.options.confidence_threshold = percent / 100.0;
            }
        });
        ui.separator();

        let can_run = self.session.phase() == SessionPhase::Ready
            && !self.selected_models.is_empty();
        if ui
            .add_enabled(
                can_run,
                egui::Button::new(RichText::new("Run Inference").size(16.)),
            )
            .clicked()
        {
            self.run_inference();
        }
        ui.separator();

        self.image_picker(ui);
    }

    fn model_select(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Models");
            if ui.button("Refresh").clicked() {
                self.refresh_catalog();
            }
        });

        if self.models.is_empty() {
            ui.label("No models loaded");
            return;
        }

        let mut all = self.selected_models.len() == self.models.len();
        if ui.checkbox(&mut all, "Select all").changed() {
            self.selected_models = if all {
                self.models.iter().map(|m| m.model_name.clone()).collect()
            } else {
                Vec::new()
            };
        }

        let names: Vec<String> = self.models.iter().map(|m| m.model_name.clone()).collect();
        for name in names {
            let mut checked = self.selected_models.contains(&name);
            if ui.checkbox(&mut checked, &name).changed() {
                if checked {
                    self.selected_models.push(name);
                } else {
                    self.selected_models.retain(|n| n != &name);
                }
            }
        }
    }

    fn image_picker(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Images");
            if ui.button("Resample").clicked() {
                self.refresh_random_images();
            }
            if ui.button("View all").clicked() {
                self.image_grid_open = true;
            }
        });

        let records: Vec<ImageRecord> = self.random_images.clone();
        egui::Grid::new("random_images").num_columns(3).show(ui, |ui| {
            for (i, record) in records.iter().enumerate() {
                let clicked = match self.thumbnails.get(&record.id) {
                    Some(texture) => {
                        let size = egui::Vec2::new(96., 96.);
                        ui.add(
                            egui::ImageButton::new(egui::Image::from_texture((
                                texture.id(),
                                size,
                            ))),
                        )
                        .clicked()
                    }
                    None => ui.button(&record.file_name).clicked(),
                };
                if clicked {
                    self.select_image(record.clone());
                }
                if i % 3 == 2 {
                    ui.end_row();
                }
            }
        });
    }

    pub fn image_grid_window(&mut self, ctx: &egui::Context) {
        if !self.image_grid_open {
            return;
        }
        if self.all_images.is_empty() {
            match self.gateway.as_ref().map(|g| g.fetch_all_images()) {
                Some(Ok(images)) => self.all_images = images,
                Some(Err(e)) => {
                    self.errors.push(format!("Failed to fetch images: {e:#}"));
                    self.image_grid_open = false;
                    return;
                }
                None => {
                    self.errors.push("Backend not configured".to_string());
                    self.image_grid_open = false;
                    return;
                }
            }
        }

        let mut open = self.image_grid_open;
        let mut picked: Option<ImageRecord> = None;
        egui::Window::new("All Images")
            .open(&mut open)
            .default_size([500., 600.])
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for record in &self.all_images {
                        let label = match &record.dataset_name {
                            Some(ds) => format!("{} ({})", record.file_name, ds),
                            None => record.file_name.clone(),
                        };
                        if ui.button(label).clicked() {
                            picked = Some(record.clone());
                        }
                    }
                });
            });
        self.image_grid_open = open;

        if let Some(record) = picked {
            self.image_grid_open = false;
            self.select_image(record);
        }
    }
}
