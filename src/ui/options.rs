use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use crate::ui::ui_types::App;

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Options {
    pub inference_endpoint: String,
    pub backend_url: String,
    pub author_id: i64,
    pub author_email: String,
    pub confidence_threshold: f32,
    pub random_sample_size: usize,

    #[serde(skip)]
    pub backend_api_key: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            inference_endpoint: "https://api.ltlab.site".to_string(),
            backend_url: "".to_string(),
            author_id: 0,
            author_email: "".to_string(),
            confidence_threshold: 0.5,
            random_sample_size: 6,

            backend_api_key: "".to_string(),
        }
    }
}

impl App {
    pub fn options(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            self._options(ui);
        });
    }

    fn _options(&mut self, ui: &mut egui::Ui) {
        egui::widgets::global_theme_preference_buttons(ui);

        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Inference endpoint: ");
            ui.text_edit_singleline(&mut self.options.inference_endpoint);
        });

        ui.horizontal(|ui| {
            ui.label("Backend URL: ");
            ui.text_edit_singleline(&mut self.options.backend_url);
        });

        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Author email: ");
            ui.text_edit_singleline(&mut self.options.author_email);
        });

        ui.horizontal(|ui| {
            ui.label("Author id: ");
            ui.add(egui::DragValue::new(&mut self.options.author_id).range(0..=i64::MAX));
        });

        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Random sample size: ");
            ui.add(
                egui::DragValue::new(&mut self.options.random_sample_size)
                    .range(1..=24)
                    .speed(0.2),
            );
        });
    }
}
