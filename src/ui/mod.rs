pub mod canvas;
pub mod controls;
pub mod options;
pub mod result_panel;
pub mod ui_types;

use ui_types::*;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use crate::{
    data_gateway::{AnnotationRecord, DataGateway, SaveOutcome},
    editor::session::{Applied, ImageRecord},
    inference::{InferenceCommand, InferenceMessage, InferenceRequest},
    loader::{ImageSlot, LoadCommand, LoadMessage},
};

/// New
impl App {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut out: Self = if let Some(storage) = cc.storage {
            eframe::get_value(storage, eframe::APP_KEY).unwrap_or_default()
        } else {
            Default::default()
        };

        if let Err(e) = crate::appconfig::read_options_from_file("config.toml", &mut out.options) {
            error!("Failed to read options from file: {}", e);
        }

        if !out.options.backend_url.is_empty() {
            match DataGateway::new(&out.options.backend_url, &out.options.backend_api_key) {
                Ok(gateway) => out.gateway = Some(gateway),
                Err(e) => out.errors.push(format!("Backend setup failed: {e:#}")),
            }
        }

        out
    }
}

/// workers
impl App {
    fn start_workers(&mut self, ctx: &egui::Context) {
        if self.workers_started {
            return;
        }
        self.workers_started = true;

        debug!("starting inference thread");
        match url::Url::parse(&self.options.inference_endpoint) {
            Ok(url) => {
                let (tx, rx) = tokio::sync::mpsc::channel(4);
                crate::inference::spawn_inference_thread(url, self.inbox.sender(), rx);
                self.inference_tx = Some(tx);
            }
            Err(e) => {
                self.errors
                    .push(format!("Invalid inference endpoint: {e}"));
            }
        }

        debug!("starting image loader thread");
        let (tx_cmd, rx_cmd) = crossbeam_channel::unbounded();
        let (tx_msg, rx_msg) = crossbeam_channel::unbounded();
        crate::loader::spawn_loader_thread(ctx.clone(), rx_cmd, tx_msg);
        self.loader_tx = Some(tx_cmd);
        self.loader_rx = Some(rx_msg);
    }

    fn drain_messages(&mut self, ctx: &egui::Context) {
        self.inbox.set_ctx(ctx);
        while let Some(msg) = self.inbox.read_without_ctx().next() {
            match msg {
                InferenceMessage::Completed { image_id, results } => {
                    let n_models = results.len();
                    match self
                        .session
                        .apply_inference(image_id, results, &mut self.geometry)
                    {
                        Applied::Applied => {
                            info!(image_id, n_models, "inference results applied");
                            self.queue_result_images();
                        }
                        Applied::Stale => {}
                    }
                }
                InferenceMessage::Failed { image_id, error } => {
                    if self.session.fail_inference(image_id) == Applied::Applied {
                        self.errors.push(format!("Inference failed: {error}"));
                    }
                }
            }
        }

        let Some(rx) = self.loader_rx.clone() else {
            return;
        };
        while let Ok(msg) = rx.try_recv() {
            match msg {
                LoadMessage::Loaded { slot, image } => self.apply_loaded_image(ctx, slot, image),
                LoadMessage::Failed { slot, error } => {
                    if let ImageSlot::Selected { image_id } = slot {
                        if self.session.image_id() == Some(image_id) {
                            self.errors.push(format!("Image load failed: {error}"));
                        }
                    } else {
                        warn!("background image load failed: {error}");
                    }
                }
            }
        }
    }

    fn apply_loaded_image(
        &mut self,
        ctx: &egui::Context,
        slot: ImageSlot,
        image: egui::ColorImage,
    ) {
        match slot {
            ImageSlot::Selected { image_id } => {
                if self.session.image_id() != Some(image_id) {
                    return;
                }
                let size = image.size;
                let texture = ctx.load_texture("selected_image", image, Default::default());
                self.image_texture = Some(texture);
                self.session.image_loaded(size);
            }
            ImageSlot::ModelResult {
                image_id,
                model_name,
            } => {
                if self.session.image_id() == Some(image_id) {
                    let texture =
                        ctx.load_texture(format!("result_{model_name}"), image, Default::default());
                    self.result_textures.insert(model_name, texture);
                }
            }
            ImageSlot::Thumbnail { image_id } => {
                let texture =
                    ctx.load_texture(format!("thumb_{image_id}"), image, Default::default());
                self.thumbnails.insert(image_id, texture);
            }
        }
    }

    fn queue_load(&mut self, slot: ImageSlot, url: String) {
        if let Some(tx) = self.loader_tx.as_ref() {
            if tx.send(LoadCommand::LoadImage { slot, url }).is_err() {
                self.errors.push("Image loader is not running".to_string());
            }
        }
    }

    fn queue_result_images(&mut self) {
        let Some(image_id) = self.session.image_id() else {
            return;
        };
        let pending: Vec<(String, String)> = self
            .session
            .results
            .iter()
            .filter_map(|run| {
                run.result_image
                    .as_ref()
                    .map(|url| (run.model_name.clone(), url.clone()))
            })
            .collect();
        for (model_name, url) in pending {
            self.queue_load(
                ImageSlot::ModelResult {
                    image_id,
                    model_name,
                },
                url,
            );
        }
    }
}

/// actions
impl App {
    pub fn select_image(&mut self, record: ImageRecord) {
        // An unsaved result blocks the first switch attempt; clicking the
        // same image again goes through.
        if self.session.has_inference_run
            && !self.session.result_saved
            && self.pending_image_switch != Some(record.id)
        {
            self.pending_image_switch = Some(record.id);
            self.notices.push(
                "Current result is not saved. Click the image again to discard it.".to_string(),
            );
            return;
        }
        self.pending_image_switch = None;

        let url = record.url.clone();
        let image_id = record.id;
        self.session.select_image(record, &mut self.geometry);
        self.view = Default::default();
        self.image_texture = None;
        self.result_textures.clear();
        self.queue_load(ImageSlot::Selected { image_id }, url);
    }

    pub fn run_inference(&mut self) {
        let Some(image) = self.session.image().cloned() else {
            self.errors.push("No image selected".to_string());
            return;
        };
        if self.selected_models.is_empty() {
            self.errors.push("No models selected".to_string());
            return;
        }
        let Some(tx) = self.inference_tx.as_ref() else {
            self.errors
                .push("Inference endpoint not configured".to_string());
            return;
        };

        let request = InferenceRequest {
            model_names: self.selected_models.clone(),
            image_url: image.url.clone(),
            confidence_threshold: self.options.confidence_threshold,
        };
        let cmd = InferenceCommand::RunInference {
            image_id: image.id,
            request,
        };
        if let Err(e) = tx.try_send(cmd) {
            self.errors.push(format!("Failed to queue inference: {e}"));
            return;
        }
        self.session.begin_inference();
    }

    pub fn save_result(&mut self) {
        let Some(image_id) = self.session.image_id() else {
            return;
        };
        let Some(run) = self.session.selected_run() else {
            return;
        };
        let model_name = run.model_name.clone();
        let (rating, comment) = (run.rating, run.comment.clone());

        let Some(model) = self.models.iter().find(|m| m.model_name == model_name) else {
            self.errors
                .push(format!("Unknown model: {model_name}"));
            return;
        };
        let Some(gateway) = self.gateway.as_ref() else {
            self.errors.push("Backend not configured".to_string());
            return;
        };

        let record = AnnotationRecord {
            image_id,
            model_id: model.id,
            anno_json: serde_json::json!({
                "detections": self.geometry.detections(),
                "rectangles": self.geometry.rectangles(),
            }),
            rating: rating as i32,
            comment,
            by_user_id: self.options.author_id,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        match gateway.save_annotation(&record) {
            Ok(SaveOutcome::Saved) => {
                self.notices.push(format!("Saved result for {model_name}"));
                self.session.mark_saved(&model_name);
            }
            Ok(SaveOutcome::Updated) => {
                self.notices
                    .push(format!("Updated existing result for {model_name}"));
                self.session.mark_saved(&model_name);
            }
            Ok(SaveOutcome::Duplicate) => {
                self.notices.push(format!(
                    "Identical result for {model_name} already saved"
                ));
                self.session.mark_saved(&model_name);
            }
            Err(e) => {
                self.errors.push(format!("Save failed: {e:#}"));
            }
        }
    }

    pub fn refresh_catalog(&mut self) {
        let Some(gateway) = self.gateway.as_ref() else {
            self.errors.push("Backend not configured".to_string());
            return;
        };
        match gateway.fetch_models() {
            Ok(models) => self.models = models,
            Err(e) => self.errors.push(format!("Failed to fetch models: {e:#}")),
        }
        self.refresh_random_images();
    }

    pub fn refresh_random_images(&mut self) {
        let n = self.options.random_sample_size;
        let images = match self.gateway.as_ref() {
            Some(gateway) => gateway.fetch_random_images(n),
            None => {
                self.errors.push("Backend not configured".to_string());
                return;
            }
        };
        match images {
            Ok(images) => {
                for record in &images {
                    if !self.thumbnails.contains_key(&record.id) {
                        let (id, url) = (record.id, record.url.clone());
                        self.queue_load(ImageSlot::Thumbnail { image_id: id }, url);
                    }
                }
                self.random_images = images;
            }
            Err(e) => self.errors.push(format!("Failed to fetch images: {e:#}")),
        }
    }

    fn handle_delete_key(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        if !ctx.input(|i| i.key_pressed(egui::Key::Delete)) {
            return;
        }
        // A non-empty checked set takes precedence over the selection.
        if !self.geometry.checked().is_empty() {
            let n = self.geometry.delete_checked();
            self.notices.push(format!("Deleted {n} detection(s)"));
        } else {
            self.geometry.delete_selected();
        }
    }
}

impl eframe::App for App {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, self);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        self.start_workers(ctx);
        self.drain_messages(ctx);

        if !self.catalog_loaded && self.gateway.is_some() {
            self.catalog_loaded = true;
            self.refresh_catalog();
        }

        self.handle_delete_key(ctx);

        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.current_tab, Tab::Annotate, "Annotate");
                ui.selectable_value(&mut self.current_tab, Tab::Options, "Options");
            });
        });

        match self.current_tab {
            Tab::Annotate => {
                egui::SidePanel::left("controls")
                    .resizable(false)
                    .default_width(340.)
                    .show(ctx, |ui| {
                        egui::ScrollArea::vertical().show(ui, |ui| {
                            self.controls(ui);
                        });
                    });

                egui::SidePanel::right("results")
                    .resizable(false)
                    .default_width(400.)
                    .show(ctx, |ui| {
                        egui::ScrollArea::vertical().show(ui, |ui| {
                            self.result_panel(ui);
                        });
                    });

                egui::CentralPanel::default().show(ctx, |ui| {
                    self.canvas(ui);
                });

                self.image_grid_window(ctx);
            }
            Tab::Options => {
                self.options(ctx);
            }
        }
    }
}
