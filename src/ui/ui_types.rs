use std::collections::HashMap;

use crate::{
    data_gateway::{DataGateway, ModelInfo},
    editor::{
        editor_types::Rectangle, geometry::GeometryStore, session::ImageRecord,
        session::ImageSession, view_transform::ViewTransform,
    },
    inference::{InferenceCommand, InferenceMessage},
    loader::{LoadCommand, LoadMessage},
    ui::canvas::ResizeHandle,
};

#[derive(serde::Serialize, serde::Deserialize, Default)]
pub struct App {
    #[serde(skip)]
    pub errors: Vec<String>,

    #[serde(skip)]
    pub notices: Vec<String>,

    #[serde(skip)]
    pub geometry: GeometryStore,

    #[serde(skip)]
    pub view: ViewTransform,

    #[serde(skip)]
    pub session: ImageSession,

    #[serde(skip)]
    pub drag: CanvasDrag,

    #[serde(skip)]
    pub is_panning: bool,

    #[serde(skip)]
    pub models: Vec<ModelInfo>,

    #[serde(skip)]
    pub selected_models: Vec<String>,

    #[serde(skip)]
    pub gateway: Option<DataGateway>,

    #[serde(skip)]
    pub random_images: Vec<ImageRecord>,

    #[serde(skip)]
    pub all_images: Vec<ImageRecord>,

    #[serde(skip)]
    pub image_grid_open: bool,

    #[serde(skip)]
    pub catalog_loaded: bool,

    /// Set once an image switch has been refused because of an unsaved
    /// result; the next click on the same image goes through.
    #[serde(skip)]
    pub pending_image_switch: Option<i64>,

    #[serde(skip)]
    pub workers_started: bool,

    #[serde(skip)]
    pub inference_tx: Option<tokio::sync::mpsc::Sender<InferenceCommand>>,

    #[serde(skip)]
    pub inbox: egui_inbox::UiInbox<InferenceMessage>,

    #[serde(skip)]
    pub loader_tx: Option<crossbeam_channel::Sender<LoadCommand>>,

    #[serde(skip)]
    pub loader_rx: Option<crossbeam_channel::Receiver<LoadMessage>>,

    #[serde(skip)]
    pub image_texture: Option<egui::TextureHandle>,

    #[serde(skip)]
    pub result_textures: HashMap<String, egui::TextureHandle>,

    #[serde(skip)]
    pub thumbnails: HashMap<i64, egui::TextureHandle>,

    #[serde(skip)]
    pub current_tab: Tab,

    pub options: crate::ui::options::Options,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum Tab {
    Annotate,
    Options,
}

impl Default for Tab {
    fn default() -> Self {
        Tab::Annotate
    }
}

/// Pointer gesture in progress on the canvas.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CanvasDrag {
    #[default]
    None,
    Drawing,
    Moving {
        id: String,
        grab_offset: egui::Vec2,
    },
    Resizing {
        id: String,
        handle: ResizeHandle,
        start: Rectangle,
    },
}
