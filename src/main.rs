#![allow(unused_imports)]
#![allow(dead_code)]
#![allow(unused_doc_comments)]

pub mod appconfig;
pub mod data_gateway;
pub mod editor;
pub mod inference;
pub mod loader;
pub mod logging;
pub mod ui;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

fn main() -> eframe::Result<()> {
    use ui::ui_types::App;

    logging::init_logs();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };
    eframe::run_native(
        "fracture_annotator",
        native_options,
        Box::new(|cc| Ok(Box::new(App::new(cc)))),
    )
}
