use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use crossbeam_channel::{Receiver, Sender};

/// Where a fetched image belongs once decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSlot {
    /// The image open on the canvas.
    Selected { image_id: i64 },
    /// A model's rendered result image.
    ModelResult { image_id: i64, model_name: String },
    /// A catalog thumbnail.
    Thumbnail { image_id: i64 },
}

#[derive(Clone, Debug)]
pub enum LoadCommand {
    LoadImage { slot: ImageSlot, url: String },
}

pub enum LoadMessage {
    Loaded {
        slot: ImageSlot,
        image: egui::ColorImage,
    },
    Failed {
        slot: ImageSlot,
        error: String,
    },
}

fn fetch_image(client: &reqwest::blocking::Client, url: &str) -> Result<egui::ColorImage> {
    let resp = client.get(url).send().context("fetching image")?;
    if !resp.status().is_success() {
        bail!("image request returned {}", resp.status());
    }
    let bytes = resp.bytes()?;
    let decoded = image::load_from_memory(&bytes).context("decoding image")?;
    let rgba = decoded.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(
        size,
        rgba.as_flat_samples().as_slice(),
    ))
}

/// Spawns the image-loader thread. Fetch + decode happen off the UI thread;
/// each completion pokes the UI awake with a repaint request.
pub fn spawn_loader_thread(
    ctx: egui::Context,
    rx: Receiver<LoadCommand>,
    tx: Sender<LoadMessage>,
) {
    std::thread::spawn(move || {
        let client = match reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                error!("failed to build image loader client: {e:?}");
                return;
            }
        };

        loop {
            let cmd = match rx.recv() {
                Ok(cmd) => cmd,
                Err(_) => {
                    debug!("loader channel closed");
                    break;
                }
            };
            match cmd {
                LoadCommand::LoadImage { slot, url } => {
                    trace!(?slot, url, "loading image");
                    let msg = match fetch_image(&client, &url) {
                        Ok(image) => LoadMessage::Loaded { slot, image },
                        Err(e) => {
                            warn!("image load failed: {e:?}");
                            LoadMessage::Failed {
                                slot,
                                error: format!("{e:#}"),
                            }
                        }
                    };
                    if tx.send(msg).is_err() {
                        break;
                    }
                    ctx.request_repaint();
                }
            }
        }
    });
}
