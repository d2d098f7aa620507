use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use egui_inbox::UiInboxSender;
use url::Url;

pub mod inference_types;

pub use self::inference_types::*;

/// Async side of the inference gateway. Lives on its own worker thread;
/// receives commands from the UI over an mpsc channel and reports back
/// through an inbox.
pub struct InferenceConn {
    endpoint: Url,
    client: reqwest::Client,
    inbox: UiInboxSender<InferenceMessage>,
    channel_from_ui: tokio::sync::mpsc::Receiver<InferenceCommand>,
}

/// command loop
impl InferenceConn {
    pub fn new(
        endpoint: Url,
        inbox: UiInboxSender<InferenceMessage>,
        channel_from_ui: tokio::sync::mpsc::Receiver<InferenceCommand>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self {
            endpoint,
            client,
            inbox,
            channel_from_ui,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        while let Some(cmd) = self.channel_from_ui.recv().await {
            self.handle_command(cmd).await?;
        }
        debug!("inference command channel closed");
        Ok(())
    }

    async fn handle_command(&mut self, cmd: InferenceCommand) -> Result<()> {
        match cmd {
            InferenceCommand::RunInference { image_id, request } => {
                info!(
                    image_id,
                    models = ?request.model_names,
                    "running inference"
                );
                let msg = match self.run_inference(&request).await {
                    Ok(results) => InferenceMessage::Completed { image_id, results },
                    Err(e) => {
                        error!("inference request failed: {e:?}");
                        InferenceMessage::Failed {
                            image_id,
                            error: format!("{e:#}"),
                        }
                    }
                };
                self.inbox
                    .send(msg)
                    .map_err(|_| anyhow!("UI inbox closed"))?;
            }
        }
        Ok(())
    }

    async fn run_inference(&self, request: &InferenceRequest) -> Result<Vec<ModelRun>> {
        let url = self.endpoint.join("run_inference")?;
        let resp = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .context("sending inference request")?;
        if !resp.status().is_success() {
            bail!("inference endpoint returned {}", resp.status());
        }
        let body: InferenceResponse = resp
            .json()
            .await
            .context("parsing inference response")?;
        Ok(body
            .model_results
            .into_iter()
            .map(ModelRun::from_result)
            .collect())
    }
}

/// Spawns the worker thread hosting the tokio runtime for the inference
/// gateway.
pub fn spawn_inference_thread(
    endpoint: Url,
    inbox: UiInboxSender<InferenceMessage>,
    rx: tokio::sync::mpsc::Receiver<InferenceCommand>,
) {
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async move {
            let mut conn = match InferenceConn::new(endpoint, inbox, rx) {
                Ok(conn) => conn,
                Err(e) => {
                    error!("failed to build inference client: {e:?}");
                    return;
                }
            };
            if let Err(e) = conn.run().await {
                error!("inference worker exited: {e:?}");
            }
        });
    });
}
