use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use serde::{Deserialize, Serialize};

use crate::inference::ModelRun;

use super::geometry::GeometryStore;

/// Lifecycle of the currently selected image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    ImageLoading,
    Ready,
    InferenceRunning,
}

/// One row of the backend `images` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: i64,
    #[serde(rename = "gdrive_url")]
    pub url: String,
    pub file_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dataset_name: Option<String>,
}

/// Outcome of applying an inference completion to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// The response was for a different image than the one currently open.
    Stale,
}

/// Per-image session state: which image is open, where it is in its
/// lifecycle, and the results of the most recent inference run.
///
/// Every inference request carries the image id it was issued for; a
/// completion whose id no longer matches the open image is dropped untouched.
#[derive(Default)]
pub struct ImageSession {
    phase: SessionPhase,
    image: Option<ImageRecord>,
    image_size: Option<[usize; 2]>,
    pub results: Vec<ModelRun>,
    pub selected_result: Option<String>,
    pub has_inference_run: bool,
    pub result_saved: bool,
}

impl ImageSession {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn image(&self) -> Option<&ImageRecord> {
        self.image.as_ref()
    }

    pub fn image_id(&self) -> Option<i64> {
        self.image.as_ref().map(|img| img.id)
    }

    /// Native pixel size of the open image, once decoded.
    pub fn image_size(&self) -> Option<[usize; 2]> {
        self.image_size
    }

    /// Opens a new image: everything about the previous one (geometry,
    /// results, saved flags) is discarded and loading begins.
    pub fn select_image(&mut self, image: ImageRecord, geometry: &mut GeometryStore) {
        info!("opening image {} ({})", image.id, image.file_name);
        self.image = Some(image);
        self.image_size = None;
        self.phase = SessionPhase::ImageLoading;
        self.results.clear();
        self.selected_result = None;
        self.has_inference_run = false;
        self.result_saved = false;
        geometry.reset();
    }

    pub fn image_loaded(&mut self, size: [usize; 2]) {
        if self.phase == SessionPhase::ImageLoading {
            self.image_size = Some(size);
            self.phase = SessionPhase::Ready;
        }
    }

    pub fn begin_inference(&mut self) {
        if self.phase == SessionPhase::Ready {
            self.phase = SessionPhase::InferenceRunning;
        }
    }

    /// Applies a completed inference run, unless it is stale. The first
    /// successful model's detections become the visible set.
    pub fn apply_inference(
        &mut self,
        image_id: i64,
        results: Vec<ModelRun>,
        geometry: &mut GeometryStore,
    ) -> Applied {
        if self.image_id() != Some(image_id) {
            debug!(
                image_id,
                current = ?self.image_id(),
                "dropping stale inference response"
            );
            return Applied::Stale;
        }
        self.phase = SessionPhase::Ready;
        self.has_inference_run = true;
        self.result_saved = false;
        self.selected_result = results
            .iter()
            .find(|run| run.is_ok())
            .or(results.first())
            .map(|run| run.model_name.clone());
        self.results = results;
        let boxes = self
            .selected_result
            .as_deref()
            .and_then(|name| self.results.iter().find(|run| run.model_name == name))
            .map(|run| run.detections.clone())
            .unwrap_or_default();
        geometry.replace_detections(boxes);
        Applied::Applied
    }

    /// Switches the visible result tab, swapping in that model's detections.
    pub fn set_selected_result(&mut self, model_name: &str, geometry: &mut GeometryStore) {
        let Some(run) = self.results.iter().find(|run| run.model_name == model_name) else {
            return;
        };
        let boxes = run.detections.clone();
        self.selected_result = Some(model_name.to_string());
        geometry.replace_detections(boxes);
    }

    pub fn selected_run(&self) -> Option<&ModelRun> {
        self.selected_result
            .as_deref()
            .and_then(|name| self.results.iter().find(|run| run.model_name == name))
    }

    pub fn selected_run_mut(&mut self) -> Option<&mut ModelRun> {
        let name = self.selected_result.clone()?;
        self.results.iter_mut().find(|run| run.model_name == name)
    }

    /// A whole-request failure (transport, non-2xx, bad body). Stale
    /// failures are dropped like stale completions.
    pub fn fail_inference(&mut self, image_id: i64) -> Applied {
        if self.image_id() != Some(image_id) {
            return Applied::Stale;
        }
        if self.phase == SessionPhase::InferenceRunning {
            self.phase = SessionPhase::Ready;
        }
        Applied::Applied
    }

    pub fn mark_saved(&mut self, model_name: &str) {
        if let Some(run) = self.results.iter_mut().find(|r| r.model_name == model_name) {
            run.saved = true;
        }
        self.result_saved = true;
    }
}

#[cfg(test)]
mod tests {
    use crate::editor::editor_types::DetectionBox;

    use super::*;

    fn record(id: i64) -> ImageRecord {
        ImageRecord {
            id,
            url: format!("https://example.com/img{id}.jpg"),
            file_name: format!("img{id}.jpg"),
            description: None,
            dataset_name: None,
        }
    }

    fn run_with_boxes(model: &str, n: usize) -> ModelRun {
        ModelRun {
            model_name: model.to_string(),
            detections: (0..n)
                .map(|i| DetectionBox {
                    id: format!("inference_{i}"),
                    x: 0.0,
                    y: 0.0,
                    width: 30.0,
                    height: 30.0,
                    class: "fracture".to_string(),
                    confidence: 0.9,
                })
                .collect(),
            result_image: None,
            error: None,
            rating: 0,
            comment: String::new(),
            saved: false,
        }
    }

    #[test]
    fn lifecycle_reaches_ready_after_load() {
        let mut session = ImageSession::default();
        let mut geometry = GeometryStore::default();
        assert_eq!(session.phase(), SessionPhase::Idle);

        session.select_image(record(1), &mut geometry);
        assert_eq!(session.phase(), SessionPhase::ImageLoading);

        session.image_loaded([640, 480]);
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(session.image_size(), Some([640, 480]));
    }

    #[test]
    fn stale_response_for_previous_image_is_dropped() {
        // Run inference on image 1, switch to image 2 before it completes,
        // then deliver both responses out of order.
        let mut session = ImageSession::default();
        let mut geometry = GeometryStore::default();

        session.select_image(record(1), &mut geometry);
        session.image_loaded([640, 480]);
        session.begin_inference();

        session.select_image(record(2), &mut geometry);
        session.image_loaded([640, 480]);
        session.begin_inference();

        let applied = session.apply_inference(2, vec![run_with_boxes("b", 2)], &mut geometry);
        assert_eq!(applied, Applied::Applied);
        assert_eq!(geometry.detections().len(), 2);

        let applied = session.apply_inference(1, vec![run_with_boxes("a", 5)], &mut geometry);
        assert_eq!(applied, Applied::Stale);
        assert_eq!(geometry.detections().len(), 2);
        assert_eq!(session.selected_result.as_deref(), Some("b"));
    }

    #[test]
    fn switching_image_clears_results_and_geometry() {
        let mut session = ImageSession::default();
        let mut geometry = GeometryStore::default();

        session.select_image(record(1), &mut geometry);
        session.image_loaded([640, 480]);
        session.begin_inference();
        session.apply_inference(1, vec![run_with_boxes("a", 3)], &mut geometry);
        assert!(session.has_inference_run);

        session.select_image(record(2), &mut geometry);
        assert!(session.results.is_empty());
        assert!(!session.has_inference_run);
        assert!(geometry.detections().is_empty());
    }

    #[test]
    fn selecting_result_tab_swaps_detections() {
        let mut session = ImageSession::default();
        let mut geometry = GeometryStore::default();

        session.select_image(record(1), &mut geometry);
        session.image_loaded([640, 480]);
        session.begin_inference();
        session.apply_inference(
            1,
            vec![run_with_boxes("a", 1), run_with_boxes("b", 4)],
            &mut geometry,
        );
        assert_eq!(session.selected_result.as_deref(), Some("a"));
        assert_eq!(geometry.detections().len(), 1);

        session.set_selected_result("b", &mut geometry);
        assert_eq!(geometry.detections().len(), 4);
    }

    #[test]
    fn first_ok_model_is_preselected_over_failed() {
        let mut session = ImageSession::default();
        let mut geometry = GeometryStore::default();
        let mut failed = run_with_boxes("a", 0);
        failed.error = Some("model crashed".to_string());

        session.select_image(record(1), &mut geometry);
        session.image_loaded([640, 480]);
        session.begin_inference();
        session.apply_inference(1, vec![failed, run_with_boxes("b", 2)], &mut geometry);
        assert_eq!(session.selected_result.as_deref(), Some("b"));
    }
}
