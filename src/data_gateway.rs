use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::editor::session::ImageRecord;

/// One row of the backend `models` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: i64,
    pub model_name: String,
    #[serde(default)]
    pub model_description: Option<String>,
}

/// Annotation payload to persist: the detection boxes as edited, plus the
/// user's evaluation of the model's result.
#[derive(Clone, Debug, Serialize)]
pub struct AnnotationRecord {
    pub image_id: i64,
    pub model_id: i64,
    pub anno_json: Value,
    pub rating: i32,
    pub comment: String,
    pub by_user_id: i64,
    pub created_at: String,
}

/// A previously saved annotation, as fetched back from the backend.
#[derive(Clone, Debug, Deserialize)]
pub struct StoredAnnotation {
    pub id: i64,
    pub image_id: i64,
    pub model_id: i64,
    pub anno_json: Value,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub comment: Option<String>,
    pub by_user_id: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Updated,
    Duplicate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SaveAction {
    Insert,
    Update(i64),
    SkipDuplicate,
}

/// Decides what a save should do against the records already stored for this
/// image + model + author: an identical payload is a no-op, a differing one
/// updates in place, otherwise insert.
fn plan_save(existing: &[StoredAnnotation], record: &AnnotationRecord) -> SaveAction {
    if existing
        .iter()
        .any(|prev| prev.anno_json == record.anno_json)
    {
        return SaveAction::SkipDuplicate;
    }
    match existing.first() {
        Some(prev) => SaveAction::Update(prev.id),
        None => SaveAction::Insert,
    }
}

/// Blocking client for the managed REST backend. All calls run on the UI
/// thread and are expected to be small and quick; image bytes go through the
/// loader thread instead.
pub struct DataGateway {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

/// requests
impl DataGateway {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        ensure!(!base_url.is_empty(), "backend URL not configured");
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn get(&self, path_and_query: &str) -> reqwest::blocking::RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, path_and_query);
        self.client
            .get(url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", &self.api_key))
    }

    pub fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let resp = self
            .get("models?select=id,model_name,model_description")
            .send()
            .context("fetching model list")?;
        if !resp.status().is_success() {
            bail!("model list request returned {}", resp.status());
        }
        let models: Vec<ModelInfo> = resp.json()?;
        debug!("fetched {} models", models.len());
        Ok(models)
    }

    /// Uniform random sample of `n` images. Ids are sampled client-side so
    /// the backend stays a plain REST table.
    pub fn fetch_random_images(&self, n: usize) -> Result<Vec<ImageRecord>> {
        #[derive(Deserialize)]
        struct IdRow {
            id: i64,
        }

        let resp = self.get("images?select=id").send().context("fetching image ids")?;
        if !resp.status().is_success() {
            bail!("image id request returned {}", resp.status());
        }
        let ids: Vec<IdRow> = resp.json()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut rng = rand::rng();
        let picked: Vec<String> = ids
            .choose_multiple(&mut rng, n.min(ids.len()))
            .map(|row| row.id.to_string())
            .collect();

        let query = format!(
            "images?select=id,gdrive_url,file_name,description,dataset_name&id=in.({})",
            picked.join(",")
        );
        let resp = self.get(&query).send().context("fetching sampled images")?;
        if !resp.status().is_success() {
            bail!("image sample request returned {}", resp.status());
        }
        Ok(resp.json()?)
    }

    pub fn fetch_all_images(&self) -> Result<Vec<ImageRecord>> {
        let resp = self
            .get("images?select=id,gdrive_url,file_name,description,dataset_name&order=id")
            .send()
            .context("fetching image catalog")?;
        if !resp.status().is_success() {
            bail!("image catalog request returned {}", resp.status());
        }
        Ok(resp.json()?)
    }

    fn fetch_annotations(
        &self,
        image_id: i64,
        model_id: i64,
        by_user_id: i64,
    ) -> Result<Vec<StoredAnnotation>> {
        let query = format!(
            "model_anno?select=id,image_id,model_id,anno_json,rating,comment,by_user_id\
             &image_id=eq.{image_id}&model_id=eq.{model_id}&by_user_id=eq.{by_user_id}"
        );
        let resp = self.get(&query).send().context("fetching annotations")?;
        if !resp.status().is_success() {
            bail!("annotation fetch returned {}", resp.status());
        }
        Ok(resp.json()?)
    }

    /// Saves an annotation record, deduplicating against what this author has
    /// already stored for the same image + model.
    pub fn save_annotation(&self, record: &AnnotationRecord) -> Result<SaveOutcome> {
        let existing =
            self.fetch_annotations(record.image_id, record.model_id, record.by_user_id)?;

        match plan_save(&existing, record) {
            SaveAction::SkipDuplicate => {
                info!(
                    image_id = record.image_id,
                    model_id = record.model_id,
                    "identical annotation already stored, skipping"
                );
                Ok(SaveOutcome::Duplicate)
            }
            SaveAction::Update(id) => {
                let url = format!("{}/rest/v1/model_anno?id=eq.{}", self.base_url, id);
                let resp = self
                    .client
                    .patch(url)
                    .header("apikey", &self.api_key)
                    .header("Authorization", format!("Bearer {}", &self.api_key))
                    .json(record)
                    .send()
                    .context("updating annotation")?;
                if !resp.status().is_success() {
                    bail!("annotation update returned {}", resp.status());
                }
                Ok(SaveOutcome::Updated)
            }
            SaveAction::Insert => {
                let url = format!("{}/rest/v1/model_anno", self.base_url);
                let resp = self
                    .client
                    .post(url)
                    .header("apikey", &self.api_key)
                    .header("Authorization", format!("Bearer {}", &self.api_key))
                    .json(record)
                    .send()
                    .context("inserting annotation")?;
                if !resp.status().is_success() {
                    bail!("annotation insert returned {}", resp.status());
                }
                Ok(SaveOutcome::Saved)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(anno: Value) -> AnnotationRecord {
        AnnotationRecord {
            image_id: 7,
            model_id: 3,
            anno_json: anno,
            rating: 4,
            comment: "clean detections".to_string(),
            by_user_id: 12,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn stored(id: i64, anno: Value) -> StoredAnnotation {
        StoredAnnotation {
            id,
            image_id: 7,
            model_id: 3,
            anno_json: anno,
            rating: Some(3),
            comment: None,
            by_user_id: 12,
        }
    }

    #[test]
    fn save_with_no_existing_records_inserts() {
        let rec = record(serde_json::json!({"detections": [1]}));
        assert_eq!(plan_save(&[], &rec), SaveAction::Insert);
    }

    #[test]
    fn identical_payload_is_skipped() {
        let anno = serde_json::json!({"detections": [{"x": 1.0}]});
        let rec = record(anno.clone());
        let existing = vec![stored(44, anno)];
        assert_eq!(plan_save(&existing, &rec), SaveAction::SkipDuplicate);
    }

    #[test]
    fn differing_payload_updates_in_place() {
        let rec = record(serde_json::json!({"detections": [{"x": 2.0}]}));
        let existing = vec![stored(44, serde_json::json!({"detections": [{"x": 1.0}]}))];
        assert_eq!(plan_save(&existing, &rec), SaveAction::Update(44));
    }

    #[test]
    fn any_identical_record_wins_over_update() {
        let anno = serde_json::json!({"detections": []});
        let rec = record(anno.clone());
        let existing = vec![
            stored(40, serde_json::json!({"detections": [{"x": 1.0}]})),
            stored(41, anno),
        ];
        assert_eq!(plan_save(&existing, &rec), SaveAction::SkipDuplicate);
    }
}
