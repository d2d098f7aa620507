use serde::{Deserialize, Serialize};

use crate::editor::editor_types::DetectionBox;

/// Request body for `POST /run_inference`. Field names follow the endpoint's
/// mixed-case contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub model_names: Vec<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "confidenceThreshold")]
    pub confidence_threshold: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InferenceResponse {
    #[serde(rename = "modelResults")]
    pub model_results: Vec<ModelResult>,
}

/// One model's slice of the response. A model can fail individually; the
/// request as a whole still succeeds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelResult {
    pub model_name: String,
    #[serde(rename = "resultImage", default)]
    pub result_image: Option<String>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Wire form of one detection: corner coordinates in original-image space.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Detection {
    pub bbox_xyxy: [f32; 4],
    pub class: String,
    pub confidence: f32,
}

impl Detection {
    /// Corner form to origin + extent, with the `inference_{n}` id scheme.
    pub fn to_box(&self, index: usize) -> DetectionBox {
        let [x1, y1, x2, y2] = self.bbox_xyxy;
        DetectionBox {
            id: format!("inference_{index}"),
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            class: self.class.clone(),
            confidence: self.confidence,
        }
    }
}

/// One model's result as held by the session: converted boxes plus the
/// user's evaluation of it.
#[derive(Clone, Debug)]
pub struct ModelRun {
    pub model_name: String,
    pub detections: Vec<DetectionBox>,
    pub result_image: Option<String>,
    pub error: Option<String>,
    pub rating: u8,
    pub comment: String,
    pub saved: bool,
}

impl ModelRun {
    pub fn from_result(result: ModelResult) -> Self {
        let detections = result
            .detections
            .iter()
            .enumerate()
            .map(|(i, d)| d.to_box(i))
            .collect();
        Self {
            model_name: result.model_name,
            detections,
            result_image: result.result_image,
            error: result.error,
            rating: 0,
            comment: String::new(),
            saved: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone, Debug)]
pub enum InferenceCommand {
    RunInference {
        image_id: i64,
        request: InferenceRequest,
    },
}

#[derive(Clone, Debug)]
pub enum InferenceMessage {
    Completed {
        image_id: i64,
        results: Vec<ModelRun>,
    },
    Failed {
        image_id: i64,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_form_converts_to_origin_extent() {
        let det = Detection {
            bbox_xyxy: [10.0, 20.0, 60.0, 90.0],
            class: "fracture".to_string(),
            confidence: 0.87,
        };
        let b = det.to_box(0);
        assert_eq!(b.id, "inference_0");
        assert_eq!((b.x, b.y, b.width, b.height), (10.0, 20.0, 50.0, 70.0));
        assert_eq!(b.class, "fracture");
        assert_eq!(b.confidence, 0.87);
    }

    #[test]
    fn request_serializes_endpoint_field_names() {
        let req = InferenceRequest {
            model_names: vec!["yolo_v8".to_string()],
            image_url: "https://example.com/a.jpg".to_string(),
            confidence_threshold: 0.5,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["imageUrl"], "https://example.com/a.jpg");
        assert_eq!(json["confidenceThreshold"], 0.5);
        assert_eq!(json["model_names"][0], "yolo_v8");
    }

    #[test]
    fn response_parses_per_model_error() {
        let body = serde_json::json!({
            "modelResults": [
                {
                    "model_name": "a",
                    "resultImage": "https://example.com/out.png",
                    "detections": [
                        { "bbox_xyxy": [1.0, 2.0, 31.0, 42.0], "class": "fracture", "confidence": 0.65 }
                    ]
                },
                { "model_name": "b", "error": "weights not found" }
            ]
        });
        let resp: InferenceResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.model_results.len(), 2);

        let a = ModelRun::from_result(resp.model_results[0].clone());
        assert!(a.is_ok());
        assert_eq!(a.detections.len(), 1);
        assert_eq!(a.detections[0].width, 30.0);

        let b = ModelRun::from_result(resp.model_results[1].clone());
        assert!(!b.is_ok());
        assert!(b.detections.is_empty());
        assert_eq!(b.error.as_deref(), Some("weights not found"));
    }
}
