//! `/detect` response payload

use serde::{Deserialize, Deserializer, Serialize};

/// One object found by the server's detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class name, e.g. "Drowsy" or "Awake"
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f32,
    /// Bounding box as `[x1, y1, x2, y2]` in frame pixels
    pub bbox: [i32; 4],
}

/// Detection result for a single uploaded frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Annotated frame, base64-encoded JPEG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_image: Option<String>,

    /// Alert condition
    #[serde(default, deserialize_with = "null_as_false")]
    pub drowsy: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detections: Vec<Detection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl DetectionResult {
    /// Annotated image, ignoring an empty string
    pub fn annotated_image(&self) -> Option<&str> {
        self.processed_image
            .as_deref()
            .filter(|image| !image.is_empty())
    }

    /// Highest-confidence detection
    pub fn top_detection(&self) -> Option<&Detection> {
        self.detections
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
