//! `image_analysis`
//!
//! Summarizes the image state the plugin sends: dimensions, layers and
//! selection, plus color statistics when the active layer's pixels are
//! attached. `analysis_type: "detailed"` adds a per-layer breakdown.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::mcp::handler::{optional_str, MethodHandler};
use crate::mcp::progress::{ProgressStore, TaskReporter};
use crate::mcp::protocol::Params;
use crate::models::{self, analysis};

const OPERATION: &str = "Image analysis";

type Object = Map<String, Value>;

pub struct ImageAnalysisMethod {
    progress: Arc<ProgressStore>,
}

impl ImageAnalysisMethod {
    pub fn new(progress: Arc<ProgressStore>) -> Self {
        Self { progress }
    }

    async fn run(reporter: &TaskReporter, state: Object, detailed: bool) -> Result<Value> {
        let pixels = active_layer_pixels(&state);
        reporter.report(0.3, "processing image data");

        let mut summary = basic_summary(&state);
        if let Some(data) = pixels.clone() {
            let colors = tokio::task::spawn_blocking(move || color_summary(&data))
                .await
                .map_err(|e| Error::Internal(format!("image worker failed: {}", e)))?;
            summary.insert("color_analysis".to_string(), colors);
        }

        if detailed {
            summary.insert("analysis_level".to_string(), json!("detailed"));
            if pixels.is_some() {
                summary.insert(
                    "detected_objects".to_string(),
                    json!([{ "label": "unknown", "confidence": 0.0, "bbox": [0, 0, 0, 0] }]),
                );
                summary.insert("scene_type".to_string(), json!("unknown"));
                summary.insert("style".to_string(), json!("unknown"));
            }
            summary.insert("layer_analysis".to_string(), layer_breakdown(&state));
        }

        Ok(Value::Object(summary))
    }
}

#[async_trait]
impl MethodHandler for ImageAnalysisMethod {
    fn name(&self) -> &'static str {
        "image_analysis"
    }

    async fn call(&self, params: Params) -> Result<Value> {
        let state = match params.get("image_state") {
            Some(Value::Object(state)) if !state.is_empty() => state.clone(),
            _ => {
                return Err(Error::operation(
                    OPERATION,
                    "Missing required parameter: image_state",
                ))
            }
        };
        let detailed = optional_str(&params, "analysis_type").as_deref() == Some("detailed");
        let task_id = optional_str(&params, "task_id")
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let reporter = self.progress.claim(task_id)?;
        reporter.report(0.1, "initializing analysis");
        info!(
            "Processing image analysis, detailed={}, task_id={}",
            detailed,
            reporter.task_id()
        );

        match Self::run(&reporter, state, detailed).await {
            Ok(analysis) => {
                reporter.complete();
                Ok(json!({
                    "analysis": analysis,
                    "status": "success",
                    "task_id": reporter.task_id(),
                }))
            }
            Err(e) => {
                error!("Error in image analysis: {}", e);
                reporter.fail(&e);
                Err(Error::operation(OPERATION, e))
            }
        }
    }
}

fn object<'a>(parent: &'a Object, key: &str) -> Option<&'a Object> {
    parent.get(key).and_then(Value::as_object)
}

fn layers(state: &Object) -> &[Value] {
    state
        .get("layers")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Base64 pixels of the active layer, when the state carries them.
fn active_layer_pixels(state: &Object) -> Option<String> {
    let pixels = object(state, "layer_pixels")?;
    let index = object(state, "metadata")
        .and_then(|m| m.get("active_layer_index"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let layer = layers(state).get(usize::try_from(index).ok()?)?;
    let id = match layer.get("id")? {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    };
    pixels.get(&id)?.as_str().map(String::from)
}

fn basic_summary(state: &Object) -> Object {
    let metadata = object(state, "metadata");
    let meta = |key: &str| metadata.and_then(|m| m.get(key));
    let dimension = |key: &str| meta(key).and_then(Value::as_f64);

    let aspect_ratio = dimension("width").unwrap_or(1.0) / dimension("height").unwrap_or(1.0).max(1.0);
    let layers = layers(state);
    let visible = layers
        .iter()
        .filter(|l| l.get("visible").and_then(Value::as_bool).unwrap_or(false))
        .count();

    let mut summary = Object::new();
    summary.insert(
        "dimensions".to_string(),
        json!({
            "width": meta("width").cloned().unwrap_or(json!(0)),
            "height": meta("height").cloned().unwrap_or(json!(0)),
            "aspect_ratio": (aspect_ratio * 100.0).round() / 100.0,
        }),
    );
    summary.insert(
        "color_mode".to_string(),
        meta("color_mode").cloned().unwrap_or(json!("Unknown")),
    );
    summary.insert("layer_count".to_string(), json!(layers.len()));
    summary.insert("visible_layer_count".to_string(), json!(visible));

    let selection = object(state, "selection");
    let has_selection = selection
        .and_then(|s| s.get("has_selection"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    summary.insert("has_selection".to_string(), json!(has_selection));
    if has_selection {
        let bounds = selection.and_then(|s| object(s, "bounds"));
        let side = |key: &str| bounds.and_then(|b| b.get(key)).and_then(Value::as_i64).unwrap_or(0);
        let (width, height) = (side("width"), side("height"));
        summary.insert(
            "selection_size".to_string(),
            json!({ "width": width, "height": height, "area": width * height }),
        );
    }

    summary
}

fn color_summary(data: &str) -> Value {
    match models::decode_image(data) {
        Ok(image) => json!(analysis::analyze_colors(&image)),
        Err(e) => {
            warn!("Error analyzing pixel data: {}", e);
            json!({
                "error": "Could not analyze pixel data",
                "reason": e.to_string(),
            })
        }
    }
}

fn layer_breakdown(state: &Object) -> Value {
    let summaries: Vec<Value> = layers(state)
        .iter()
        .map(|layer| {
            let field = |key: &str, default: Value| layer.get(key).cloned().unwrap_or(default);
            json!({
                "name": field("name", json!("Unnamed")),
                "visible": field("visible", json!(false)),
                "opacity": field("opacity", json!(100)),
                "blend_mode": field("mode_name", json!("Normal")),
                "is_group": field("is_group", json!(false)),
                "size": {
                    "width": field("width", json!(0)),
                    "height": field("height", json!(0)),
                },
            })
        })
        .collect();
    Value::Array(summaries)
}
