//! Image-processing methods.
//!
//! Each handler claims its task id in the progress store, reports fixed
//! milestones, and runs the pixel work on the blocking pool so the runtime
//! keeps serving other requests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::mcp::handler::{bool_or, f64_or, i64_or, optional_str, required_str, MethodHandler};
use crate::mcp::progress::{ProgressStore, TaskReporter, INITIAL_STATUS};
use crate::mcp::protocol::Params;
use crate::models::{self, background, inpainting, style, upscale};

/// One running image operation and its progress record.
struct ImageTask {
    reporter: TaskReporter,
    operation: &'static str,
}

impl ImageTask {
    fn begin(progress: &Arc<ProgressStore>, params: &Params, operation: &'static str) -> Result<Self> {
        let task_id = optional_str(params, "task_id")
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let reporter = progress.claim(task_id)?;
        reporter.report(0.1, INITIAL_STATUS);

        if bool_or(params, "use_gpu", false) {
            debug!("{}: use_gpu requested, running on CPU", operation);
        }
        Ok(Self {
            reporter,
            operation,
        })
    }

    fn loading_model(&self) {
        self.reporter.report(0.2, "loading model");
    }

    fn stage(&self, status: &str) {
        self.reporter.report(0.4, status);
    }

    fn finish(self, outcome: Result<String>) -> Result<Value> {
        match outcome {
            Ok(image_data) => {
                self.reporter.complete();
                info!("{} completed for task {}", self.operation, self.reporter.task_id());
                Ok(json!({
                    "image_data": image_data,
                    "status": "success",
                    "task_id": self.reporter.task_id(),
                }))
            }
            Err(e) => {
                error!("Error in {}: {}", self.operation, e);
                self.reporter.fail(&e);
                Err(Error::operation(self.operation, e))
            }
        }
    }
}

async fn run_blocking<F>(work: F) -> Result<String>
where
    F: FnOnce() -> Result<String> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Internal(format!("image worker failed: {}", e)))?
}

fn unit_interval(value: f64, message: &str) -> Result<f32> {
    if (0.0..=1.0).contains(&value) {
        Ok(value as f32)
    } else {
        Err(Error::InvalidParams(message.to_string()))
    }
}

/// `ai_background_removal`
pub struct BackgroundRemovalMethod {
    progress: Arc<ProgressStore>,
}

impl BackgroundRemovalMethod {
    pub fn new(progress: Arc<ProgressStore>) -> Self {
        Self { progress }
    }

    async fn run(task: &ImageTask, params: &Params) -> Result<String> {
        let image_data = required_str(params, "image_data")?;
        let threshold = unit_interval(
            f64_or(params, "threshold", 0.5)?,
            "Threshold must be between 0.0 and 1.0",
        )?;

        task.loading_model();
        task.stage("processing");
        run_blocking(move || {
            let image = models::decode_image(&image_data)?;
            let result = background::remove_background(&image, threshold);
            models::encode_png(&image::DynamicImage::ImageRgba8(result))
        })
        .await
    }
}

#[async_trait]
impl MethodHandler for BackgroundRemovalMethod {
    fn name(&self) -> &'static str {
        "ai_background_removal"
    }

    async fn call(&self, params: Params) -> Result<Value> {
        let task = ImageTask::begin(&self.progress, &params, "Background removal")?;
        let outcome = Self::run(&task, &params).await;
        task.finish(outcome)
    }
}

/// `ai_inpainting`
pub struct InpaintingMethod {
    progress: Arc<ProgressStore>,
}

impl InpaintingMethod {
    pub fn new(progress: Arc<ProgressStore>) -> Self {
        Self { progress }
    }

    async fn run(task: &ImageTask, params: &Params) -> Result<String> {
        let image_data = required_str(params, "image_data")?;
        let mask_data = required_str(params, "mask_data")?;

        task.loading_model();
        task.stage("processing");
        run_blocking(move || {
            let image = models::decode_image(&image_data)?;
            let mask = models::decode_image(&mask_data)?;
            let result = inpainting::inpaint(&image, &mask)?;
            models::encode_png(&image::DynamicImage::ImageRgba8(result))
        })
        .await
    }
}

#[async_trait]
impl MethodHandler for InpaintingMethod {
    fn name(&self) -> &'static str {
        "ai_inpainting"
    }

    async fn call(&self, params: Params) -> Result<Value> {
        let task = ImageTask::begin(&self.progress, &params, "Inpainting")?;
        let outcome = Self::run(&task, &params).await;
        task.finish(outcome)
    }
}

/// `ai_style_transfer`
pub struct StyleTransferMethod {
    progress: Arc<ProgressStore>,
}

impl StyleTransferMethod {
    pub fn new(progress: Arc<ProgressStore>) -> Self {
        Self { progress }
    }

    async fn run(task: &ImageTask, params: &Params) -> Result<String> {
        let image_data = required_str(params, "image_data")?;
        let style_name =
            optional_str(params, "style_name").unwrap_or_else(|| style::DEFAULT_STYLE.to_string());
        let strength = unit_interval(
            f64_or(params, "strength", 1.0)?,
            "Style strength must be between 0.0 and 1.0",
        )?;
        let chosen = style::find_style(&style_name)?;

        task.loading_model();
        task.stage("applying style");
        run_blocking(move || {
            let image = models::decode_image(&image_data)?;
            let result = style::apply_style(&image, chosen, strength);
            models::encode_png(&image::DynamicImage::ImageRgba8(result))
        })
        .await
    }
}

#[async_trait]
impl MethodHandler for StyleTransferMethod {
    fn name(&self) -> &'static str {
        "ai_style_transfer"
    }

    async fn call(&self, params: Params) -> Result<Value> {
        let task = ImageTask::begin(&self.progress, &params, "Style transfer")?;
        let outcome = Self::run(&task, &params).await;
        task.finish(outcome)
    }
}

/// `get_available_styles`
pub struct GetAvailableStylesMethod;

#[async_trait]
impl MethodHandler for GetAvailableStylesMethod {
    fn name(&self) -> &'static str {
        "get_available_styles"
    }

    async fn call(&self, _params: Params) -> Result<Value> {
        Ok(json!({
            "styles": style::available_styles(),
            "status": "success",
        }))
    }
}

/// `ai_upscale`
pub struct UpscaleMethod {
    progress: Arc<ProgressStore>,
}

impl UpscaleMethod {
    pub fn new(progress: Arc<ProgressStore>) -> Self {
        Self { progress }
    }

    async fn run(task: &ImageTask, params: &Params) -> Result<String> {
        let image_data = required_str(params, "image_data")?;
        let scale = i64_or(params, "scale_factor", 2)?;
        let scale = u32::try_from(scale)
            .ok()
            .filter(|s| upscale::SUPPORTED_SCALES.contains(s))
            .ok_or_else(|| Error::InvalidParams("Scale factor must be 2, 4, or 8".to_string()))?;
        let denoise_level = unit_interval(
            f64_or(params, "denoise_level", 0.0)?,
            "Denoise level must be between 0.0 and 1.0",
        )?;
        let sharpen = bool_or(params, "sharpen", false);

        task.loading_model();
        task.stage("upscaling image");
        run_blocking(move || {
            let image = models::decode_image(&image_data)?;
            let result = upscale::upscale(&image, scale, denoise_level, sharpen)?;
            models::encode_png(&result)
        })
        .await
    }
}

#[async_trait]
impl MethodHandler for UpscaleMethod {
    fn name(&self) -> &'static str {
        "ai_upscale"
    }

    async fn call(&self, params: Params) -> Result<Value> {
        let task = ImageTask::begin(&self.progress, &params, "Upscaling")?;
        let outcome = Self::run(&task, &params).await;
        task.finish(outcome)
    }
}
