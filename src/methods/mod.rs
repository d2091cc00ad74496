//! JSON-RPC method implementations.
//!
//! - `protocol` - `initialize`, `shutdown`, `hello_world`
//! - `imaging` - background removal, inpainting, style transfer, upscaling
//! - `analysis` - image state and color summary

pub mod analysis;
pub mod imaging;
pub mod protocol;

use std::sync::Arc;

use crate::mcp::handler::MethodRegistry;
use crate::mcp::progress::ProgressStore;

/// Register every method with the registry.
///
/// `initialize` is registered last so it can advertise the full method list.
pub fn register_all(registry: &mut MethodRegistry, progress: Arc<ProgressStore>) {
    registry.register(protocol::ShutdownMethod);
    registry.register(protocol::HelloWorldMethod);

    registry.register(imaging::BackgroundRemovalMethod::new(progress.clone()));
    registry.register(imaging::InpaintingMethod::new(progress.clone()));
    registry.register(imaging::StyleTransferMethod::new(progress.clone()));
    registry.register(imaging::GetAvailableStylesMethod);
    registry.register(imaging::UpscaleMethod::new(progress.clone()));
    registry.register(analysis::ImageAnalysisMethod::new(progress));

    let mut supported = registry.method_names();
    supported.push("initialize".to_string());
    supported.sort();
    registry.register(protocol::InitializeMethod::new(supported));
}
