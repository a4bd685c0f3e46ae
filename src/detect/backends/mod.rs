pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

use std::path::Path;

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;

/// Build a backend by name.
#[allow(unused_variables)]
pub fn create_backend(
    name: &str,
    model_path: Option<&Path>,
    input_width: u32,
    input_height: u32,
) -> Result<Box<dyn DetectorBackend>> {
    match name {
        "stub" => Ok(Box::new(StubBackend::new())),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let path = model_path.ok_or_else(|| anyhow!("tract backend requires a model path"))?;
            Ok(Box::new(TractBackend::new(path, input_width, input_height)?))
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => Err(anyhow!(
            "backend 'tract' requires the backend-tract build feature"
        )),
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}
