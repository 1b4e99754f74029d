mod backend;
mod backends;
mod result;

pub use backend::DetectorBackend;
#[cfg(feature = "backend-deepstack")]
pub use backends::{DeepStackBackend, DeepStackConfig};
pub use backends::StubBackend;
pub use result::{Detection, DetectionResponse};

use anyhow::{anyhow, Result};

use crate::config::DetectorSettings;

/// Build the backend named in the detector settings.
pub fn backend_from_settings(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend.as_str() {
        "stub" => Ok(Box::new(StubBackend::new())),
        #[cfg(feature = "backend-deepstack")]
        "deepstack" => Ok(Box::new(DeepStackBackend::new(DeepStackConfig {
            url: settings.url.clone(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
        })?)),
        #[cfg(not(feature = "backend-deepstack"))]
        "deepstack" => Err(anyhow!(
            "deepstack detector requires the backend-deepstack feature"
        )),
        other => Err(anyhow!(
            "unknown detector backend '{}'; expected deepstack or stub",
            other
        )),
    }
}
