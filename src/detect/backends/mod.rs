#[cfg(feature = "backend-deepstack")]
pub mod deepstack;
pub mod stub;

#[cfg(feature = "backend-deepstack")]
pub use deepstack::{DeepStackBackend, DeepStackConfig};
pub use stub::StubBackend;
