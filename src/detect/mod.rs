//! Offline detection backends.

pub mod backend;
pub mod backends;
pub mod result;

pub use backend::{DetectionCapability, DetectorBackend};
pub use backends::{create_backend, StubBackend};
pub use result::{Detection, DetectionResult};
