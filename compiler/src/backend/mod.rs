use miette::Diagnostic;
use thiserror::Error;

use crate::WiredScenario;

pub mod cpp;
pub mod dot;
pub mod record;

pub use cpp::CppEmitter;
pub use dot::DotBackend;
pub use record::{Call, RecordingEmitter};

#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum BackendError {
    #[error("backend error: {0}")]
    #[diagnostic(code(backend::error))]
    Other(String),
}

/// Renders an already wired scenario.
pub trait Backend {
    type Artifact;

    fn emit(&self, output: &WiredScenario) -> Result<Self::Artifact, BackendError>;
}
