//! Image classification.
//!
//! - `ClassifierBackend`: one loaded model that scores an RGB frame.
//! - `ClassifierRegistry`: the category -> (model, vocabulary) table.
//! - `Label` / `Vocabulary`: what a category can output.
//!
//! The registry is constructed once at startup and passed explicitly to the
//! analysis pipeline; there is no process-global model state.

mod backend;
mod backends;
mod label;
mod registry;

pub use backend::ClassifierBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use label::{Label, Vocabulary};
pub use registry::{ClassifierRegistry, ClassifyError};
