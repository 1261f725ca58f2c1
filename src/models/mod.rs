pub mod backend;
pub mod classifier;
pub mod manager;

pub use backend::{InferenceBackend, OnnxBackend, NUM_CLASSES};
pub use classifier::Classifier;
pub use manager::{ModelManager, ModelStats};
