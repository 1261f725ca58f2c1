pub mod error;

pub use error::DetectionError;
