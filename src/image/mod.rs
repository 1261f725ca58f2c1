pub mod loader;
pub mod preprocessing;
pub mod transforms;

pub use loader::ImageLoader;
pub use preprocessing::{ImagePreprocessor, NormalizedTensor, INPUT_SHAPE, INPUT_SIZE};
pub use transforms::{ImageTransforms, IMAGENET_MEAN, IMAGENET_STD};
