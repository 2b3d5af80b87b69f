mod raw_image;
pub use raw_image::*;

mod sampler;
pub use sampler::*;
