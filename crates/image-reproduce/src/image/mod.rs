//! Image generation and retrieval

pub mod extract;
pub mod generate;
pub mod random;

pub use extract::{ExtractedImage, extract_image_url};
pub use generate::{ImageGenerator, NO_IMAGE_FOUND, REQUEST_TIMEOUT};
pub use random::{fetch_random_image, to_data_uri};
