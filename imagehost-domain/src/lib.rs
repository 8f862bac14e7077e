pub mod image;

pub use image::{cdn_url, ImageId, ImageResponse, StoredImage};
