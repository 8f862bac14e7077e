pub mod image;

pub use image::{
    CacheHeaders, ConditionalHeaders, DefaultImageService, ErrorCategory, FileContent, ImageError,
    ImageService, ImageSettings, JsonPayload, MultipartFile, ServeOutcome, UploadBody,
    UploadRequest,
};
