pub mod attachment;
pub mod logging;
pub mod security;

pub use attachment::{mime, FileStat, ImageStorage, LocalImageStorage};
pub use security::{CaptchaVerifier, TurnstileVerifier, VerificationError};
