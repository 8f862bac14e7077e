pub mod captcha;

pub use captcha::{CaptchaVerifier, TurnstileVerifier, VerificationError, TURNSTILE_VERIFY_URL};
