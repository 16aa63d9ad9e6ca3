//! Korean-specific text analysis: stemming, tone, jamo slang.

pub mod morphology;
pub mod slang;
pub mod tone;

pub use morphology::{has_batchim, stem};
pub use slang::{is_jamo_only, SlangDictionary, SlangMatch};
pub use tone::{detect_tone, Tone};
