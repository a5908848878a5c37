//! Extraction: engine adapters and the client-identity fallback around them.

pub mod engine;
pub mod identity;
pub mod oembed;
pub mod retry;
pub mod strategy;
pub mod ytdlp;

pub use engine::{
    EngineError, EngineErrorKind, ExtractOutcome, ExtractRequest, ExtractionEngine, TitleLookup,
    TrackSearch,
};
pub use identity::ClientIdentity;
pub use oembed::OEmbedTitleLookup;
pub use retry::RetryConfig;
pub use strategy::{Acquisition, FallbackStrategy, UNKNOWN_TITLE, is_placeholder_title};
pub use ytdlp::{YtDlpConfig, YtDlpEngine};
