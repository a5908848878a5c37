//! Client identities the extractor can present upstream.

use serde::{Deserialize, Serialize};

/// A persona the extraction engine assumes when talking to the upstream
/// platform. Each one exercises a different player client, so a block on
/// one is often not a block on the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientIdentity {
    AndroidMusic,
    Android,
    Ios,
    Web,
    TvEmbedded,
}

impl ClientIdentity {
    /// Fallback order used when none is configured.
    pub const DEFAULT_ORDER: [ClientIdentity; 5] = [
        ClientIdentity::AndroidMusic,
        ClientIdentity::Android,
        ClientIdentity::Ios,
        ClientIdentity::Web,
        ClientIdentity::TvEmbedded,
    ];

    /// Value for `--extractor-args youtube:player_client=<..>`.
    pub fn player_client(&self) -> &'static str {
        match self {
            Self::AndroidMusic => "android_music",
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Web => "web",
            Self::TvEmbedded => "tv_embedded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "android_music" => Some(Self::AndroidMusic),
            "android" => Some(Self::Android),
            "ios" => Some(Self::Ios),
            "web" => Some(Self::Web),
            "tv_embedded" | "tv" => Some(Self::TvEmbedded),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.player_client())
    }
}
