//! Output bitrate and container value objects.

use serde::{Deserialize, Serialize, Serializer};

/// Requested output bitrate.
///
/// A closed set; anything a client sends outside of it is coerced to the
/// configured default rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quality {
    Kbps128,
    #[default]
    Kbps192,
    Kbps256,
    Kbps320,
}

impl Quality {
    /// Every accepted quality, lowest first.
    pub const ALL: [Quality; 4] = [
        Quality::Kbps128,
        Quality::Kbps192,
        Quality::Kbps256,
        Quality::Kbps320,
    ];

    /// Bitrate in kbps.
    pub fn kbps(&self) -> u32 {
        match self {
            Self::Kbps128 => 128,
            Self::Kbps192 => 192,
            Self::Kbps256 => 256,
            Self::Kbps320 => 320,
        }
    }

    /// Exact match against the enumerated set.
    pub fn from_kbps(kbps: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.kbps() == kbps)
    }

    /// Parse `"192"`, `"192k"` or `"192kbps"`.
    pub fn parse(s: &str) -> Option<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let digits = lowered
            .strip_suffix("kbps")
            .or_else(|| lowered.strip_suffix('k'))
            .unwrap_or(&lowered)
            .trim();
        digits.parse::<u32>().ok().and_then(Self::from_kbps)
    }

    /// Resolve a client-supplied value, falling back to `fallback` for
    /// anything absent or outside the enumerated set.
    pub fn coerce(requested: Option<&RequestedQuality>, fallback: Quality) -> Quality {
        requested
            .and_then(RequestedQuality::to_quality)
            .unwrap_or(fallback)
    }

    /// Value passed to the transcoder, e.g. `192K`.
    pub fn bitrate_arg(&self) -> String {
        format!("{}K", self.kbps())
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}kbps", self.kbps())
    }
}

impl Serialize for Quality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.kbps())
    }
}

/// Quality as it arrives on the wire. Never fails to deserialize.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RequestedQuality {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RequestedQuality {
    fn to_quality(&self) -> Option<Quality> {
        match self {
            Self::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= u32::MAX as f64 => {
                Quality::from_kbps(*n as u32)
            }
            Self::Text(s) => Quality::parse(s),
            _ => None,
        }
    }
}

/// Target container/codec produced by the transcoding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    /// AAC in an MP4 container.
    M4a,
    Opus,
}

impl AudioFormat {
    /// Name understood by the extractor's `--audio-format`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Opus => "opus",
        }
    }

    /// File extension of the produced artifact.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// MIME type used when serving the artifact.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::M4a => "audio/mp4",
            Self::Opus => "audio/ogg",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "m4a" | "aac" => Some(Self::M4a),
            "opus" => Some(Self::Opus),
            _ => None,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
