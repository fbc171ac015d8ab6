//! Quality tiers and video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default audio handling: audio is always stream-copied
pub const DEFAULT_AUDIO_CODEC: &str = "copy";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "slow";

/// Long edge at or above which a clip is treated as 4K-class.
pub const UHD_LONG_EDGE: u32 = 3840;
/// Long edge at or above which a clip is treated as 1080p-class.
pub const FULL_HD_LONG_EDGE: u32 = 1920;

/// Compression family of a source video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CodecFamily {
    /// H.264 / AVC
    Avc,
    /// H.265 / HEVC
    Hevc,
    /// Apple ProRes
    ProRes,
    /// Anything else
    Other,
}

impl CodecFamily {
    /// Classify an FFprobe `codec_name`.
    pub fn from_codec_name(codec: &str) -> Self {
        match codec.to_ascii_lowercase().as_str() {
            "h264" | "avc" | "avc1" => CodecFamily::Avc,
            "hevc" | "h265" | "hvc1" | "hev1" => CodecFamily::Hevc,
            "prores" | "apch" | "apcn" | "apcs" | "apco" | "ap4h" => CodecFamily::ProRes,
            _ => CodecFamily::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CodecFamily::Avc => "avc",
            CodecFamily::Hevc => "hevc",
            CodecFamily::ProRes => "prores",
            CodecFamily::Other => "other",
        }
    }
}

/// Output quality tier chosen for a re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "tier", content = "family", rename_all = "snake_case")]
pub enum QualityTier {
    /// 3840x2160-class output
    Uhd(CodecFamily),
    /// 1920x1080-class output in the source's codec family
    FullHd(CodecFamily),
    /// Generic highest-quality output for everything smaller
    Highest,
}

impl QualityTier {
    /// Select a tier from the source's natural size and codec.
    pub fn select(width: u32, height: u32, family: CodecFamily) -> Self {
        let long_edge = width.max(height);
        if long_edge >= UHD_LONG_EDGE {
            QualityTier::Uhd(family)
        } else if long_edge >= FULL_HD_LONG_EDGE {
            QualityTier::FullHd(family)
        } else {
            QualityTier::Highest
        }
    }

    /// Encoder settings for this tier.
    pub fn encoding(&self) -> EncodingConfig {
        match self {
            QualityTier::Uhd(CodecFamily::Hevc) | QualityTier::FullHd(CodecFamily::Hevc) => {
                EncodingConfig::hevc(if matches!(self, QualityTier::Uhd(_)) { 20 } else { 18 })
            }
            QualityTier::Uhd(CodecFamily::ProRes) | QualityTier::FullHd(CodecFamily::ProRes) => {
                EncodingConfig::prores()
            }
            QualityTier::Uhd(_) => EncodingConfig::default().with_crf(17),
            QualityTier::FullHd(_) => EncodingConfig::default(),
            QualityTier::Highest => EncodingConfig::default().with_crf(14),
        }
    }

    pub fn label(&self) -> String {
        match self {
            QualityTier::Uhd(family) => format!("3840x2160 ({})", family.as_str()),
            QualityTier::FullHd(family) => format!("1920x1080 ({})", family.as_str()),
            QualityTier::Highest => "highest quality".to_string(),
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Video encoding configuration for a re-encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264", "libx265", "prores_ks")
    pub codec: String,

    /// Encoding preset; ignored by encoders without presets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    /// Constant Rate Factor (quality, lower is better)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crf: Option<u8>,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: Some(DEFAULT_PRESET.to_string()),
            crf: Some(16),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            extra_args: vec!["-pix_fmt".to_string(), "yuv420p".to_string()],
        }
    }
}

impl EncodingConfig {
    /// HEVC output tagged for broad player compatibility.
    pub fn hevc(crf: u8) -> Self {
        Self {
            codec: "libx265".to_string(),
            crf: Some(crf),
            extra_args: vec!["-tag:v".to_string(), "hvc1".to_string()],
            ..Default::default()
        }
    }

    /// ProRes 422 HQ output.
    pub fn prores() -> Self {
        Self {
            codec: "prores_ks".to_string(),
            preset: None,
            crf: None,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            extra_args: vec!["-profile:v".to_string(), "3".to_string()],
        }
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = Some(crf);
        self
    }

    /// Convert to FFmpeg command arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.codec.clone()];

        if let Some(preset) = &self.preset {
            args.extend_from_slice(&["-preset".to_string(), preset.clone()]);
        }
        if let Some(crf) = self.crf {
            args.extend_from_slice(&["-crf".to_string(), crf.to_string()]);
        }

        args.extend_from_slice(&["-c:a".to_string(), self.audio_codec.clone()]);
        args.extend(self.extra_args.clone());

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_family() {
        assert_eq!(CodecFamily::from_codec_name("h264"), CodecFamily::Avc);
        assert_eq!(CodecFamily::from_codec_name("HEVC"), CodecFamily::Hevc);
        assert_eq!(CodecFamily::from_codec_name("prores"), CodecFamily::ProRes);
        assert_eq!(CodecFamily::from_codec_name("vp9"), CodecFamily::Other);
    }

    #[test]
    fn test_tier_selection() {
        assert_eq!(QualityTier::select(3840, 2160, CodecFamily::Hevc), QualityTier::Uhd(CodecFamily::Hevc));
        assert_eq!(QualityTier::select(4096, 1716, CodecFamily::Avc), QualityTier::Uhd(CodecFamily::Avc));
        assert_eq!(QualityTier::select(1920, 1080, CodecFamily::Hevc), QualityTier::FullHd(CodecFamily::Hevc));
        // Portrait 1080p
        assert_eq!(QualityTier::select(1080, 1920, CodecFamily::Avc), QualityTier::FullHd(CodecFamily::Avc));
        assert_eq!(QualityTier::select(1280, 720, CodecFamily::Hevc), QualityTier::Highest);
    }

    #[test]
    fn test_hevc_stays_hevc() {
        let enc = QualityTier::FullHd(CodecFamily::Hevc).encoding();
        assert_eq!(enc.codec, "libx265");
        let enc = QualityTier::FullHd(CodecFamily::Avc).encoding();
        assert_eq!(enc.codec, "libx264");
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = EncodingConfig::default().to_ffmpeg_args();
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"copy".to_string()));
    }

    #[test]
    fn test_prores_has_no_crf() {
        let args = EncodingConfig::prores().to_ffmpeg_args();
        assert!(args.contains(&"prores_ks".to_string()));
        assert!(!args.contains(&"-crf".to_string()));
        assert!(!args.contains(&"-preset".to_string()));
    }
}
