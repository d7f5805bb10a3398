//! Typed ffprobe JSON output (`-print_format json -show_format -show_streams`).
//!
//! Every field is optional on the wire; missing values decode to their
//! defaults.

use serde::{Deserialize, Serialize};

/// Stream disposition flags (0 or 1 each).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeDisposition {
    pub default: i32,
    pub dub: i32,
    pub original: i32,
    pub comment: i32,
    pub lyrics: i32,
    pub karaoke: i32,
    pub forced: i32,
    pub hearing_impaired: i32,
    pub visual_impaired: i32,
    pub clean_effects: i32,
    pub attached_pic: i32,
    pub timed_thumbnails: i32,
}

/// Per-stream tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamTags {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub language: String,
    /// Matroska stores the stream duration as a tag.
    #[serde(rename = "DURATION", skip_serializing_if = "String::is_empty")]
    pub duration: String,
}

/// One stream record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeStream {
    pub index: u32,
    pub codec_name: String,
    pub codec_long_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub profile: String,
    /// `video`, `audio`, `subtitle`, `data`, ...
    pub codec_type: String,
    pub codec_time_base: String,
    pub codec_tag_string: String,
    pub codec_tag: String,
    pub width: u32,
    pub height: u32,
    pub coded_width: u32,
    pub coded_height: u32,
    pub has_b_frames: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sample_aspect_ratio: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_aspect_ratio: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pix_fmt: String,
    pub level: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub field_order: String,
    pub refs: u32,
    pub r_frame_rate: String,
    pub avg_frame_rate: String,
    pub time_base: String,
    pub start_pts: i64,
    pub start_time: String,
    /// Seconds as a decimal string, e.g. `"35.968000"`.
    pub duration: String,
    pub disposition: ProbeDisposition,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sample_fmt: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sample_rate: String,
    pub channels: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub channel_layout: String,
    pub bits_per_sample: u32,
    pub tags: StreamTags,
}

/// Container tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeTags {
    pub title: String,
    pub encoder: String,
}

/// Container-level record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeFormat {
    pub filename: String,
    pub nb_streams: u32,
    pub nb_programs: u32,
    pub format_name: String,
    pub format_long_name: String,
    pub start_time: String,
    pub duration: String,
    pub size: String,
    pub bit_rate: String,
    pub probe_score: i32,
    pub tags: ProbeTags,
}

/// Full probe result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Probe {
    pub streams: Vec<ProbeStream>,
    pub format: ProbeFormat,
    /// Raw JSON as printed by ffprobe.
    #[serde(skip)]
    pub raw: Vec<u8>,
}

impl Probe {
    /// Decode ffprobe JSON output, keeping the raw bytes.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if `raw` is not a probe document.
    pub fn from_json(raw: Vec<u8>) -> Result<Self, serde_json::Error> {
        let mut probe: Self = serde_json::from_slice(&raw)?;
        probe.raw = raw;
        Ok(probe)
    }
}
