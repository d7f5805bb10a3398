//! Reduction of a probe document to the facts a job needs.

use std::time::Duration;

use serde::Serialize;

use super::Probe;

const NANOS_PER_SEC_DIGITS: usize = 9;

/// Error returned when a duration string is not a decimal number of seconds.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid duration {0:?}")]
pub struct DurationParseError(pub String);

/// Parse an ffprobe duration string such as `"35.968000"`.
///
/// An empty string is a zero duration. Digits beyond nanosecond precision
/// are truncated.
///
/// # Errors
///
/// Returns `DurationParseError` if the string is not a non-negative decimal
/// number.
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Duration::ZERO);
    }

    let invalid = || DurationParseError(s.to_string());
    let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let secs = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| invalid())?
    };

    let mut digits = fraction
        .get(..NANOS_PER_SEC_DIGITS)
        .unwrap_or(fraction)
        .to_string();
    while digits.len() < NANOS_PER_SEC_DIGITS {
        digits.push('0');
    }
    let nanos = digits.parse::<u32>().map_err(|_| invalid())?;

    Ok(Duration::new(secs, nanos))
}

/// Summary of a probe result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Longest stream duration, or the container duration if no stream
    /// reports one.
    pub duration: Duration,
    pub has_video: bool,
    pub has_audio: bool,
    /// Dimensions of the last video stream.
    pub width: u32,
    pub height: u32,
}

impl Summary {
    /// Derive the summary from a probe document.
    ///
    /// # Errors
    ///
    /// Returns `DurationParseError` if a stream or the container reports a
    /// non-numeric duration.
    pub fn from_probe(probe: &Probe) -> Result<Self, DurationParseError> {
        let mut summary = Self::default();

        for stream in &probe.streams {
            let duration = parse_duration(&stream.duration)?;
            if duration > summary.duration {
                summary.duration = duration;
            }
            match stream.codec_type.as_str() {
                "video" => {
                    summary.has_video = true;
                    summary.width = stream.width;
                    summary.height = stream.height;
                }
                "audio" => summary.has_audio = true,
                _ => {}
            }
        }

        if summary.duration.is_zero() {
            summary.duration = parse_duration(&probe.format.duration)?;
        }

        Ok(summary)
    }

    /// Fraction of the input covered by `out_time`.
    ///
    /// Not finite when the duration is unknown (zero).
    #[must_use]
    pub fn completion(&self, out_time: Duration) -> f64 {
        out_time.as_secs_f64() / self.duration.as_secs_f64()
    }
}
