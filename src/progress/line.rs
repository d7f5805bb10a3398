//! Decoder for a single line of the ffmpeg `-progress` report.

/// Error returned when a progress line is not a `key=value` pair.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressLineError {
    /// The line has no `=` separator.
    #[error("bad format: missing '=' separator")]
    MissingSeparator,
}

/// One `key=value` line of an ffmpeg progress report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLine {
    /// Field name, e.g. `out_time_us`.
    pub key: String,
    /// Raw field value. Not trimmed or validated.
    pub value: String,
}

impl ProgressLine {
    /// Parse a line, splitting on the first `=`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressLineError::MissingSeparator` if the line has no `=`.
    pub fn parse(line: &str) -> Result<Self, ProgressLineError> {
        let (key, value) = line
            .split_once('=')
            .ok_or(ProgressLineError::MissingSeparator)?;
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

impl std::str::FromStr for ProgressLine {
    type Err = ProgressLineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
