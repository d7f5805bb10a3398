//! Named sets of output arguments.

/// A named ffmpeg argument set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub args: Vec<String>,
}

/// Remux with stream copy, fixing ADTS AAC for MP4 containers.
#[must_use]
pub fn default_args() -> Vec<String> {
    ["-y", "-bsf:a", "aac_adtstoasc", "-c", "copy"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// All known presets.
#[must_use]
pub fn all() -> Vec<Preset> {
    vec![
        Preset {
            name: "default",
            args: default_args(),
        },
        Preset {
            name: "blank",
            args: Vec::new(),
        },
    ]
}

/// Look up a preset by name.
#[must_use]
pub fn find(name: &str) -> Option<Preset> {
    all().into_iter().find(|preset| preset.name == name)
}
