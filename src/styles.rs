use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StylePreset {
    #[default]
    Default,
    Compact,
    Neat,
    Casual,
}

/// Layout and perturbation parameters, in pixels at 300 DPI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleParams {
    pub font_size: f32,
    pub line_spacing: f32,
    pub word_spacing: f32,
    pub letter_spacing: f32,
    pub left_margin: f32,
    pub top_margin: f32,
    pub right_margin: f32,
    pub bottom_margin: f32,
    pub font_size_sigma: f32,
    pub line_spacing_sigma: f32,
    pub word_spacing_sigma: f32,
    pub letter_spacing_sigma: f32,
    /// Per-glyph rotation spread in degrees.
    pub rotation_sigma: f32,
}

const BASE: StyleParams = StyleParams {
    font_size: 120.0,
    line_spacing: 140.0,
    word_spacing: 20.0,
    letter_spacing: 0.0,
    left_margin: 100.0,
    top_margin: 120.0,
    right_margin: 100.0,
    bottom_margin: 120.0,
    font_size_sigma: 3.0,
    line_spacing_sigma: 8.0,
    word_spacing_sigma: 3.0,
    letter_spacing_sigma: 0.5,
    rotation_sigma: 1.0,
};

impl StylePreset {
    pub const ALL: [StylePreset; 4] = [
        StylePreset::Default,
        StylePreset::Compact,
        StylePreset::Neat,
        StylePreset::Casual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StylePreset::Default => "default",
            StylePreset::Compact => "compact",
            StylePreset::Neat => "neat",
            StylePreset::Casual => "casual",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StylePreset::Default => "balanced handwriting",
            StylePreset::Compact => "small glyphs, saves space",
            StylePreset::Neat => "tidy, low jitter",
            StylePreset::Casual => "loose, natural jitter",
        }
    }

    pub fn params(&self) -> StyleParams {
        match self {
            StylePreset::Default => BASE,
            StylePreset::Compact => StyleParams {
                font_size: 36.0,
                line_spacing: 60.0,
                word_spacing: 5.0,
                left_margin: 80.0,
                right_margin: 80.0,
                ..BASE
            },
            StylePreset::Neat => StyleParams {
                font_size_sigma: 1.0,
                line_spacing_sigma: 3.0,
                word_spacing_sigma: 1.0,
                rotation_sigma: 0.5,
                ..BASE
            },
            StylePreset::Casual => StyleParams {
                line_spacing_sigma: 10.0,
                letter_spacing_sigma: 1.0,
                rotation_sigma: 1.5,
                ..BASE
            },
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(StylePreset::as_str).collect()
    }
}

impl FromStr for StylePreset {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|preset| preset.as_str() == name)
            .ok_or_else(|| Error::InvalidStyle {
                name: name.to_string(),
                expected: Self::names().join(", "),
            })
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
