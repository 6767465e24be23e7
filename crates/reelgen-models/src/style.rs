//! Slide styling definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Named color-grading looks applied per slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ColorGrade {
    Vibrant,
    Warm,
    Cool,
    Vintage,
    Sepia,
    BlackWhite,
    Dramatic,
}

impl ColorGrade {
    pub const ALL: &'static [ColorGrade] = &[
        ColorGrade::Vibrant,
        ColorGrade::Warm,
        ColorGrade::Cool,
        ColorGrade::Vintage,
        ColorGrade::Sepia,
        ColorGrade::BlackWhite,
        ColorGrade::Dramatic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorGrade::Vibrant => "vibrant",
            ColorGrade::Warm => "warm",
            ColorGrade::Cool => "cool",
            ColorGrade::Vintage => "vintage",
            ColorGrade::Sepia => "sepia",
            ColorGrade::BlackWhite => "black_white",
            ColorGrade::Dramatic => "dramatic",
        }
    }
}

impl fmt::Display for ColorGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColorGrade {
    type Err = StyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' ', '&'], "_").as_str() {
            "vibrant" => Ok(ColorGrade::Vibrant),
            "warm" => Ok(ColorGrade::Warm),
            "cool" => Ok(ColorGrade::Cool),
            "vintage" => Ok(ColorGrade::Vintage),
            "sepia" => Ok(ColorGrade::Sepia),
            "black_white" | "b_w" | "bw" | "grayscale" => Ok(ColorGrade::BlackWhite),
            "dramatic" => Ok(ColorGrade::Dramatic),
            _ => Err(StyleParseError(s.to_string())),
        }
    }
}

/// Anchor for text overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    TopLeft,
    Top,
    TopRight,
    #[default]
    Center,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl TextPosition {
    pub const ALL: &'static [TextPosition] = &[
        TextPosition::TopLeft,
        TextPosition::Top,
        TextPosition::TopRight,
        TextPosition::Center,
        TextPosition::BottomLeft,
        TextPosition::Bottom,
        TextPosition::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TextPosition::TopLeft => "top_left",
            TextPosition::Top => "top",
            TextPosition::TopRight => "top_right",
            TextPosition::Center => "center",
            TextPosition::BottomLeft => "bottom_left",
            TextPosition::Bottom => "bottom",
            TextPosition::BottomRight => "bottom_right",
        }
    }
}

impl FromStr for TextPosition {
    type Err = StyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "top_left" => Ok(TextPosition::TopLeft),
            "top" => Ok(TextPosition::Top),
            "top_right" => Ok(TextPosition::TopRight),
            "center" | "middle" => Ok(TextPosition::Center),
            "bottom_left" => Ok(TextPosition::BottomLeft),
            "bottom" => Ok(TextPosition::Bottom),
            "bottom_right" => Ok(TextPosition::BottomRight),
            _ => Err(StyleParseError(s.to_string())),
        }
    }
}

/// Transition hint between slides.
///
/// Rendering is best-effort: the compositor always concatenates, and
/// named transitions only add per-slide fades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    #[default]
    None,
    Fade,
    Dissolve,
    Wipe,
    Slide,
}

impl Transition {
    pub fn is_none(&self) -> bool {
        matches!(self, Transition::None)
    }
}

impl FromStr for Transition {
    type Err = StyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "cut" => Ok(Transition::None),
            "fade" => Ok(Transition::Fade),
            "dissolve" => Ok(Transition::Dissolve),
            "wipe" => Ok(Transition::Wipe),
            "slide" => Ok(Transition::Slide),
            _ => Err(StyleParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown style value: {0}")]
pub struct StyleParseError(String);

/// Visual style of a slideshow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlideStyle {
    /// Optional color grade applied to every slide
    #[serde(default)]
    pub color_grade: Option<ColorGrade>,

    /// Slow zoom over each slide
    #[serde(default = "default_ken_burns")]
    pub ken_burns: bool,

    /// Anchor for slide captions
    #[serde(default)]
    pub text_position: TextPosition,

    /// Transition hint
    #[serde(default)]
    pub transition: Transition,

    /// Transition duration in seconds
    #[serde(default = "default_transition_duration")]
    pub transition_duration: f64,
}

fn default_ken_burns() -> bool {
    true
}

fn default_transition_duration() -> f64 {
    0.5
}

impl Default for SlideStyle {
    fn default() -> Self {
        Self {
            color_grade: None,
            ken_burns: default_ken_burns(),
            text_position: TextPosition::default(),
            transition: Transition::default(),
            transition_duration: default_transition_duration(),
        }
    }
}

impl SlideStyle {
    /// A style with every effect disabled.
    pub fn plain() -> Self {
        Self {
            ken_burns: false,
            transition_duration: 0.0,
            ..Default::default()
        }
    }
}
