use std::fmt;
use std::str::FromStr;

use crate::shared::error::ConfigError;

pub const DEFAULT_THRESHOLD: f64 = 0.2;
pub const DEFAULT_MASK_SCALE: f64 = 1.3;

/// What goes inside an anonymization region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplaceMode {
    /// Opaque fill.
    Solid,
    #[default]
    Blur,
    /// Leave pixels alone; useful together with annotation.
    None,
}

impl FromStr for ReplaceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "solid" => Ok(Self::Solid),
            "blur" => Ok(Self::Blur),
            "none" => Ok(Self::None),
            _ => Err(ConfigError::UnknownVariant {
                kind: "replace mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ReplaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Solid => "solid",
            Self::Blur => "blur",
            Self::None => "none",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaskShape {
    #[default]
    Ellipse,
    Box,
}

impl FromStr for MaskShape {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ellipse" => Ok(Self::Ellipse),
            "box" | "rect" => Ok(Self::Box),
            _ => Err(ConfigError::UnknownVariant {
                kind: "mask shape",
                value: s.to_string(),
            }),
        }
    }
}

/// Run-wide settings read by the detector and the compositor.
///
/// Built once at startup through [`AnonymizationConfig::new`] and never
/// mutated during a run.
#[derive(Clone, Debug, PartialEq)]
pub struct AnonymizationConfig {
    pub threshold: f64,
    /// Network input size; `None` runs at each frame's native size.
    pub inference_scale: Option<(u32, u32)>,
    pub mask_scale: f64,
    pub replace_mode: ReplaceMode,
    pub shape: MaskShape,
    pub annotate: bool,
}

impl AnonymizationConfig {
    pub fn new(
        threshold: f64,
        inference_scale: Option<(u32, u32)>,
        mask_scale: f64,
        replace_mode: ReplaceMode,
        shape: MaskShape,
        annotate: bool,
    ) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Threshold(threshold));
        }
        if !mask_scale.is_finite() || mask_scale < 1.0 {
            return Err(ConfigError::MaskScale(mask_scale));
        }
        if let Some((w, h)) = inference_scale {
            if w == 0 || h == 0 {
                return Err(ConfigError::ZeroSize(w, h));
            }
        }
        Ok(Self {
            threshold,
            inference_scale,
            mask_scale,
            replace_mode,
            shape,
            annotate,
        })
    }
}

impl Default for AnonymizationConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            inference_scale: None,
            mask_scale: DEFAULT_MASK_SCALE,
            replace_mode: ReplaceMode::default(),
            shape: MaskShape::default(),
            annotate: false,
        }
    }
}

/// Parses an inference size written as `WxH` (e.g. `640x360`).
pub fn parse_size(s: &str) -> Result<(u32, u32), ConfigError> {
    let malformed = || ConfigError::MalformedSize(s.to_string());
    let (w, h) = s
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(malformed)?;
    let w: u32 = w.trim().parse().map_err(|_| malformed())?;
    let h: u32 = h.trim().parse().map_err(|_| malformed())?;
    if w == 0 || h == 0 {
        return Err(ConfigError::ZeroSize(w, h));
    }
    Ok((w, h))
}
