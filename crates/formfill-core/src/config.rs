//! Engine configuration
//!
//! Every value has a default, so an empty TOML document (or no file at all)
//! yields the stock engine. Sections mirror the engine stages.

use crate::error::FillError;
use serde::{Deserialize, Serialize};
use shared_pdf::OverlayStyle;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matcher: MatcherConfig,
    pub locator: LocatorConfig,
    /// Presentation of synthesized overlay fields
    pub overlay: OverlayStyle,
    pub summary: SummaryConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FillError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FillError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self, FillError> {
        let config: Self = toml::from_str(s).map_err(|e| FillError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FillError> {
        if !(0.0..=1.0).contains(&self.matcher.threshold) {
            return Err(FillError::Config(format!(
                "matcher.threshold must be within 0..=1, got {}",
                self.matcher.threshold
            )));
        }
        if self.locator.min_pattern_len == 0 {
            return Err(FillError::Config(
                "locator.min_pattern_len must be positive".to_string(),
            ));
        }
        let positive = [
            ("overlay.font_size", self.overlay.font_size),
            ("summary.heading_size", self.summary.heading_size),
            ("summary.entry_size", self.summary.entry_size),
            ("summary.line_height", self.summary.line_height),
            ("summary.page_width", self.summary.page_width),
            ("summary.page_height", self.summary.page_height),
            ("render.scale", self.render.scale),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(FillError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum score for a native field to be considered a match
    pub threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { threshold: 0.3 }
    }
}

/// Distances are in PDF points, page space (y grows downward).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// How far above the label top the search region starts
    pub roi_above: f64,
    /// How far below the label bottom the search region ends
    pub roi_below: f64,
    /// Maximum bottom-edge offset for a same-line candidate
    pub same_line_tolerance: f64,
    /// Score multiplier for candidates below the label
    pub below_penalty: f64,
    /// Upward shift applied to a chosen line so text sits on it
    pub line_lift: f64,
    pub fallback_gap: f64,
    pub fallback_width: f64,
    /// Minimum run of `_` or `.` that counts as a blank
    pub min_pattern_len: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            roi_above: 10.0,
            roi_below: 50.0,
            same_line_tolerance: 10.0,
            below_penalty: 1.5,
            line_lift: 5.0,
            fallback_gap: 10.0,
            fallback_width: 200.0,
            min_pattern_len: 4,
        }
    }
}

/// Layout of the appended summary pages, in page space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub heading: String,
    pub heading_size: f64,
    pub entry_size: f64,
    pub margin_x: f64,
    pub heading_y: f64,
    pub first_entry_y: f64,
    pub line_height: f64,
    /// A cursor past this line starts a new page
    pub max_y: f64,
    pub continuation_y: f64,
    pub page_width: f64,
    pub page_height: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            heading: default_heading(),
            heading_size: 16.0,
            entry_size: 12.0,
            margin_x: 50.0,
            heading_y: 50.0,
            first_entry_y: 100.0,
            line_height: 20.0,
            max_y: 800.0,
            continuation_y: 50.0,
            // A4
            page_width: 595.0,
            page_height: 842.0,
        }
    }
}

fn default_heading() -> String {
    "Additional / Unmapped Data".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Pixels per point for page previews
    pub scale: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { scale: 2.0 }
    }
}
