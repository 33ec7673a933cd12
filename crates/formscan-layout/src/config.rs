//! Engine configuration

use crate::association::AssociationPolicy;
use crate::error::{LayoutError, Result};
use crate::reconstruct::PageSize;
use serde::{Deserialize, Serialize};
use std::env;

/// Default minimum OCR confidence for a real transcription
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 25.0;

/// Default horizontal slack (pixels) when matching fields to lines
pub const DEFAULT_SHIFT_TOLERANCE: i32 = 50;

/// Resolution assumed when the image carries no density metadata
pub const DEFAULT_DPI: u32 = 300;

/// Per-image layout reconstruction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// OCR language hint, e.g. `"rus"` or `"rus+eng"`
    pub language: String,

    /// Records with confidence in (0, threshold) are dropped
    pub confidence_threshold: f32,

    /// Horizontal tolerance T (pixels) of the field-to-line corner test
    pub horizontal_shift_tolerance: i32,

    /// Which line wins when a field matches several
    pub association_policy: AssociationPolicy,

    /// Structuring element width for the field detector's opening
    pub kernel_width: u32,

    /// Structuring element height for the field detector's opening
    pub kernel_height: u32,

    /// Number of erosions (then dilations) in the opening
    pub open_iterations: u32,

    /// Resolution used when the image has no DPI metadata
    pub default_dpi: u32,

    /// Fixed target page for positioned output; `None` keeps the image size
    pub page_size: Option<PageSize>,
}

impl Default for LayoutConfig {
    #[inline]
    fn default() -> Self {
        Self {
            language: "rus".to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            horizontal_shift_tolerance: DEFAULT_SHIFT_TOLERANCE,
            association_policy: AssociationPolicy::default(),
            kernel_width: 20,
            kernel_height: 1,
            open_iterations: 2,
            default_dpi: DEFAULT_DPI,
            page_size: None,
        }
    }
}

impl LayoutConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `FORMSCAN_LANGUAGE`: OCR language (default: "rus")
    /// - `FORMSCAN_CONFIDENCE_THRESHOLD`: confidence threshold (default: 25)
    /// - `FORMSCAN_SHIFT_TOLERANCE`: horizontal tolerance in pixels (default: 50)
    /// - `FORMSCAN_DEFAULT_DPI`: fallback resolution (default: 300)
    /// - `FORMSCAN_PAGE_SIZE`: `a4` or `letter` (default: unset)
    ///
    /// Unparseable values fall back to the defaults.
    #[must_use = "creates config from environment variables"]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let language = env::var("FORMSCAN_LANGUAGE").unwrap_or(defaults.language);

        let confidence_threshold = env::var("FORMSCAN_CONFIDENCE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.confidence_threshold);

        let horizontal_shift_tolerance = env::var("FORMSCAN_SHIFT_TOLERANCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.horizontal_shift_tolerance);

        let default_dpi = env::var("FORMSCAN_DEFAULT_DPI")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.default_dpi);

        let page_size = env::var("FORMSCAN_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok());

        Self {
            language,
            confidence_threshold,
            horizontal_shift_tolerance,
            default_dpi,
            page_size,
            ..defaults
        }
    }

    /// Check that every setting is usable
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::InvalidConfig` naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        if !self.confidence_threshold.is_finite() {
            return Err(LayoutError::InvalidConfig(format!(
                "confidence_threshold must be finite, got {}",
                self.confidence_threshold
            )));
        }
        if self.horizontal_shift_tolerance < 0 {
            return Err(LayoutError::InvalidConfig(format!(
                "horizontal_shift_tolerance must be non-negative, got {}",
                self.horizontal_shift_tolerance
            )));
        }
        if self.kernel_width == 0 || self.kernel_height == 0 {
            return Err(LayoutError::InvalidConfig(format!(
                "structuring element must be at least 1x1, got {}x{}",
                self.kernel_width, self.kernel_height
            )));
        }
        if self.open_iterations == 0 {
            return Err(LayoutError::InvalidConfig(
                "open_iterations must be at least 1".to_string(),
            ));
        }
        if self.default_dpi == 0 {
            return Err(LayoutError::InvalidConfig(
                "default_dpi must be positive".to_string(),
            ));
        }
        if self.language.trim().is_empty() {
            return Err(LayoutError::InvalidConfig(
                "language must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
