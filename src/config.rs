use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Resampling filter used when standardizing image size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<Filter> for FilterType {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => FilterType::Nearest,
            Filter::Triangle => FilterType::Triangle,
            Filter::CatmullRom => FilterType::CatmullRom,
            Filter::Gaussian => FilterType::Gaussian,
            Filter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Parameters shared by every signature that will be compared against each other.
///
/// Hue values produced by [`crate::hsv`] lie in `[0, 180)` and saturation in
/// `[0, 255]`; `hue_range` and `saturation_range` are the half-open intervals
/// the histogram spreads its bins over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Canonical (width, height) every image is resized to
    pub resolution: (u32, u32),
    /// Bins per axis, (hue, saturation)
    pub bins: (usize, usize),
    pub hue_range: (f64, f64),
    pub saturation_range: (f64, f64),
    pub filter: Filter,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            resolution: (256, 256),
            bins: (18, 18),
            hue_range: (0., 180.),
            saturation_range: (0., 256.),
            filter: Filter::Triangle,
        }
    }
}

impl ExtractorConfig {
    pub fn signature_len(&self) -> usize {
        self.bins.0 * self.bins.1
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err(Error::invalid_config("resolution", "must be non-zero"));
        }
        if self.bins.0 == 0 || self.bins.1 == 0 {
            return Err(Error::invalid_config("bins", "must be non-zero"));
        }
        for (name, (lo, hi)) in [
            ("hue_range", self.hue_range),
            ("saturation_range", self.saturation_range),
        ] {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(Error::invalid_config(
                    name,
                    format!("must be a finite interval with lo < hi, got ({}, {})", lo, hi),
                ));
            }
        }
        Ok(())
    }
}

/// Everything the identifier needs to know about its dataset and presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder holding one subfolder of reference images per category
    pub dataset: PathBuf,
    /// Category labels in the order they are scored; ties go to the earlier one
    pub categories: Vec<String>,
    /// File extensions (without dot, compared case-insensitively) treated as images
    pub extensions: Vec<String>,
    pub extractor: ExtractorConfig,
    /// Remedy lines per category label
    pub remedies: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("dataset"),
            categories: vec!["healthy".into(), "rust".into(), "blight".into()],
            extensions: vec!["jpg".into(), "png".into(), "jpeg".into()],
            extractor: ExtractorConfig::default(),
            remedies: crate::remedy::defaults(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: Config = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<&Self> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.extractor.validate()?;
        if self.categories.is_empty() {
            return Err(Error::invalid_config("categories", "must not be empty"));
        }
        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.trim().is_empty() {
                return Err(Error::invalid_config("categories", "contains an empty label"));
            }
            if !seen.insert(category.as_str()) {
                return Err(Error::invalid_config(
                    "categories",
                    format!("lists '{}' more than once", category),
                ));
            }
        }
        Ok(())
    }

    pub fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}
