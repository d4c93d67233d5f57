use image::{DynamicImage, GenericImageView};
use tracing::warn;

use std::path::Path;

use crate::config::ExtractorConfig;
use crate::error::{Error, Result};
use crate::hsv::HsvConverter;

/// Normalized hue/saturation histogram of one image, flattened hue-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    bins: Vec<f32>,
}

impl Signature {
    pub fn as_slice(&self) -> &[f32] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Every cell must be a finite number in `[0, 1]`.
impl TryFrom<Vec<f32>> for Signature {
    type Error = Error;

    fn try_from(bins: Vec<f32>) -> Result<Self> {
        if let Some((index, &value)) = bins
            .iter()
            .enumerate()
            .find(|(_, v)| !(0. ..=1.).contains(*v))
        {
            return Err(Error::InvalidSignature { index, value });
        }
        Ok(Self { bins })
    }
}

/// Maps every possible 8-bit channel value to its histogram bin, or `None`
/// when it falls outside the configured range.
fn bin_lookup(bins: usize, (lo, hi): (f64, f64)) -> [Option<usize>; 256] {
    let a = bins as f64 / (hi - lo);
    let b = -lo * a;
    let mut table = [None; 256];
    for (v, slot) in table.iter_mut().enumerate() {
        let idx = (v as f64 * a + b).floor();
        if idx >= 0. && idx < bins as f64 {
            *slot = Some(idx as usize);
        }
    }
    table
}

pub struct Extractor {
    config: ExtractorConfig,
    hsv: HsvConverter,
    hue_bins: [Option<usize>; 256],
    saturation_bins: [Option<usize>; 256],
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            hue_bins: bin_lookup(config.bins.0, config.hue_range),
            saturation_bins: bin_lookup(config.bins.1, config.saturation_range),
            hsv: HsvConverter::new(),
            config,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn signature_len(&self) -> usize {
        self.config.signature_len()
    }

    /**
     * Reduces an image to its signature. `None` in gives `None` out, which is how an
     * image that could not be decoded upstream travels through the pipeline. An
     * image with no pixels has nothing to fingerprint and also gives `None`.
     */
    pub fn extract(&self, image: Option<&DynamicImage>) -> Option<Signature> {
        let image = image?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return None;
        }
        Some(normalize(self.histogram(image)))
    }

    /// Decodes and extracts in one step; decode failures are logged and yield `None`.
    pub fn extract_path<P: AsRef<Path>>(&self, path: P) -> Option<Signature> {
        let path = path.as_ref();
        match image::open(path) {
            Ok(image) => self.extract(Some(&image)),
            Err(e) => {
                warn!("Could not decode {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Raw pixel counts per (hue, saturation) cell after resizing. `image` must
    /// have at least one pixel.
    fn histogram(&self, image: &DynamicImage) -> Vec<u32> {
        let (width, height) = self.config.resolution;
        let rgb = if image.dimensions() == (width, height) {
            image.to_rgb8()
        } else {
            image
                .resize_exact(width, height, self.config.filter.into())
                .to_rgb8()
        };

        let saturation_bins = self.config.bins.1;
        let mut counts = vec![0_u32; self.signature_len()];
        for pixel in rgb.pixels() {
            let [r, g, b] = pixel.0;
            let (h, s, _) = self.hsv.convert(r, g, b);
            if let (Some(hb), Some(sb)) = (
                self.hue_bins[h as usize],
                self.saturation_bins[s as usize],
            ) {
                counts[hb * saturation_bins + sb] += 1;
            }
        }
        counts
    }
}

/// Min-max rescale to `[0, 1]`. A flat histogram becomes all zeros.
fn normalize(counts: Vec<u32>) -> Signature {
    let min = counts.iter().copied().min().unwrap_or(0) as f64;
    let max = counts.iter().copied().max().unwrap_or(0) as f64;
    let scale = if max - min > f64::EPSILON {
        1. / (max - min)
    } else {
        0.
    };
    let shift = -min * scale;
    let bins = counts
        .into_iter()
        .map(|c| ((c as f64 * scale + shift) as f32).clamp(0., 1.))
        .collect();
    Signature { bins }
}
