//! 8-bit RGB to HSV conversion.
//!
//! Output ranges: hue `[0, 180)` (degrees halved so it fits a byte),
//! saturation `[0, 255]`, value `[0, 255]`. Division is done with 12-bit
//! fixed-point reciprocal tables so results are bit-exact across platforms.

const SHIFT: i32 = 12;
const ROUND: i32 = 1 << (SHIFT - 1);
const HUE_RANGE: i32 = 180;

pub struct HsvConverter {
    sdiv: [i32; 256],
    hdiv: [i32; 256],
}

impl Default for HsvConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl HsvConverter {
    pub fn new() -> Self {
        let mut sdiv = [0; 256];
        let mut hdiv = [0; 256];
        for i in 1..256 {
            sdiv[i] = ((255 << SHIFT) as f64 / i as f64).round_ties_even() as i32;
            hdiv[i] = ((HUE_RANGE << SHIFT) as f64 / (6. * i as f64)).round_ties_even() as i32;
        }
        Self { sdiv, hdiv }
    }

    pub fn convert(&self, r: u8, g: u8, b: u8) -> (u8, u8, u8) {
        let (r, g, b) = (r as i32, g as i32, b as i32);
        let v = r.max(g).max(b);
        let diff = v - r.min(g).min(b);

        let s = (diff * self.sdiv[v as usize] + ROUND) >> SHIFT;

        let h = if v == r {
            g - b
        } else if v == g {
            b - r + 2 * diff
        } else {
            r - g + 4 * diff
        };
        let mut h = (h * self.hdiv[diff as usize] + ROUND) >> SHIFT;
        if h < 0 {
            h += HUE_RANGE;
        }

        (h as u8, s as u8, v as u8)
    }
}
