//! # Colors and built-in colormaps
//!
//! `Rgb` is the visual attribute the mapper produces. Colormaps are continuous
//! piecewise-linear ramps sampled at `t ∈ [0, 1]`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{DomainBounds, EncodingUnavailable, FallbackEncoder, MapperError};

/// 8-bit RGB color. Serializes as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const RED: Rgb = Rgb::new(0xff, 0x00, 0x00);
    pub const BLACK: Rgb = Rgb::new(0x00, 0x00, 0x00);
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Accepts `#rrggbb`, `rrggbb`, `r/g/b` (GMT style) and a few color names.
    pub fn parse(s: &str) -> Result<Self, MapperError> {
        let t = s.trim();
        match t.to_ascii_lowercase().as_str() {
            "red" => return Ok(Self::RED),
            "black" => return Ok(Self::BLACK),
            "white" => return Ok(Self::WHITE),
            "gray" | "grey" => return Ok(Self::new(0x80, 0x80, 0x80)),
            _ => {}
        }

        if t.contains('/') {
            let parts: Vec<&str> = t.split('/').collect();
            if parts.len() == 3 {
                let mut rgb = [0u8; 3];
                for (slot, p) in rgb.iter_mut().zip(&parts) {
                    *slot = p
                        .trim()
                        .parse::<u8>()
                        .map_err(|_| MapperError::BadColor(s.to_string()))?;
                }
                return Ok(Self::new(rgb[0], rgb[1], rgb[2]));
            }
            return Err(MapperError::BadColor(s.to_string()));
        }

        let hex = t.strip_prefix('#').unwrap_or(t);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(MapperError::BadColor(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| MapperError::BadColor(s.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Linear blend, `t` clamped to `[0, 1]`.
    pub fn lerp(a: Rgb, b: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
        Rgb::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Rgb {
    type Error = MapperError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Rgb::parse(&s)
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_hex()
    }
}

/// Named continuous colormap.
#[derive(Debug)]
pub struct Colormap {
    pub name: &'static str,
    stops: &'static [(f64, Rgb)],
}

const TURBO: Colormap = Colormap {
    name: "turbo",
    stops: &[
        (0.0, Rgb::new(0x30, 0x12, 0x3b)),
        (0.1, Rgb::new(0x44, 0x54, 0xc4)),
        (0.2, Rgb::new(0x44, 0x90, 0xfe)),
        (0.3, Rgb::new(0x1f, 0xc8, 0xde)),
        (0.4, Rgb::new(0x29, 0xef, 0xa2)),
        (0.5, Rgb::new(0x7d, 0xfd, 0x56)),
        (0.6, Rgb::new(0xc1, 0xf3, 0x34)),
        (0.7, Rgb::new(0xf1, 0xca, 0x3a)),
        (0.8, Rgb::new(0xfe, 0x92, 0x2a)),
        (0.9, Rgb::new(0xea, 0x4f, 0x0d)),
        (1.0, Rgb::new(0x7a, 0x04, 0x03)),
    ],
};

const VIRIDIS: Colormap = Colormap {
    name: "viridis",
    stops: &[
        (0.0, Rgb::new(0x44, 0x01, 0x54)),
        (0.25, Rgb::new(0x3b, 0x52, 0x8b)),
        (0.5, Rgb::new(0x21, 0x91, 0x8c)),
        (0.75, Rgb::new(0x5e, 0xc9, 0x62)),
        (1.0, Rgb::new(0xfd, 0xe7, 0x25)),
    ],
};

const GRAY: Colormap = Colormap {
    name: "gray",
    stops: &[(0.0, Rgb::BLACK), (1.0, Rgb::WHITE)],
};

const ALL: [&Colormap; 3] = [&TURBO, &VIRIDIS, &GRAY];

impl Colormap {
    /// Case-insensitive lookup among the built-in maps.
    pub fn by_name(name: &str) -> Option<&'static Colormap> {
        ALL.into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        ALL.into_iter().map(|c| c.name)
    }

    /// Sample at `t`. Values past either end saturate at the end color;
    /// non-finite `t` yields `None`.
    pub fn sample(&self, t: f64) -> Option<Rgb> {
        if !t.is_finite() {
            return None;
        }
        let t = t.clamp(0.0, 1.0);
        let stops = self.stops;
        for pair in stops.windows(2) {
            let (t0, c0) = pair[0];
            let (t1, c1) = pair[1];
            if t <= t1 {
                return Some(Rgb::lerp(c0, c1, (t - t0) / (t1 - t0)));
            }
        }
        stops.last().map(|&(_, c)| c)
    }
}

/// Default fallback encoder: normalize against the batch bounds, then sample a
/// built-in colormap.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinColormaps;

impl FallbackEncoder for BuiltinColormaps {
    fn colormap(
        &self,
        value: f64,
        bounds: &DomainBounds,
        colormap_name: &str,
    ) -> Result<Rgb, EncodingUnavailable> {
        let cmap = Colormap::by_name(colormap_name)
            .ok_or_else(|| EncodingUnavailable::UnknownColormap(colormap_name.to_string()))?;
        cmap.sample(bounds.normalize(value))
            .ok_or(EncodingUnavailable::NonFinite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_and_gmt_forms_parse() {
        assert_eq!(Rgb::parse("#112233").unwrap(), Rgb::new(0x11, 0x22, 0x33));
        assert_eq!(Rgb::parse("AABBCC").unwrap(), Rgb::new(0xaa, 0xbb, 0xcc));
        assert_eq!(Rgb::parse("255/0/0").unwrap(), Rgb::RED);
        assert_eq!(Rgb::parse("Red").unwrap(), Rgb::RED);
        assert!(Rgb::parse("#12345").is_err());
        assert!(Rgb::parse("300/0/0").is_err());
    }

    #[test]
    fn hex_round_trips_through_serde() {
        let c = Rgb::new(0x44, 0x55, 0x66);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"#445566\"");
        let back: Rgb = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn colormap_ends_and_saturation() {
        let gray = Colormap::by_name("GRAY").unwrap();
        assert_eq!(gray.sample(0.0), Some(Rgb::BLACK));
        assert_eq!(gray.sample(1.0), Some(Rgb::WHITE));
        assert_eq!(gray.sample(0.5), Some(Rgb::new(0x80, 0x80, 0x80)));
        assert_eq!(gray.sample(-3.0), Some(Rgb::BLACK));
        assert_eq!(gray.sample(f64::NAN), None);
    }

    #[test]
    fn unknown_colormap_is_unavailable() {
        let b = DomainBounds::new(0.0, 10.0).unwrap();
        let err = BuiltinColormaps.colormap(5.0, &b, "jet").unwrap_err();
        assert_eq!(err, EncodingUnavailable::UnknownColormap("jet".into()));
    }
}
