//! Continuous color palette tables, built once per batch from the batch's
//! value range (the equivalent of `makecpt -T min/max/step -Z`).

use super::colormap::{Colormap, Rgb};
use super::{DomainBounds, EncodingUnavailable, MapperError, PrimaryEncoder};

#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    /// Control points, strictly ascending in `z`. At least two.
    stops: Vec<(f64, Rgb)>,
}

impl ColorTable {
    /// Resample `cmap` at `steps + 1` evenly spaced points across `bounds`.
    /// A zero-width range cannot carry a table.
    pub fn build(
        bounds: &DomainBounds,
        cmap: &Colormap,
        steps: usize,
    ) -> Result<Self, EncodingUnavailable> {
        if bounds.is_degenerate() {
            return Err(EncodingUnavailable::DegenerateRange);
        }
        let steps = steps.max(1);
        let inc = bounds.span() / steps as f64;
        let mut stops = Vec::with_capacity(steps + 1);
        for i in 0..=steps {
            let z = if i == steps {
                bounds.max()
            } else {
                bounds.min() + inc * i as f64
            };
            let c = cmap
                .sample(i as f64 / steps as f64)
                .ok_or(EncodingUnavailable::NonFinite(z))?;
            stops.push((z, c));
        }
        Ok(Self { stops })
    }

    pub fn from_stops(stops: Vec<(f64, Rgb)>) -> Result<Self, MapperError> {
        if stops.len() < 2 {
            return Err(MapperError::InvalidTable(
                "need at least two control points".into(),
            ));
        }
        if stops.iter().any(|(z, _)| !z.is_finite()) {
            return Err(MapperError::InvalidTable("non-finite z value".into()));
        }
        if stops.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(MapperError::InvalidTable(
                "z values must be strictly ascending".into(),
            ));
        }
        Ok(Self { stops })
    }

    /// Parse a GMT-style CPT body: `z0 color0 z1 color1` per line, where a
    /// color is `r/g/b`, `#rrggbb` or a name. Comments and the B/F/N
    /// background lines are ignored.
    pub fn parse_cpt(text: &str) -> Result<Self, MapperError> {
        let mut stops: Vec<(f64, Rgb)> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if matches!(line.chars().next(), Some('B' | 'F' | 'N')) {
                continue;
            }
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return Err(MapperError::InvalidTable(format!("bad cpt line {line:?}")));
            }
            let z0 = parse_z(cols[0])?;
            let c0 = Rgb::parse(cols[1])?;
            let z1 = parse_z(cols[2])?;
            let c1 = Rgb::parse(cols[3])?;
            // Adjacent slices share their boundary.
            if stops.last().map(|&(z, _)| z) != Some(z0) {
                stops.push((z0, c0));
            }
            stops.push((z1, c1));
        }
        Self::from_stops(stops)
    }

    pub fn range(&self) -> (f64, f64) {
        // from_stops/build guarantee at least two stops
        (self.stops[0].0, self.stops[self.stops.len() - 1].0)
    }

    /// Interpolated color for `z`. Values outside the table are unavailable.
    pub fn sample(&self, z: f64) -> Result<Rgb, EncodingUnavailable> {
        let (min, max) = self.range();
        if !(min..=max).contains(&z) {
            return Err(EncodingUnavailable::OutOfTable { value: z, min, max });
        }
        for pair in self.stops.windows(2) {
            let (z0, c0) = pair[0];
            let (z1, c1) = pair[1];
            if z <= z1 {
                return Ok(Rgb::lerp(c0, c1, (z - z0) / (z1 - z0)));
            }
        }
        Ok(self.stops[self.stops.len() - 1].1)
    }
}

fn parse_z(s: &str) -> Result<f64, MapperError> {
    s.parse::<f64>()
        .map_err(|_| MapperError::InvalidTable(format!("bad z value {s:?}")))
}

/// Default primary encoder: exact lookup in the batch's color table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CptLookup;

impl PrimaryEncoder for CptLookup {
    fn lookup(&self, value: f64, table: &ColorTable) -> Result<Rgb, EncodingUnavailable> {
        table.sample(value)
    }
}
