//! # Degrading Value Mapper
//!
//! Turns a numeric value (event depth, magnitude, ...) into a color using the
//! best strategy available for the batch.
//!
//! - Primary: exact lookup in a color table built once per batch.
//! - Fallback: normalize into `[0, 1]` against the batch bounds, then sample a
//!   named colormap.
//! - Default: a fixed configured color.
//!
//! The first tier that returns `Ok` wins. A missing collaborator or a missing
//! table counts the same as an error, so `map_value` itself never fails.

pub mod colormap;
pub mod cpt;

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use colormap::{BuiltinColormaps, Colormap, Rgb};
pub use cpt::{ColorTable, CptLookup};

/// API misuse. Raised eagerly, never from `map_value`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapperError {
    #[error("domain bounds are inverted: min {min} > max {max}")]
    InvertedBounds { min: f64, max: f64 },
    #[error("domain bounds must be finite (got {min}, {max})")]
    NonFinite { min: f64, max: f64 },
    #[error("invalid color {0:?}")]
    BadColor(String),
    #[error("invalid color table: {0}")]
    InvalidTable(String),
}

/// Why a tier could not produce a color. Recovered by moving to the next tier.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingUnavailable {
    #[error("no color table for this batch")]
    MissingTable,
    #[error("{0} encoder not configured")]
    MissingCollaborator(&'static str),
    #[error("value {value} outside table range [{min}, {max}]")]
    OutOfTable { value: f64, min: f64, max: f64 },
    #[error("zero-width value range")]
    DegenerateRange,
    #[error("unknown colormap {0:?}")]
    UnknownColormap(String),
    #[error("value {0} cannot be encoded")]
    NonFinite(f64),
    #[error("{0}")]
    Other(String),
}

/// Closed value range of a batch. Always finite with `min <= max`; every
/// constructor (serde included) goes through [`DomainBounds::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBounds", into = "RawBounds")]
pub struct DomainBounds {
    min: f64,
    max: f64,
}

#[derive(Serialize, Deserialize)]
struct RawBounds {
    min: f64,
    max: f64,
}

impl TryFrom<RawBounds> for DomainBounds {
    type Error = MapperError;

    fn try_from(raw: RawBounds) -> Result<Self, Self::Error> {
        Self::new(raw.min, raw.max)
    }
}

impl From<DomainBounds> for RawBounds {
    fn from(b: DomainBounds) -> Self {
        Self { min: b.min, max: b.max }
    }
}

impl DomainBounds {
    pub fn new(min: f64, max: f64) -> Result<Self, MapperError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(MapperError::NonFinite { min, max });
        }
        if min > max {
            return Err(MapperError::InvertedBounds { min, max });
        }
        Ok(Self { min, max })
    }

    /// Zero-width range at the origin.
    pub const ZERO: Self = Self { min: 0.0, max: 0.0 };

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Min/max over the finite values; `None` if there are none.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .map(|(min, max)| Self { min, max })
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn is_degenerate(&self) -> bool {
        self.span() == 0.0
    }

    /// Position of `value` in the range. A zero-width range maps everything to
    /// the midpoint 0.5. Not clamped.
    pub fn normalize(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            0.5
        } else {
            (value - self.min) / self.span()
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// What to do with values outside the batch bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRange {
    /// Pull the value onto the nearest bound before any tier runs.
    #[default]
    Clamp,
    /// Hand the raw value to the tiers. The table lookup then rejects it and
    /// the colormap tier decides (built-in maps saturate at their ends).
    Extrapolate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingRequest {
    pub value: f64,
    pub bounds: DomainBounds,
    pub table: Option<Arc<ColorTable>>,
}

impl MappingRequest {
    pub fn new(value: f64, bounds: DomainBounds) -> Self {
        Self {
            value,
            bounds,
            table: None,
        }
    }

    pub fn with_table(mut self, table: Arc<ColorTable>) -> Self {
        self.table = Some(table);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    Primary,
    Fallback,
    Default,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Primary => "primary",
            Strategy::Fallback => "fallback",
            Strategy::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingResult {
    pub encoded: Rgb,
    pub strategy: Strategy,
}

/// Precise, table-backed encoder.
pub trait PrimaryEncoder: Send + Sync {
    fn lookup(&self, value: f64, table: &ColorTable) -> Result<Rgb, EncodingUnavailable>;
}

/// Approximate normalize-then-colormap encoder.
pub trait FallbackEncoder: Send + Sync {
    fn colormap(
        &self,
        value: f64,
        bounds: &DomainBounds,
        colormap_name: &str,
    ) -> Result<Rgb, EncodingUnavailable>;
}

/// Tiers tried before settling on the default color, in order.
const TIERS: [Strategy; 2] = [Strategy::Primary, Strategy::Fallback];

pub struct ValueMapper {
    primary: Option<Box<dyn PrimaryEncoder>>,
    fallback: Option<Box<dyn FallbackEncoder>>,
    colormap: String,
    default_color: Rgb,
    out_of_range: OutOfRange,
}

impl ValueMapper {
    /// Mapper with no collaborators: every value gets `default_color`.
    pub fn new(default_color: Rgb) -> Self {
        Self {
            primary: None,
            fallback: None,
            colormap: "turbo".to_string(),
            default_color,
            out_of_range: OutOfRange::default(),
        }
    }

    /// Mapper wired with the built-in table lookup and colormaps.
    pub fn builtin(colormap: &str, default_color: Rgb) -> Self {
        Self::new(default_color)
            .with_primary(CptLookup)
            .with_fallback(BuiltinColormaps)
            .with_colormap(colormap)
    }

    pub fn with_primary(mut self, enc: impl PrimaryEncoder + 'static) -> Self {
        self.primary = Some(Box::new(enc));
        self
    }

    pub fn with_fallback(mut self, enc: impl FallbackEncoder + 'static) -> Self {
        self.fallback = Some(Box::new(enc));
        self
    }

    pub fn with_colormap(mut self, name: &str) -> Self {
        self.colormap = name.to_string();
        self
    }

    pub fn with_out_of_range(mut self, policy: OutOfRange) -> Self {
        self.out_of_range = policy;
        self
    }

    pub fn colormap_name(&self) -> &str {
        &self.colormap
    }

    pub fn default_color(&self) -> Rgb {
        self.default_color
    }

    /// Build the per-batch table for `bounds` from the configured colormap.
    /// `None` when the colormap is unknown or the range has zero width; the
    /// primary tier is then skipped for the whole batch.
    pub fn build_table(&self, bounds: &DomainBounds, steps: usize) -> Option<Arc<ColorTable>> {
        let Some(cmap) = Colormap::by_name(&self.colormap) else {
            tracing::debug!(colormap = %self.colormap, "no built-in colormap for table");
            return None;
        };
        match ColorTable::build(bounds, cmap, steps) {
            Ok(t) => Some(Arc::new(t)),
            Err(e) => {
                tracing::debug!(error = %e, "color table unavailable for batch");
                None
            }
        }
    }

    /// Map one value. Never fails; `strategy` tells which tier answered.
    pub fn map_value(&self, req: &MappingRequest) -> MappingResult {
        let value = match self.out_of_range {
            OutOfRange::Clamp if req.value.is_finite() => req.bounds.clamp(req.value),
            _ => req.value,
        };

        for tier in TIERS {
            match self.attempt(tier, value, req) {
                Ok(encoded) => return self.done(encoded, tier),
                Err(e) => {
                    tracing::debug!(tier = tier.as_str(), value, error = %e, "mapping tier unavailable");
                }
            }
        }
        self.done(self.default_color, Strategy::Default)
    }

    /// Map a batch of values against one shared table.
    pub fn map_batch(
        &self,
        values: &[f64],
        bounds: DomainBounds,
        table: Option<Arc<ColorTable>>,
    ) -> Vec<MappingResult> {
        values
            .iter()
            .map(|&value| {
                self.map_value(&MappingRequest {
                    value,
                    bounds,
                    table: table.clone(),
                })
            })
            .collect()
    }

    fn attempt(
        &self,
        tier: Strategy,
        value: f64,
        req: &MappingRequest,
    ) -> Result<Rgb, EncodingUnavailable> {
        match tier {
            Strategy::Primary => {
                let enc = self
                    .primary
                    .as_deref()
                    .ok_or(EncodingUnavailable::MissingCollaborator("primary"))?;
                let table = req
                    .table
                    .as_deref()
                    .ok_or(EncodingUnavailable::MissingTable)?;
                enc.lookup(value, table)
            }
            Strategy::Fallback => {
                let enc = self
                    .fallback
                    .as_deref()
                    .ok_or(EncodingUnavailable::MissingCollaborator("fallback"))?;
                enc.colormap(value, &req.bounds, &self.colormap)
            }
            Strategy::Default => Ok(self.default_color),
        }
    }

    fn done(&self, encoded: Rgb, strategy: Strategy) -> MappingResult {
        counter!("mapper_tier_total", "tier" => strategy.as_str()).increment(1);
        MappingResult { encoded, strategy }
    }
}
