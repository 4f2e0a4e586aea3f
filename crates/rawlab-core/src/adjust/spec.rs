//! Named, range-checked adjustment parameters.
//!
//! An [`AdjustmentSpec`] always holds one value for every [`Adjustment`]. It
//! can only be built through validating constructors, so a spec in hand is
//! known to be complete, finite and in range.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::AdjustError;

/// Every recognized adjustment parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Adjustment {
    Temperature,
    Tint,
    Exposure,
    Contrast,
    Highlights,
    Shadows,
    Whites,
    Blacks,
    Texture,
    Clarity,
    Dehaze,
    Vibrance,
    Saturation,
}

impl Adjustment {
    /// All adjustments, in pipeline order.
    pub const ALL: [Adjustment; 13] = [
        Adjustment::Temperature,
        Adjustment::Tint,
        Adjustment::Exposure,
        Adjustment::Contrast,
        Adjustment::Highlights,
        Adjustment::Shadows,
        Adjustment::Whites,
        Adjustment::Blacks,
        Adjustment::Texture,
        Adjustment::Clarity,
        Adjustment::Dehaze,
        Adjustment::Vibrance,
        Adjustment::Saturation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Adjustment::Temperature => "temperature",
            Adjustment::Tint => "tint",
            Adjustment::Exposure => "exposure",
            Adjustment::Contrast => "contrast",
            Adjustment::Highlights => "highlights",
            Adjustment::Shadows => "shadows",
            Adjustment::Whites => "whites",
            Adjustment::Blacks => "blacks",
            Adjustment::Texture => "texture",
            Adjustment::Clarity => "clarity",
            Adjustment::Dehaze => "dehaze",
            Adjustment::Vibrance => "vibrance",
            Adjustment::Saturation => "saturation",
        }
    }

    /// Look up an adjustment by its (case-insensitive) name.
    pub fn from_name(name: &str) -> Result<Self, AdjustError> {
        let lower = name.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name() == lower)
            .ok_or_else(|| AdjustError::UnknownParameter(name.to_string()))
    }

    /// Inclusive `(min, max)` range.
    pub fn range(self) -> (f32, f32) {
        match self {
            Adjustment::Temperature => (2000.0, 50000.0),
            Adjustment::Exposure => (-5.0, 5.0),
            _ => (-100.0, 100.0),
        }
    }

    /// Default value. Also the neutral value: a stage whose parameters all sit
    /// at their defaults is skipped.
    pub fn default_value(self) -> f32 {
        match self {
            Adjustment::Temperature => 5050.0,
            Adjustment::Tint => 8.0,
            _ => 0.0,
        }
    }

    /// Display unit, if any.
    pub fn unit(self) -> Option<&'static str> {
        match self {
            Adjustment::Temperature => Some("K"),
            Adjustment::Exposure => Some("EV"),
            _ => None,
        }
    }

    /// Check a candidate value against this adjustment's range.
    pub fn check(self, value: f32) -> Result<f32, AdjustError> {
        let (min, max) = self.range();
        if value.is_finite() && value >= min && value <= max {
            Ok(value)
        } else {
            Err(AdjustError::InvalidParameter {
                name: self.name(),
                value,
                min,
                max,
            })
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A complete, validated set of adjustment values.
///
/// Serializes as a flat `name -> value` map. Deserialization goes through the
/// same validation as [`AdjustmentSpec::from_pairs`]; names missing from the
/// input keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, f32>")]
pub struct AdjustmentSpec {
    values: [f32; 13],
}

impl Default for AdjustmentSpec {
    fn default() -> Self {
        let mut values = [0.0; 13];
        for adj in Adjustment::ALL {
            values[adj.index()] = adj.default_value();
        }
        Self { values }
    }
}

impl AdjustmentSpec {
    /// Build a spec from `(name, value)` pairs on top of the defaults.
    ///
    /// Fails on the first unknown name or invalid value.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, AdjustError>
    where
        I: IntoIterator<Item = (S, f32)>,
        S: AsRef<str>,
    {
        let mut spec = Self::default();
        for (name, value) in pairs {
            let adj = Adjustment::from_name(name.as_ref())?;
            spec.values[adj.index()] = adj.check(value)?;
        }
        Ok(spec)
    }

    pub fn get(&self, adj: Adjustment) -> f32 {
        self.values[adj.index()]
    }

    /// Return a copy with one value replaced.
    pub fn with(mut self, adj: Adjustment, value: f32) -> Result<Self, AdjustError> {
        self.values[adj.index()] = adj.check(value)?;
        Ok(self)
    }

    /// Replace one value in place.
    pub fn set(&mut self, adj: Adjustment, value: f32) -> Result<(), AdjustError> {
        self.values[adj.index()] = adj.check(value)?;
        Ok(())
    }

    /// Whether `adj` sits at its neutral value.
    pub fn is_neutral(&self, adj: Adjustment) -> bool {
        self.get(adj) == adj.default_value()
    }

    /// Whether every value is neutral (applying this spec is a no-op).
    pub fn is_identity(&self) -> bool {
        Adjustment::ALL.iter().all(|&a| self.is_neutral(a))
    }

    /// Re-check every value against its range.
    pub fn validate(&self) -> Result<(), AdjustError> {
        for adj in Adjustment::ALL {
            adj.check(self.get(adj))?;
        }
        Ok(())
    }

    /// Effective spec for one file: this spec with `overrides` applied.
    pub fn with_overrides(&self, overrides: &SpecOverrides) -> Self {
        let mut spec = *self;
        for (&adj, &value) in &overrides.values {
            spec.values[adj.index()] = value;
        }
        spec
    }

    /// `(adjustment, value)` pairs in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (Adjustment, f32)> + '_ {
        Adjustment::ALL.iter().map(move |&a| (a, self.get(a)))
    }
}

impl TryFrom<BTreeMap<String, f32>> for AdjustmentSpec {
    type Error = AdjustError;

    fn try_from(map: BTreeMap<String, f32>) -> Result<Self, Self::Error> {
        Self::from_pairs(map)
    }
}

impl Serialize for AdjustmentSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Adjustment::ALL.len()))?;
        for (adj, value) in self.iter() {
            map.serialize_entry(adj.name(), &value)?;
        }
        map.end()
    }
}

/// A validated partial set of values, used for per-file tweaks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f32>", into = "BTreeMap<String, f32>")]
pub struct SpecOverrides {
    values: BTreeMap<Adjustment, f32>,
}

impl SpecOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build overrides from `(name, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, AdjustError>
    where
        I: IntoIterator<Item = (S, f32)>,
        S: AsRef<str>,
    {
        let mut overrides = Self::default();
        for (name, value) in pairs {
            let adj = Adjustment::from_name(name.as_ref())?;
            overrides.set(adj, value)?;
        }
        Ok(overrides)
    }

    pub fn set(&mut self, adj: Adjustment, value: f32) -> Result<(), AdjustError> {
        self.values.insert(adj, adj.check(value)?);
        Ok(())
    }

    pub fn get(&self, adj: Adjustment) -> Option<f32> {
        self.values.get(&adj).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TryFrom<BTreeMap<String, f32>> for SpecOverrides {
    type Error = AdjustError;

    fn try_from(map: BTreeMap<String, f32>) -> Result<Self, Self::Error> {
        Self::from_pairs(map)
    }
}

impl From<SpecOverrides> for BTreeMap<String, f32> {
    fn from(overrides: SpecOverrides) -> Self {
        overrides
            .values
            .into_iter()
            .map(|(a, v)| (a.name().to_string(), v))
            .collect()
    }
}
