//! Acquisition metadata attached to each detector frame.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Well-known metadata key for photon energy in eV.
pub const KEY_ENERGY: &str = "energy";
/// Well-known metadata key for beam polarization in degrees.
pub const KEY_POLARIZATION: &str = "polarization";
/// Well-known metadata key for exposure time in seconds.
pub const KEY_EXPOSURE: &str = "exposure";
/// Well-known metadata key for the sample identifier.
pub const KEY_SAMPLE_NAME: &str = "sample_name";

/// A single metadata value: numeric or textual.
///
/// Numeric values carry `f64` but compare and hash by bit pattern, so a
/// `MetaValue` can participate in map keys (coordinate tuples) without the
/// usual float caveats. NaN is permitted but only ever equal to itself.
#[derive(Debug, Clone)]
pub enum MetaValue {
    Number(f64),
    Text(String),
}

impl MetaValue {
    /// Numeric value, if this is a `Number`.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetaValue::Number(v) => Some(*v),
            MetaValue::Text(_) => None,
        }
    }

    /// Text value, if this is a `Text`.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Number(_) => None,
            MetaValue::Text(s) => Some(s),
        }
    }
}

impl PartialEq for MetaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MetaValue::Number(a), MetaValue::Number(b)) => a.to_bits() == b.to_bits(),
            (MetaValue::Text(a), MetaValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for MetaValue {}

impl Hash for MetaValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            MetaValue::Number(v) => {
                0u8.hash(state);
                v.to_bits().hash(state);
            }
            MetaValue::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl Ord for MetaValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (MetaValue::Number(a), MetaValue::Number(b)) => a.total_cmp(b),
            (MetaValue::Text(a), MetaValue::Text(b)) => a.cmp(b),
            // Numbers sort before text so mixed axes still have one order.
            (MetaValue::Number(_), MetaValue::Text(_)) => Ordering::Less,
            (MetaValue::Text(_), MetaValue::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for MetaValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Number(v) => write!(f, "{}", v),
            MetaValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Number(v)
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

/// Metadata mapping for one frame.
///
/// Loaders populate this before handing the frame to the engine. Required
/// keys depend on use: stack integration needs `energy` plus every dimension
/// of the coordinate index.
#[derive(Debug, Clone, Default)]
pub struct FrameMetadata {
    entries: HashMap<String, MetaValue>,
}

impl FrameMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a metadata entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up an entry by key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.get(key)
    }

    /// Look up a numeric entry by key.
    #[inline]
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.entries.get(key).and_then(MetaValue::as_number)
    }

    /// Check whether a key is present.
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Photon energy in eV, if recorded.
    #[inline]
    pub fn energy(&self) -> Option<f64> {
        self.get_number(KEY_ENERGY)
    }

    /// Polarization in degrees, if recorded.
    #[inline]
    pub fn polarization(&self) -> Option<f64> {
        self.get_number(KEY_POLARIZATION)
    }

    /// Exposure time in seconds, if recorded.
    #[inline]
    pub fn exposure(&self) -> Option<f64> {
        self.get_number(KEY_EXPOSURE)
    }

    /// Sample identifier, if recorded.
    #[inline]
    pub fn sample_name(&self) -> Option<&str> {
        self.get(KEY_SAMPLE_NAME).and_then(MetaValue::as_text)
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge entries from another mapping, overwriting on key collision.
    pub fn merge(&mut self, other: &FrameMetadata) {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
    }
}
