//! Coordinate index: the metadata dimensions that label stack output.

use crate::data::{FrameMetadata, MetaValue};
use crate::geometry::ConfigurationError;
use std::collections::HashMap;
use std::fmt;

/// An externally supplied coordinate derivation.
///
/// Looks up the frame's `source_key` (as text), maps it through `table`,
/// and stores the derived value under `target_key` before indexing. The
/// typical use is deriving a scan position from a filename or sample id.
#[derive(Debug, Clone)]
pub struct CoordinateMapping {
    pub source_key: String,
    pub target_key: String,
    pub table: HashMap<String, MetaValue>,
}

impl CoordinateMapping {
    pub fn new(
        source_key: impl Into<String>,
        target_key: impl Into<String>,
        table: HashMap<String, MetaValue>,
    ) -> Self {
        Self {
            source_key: source_key.into(),
            target_key: target_key.into(),
            table,
        }
    }
}

/// Ordered set of metadata dimensions labeling the output container.
#[derive(Debug, Clone)]
pub struct CoordinateIndex {
    dims: Vec<String>,
    mappings: Vec<CoordinateMapping>,
}

impl CoordinateIndex {
    /// Index over the given metadata keys, in output-dimension order.
    pub fn new(dims: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            dims: dims.into_iter().map(Into::into).collect(),
            mappings: Vec::new(),
        }
    }

    /// Attach an external coordinate mapping, applied before indexing.
    pub fn with_mapping(mut self, mapping: CoordinateMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Dimension names in order.
    #[inline]
    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    /// Apply the external mappings to one frame's metadata.
    pub fn apply_mappings(&self, meta: &mut FrameMetadata) {
        for mapping in &self.mappings {
            let derived = meta
                .get(&mapping.source_key)
                .and_then(MetaValue::as_text)
                .and_then(|text| mapping.table.get(text))
                .cloned();
            if let Some(value) = derived {
                meta.set(mapping.target_key.clone(), value);
            }
        }
    }

    /// Extract the frame's coordinate tuple.
    ///
    /// Every dimension must be present in the metadata; a missing key is a
    /// `ConfigurationError` naming the frame and the key.
    pub fn tuple_for(
        &self,
        frame_index: usize,
        meta: &FrameMetadata,
    ) -> Result<CoordinateTuple, ConfigurationError> {
        let mut values = Vec::with_capacity(self.dims.len());
        for dim in &self.dims {
            let value = meta
                .get(dim)
                .ok_or_else(|| ConfigurationError::MissingMetadata {
                    frame: frame_index,
                    key: dim.clone(),
                })?;
            values.push(value.clone());
        }
        Ok(CoordinateTuple(values))
    }
}

/// One frame's position in the output: its value for each index dimension.
///
/// Ordering is lexicographic over the dimension order, giving the output a
/// deterministic layout independent of frame arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordinateTuple(pub Vec<MetaValue>);

impl CoordinateTuple {
    /// Value for the dimension at `position`.
    #[inline]
    pub fn value(&self, position: usize) -> Option<&MetaValue> {
        self.0.get(position)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CoordinateTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{KEY_ENERGY, KEY_POLARIZATION};

    #[test]
    fn test_tuple_extraction() {
        let index = CoordinateIndex::new([KEY_ENERGY, KEY_POLARIZATION]);
        let meta = FrameMetadata::new()
            .with(KEY_ENERGY, 270.0)
            .with(KEY_POLARIZATION, 90.0);

        let tuple = index.tuple_for(0, &meta).unwrap();
        assert_eq!(
            tuple,
            CoordinateTuple(vec![MetaValue::Number(270.0), MetaValue::Number(90.0)])
        );
    }

    #[test]
    fn test_missing_dimension_named() {
        let index = CoordinateIndex::new([KEY_ENERGY, KEY_POLARIZATION]);
        let meta = FrameMetadata::new().with(KEY_ENERGY, 270.0);

        let err = index.tuple_for(7, &meta).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingMetadata {
                frame: 7,
                key: KEY_POLARIZATION.to_string()
            }
        );
    }

    #[test]
    fn test_mapping_derives_coordinate() {
        let mut table = HashMap::new();
        table.insert("scan_004.tiff".to_string(), MetaValue::Number(4.0));

        let index = CoordinateIndex::new(["position"]).with_mapping(CoordinateMapping::new(
            "filename", "position", table,
        ));

        let mut meta = FrameMetadata::new().with("filename", "scan_004.tiff");
        index.apply_mappings(&mut meta);

        let tuple = index.tuple_for(0, &meta).unwrap();
        assert_eq!(tuple.value(0), Some(&MetaValue::Number(4.0)));
    }

    #[test]
    fn test_tuple_ordering_is_lexicographic() {
        let a = CoordinateTuple(vec![MetaValue::Number(270.0), MetaValue::Number(0.0)]);
        let b = CoordinateTuple(vec![MetaValue::Number(270.0), MetaValue::Number(90.0)]);
        let c = CoordinateTuple(vec![MetaValue::Number(320.0), MetaValue::Number(0.0)]);

        assert!(a < b);
        assert!(b < c);
    }
}
