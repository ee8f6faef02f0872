//! Coordinate-labeled assembly of integration results.

use super::coordinates::CoordinateTuple;
use crate::data::{IntegrationResult, MetaValue};
use std::collections::HashMap;

/// The assembled output of a stack integration.
///
/// Entries are keyed by coordinate tuple, so the final layout depends only
/// on coordinate values, never on frame arrival order. Insertion is O(1)
/// during streaming; `finalize` sorts the per-dimension axes exactly once,
/// after the last insertion.
#[derive(Debug, Default)]
pub struct OutputContainer {
    dims: Vec<String>,
    entries: HashMap<CoordinateTuple, IntegrationResult>,
    /// Sorted unique coordinate values per dimension; filled by `finalize`.
    axes: Vec<Vec<MetaValue>>,
}

impl OutputContainer {
    /// Empty container over the given dimensions.
    pub fn new(dims: Vec<String>) -> Self {
        Self {
            dims,
            entries: HashMap::new(),
            axes: Vec::new(),
        }
    }

    /// Dimension names in order.
    #[inline]
    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    /// Number of assembled entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry exists at this tuple.
    #[inline]
    pub fn contains(&self, tuple: &CoordinateTuple) -> bool {
        self.entries.contains_key(tuple)
    }

    /// Insert a result, failing on an already-occupied tuple.
    pub fn insert(
        &mut self,
        tuple: CoordinateTuple,
        result: IntegrationResult,
    ) -> Result<(), CoordinateTuple> {
        if self.entries.contains_key(&tuple) {
            return Err(tuple);
        }
        self.entries.insert(tuple, result);
        Ok(())
    }

    /// Remove and return the entry at this tuple.
    pub fn remove(&mut self, tuple: &CoordinateTuple) -> Option<IntegrationResult> {
        self.entries.remove(tuple)
    }

    /// Entry at an exact tuple.
    #[inline]
    pub fn get(&self, tuple: &CoordinateTuple) -> Option<&IntegrationResult> {
        self.entries.get(tuple)
    }

    /// All tuples in deterministic (sorted) order.
    pub fn tuples(&self) -> Vec<&CoordinateTuple> {
        let mut tuples: Vec<&CoordinateTuple> = self.entries.keys().collect();
        tuples.sort();
        tuples
    }

    /// Sort the per-dimension coordinate axes. Call once, after streaming.
    pub fn finalize(&mut self) {
        self.axes = self.compute_axes();
    }

    /// Sorted unique coordinate values for a dimension.
    ///
    /// Served from the finalized axes when available.
    pub fn axis(&self, dim: &str) -> Option<Vec<MetaValue>> {
        let position = self.dims.iter().position(|d| d.as_str() == dim)?;
        if let Some(axis) = self.axes.get(position) {
            return Some(axis.clone());
        }
        Some(self.compute_axes().swap_remove(position))
    }

    /// Entries whose numeric coordinate on `dim` is nearest to `value`,
    /// within `tolerance`. Mirrors downstream nearest-match selection.
    pub fn select_nearest(
        &self,
        dim: &str,
        value: f64,
        tolerance: f64,
    ) -> Vec<(&CoordinateTuple, &IntegrationResult)> {
        let Some(position) = self.dims.iter().position(|d| d.as_str() == dim) else {
            return Vec::new();
        };

        let nearest = self
            .entries
            .keys()
            .filter_map(|t| t.value(position).and_then(MetaValue::as_number))
            .filter(|v| (v - value).abs() <= tolerance)
            .min_by(|a, b| (a - value).abs().total_cmp(&(b - value).abs()));

        let Some(nearest) = nearest else {
            return Vec::new();
        };

        let mut selected: Vec<_> = self
            .entries
            .iter()
            .filter(|(t, _)| {
                t.value(position).and_then(MetaValue::as_number) == Some(nearest)
            })
            .collect();
        selected.sort_by(|(a, _), (b, _)| a.cmp(b));
        selected
    }

    fn compute_axes(&self) -> Vec<Vec<MetaValue>> {
        (0..self.dims.len())
            .map(|position| {
                let mut axis: Vec<MetaValue> = self
                    .entries
                    .keys()
                    .filter_map(|t| t.value(position).cloned())
                    .collect();
                axis.sort();
                axis.dedup();
                axis
            })
            .collect()
    }
}
