//! Spatial indexing abstractions for nearest-neighbour point queries.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Common behaviour exposed by neighbourhood indices.
pub trait NeighborhoodIndex {
    /// Rebuild internal structures from point positions. Indices passed to visitors refer
    /// to the order of `positions`.
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError>;

    /// Visit every indexed point strictly closer than `radius` to `origin`, in scan order.
    fn neighbors_within(
        &self,
        origin: (f32, f32),
        radius: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    );

    /// Return the closest indexed point strictly within `radius`, with its distance.
    ///
    /// Ties keep the first point found in scan order.
    fn nearest_within(&self, origin: (f32, f32), radius: f32) -> Option<(usize, f32)> {
        let mut best: Option<(usize, OrderedFloat<f32>)> = None;
        self.neighbors_within(origin, radius, &mut |idx, dist| {
            let closer = match best {
                Some((_, best_dist)) => dist < best_dist,
                None => true,
            };
            if closer {
                best = Some((idx, dist));
            }
        });
        best.map(|(idx, dist)| (idx, dist.into_inner()))
    }
}

type CellKey = (i32, i32);

/// Uniform bucket grid keyed by integer cell coordinates.
///
/// The grid is unbounded: cells are created lazily for whatever coordinates appear, so points
/// outside any nominal world rectangle still index correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformGridIndex {
    /// Edge length of each grid cell used for bucketing points.
    pub cell_size: f32,
    #[serde(skip)]
    positions: Vec<(f32, f32)>,
    #[serde(skip)]
    buckets: HashMap<CellKey, Vec<usize>>,
}

impl UniformGridIndex {
    /// Create a new uniform grid with the provided cell size.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            positions: Vec::new(),
            buckets: HashMap::new(),
        }
    }

    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    fn cell_of(&self, x: f32, y: f32) -> CellKey {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }
}

impl Default for UniformGridIndex {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl NeighborhoodIndex for UniformGridIndex {
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }
        for (idx, &(x, y)) in positions.iter().enumerate() {
            let key = self.cell_of(x, y);
            self.buckets.entry(key).or_default().push(idx);
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        Ok(())
    }

    fn neighbors_within(
        &self,
        origin: (f32, f32),
        radius: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        if self.positions.is_empty() || !radius.is_finite() || radius <= 0.0 {
            return;
        }
        let (ox, oy) = origin;
        let (cx, cy) = self.cell_of(ox, oy);
        let range = i64::from(i32::MAX).min((radius / self.cell_size).ceil() as i64);
        let (cx, cy) = (i64::from(cx), i64::from(cy));
        let in_window = |(ix, iy): CellKey| {
            (i64::from(ix) - cx).abs() <= range && (i64::from(iy) - cy).abs() <= range
        };

        let mut visit_bucket = |bucket: &[usize]| {
            for &idx in bucket {
                let (px, py) = self.positions[idx];
                let dist = (px - ox).hypot(py - oy);
                if dist < radius {
                    visitor(idx, OrderedFloat(dist));
                }
            }
        };

        let side = (2 * range + 1) as u128;
        if side * side > self.buckets.len() as u128 {
            // Window has more cells than are occupied: walk occupied cells in window scan order.
            let mut keys: Vec<CellKey> = self
                .buckets
                .keys()
                .copied()
                .filter(|&key| in_window(key))
                .collect();
            keys.sort_unstable();
            for key in keys {
                if let Some(bucket) = self.buckets.get(&key) {
                    visit_bucket(bucket);
                }
            }
            return;
        }

        for ix in (cx - range)..=(cx + range) {
            for iy in (cy - range)..=(cy + range) {
                let (Ok(ix), Ok(iy)) = (i32::try_from(ix), i32::try_from(iy)) else {
                    continue;
                };
                if let Some(bucket) = self.buckets.get(&(ix, iy)) {
                    visit_bucket(bucket);
                }
            }
        }
    }
}
