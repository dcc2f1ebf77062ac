//! Uniform-grid spatial index.
//!
//! Rebuilt from scratch once per frame between post-update and render, when
//! every position is final. Update hooks of the next frame query it.

use std::collections::HashMap;

use engine_runtime::EntityId;
use glam::{IVec2, Vec2};

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<IVec2, Vec<(EntityId, Vec2)>>,
    len: usize,
}

impl SpatialGrid {
    /// # Panics
    ///
    /// Panics if `cell_size` is not finite and positive.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        assert!(
            cell_size.is_finite() && cell_size > 0.0,
            "grid cell size must be finite and positive, got {cell_size}"
        );
        Self {
            cell_size,
            cells: HashMap::new(),
            len: 0,
        }
    }

    fn cell_of(&self, pos: Vec2) -> IVec2 {
        (pos / self.cell_size).floor().as_ivec2()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.len = 0;
    }

    pub fn insert(&mut self, id: EntityId, pos: Vec2) {
        let cell = self.cell_of(pos);
        self.cells.entry(cell).or_default().push((id, pos));
        self.len += 1;
    }

    /// Replace the contents with `entries`.
    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = (EntityId, Vec2)>) {
        self.clear();
        for (id, pos) in entries {
            self.insert(id, pos);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries within `radius` of `center`, unordered.
    pub fn within(&self, center: Vec2, radius: f32) -> impl Iterator<Item = (EntityId, Vec2)> + '_ {
        let min = self.cell_of(center - Vec2::splat(radius));
        let max = self.cell_of(center + Vec2::splat(radius));
        let radius_sq = radius * radius;
        (min.y..=max.y)
            .flat_map(move |y| (min.x..=max.x).map(move |x| IVec2::new(x, y)))
            .filter_map(|cell| self.cells.get(&cell))
            .flatten()
            .copied()
            .filter(move |(_, pos)| pos.distance_squared(center) <= radius_sq)
    }

    /// Closest entry within `radius` of `center`; ties go to the lower id.
    #[must_use]
    pub fn nearest(&self, center: Vec2, radius: f32) -> Option<(EntityId, Vec2)> {
        self.within(center, radius).min_by(|a, b| {
            a.1.distance_squared(center)
                .total_cmp(&b.1.distance_squared(center))
                .then_with(|| a.0.cmp(&b.0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_filters_by_distance() {
        let mut grid = SpatialGrid::new(4.0);
        grid.insert(EntityId(1), Vec2::new(1.0, 1.0));
        grid.insert(EntityId(2), Vec2::new(5.0, 1.0));
        grid.insert(EntityId(3), Vec2::new(20.0, 20.0));

        let mut hits: Vec<_> = grid.within(Vec2::new(2.0, 1.0), 3.5).map(|(id, _)| id).collect();
        hits.sort();
        assert_eq!(hits, vec![EntityId(1), EntityId(2)]);
        assert_eq!(grid.len(), 3);
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = SpatialGrid::new(2.0);
        grid.insert(EntityId(1), Vec2::new(-0.5, -0.5));
        assert_eq!(grid.within(Vec2::new(0.5, 0.5), 2.0).count(), 1);
    }

    #[test]
    fn test_nearest_prefers_closer_then_lower_id() {
        let mut grid = SpatialGrid::new(1.0);
        grid.insert(EntityId(5), Vec2::new(1.0, 0.0));
        grid.insert(EntityId(2), Vec2::new(-1.0, 0.0));
        grid.insert(EntityId(9), Vec2::new(0.5, 0.0));
        assert_eq!(grid.nearest(Vec2::ZERO, 2.0).map(|(id, _)| id), Some(EntityId(9)));

        let mut tied = SpatialGrid::new(1.0);
        tied.insert(EntityId(5), Vec2::new(1.0, 0.0));
        tied.insert(EntityId(2), Vec2::new(-1.0, 0.0));
        assert_eq!(tied.nearest(Vec2::ZERO, 2.0).map(|(id, _)| id), Some(EntityId(2)));
        assert_eq!(tied.nearest(Vec2::new(50.0, 50.0), 2.0), None);
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let mut grid = SpatialGrid::new(1.0);
        grid.insert(EntityId(1), Vec2::ZERO);
        grid.rebuild([(EntityId(2), Vec2::ONE)]);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.within(Vec2::ZERO, 0.5).count(), 0);
        grid.clear();
        assert!(grid.is_empty());
    }

    #[test]
    #[should_panic(expected = "cell size")]
    fn test_zero_cell_size_panics() {
        let _ = SpatialGrid::new(0.0);
    }
}
