//! Fixed six-zone container for calorimeter maps.

use std::ops::{Index, IndexMut};

use nv_core::Result;
use nv_geom::CaloZone;
use serde::Serialize;

use crate::accumulator::GridAccumulator;
use crate::grid::{Grid, GridMode, GridSpec};

/// One `T` per calorimeter zone, indexed by [`CaloZone`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneSet<T> {
    items: [T; 6],
}

impl<T> ZoneSet<T> {
    /// Build by calling `f` for every zone in [`CaloZone::ALL`] order.
    pub fn from_fn(mut f: impl FnMut(CaloZone) -> T) -> Self {
        Self { items: CaloZone::ALL.map(&mut f) }
    }

    /// `(zone, item)` pairs in zone order.
    pub fn iter(&self) -> impl Iterator<Item = (CaloZone, &T)> {
        CaloZone::ALL.into_iter().zip(self.items.iter())
    }

    /// Mutable `(zone, item)` pairs in zone order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (CaloZone, &mut T)> {
        CaloZone::ALL.into_iter().zip(self.items.iter_mut())
    }

    /// Apply `f` to every zone's item.
    pub fn map<U>(self, mut f: impl FnMut(CaloZone, T) -> U) -> ZoneSet<U> {
        let mut i = 0;
        ZoneSet {
            items: self.items.map(|item| {
                let zone = CaloZone::ALL[i];
                i += 1;
                f(zone, item)
            }),
        }
    }

    /// Items in zone order.
    pub fn into_inner(self) -> [T; 6] {
        self.items
    }
}

impl<T> Index<CaloZone> for ZoneSet<T> {
    type Output = T;

    fn index(&self, zone: CaloZone) -> &T {
        &self.items[zone.index()]
    }
}

impl<T> IndexMut<CaloZone> for ZoneSet<T> {
    fn index_mut(&mut self, zone: CaloZone) -> &mut T {
        &mut self.items[zone.index()]
    }
}

impl ZoneSet<GridAccumulator> {
    /// Empty accumulators for all six zones of variable `name`.
    pub fn calo_accumulators(name: &str, mode: GridMode) -> Self {
        Self::from_fn(|zone| GridAccumulator::new(GridSpec::calo(name, zone, mode)))
    }

    /// Zone-wise [`GridAccumulator::merge`].
    pub fn merge(&mut self, other: &ZoneSet<GridAccumulator>) -> Result<()> {
        for (zone, acc) in self.iter_mut() {
            acc.merge(&other[zone])?;
        }
        Ok(())
    }

    /// Finalise every zone according to its mode.
    pub fn finalize(self) -> ZoneSet<Grid> {
        self.map(|_, acc| acc.finalize())
    }
}

impl ZoneSet<Grid> {
    /// Rescale every zone (count-mode only, see [`Grid::scaled`]).
    pub fn scaled(self, factor: f64) -> Self {
        self.map(|_, g| g.scaled(factor))
    }

    /// Total in-grid fills over all zones.
    pub fn entries(&self) -> u64 {
        self.items.iter().map(|g| g.entries).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_by_zone() {
        let mut set = ZoneSet::from_fn(|z| z.name().len());
        assert_eq!(set[CaloZone::Mountain], "mountain".len());
        set[CaloZone::Top] = 99;
        assert_eq!(set.iter().nth(4), Some((CaloZone::Top, &99)));
    }

    #[test]
    fn test_calo_accumulators_route_by_zone() {
        let mut accs = ZoneSet::calo_accumulators("c_hits", GridMode::Count);
        assert!(accs[CaloZone::Italy].add_count(-5, 3));
        assert!(!accs[CaloZone::France].add_count(-5, 3));
        let grids = accs.finalize();
        assert_eq!(grids[CaloZone::Italy].name(), "c_hits_italy");
        assert_eq!(grids[CaloZone::Italy].count_at(-5, 3), Some(1));
        assert_eq!(grids.entries(), 1);
    }
}
