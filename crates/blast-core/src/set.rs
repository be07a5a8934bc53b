//! Blast sets
//!
//! A [`BlastSet`] presents several layers plus one overflow group as a single
//! 0-based sequence. Indexed reads can be served from a baked snapshot for
//! fast repeated access; every mutation path invalidates the snapshot.

use serde::{Deserialize, Serialize};

use crate::layer::BlastLayer;
use crate::unit::BlastUnit;

/// Composite read/write sequence over multiple layers and an overflow group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlastSet {
    layers: Vec<BlastLayer>,
    overflow: Vec<BlastUnit>,
    #[serde(skip)]
    baked: Option<Vec<BlastUnit>>,
}

/// Where an index landed inside the set
enum Slot {
    Layer(usize, usize),
    Overflow(usize),
}

impl BlastSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the layers in insertion order, then the overflow group
    fn resolve(&self, mut index: usize) -> Option<Slot> {
        for (j, layer) in self.layers.iter().enumerate() {
            if index < layer.len() {
                return Some(Slot::Layer(j, index));
            }
            index -= layer.len();
        }
        if index < self.overflow.len() {
            return Some(Slot::Overflow(index));
        }
        None
    }

    /// Unit at `index`, reading from the baked snapshot when present
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&BlastUnit> {
        if let Some(baked) = &self.baked {
            return baked.get(index);
        }
        match self.resolve(index)? {
            Slot::Layer(j, i) => self.layers[j].units.get(i),
            Slot::Overflow(i) => self.overflow.get(i),
        }
    }

    /// Replace the unit at `index`; returns false if the index is out of
    /// range
    pub fn set(&mut self, index: usize, unit: BlastUnit) -> bool {
        let done = match self.resolve(index) {
            Some(Slot::Layer(j, i)) => {
                self.layers[j].units[i] = unit;
                true
            }
            Some(Slot::Overflow(i)) => {
                self.overflow[i] = unit;
                true
            }
            None => false,
        };
        if done {
            self.unbake();
        }
        done
    }

    /// Total unit count across all layers and the overflow group
    ///
    /// Cache this rather than calling it in a loop condition.
    #[must_use]
    pub fn len(&self) -> usize {
        if let Some(baked) = &self.baked {
            return baked.len();
        }
        self.layers.iter().map(BlastLayer::len).sum::<usize>() + self.overflow.len()
    }

    /// Whether the set holds no units
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of layers (excluding the overflow group)
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Whether a baked snapshot is currently valid
    #[must_use]
    pub fn is_baked(&self) -> bool {
        self.baked.is_some()
    }

    /// Append a layer
    pub fn add_layer(&mut self, layer: BlastLayer) {
        self.layers.push(layer);
        self.unbake();
    }

    /// Append a unit to the overflow group
    pub fn add_unit(&mut self, unit: BlastUnit) {
        self.overflow.push(unit);
        self.unbake();
    }

    /// Insert a unit at a flattened index
    ///
    /// An index past the last layer inserts into the overflow group.
    pub fn insert(&mut self, index: usize, unit: BlastUnit) {
        let mut remaining = index;
        for layer in &mut self.layers {
            if remaining < layer.len() {
                layer.units.insert(remaining, unit);
                self.unbake();
                return;
            }
            remaining -= layer.len();
        }
        let at = remaining.min(self.overflow.len());
        self.overflow.insert(at, unit);
        self.unbake();
    }

    /// Remove the first occurrence of `unit`; returns whether one was found
    pub fn remove(&mut self, unit: &BlastUnit) -> bool {
        for layer in &mut self.layers {
            if let Some(i) = layer.units.iter().position(|u| u == unit) {
                layer.units.remove(i);
                self.unbake();
                return true;
            }
        }
        if let Some(i) = self.overflow.iter().position(|u| u == unit) {
            self.overflow.remove(i);
            self.unbake();
            return true;
        }
        false
    }

    /// Remove and return the unit at a flattened index
    pub fn remove_at(&mut self, index: usize) -> Option<BlastUnit> {
        let removed = match self.resolve(index)? {
            Slot::Layer(j, i) => self.layers[j].units.remove(i),
            Slot::Overflow(i) => self.overflow.remove(i),
        };
        self.unbake();
        Some(removed)
    }

    /// Whether the set contains `unit`
    #[must_use]
    pub fn contains(&self, unit: &BlastUnit) -> bool {
        self.layers.iter().any(|l| l.units.contains(unit)) || self.overflow.contains(unit)
    }

    /// Flattened index of the first occurrence of `unit`
    #[must_use]
    pub fn index_of(&self, unit: &BlastUnit) -> Option<usize> {
        let mut offset = 0;
        for layer in &self.layers {
            if let Some(i) = layer.units.iter().position(|u| u == unit) {
                return Some(offset + i);
            }
            offset += layer.len();
        }
        self.overflow
            .iter()
            .position(|u| u == unit)
            .map(|i| offset + i)
    }

    /// Empty every layer and the overflow group, keeping the layer slots
    pub fn clear(&mut self) {
        for layer in &mut self.layers {
            layer.units.clear();
        }
        self.overflow.clear();
        self.unbake();
    }

    /// Drop all layers (the overflow group is untouched)
    pub fn clear_layers(&mut self) {
        self.layers.clear();
        self.unbake();
    }

    /// Flatten every unit into one contiguous snapshot for fast repeated
    /// indexed access
    pub fn bake(&mut self) {
        let baked = self.copy_to_vec();
        self.baked = Some(baked);
    }

    /// Invalidate the baked snapshot
    pub fn unbake(&mut self) {
        self.baked = None;
    }

    /// Clone every unit, in flattened order, into a new vector
    #[must_use]
    pub fn copy_to_vec(&self) -> Vec<BlastUnit> {
        let mut out = Vec::with_capacity(
            self.layers.iter().map(BlastLayer::len).sum::<usize>() + self.overflow.len(),
        );
        for layer in &self.layers {
            out.extend(layer.units.iter().cloned());
        }
        out.extend(self.overflow.iter().cloned());
        out
    }
}
