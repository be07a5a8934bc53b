//! Blast layers
//!
//! An ordered collection of units. The distribution engine returns one layer
//! per generation call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::unit::BlastUnit;

/// Ordered collection of blast units
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlastLayer {
    /// The units, in generation order
    pub units: Vec<BlastUnit>,
}

impl BlastLayer {
    /// Create an empty layer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layer from existing units
    #[must_use]
    pub fn with_units(units: Vec<BlastUnit>) -> Self {
        Self { units }
    }

    /// Append a unit
    pub fn push(&mut self, unit: BlastUnit) {
        self.units.push(unit);
    }

    /// Number of units
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the layer holds no units
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Iterate over the units
    pub fn iter(&self) -> std::slice::Iter<'_, BlastUnit> {
        self.units.iter()
    }
}

impl IntoIterator for BlastLayer {
    type Item = BlastUnit;
    type IntoIter = std::vec::IntoIter<BlastUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_iter()
    }
}

impl<'a> IntoIterator for &'a BlastLayer {
    type Item = &'a BlastUnit;
    type IntoIter = std::slice::Iter<'a, BlastUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

impl Extend<BlastUnit> for BlastLayer {
    fn extend<T: IntoIterator<Item = BlastUnit>>(&mut self, iter: T) {
        self.units.extend(iter);
    }
}

impl fmt::Display for BlastLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlastLayer ({} units)", self.units.len())?;
        for unit in &self.units {
            write!(f, "\n  {unit}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serde_round_trips_a_layer() {
        let layer = BlastLayer::with_units(vec![
            BlastUnit::new_value("wram", 0x10, vec![0xde, 0xad]).with_lifetime(3),
            BlastUnit::new_store("wram", 0x40, 1, "wram", 0x40).with_lifetime(0),
        ]);

        let json = serde_json::to_string(&layer).unwrap();
        let back: BlastLayer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layer);
    }

    #[test]
    fn extend_appends_in_order() {
        let mut layer = BlastLayer::new();
        layer.extend(vec![
            BlastUnit::new_value("wram", 1, vec![0]),
            BlastUnit::new_value("wram", 2, vec![0]),
        ]);
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.iter().next().unwrap().address, 1);
    }
}
