// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The pad x step on/off matrix.

use serde::{Deserialize, Serialize};

use super::NUM_STEPS;
use crate::error::IndexError;
use crate::pads::NUM_PADS;

/// 9 rows (pads) by 4 columns (steps).
///
/// Serializes as a plain `bool[9][4]` array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    cells: [[bool; NUM_STEPS]; NUM_PADS],
}

fn check(pad: usize, step: usize) -> Result<(), IndexError> {
    if pad >= NUM_PADS {
        return Err(IndexError::pad(pad));
    }
    if step >= NUM_STEPS {
        return Err(IndexError::step(step));
    }
    Ok(())
}

impl Grid {
    /// An all-off grid
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw rows
    pub fn from_rows(cells: [[bool; NUM_STEPS]; NUM_PADS]) -> Self {
        Self { cells }
    }

    /// Raw rows, pad-major
    pub fn rows(&self) -> &[[bool; NUM_STEPS]; NUM_PADS] {
        &self.cells
    }

    /// Whether `pad` sounds on `step`
    pub fn get(&self, pad: usize, step: usize) -> Result<bool, IndexError> {
        check(pad, step)?;
        Ok(self.cells[pad][step])
    }

    /// Set one cell
    pub fn set(&mut self, pad: usize, step: usize, on: bool) -> Result<(), IndexError> {
        check(pad, step)?;
        self.cells[pad][step] = on;
        Ok(())
    }

    /// Flip one cell and return its new value
    pub fn toggle(&mut self, pad: usize, step: usize) -> Result<bool, IndexError> {
        check(pad, step)?;
        let cell = &mut self.cells[pad][step];
        *cell = !*cell;
        Ok(*cell)
    }

    /// Turn every cell off
    pub fn clear(&mut self) {
        self.cells = [[false; NUM_STEPS]; NUM_PADS];
    }

    /// Pads that sound on `step`, in index order
    pub fn pads_on_step(&self, step: usize) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, row)| row.get(step).copied().unwrap_or(false))
            .map(|(pad, _)| pad)
    }

    /// Number of cells switched on
    pub fn active_count(&self) -> usize {
        self.cells.iter().flatten().filter(|&&on| on).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips() {
        let mut grid = Grid::new();
        assert!(grid.toggle(2, 3).unwrap());
        assert!(grid.get(2, 3).unwrap());
        assert!(!grid.toggle(2, 3).unwrap());
        assert_eq!(grid.active_count(), 0);
    }

    #[test]
    fn test_invalid_indices() {
        let mut grid = Grid::new();
        assert_eq!(grid.toggle(9, 0).unwrap_err(), IndexError::pad(9));
        assert_eq!(grid.toggle(0, 4).unwrap_err(), IndexError::step(4));
        assert!(grid.get(0, 7).is_err());
    }

    #[test]
    fn test_pads_on_step() {
        let mut grid = Grid::new();
        grid.set(0, 0, true).unwrap();
        grid.set(5, 0, true).unwrap();
        grid.set(1, 2, true).unwrap();

        assert_eq!(grid.pads_on_step(0).collect::<Vec<_>>(), vec![0, 5]);
        assert_eq!(grid.pads_on_step(2).collect::<Vec<_>>(), vec![1]);
        assert_eq!(grid.pads_on_step(1).count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut grid = Grid::new();
        grid.set(8, 3, true).unwrap();
        grid.clear();
        assert_eq!(grid, Grid::new());
    }

    #[test]
    fn test_serializes_as_nested_array() {
        let mut grid = Grid::new();
        grid.set(0, 1, true).unwrap();
        let json = serde_json::to_string(&grid).unwrap();
        assert!(json.starts_with("[[false,true,false,false],[false,false,false,false]"));

        let back: Grid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let short = "[[true,false,false,false]]";
        assert!(serde_json::from_str::<Grid>(short).is_err());
    }
}
