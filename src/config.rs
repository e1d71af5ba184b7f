//! Build-time knobs for the blockmap and the BSP point-location cache.

use thiserror::Error;

/// Vanilla blockmap cell: 2^7 = 128 map units.
pub const MAPBLOCKSHIFT: i32 = 7;
pub const MAPBLOCKSIZE: f32 = (1 << MAPBLOCKSHIFT) as f32;

/// Coarse cell used by the BSP cache (four blockmap cells wide).
pub const BSPBLOCKSIZE: f32 = MAPBLOCKSIZE * 4.0;

/// Upper bound on `width * height` for either grid.
pub const MAX_GRID_CELLS: usize = 1 << 22;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("cell size {0} must be finite and positive")]
    BadCellSize(f32),

    #[error("BSP cache cell size {0} must be finite and positive")]
    BadBspCellSize(f32),

    #[error("cell budget must be at least one")]
    NoCells,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockmapConfig {
    /// Side of one collision cell in map units.
    pub cell_size: f32,
    /// Side of one point-location cache cell in map units.
    pub bsp_cell_size: f32,
    /// Refuse to allocate grids larger than this many cells.
    pub max_cells: usize,
}

impl Default for BlockmapConfig {
    fn default() -> Self {
        Self {
            cell_size: MAPBLOCKSIZE,
            bsp_cell_size: BSPBLOCKSIZE,
            max_cells: MAX_GRID_CELLS,
        }
    }
}

impl BlockmapConfig {
    pub fn with_cell_size(mut self, size: f32) -> Self {
        self.cell_size = size;
        self
    }

    pub fn with_bsp_cell_size(mut self, size: f32) -> Self {
        self.bsp_cell_size = size;
        self
    }

    pub fn with_max_cells(mut self, cells: usize) -> Self {
        self.max_cells = cells;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(ConfigError::BadCellSize(self.cell_size));
        }
        if !(self.bsp_cell_size.is_finite() && self.bsp_cell_size > 0.0) {
            return Err(ConfigError::BadBspCellSize(self.bsp_cell_size));
        }
        if self.max_cells == 0 {
            return Err(ConfigError::NoCells);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_vanilla_block_size() {
        let cfg = BlockmapConfig::default();
        assert_eq!(cfg.cell_size, 128.0);
        assert!(cfg.bsp_cell_size > cfg.cell_size);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn rejects_nonsense_sizes() {
        let cfg = BlockmapConfig::default().with_cell_size(0.0);
        assert_eq!(cfg.validate(), Err(ConfigError::BadCellSize(0.0)));

        let cfg = BlockmapConfig::default().with_bsp_cell_size(f32::NAN);
        assert!(matches!(cfg.validate(), Err(ConfigError::BadBspCellSize(_))));

        let cfg = BlockmapConfig::default().with_max_cells(0);
        assert_eq!(cfg.validate(), Err(ConfigError::NoCells));
    }
}
