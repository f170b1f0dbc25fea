// Touch verification grid: one flag per test cell.
// Visual: nothing on screen; it records which cells the operator has hit so an
// automated jig can tell when the whole panel responded.

use std::io::{self, Write};

use log::debug;

use crate::types::{CellSize, Geometry};

pub struct Coverage {
    cells: Vec<bool>,
    columns: u32,
    rows: u32,
}

impl Coverage {
    /// One cell per whole `cell` that fits on the display.
    pub fn new(geometry: &Geometry, cell: CellSize) -> Self {
        let columns = geometry.width / cell.width.max(1);
        let rows = geometry.height / cell.height.max(1);
        Self {
            cells: vec![false; columns as usize * rows as usize],
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Flat index for a grid column/row, if it lies inside the grid.
    pub fn index_of(&self, column: u32, row: u32) -> Option<usize> {
        (column < self.columns && row < self.rows)
            .then(|| row as usize * self.columns as usize + column as usize)
    }

    pub fn mark(&mut self, index: usize) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = true;
        }
    }

    pub fn is_marked(&self, index: usize) -> bool {
        self.cells.get(index).copied().unwrap_or(false)
    }

    pub fn touched(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// True once every cell except the first has been touched; the first cell
    /// is never consulted. On success the whole grid (first cell included) is
    /// cleared so the next test cycle can start.
    pub fn check(&mut self) -> bool {
        self.check_to(&mut io::stdout())
    }

    /// [`Coverage::check`], printing the success line to `out`.
    pub fn check_to<W: Write>(&mut self, out: &mut W) -> bool {
        if self.cells.iter().skip(1).any(|&c| !c) {
            return false;
        }

        if let Err(e) = writeln!(out, "Input test: success") {
            debug!("success line not written: {e}");
        }
        self.cells.fill(false);

        true
    }
}
