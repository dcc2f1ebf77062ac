//! Character canvas the render hooks draw into.
//!
//! Render runs in descending depth order, so later plots (lower depth) land
//! on top of earlier ones.

use glam::Vec2;

#[derive(Debug, Clone)]
pub struct Canvas {
    columns: usize,
    rows: usize,
    /// World-space extent mapped onto the canvas.
    world: Vec2,
    cells: Vec<char>,
    plotted: usize,
}

impl Canvas {
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    #[must_use]
    pub fn new(columns: usize, rows: usize, world: Vec2) -> Self {
        assert!(columns > 0 && rows > 0, "canvas must have at least one cell");
        Self {
            columns,
            rows,
            world,
            cells: vec![' '; columns * rows],
            plotted: 0,
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(' ');
        self.plotted = 0;
    }

    /// Draw `glyph` at world position `pos`. Positions outside the world
    /// extent are ignored. Returns `true` if something was drawn.
    pub fn plot(&mut self, pos: Vec2, glyph: char) -> bool {
        if !(0.0..self.world.x).contains(&pos.x) || !(0.0..self.world.y).contains(&pos.y) {
            return false;
        }
        let column = ((pos.x / self.world.x) * self.columns as f32) as usize;
        let row = ((pos.y / self.world.y) * self.rows as f32) as usize;
        let (column, row) = (column.min(self.columns - 1), row.min(self.rows - 1));
        self.cells[row * self.columns + column] = glyph;
        self.plotted += 1;
        true
    }

    /// Number of successful plots since the last clear.
    #[must_use]
    pub fn plotted(&self) -> usize {
        self.plotted
    }

    #[must_use]
    pub fn glyph_at(&self, column: usize, row: usize) -> Option<char> {
        (column < self.columns && row < self.rows).then(|| self.cells[row * self.columns + column])
    }

    /// Rows top to bottom, trailing blanks trimmed.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.cells
            .chunks(self.columns)
            .map(|row| row.iter().collect::<String>().trim_end().to_string())
    }
}
