//! Static race layout: open cells, walls, the goal flag and the finish boundary.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Grid coordinate. Rows grow downward, columns grow toward the finish line.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    /// Construct a new position.
    #[must_use]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Position reached by applying `step` once.
    #[must_use]
    pub const fn offset(self, step: Step) -> Self {
        Self::new(self.row + step.d_row, self.col + step.d_col)
    }

    /// Manhattan distance between two cells.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> i32 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }
}

/// Unit movement on the grid; each component is -1, 0 or 1.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Step {
    pub d_row: i32,
    pub d_col: i32,
}

impl Step {
    pub const UP: Self = Self::new(-1, 0);
    pub const DOWN: Self = Self::new(1, 0);
    pub const LEFT: Self = Self::new(0, -1);
    pub const RIGHT: Self = Self::new(0, 1);
    pub const STAY: Self = Self::new(0, 0);

    /// Four cardinal neighbours plus staying put, in draw order.
    pub const CHOICES: [Self; 5] = [Self::UP, Self::DOWN, Self::LEFT, Self::RIGHT, Self::STAY];

    #[must_use]
    pub const fn new(d_row: i32, d_col: i32) -> Self {
        Self { d_row, d_col }
    }

    #[must_use]
    pub const fn is_stay(self) -> bool {
        self.d_row == 0 && self.d_col == 0
    }

    /// The same direction repeated `factor` times.
    #[must_use]
    pub const fn scaled(self, factor: i32) -> Self {
        Self::new(self.d_row * factor, self.d_col * factor)
    }
}

/// Static cell classification.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CellKind {
    #[default]
    Open,
    Wall,
    Goal,
    Boundary,
}

impl CellKind {
    /// Character used when drawing the static layout.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Open => '.',
            Self::Wall => '#',
            Self::Goal => 'F',
            Self::Boundary => '|',
        }
    }
}

/// Largest grid height a layout will allocate.
pub const MAX_ROWS: u32 = 512;
/// Largest grid width a layout will allocate.
pub const MAX_COLS: u32 = 512;

/// Immutable race layout. Agent occupancy lives in [`crate::RaceState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    rows: i32,
    cols: i32,
    goal: Position,
    cells: Vec<CellKind>,
}

impl Grid {
    /// Build an open layout with the finish boundary on the last column and
    /// the goal flag one column to its left, half way down. Dimensions are
    /// capped at [`MAX_ROWS`] by [`MAX_COLS`].
    #[must_use]
    pub fn new(rows: u32, cols: u32) -> Self {
        let rows = rows.clamp(1, MAX_ROWS) as i32;
        let cols = cols.clamp(3, MAX_COLS) as i32;
        let goal = Position::new(rows / 2, cols - 2);
        let mut cells = vec![CellKind::Open; (rows as usize) * (cols as usize)];
        for row in 0..rows {
            cells[(row as usize) * (cols as usize) + (cols - 1) as usize] = CellKind::Boundary;
        }
        cells[(goal.row as usize) * (cols as usize) + goal.col as usize] = CellKind::Goal;
        Self {
            rows,
            cols,
            goal,
            cells,
        }
    }

    #[must_use]
    pub const fn rows(&self) -> i32 {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> i32 {
        self.cols
    }

    #[must_use]
    pub const fn goal(&self) -> Position {
        self.goal
    }

    /// Column of the finish boundary; no agent may stand on or past it.
    #[must_use]
    pub const fn finish_col(&self) -> i32 {
        self.cols - 1
    }

    /// Highest column agents may start on or walls may be placed on.
    #[must_use]
    pub const fn spawn_max_col(&self) -> i32 {
        self.cols - 3
    }

    #[must_use]
    pub const fn in_bounds(&self, pos: Position) -> bool {
        pos.row >= 0 && pos.row < self.rows && pos.col >= 0 && pos.col < self.cols
    }

    /// Cell kind at `pos`; anything outside the grid reads as boundary.
    #[must_use]
    pub fn cell_kind(&self, pos: Position) -> CellKind {
        if self.in_bounds(pos) {
            self.cells[self.offset(pos)]
        } else {
            CellKind::Boundary
        }
    }

    /// Whether the static layout allows an agent to stand on `pos`.
    #[must_use]
    pub fn is_passable(&self, pos: Position) -> bool {
        self.in_bounds(pos)
            && pos.col < self.finish_col()
            && matches!(self.cell_kind(pos), CellKind::Open | CellKind::Goal)
    }

    /// Mark `pos` as a wall. The goal, the boundary and out-of-range cells are left alone.
    pub fn set_wall(&mut self, pos: Position) -> bool {
        if self.cell_kind(pos) != CellKind::Open {
            return false;
        }
        let idx = self.offset(pos);
        self.cells[idx] = CellKind::Wall;
        true
    }

    /// Sprinkle `count` wall draws over the spawnable area. Draws that hit the
    /// goal are redrawn; repeated draws on the same cell are kept.
    pub fn scatter_walls<R: Rng>(&mut self, rng: &mut R, count: usize) {
        let max_col = self.spawn_max_col().max(0);
        let mut placed = 0;
        while placed < count {
            let pos = Position::new(
                rng.random_range(0..self.rows),
                rng.random_range(0..=max_col),
            );
            if pos == self.goal {
                continue;
            }
            self.set_wall(pos);
            placed += 1;
        }
    }

    /// Static glyphs for every cell, row-major.
    pub(crate) fn layout_glyphs(&self) -> Vec<char> {
        self.cells.iter().map(|cell| cell.glyph()).collect()
    }

    #[inline]
    pub(crate) fn offset(&self, pos: Position) -> usize {
        (pos.row as usize) * (self.cols as usize) + (pos.col as usize)
    }
}

/// Render buffer produced from the layout plus current agent markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub total_steps: u64,
    cells: Vec<char>,
}

impl GridSnapshot {
    pub(crate) fn new(rows: usize, cols: usize, total_steps: u64, cells: Vec<char>) -> Self {
        Self {
            rows,
            cols,
            total_steps,
            cells,
        }
    }

    /// Glyph drawn at `(row, col)`.
    #[must_use]
    pub fn glyph(&self, row: usize, col: usize) -> Option<char> {
        (row < self.rows && col < self.cols).then(|| self.cells[row * self.cols + col])
    }

    /// One row of glyphs, or `None` past the last row.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[char]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        self.cells.get(start..start + self.cols)
    }

    /// Iterate rows as owned strings.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.cells
            .chunks(self.cols.max(1))
            .map(|chunk| chunk.iter().collect())
    }
}
