use serde::{Deserialize, Serialize};

use crate::constants::{SCORING_NODE_POSITIONS, UTILITY_NODE_POSITIONS};
use crate::movement::{manhattan, Bounds};
use crate::rng::RandomSource;
use crate::types::{Cell, CellKind, Vec2};

/// Row-major cell array, fixed size for the lifetime of a game. Empty
/// (0x0) until the game starts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub width: i32,
    pub height: i32,
    pub rows: Vec<Vec<Cell>>,
}

impl Grid {
    /// Builds the standard layout: four repos at the symmetric points and
    /// the utility nodes across the middle row.
    pub fn with_layout(width: i32, height: i32) -> Self {
        let mut grid = Self {
            width,
            height,
            rows: (0..height)
                .map(|y| (0..width).map(|x| Cell::empty(x, y)).collect())
                .collect(),
        };
        for pos in SCORING_NODE_POSITIONS {
            grid.set_kind(pos, CellKind::Repo);
        }
        for (kind, pos) in UTILITY_NODE_POSITIONS {
            grid.set_kind(pos, kind);
        }
        grid
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            width: self.width,
            height: self.height,
        }
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        self.bounds().contains(x, y)
    }

    pub fn cell(&self, x: i32, y: i32) -> Option<&Cell> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.rows.get(y as usize).and_then(|row| row.get(x as usize))
    }

    pub fn cell_mut(&mut self, x: i32, y: i32) -> Option<&mut Cell> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.rows
            .get_mut(y as usize)
            .and_then(|row| row.get_mut(x as usize))
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.rows.iter().flat_map(|row| row.iter())
    }

    /// Turns a consumable into a time-boxed cell at `pos`.
    pub fn place_consumable(&mut self, pos: Vec2, kind: CellKind, tick: u32, lifetime: u32) {
        if let Some(cell) = self.cell_mut(pos.x, pos.y) {
            cell.kind = kind;
            cell.active = true;
            cell.spawned_at_tick = Some(tick);
            cell.expires_at_tick = Some(tick.saturating_add(lifetime));
        }
    }

    pub fn clear_cell(&mut self, pos: Vec2) {
        if let Some(cell) = self.cell_mut(pos.x, pos.y) {
            *cell = Cell::empty(pos.x, pos.y);
        }
    }

    pub fn scoring_nodes(&self, active_only: bool) -> Vec<Vec2> {
        self.cells()
            .filter(|cell| cell.kind == CellKind::Repo && (!active_only || cell.active))
            .map(Cell::pos)
            .collect()
    }

    fn set_kind(&mut self, pos: Vec2, kind: CellKind) {
        if let Some(cell) = self.cell_mut(pos.x, pos.y) {
            cell.kind = kind;
            cell.active = true;
        }
    }
}

/// Closest cell of `kind`; ties go to the first cell in row-major order.
pub fn nearest_of_kind(
    grid: &Grid,
    x: i32,
    y: i32,
    kind: CellKind,
    active_only: bool,
) -> Option<&Cell> {
    let mut best: Option<(i32, &Cell)> = None;
    for cell in grid.cells() {
        if cell.kind != kind || (active_only && !cell.active) {
            continue;
        }
        let dist = manhattan(x, y, cell.x, cell.y);
        if best.map(|(best_dist, _)| dist < best_dist).unwrap_or(true) {
            best = Some((dist, cell));
        }
    }
    best.map(|(_, cell)| cell)
}

/// Active cells of the given kinds within `range`, nearest first. Equal
/// distances keep row-major order.
pub fn cells_in_range<'a>(
    grid: &'a Grid,
    x: i32,
    y: i32,
    kinds: &[CellKind],
    range: i32,
) -> Vec<&'a Cell> {
    let mut found: Vec<&Cell> = grid
        .cells()
        .filter(|cell| {
            kinds.contains(&cell.kind) && cell.active && manhattan(x, y, cell.x, cell.y) <= range
        })
        .collect();
    found.sort_by_key(|cell| manhattan(x, y, cell.x, cell.y));
    found
}

pub fn random_empty_cell(grid: &Grid, rng: &mut impl RandomSource) -> Option<Vec2> {
    let empty: Vec<Vec2> = grid
        .cells()
        .filter(|cell| cell.kind == CellKind::Empty)
        .map(Cell::pos)
        .collect();
    if empty.is_empty() {
        return None;
    }
    Some(empty[rng.pick_index(empty.len())])
}
