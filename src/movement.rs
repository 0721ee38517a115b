use crate::types::Vec2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn clamp(&self, x: i32, y: i32) -> Vec2 {
        Vec2 {
            x: x.clamp(0, (self.width - 1).max(0)),
            y: y.clamp(0, (self.height - 1).max(0)),
        }
    }
}

pub fn manhattan(ax: i32, ay: i32, bx: i32, by: i32) -> i32 {
    (ax - bx).abs() + (ay - by).abs()
}

/// One orthogonal step from `(from_x, from_y)` toward `(to_x, to_y)`.
///
/// Moves along the axis with the larger delta; equal deltas move
/// horizontally. The result is clamped to `bounds`.
pub fn step_toward(from_x: i32, from_y: i32, to_x: i32, to_y: i32, bounds: Bounds) -> Vec2 {
    let dx = to_x - from_x;
    let dy = to_y - from_y;
    if dx == 0 && dy == 0 {
        return Vec2 {
            x: from_x,
            y: from_y,
        };
    }

    let (mut x, mut y) = (from_x, from_y);
    if dx.abs() >= dy.abs() {
        x += dx.signum();
    } else {
        y += dy.signum();
    }
    bounds.clamp(x, y)
}

pub fn step_toward_n(from: Vec2, to: Vec2, steps: u32, bounds: Bounds) -> Vec2 {
    let mut pos = from;
    for _ in 0..steps {
        if pos == to {
            break;
        }
        pos = step_toward(pos.x, pos.y, to.x, to.y, bounds);
    }
    pos
}
