use crate::types::{CellKind, Vec2};

pub const GRID_WIDTH: i32 = 20;
pub const GRID_HEIGHT: i32 = 15;

pub const SCORING_NODE_POSITIONS: [Vec2; 4] = [
    Vec2 { x: 3, y: 3 },
    Vec2 { x: 16, y: 3 },
    Vec2 { x: 3, y: 11 },
    Vec2 { x: 16, y: 11 },
];
pub const UTILITY_NODE_POSITIONS: [(CellKind, Vec2); 3] = [
    (CellKind::CoffeeStation, Vec2 { x: 10, y: 7 }),
    (CellKind::SupabaseNode, Vec2 { x: 5, y: 7 }),
    (CellKind::MongodbNode, Vec2 { x: 14, y: 7 }),
];

pub const MIN_PARTICIPANTS: usize = 3;
pub const DEFAULT_MAX_TICKS: u32 = 120;
pub const DEFAULT_TARGET_SCORE: u32 = 40;

pub const RESOURCE_SPAWN_CHANCE: f32 = 0.05;
pub const BONUS_EVENT_CHANCE: f32 = 0.02;
pub const OUTAGE_CHANCE: f32 = 0.01;

pub const CONSUMABLE_LIFETIME_TICKS: u32 = 30;
pub const BONUS_SCORE: u32 = 2;
pub const OUTAGE_DURATION_TICKS: u32 = 10;

pub const DISTRACTION_RADIUS: i32 = 5;
pub const CRUNCH_THRESHOLD: f32 = 0.10;
pub const CRUNCH_STEPS: u32 = 2;
pub const FORCE_ACTION_CHANCE: f32 = 0.5;
pub const FORCE_ACTION_MIN: u32 = 1;
pub const FORCE_ACTION_MAX: u32 = 3;

pub const CONFLICT_PENALTY_TICKS: u32 = 5;
pub const HEADPHONE_DURATION_TICKS: u32 = 15;
pub const PIZZA_DISTRACTION_TICKS: u32 = 5;
pub const ENERGY_DRINK_DISTRACTION_TICKS: u32 = 3;
pub const STARVATION_MIN_TICK: u32 = 30;

pub const EVENT_LOG_CAPACITY: usize = 200;
pub const TEXT_LOG_CAPACITY: usize = 100;
pub const NAME_MAX_LEN: usize = 24;

pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// Evenly spaced slots along the bottom edge, one per agent.
pub fn get_spawn_positions(count: usize, width: i32, height: i32) -> Vec<Vec2> {
    let y = height - 1;
    let spacing = width / (count as i32 + 1);
    (0..count)
        .map(|idx| Vec2 {
            x: (spacing * (idx as i32 + 1)).clamp(0, width - 1),
            y,
        })
        .collect()
}

pub fn get_time_pressure(tick_count: u32, max_ticks: u32) -> f32 {
    if max_ticks == 0 {
        return 0.0;
    }
    max_ticks.saturating_sub(tick_count) as f32 / max_ticks as f32
}
