use crate::constants::NAME_MAX_LEN;
use crate::types::{CellKind, Vec2};

pub(super) const DISTRACTION_KINDS: [CellKind; 2] = [CellKind::Pizza, CellKind::EnergyDrink];

pub(super) fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Agent".to_string();
    }
    trimmed.chars().take(NAME_MAX_LEN).collect()
}

pub(super) fn format_pos(pos: Vec2) -> String {
    format!("({}, {})", pos.x, pos.y)
}
