use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BONUS_EVENT_CHANCE, BONUS_SCORE, CONFLICT_PENALTY_TICKS, CONSUMABLE_LIFETIME_TICKS,
    CRUNCH_STEPS, CRUNCH_THRESHOLD, DEFAULT_MAX_TICKS, DEFAULT_TARGET_SCORE, DISTRACTION_RADIUS,
    ENERGY_DRINK_DISTRACTION_TICKS, EVENT_LOG_CAPACITY, FORCE_ACTION_CHANCE, FORCE_ACTION_MAX,
    FORCE_ACTION_MIN, GRID_HEIGHT, GRID_WIDTH, HEADPHONE_DURATION_TICKS, MIN_PARTICIPANTS,
    OUTAGE_CHANCE, OUTAGE_DURATION_TICKS, PIZZA_DISTRACTION_TICKS, RESOURCE_SPAWN_CHANCE,
    SCORING_NODE_POSITIONS, STARVATION_MIN_TICK, TEXT_LOG_CAPACITY, UTILITY_NODE_POSITIONS,
};
use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub width: i32,
    pub height: i32,
    pub max_ticks: u32,
    pub target_score: u32,
    pub min_participants: usize,
    pub resource_spawn_chance: f32,
    pub bonus_event_chance: f32,
    pub outage_chance: f32,
    pub consumable_lifetime_ticks: u32,
    pub bonus_score: u32,
    pub outage_duration_ticks: u32,
    pub distraction_radius: i32,
    pub crunch_threshold: f32,
    pub crunch_steps: u32,
    pub force_action_chance: f32,
    pub force_action_min: u32,
    pub force_action_max: u32,
    pub conflict_penalty_ticks: u32,
    pub headphone_duration_ticks: u32,
    pub pizza_distraction_ticks: u32,
    pub energy_drink_distraction_ticks: u32,
    pub starvation_min_tick: u32,
    pub event_log_capacity: usize,
    pub text_log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: GRID_WIDTH,
            height: GRID_HEIGHT,
            max_ticks: DEFAULT_MAX_TICKS,
            target_score: DEFAULT_TARGET_SCORE,
            min_participants: MIN_PARTICIPANTS,
            resource_spawn_chance: RESOURCE_SPAWN_CHANCE,
            bonus_event_chance: BONUS_EVENT_CHANCE,
            outage_chance: OUTAGE_CHANCE,
            consumable_lifetime_ticks: CONSUMABLE_LIFETIME_TICKS,
            bonus_score: BONUS_SCORE,
            outage_duration_ticks: OUTAGE_DURATION_TICKS,
            distraction_radius: DISTRACTION_RADIUS,
            crunch_threshold: CRUNCH_THRESHOLD,
            crunch_steps: CRUNCH_STEPS,
            force_action_chance: FORCE_ACTION_CHANCE,
            force_action_min: FORCE_ACTION_MIN,
            force_action_max: FORCE_ACTION_MAX,
            conflict_penalty_ticks: CONFLICT_PENALTY_TICKS,
            headphone_duration_ticks: HEADPHONE_DURATION_TICKS,
            pizza_distraction_ticks: PIZZA_DISTRACTION_TICKS,
            energy_drink_distraction_ticks: ENERGY_DRINK_DISTRACTION_TICKS,
            starvation_min_tick: STARVATION_MIN_TICK,
            event_log_capacity: EVENT_LOG_CAPACITY,
            text_log_capacity: TEXT_LOG_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|error| ConfigError::Io(format!("{}: {error}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|error| ConfigError::Parse(format!("{}: {error}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Environment events disabled; handy for scripted scenarios.
    pub fn without_random_events(mut self) -> Self {
        self.resource_spawn_chance = 0.0;
        self.bonus_event_chance = 0.0;
        self.outage_chance = 0.0;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("resourceSpawnChance", self.resource_spawn_chance),
            ("bonusEventChance", self.bonus_event_chance),
            ("outageChance", self.outage_chance),
            ("crunchThreshold", self.crunch_threshold),
            ("forceActionChance", self.force_action_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { name, value });
            }
        }

        for (name, value) in [
            ("maxTicks", self.max_ticks),
            ("targetScore", self.target_score),
            ("crunchSteps", self.crunch_steps),
            ("conflictPenaltyTicks", self.conflict_penalty_ticks),
            ("consumableLifetimeTicks", self.consumable_lifetime_ticks),
            ("outageDurationTicks", self.outage_duration_ticks),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if self.event_log_capacity == 0 {
            return Err(ConfigError::Zero("eventLogCapacity"));
        }
        if self.text_log_capacity == 0 {
            return Err(ConfigError::Zero("textLogCapacity"));
        }
        if self.min_participants == 0 {
            return Err(ConfigError::Zero("minParticipants"));
        }

        let layout_fits = SCORING_NODE_POSITIONS
            .iter()
            .chain(UTILITY_NODE_POSITIONS.iter().map(|(_, pos)| pos))
            .all(|pos| pos.x < self.width && pos.y < self.height);
        if !layout_fits {
            return Err(ConfigError::GridTooSmall {
                width: self.width,
                height: self.height,
            });
        }

        if self.force_action_min > self.force_action_max {
            return Err(ConfigError::EmptyForceRange {
                min: self.force_action_min,
                max: self.force_action_max,
            });
        }
        Ok(())
    }
}
