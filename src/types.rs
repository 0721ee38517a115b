use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::event_log::BoundedLog;
use crate::world::Grid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Empty,
    Repo,
    CoffeeStation,
    SupabaseNode,
    MongodbNode,
    Pizza,
    EnergyDrink,
    Headphones,
}

impl CellKind {
    pub fn is_consumable(self) -> bool {
        matches!(self, Self::Pizza | Self::EnergyDrink | Self::Headphones)
    }

    pub fn is_fixed_node(self) -> bool {
        matches!(
            self,
            Self::Repo | Self::CoffeeStation | Self::SupabaseNode | Self::MongodbNode
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Repo => "repo",
            Self::CoffeeStation => "coffee station",
            Self::SupabaseNode => "supabase node",
            Self::MongodbNode => "mongodb node",
            Self::Pizza => "pizza",
            Self::EnergyDrink => "energy drink",
            Self::Headphones => "headphones",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: CellKind,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawned_at_tick: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_tick: Option<u32>,
}

impl Cell {
    pub fn empty(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            kind: CellKind::Empty,
            active: true,
            spawned_at_tick: None,
            expires_at_tick: None,
        }
    }

    pub fn pos(&self) -> Vec2 {
        Vec2 {
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorState {
    Coding,
    Distracted,
    Panicking,
    MergeConflict,
    Idle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Lobby,
    Active,
    Over,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubPhase {
    Normal,
    CrunchTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameOutcome {
    Win,
    Timeout,
    AllBlocked,
    ResourceStarvation,
}

impl GameOutcome {
    pub fn key(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Timeout => "timeout",
            Self::AllBlocked => "all_blocked",
            Self::ResourceStarvation => "resource_starvation",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorActivity {
    Thinking,
    Typing,
}

impl ActorActivity {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "thinking" => Some(Self::Thinking),
            "typing" => Some(Self::Typing),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub participant_id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub state: BehaviorState,
    pub score_count: u32,
    pub has_headphones: bool,
    pub headphone_ticks_left: u32,
    pub speed_multiplier: f32,
    pub last_action_tick: u32,
    pub distraction_time: u32,
    pub conflict_penalty_ticks_left: u32,
    pub conflict_count: u32,
    pub force_action_count: u32,
}

impl Agent {
    pub fn pos(&self) -> Vec2 {
        Vec2 {
            x: self.x,
            y: self.y,
        }
    }

    pub fn is_penalized(&self) -> bool {
        self.conflict_penalty_ticks_left > 0
    }

    pub fn to_view(&self) -> AgentView {
        AgentView {
            id: self.id.clone(),
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            state: self.state,
            score_count: self.score_count,
            has_headphones: self.has_headphones,
            distraction_time: self.distraction_time,
            conflict_count: self.conflict_count,
            force_action_count: self.force_action_count,
        }
    }
}

/// Public projection of an [`Agent`]; omits the participant id and timers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    pub id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub state: BehaviorState,
    pub score_count: u32,
    pub has_headphones: bool,
    pub distraction_time: u32,
    pub conflict_count: u32,
    pub force_action_count: u32,
}

#[derive(Clone, Debug)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Joined,
    GameStarted,
    ResourceSpawned,
    ItemPlaced,
    ItemExpired,
    BonusAwarded,
    Outage,
    OutageResolved,
    Distracted,
    Consumed,
    HeadphonesExpired,
    Moved,
    Commit,
    ForcePush,
    MergeConflict,
    ConflictResolved,
    GameOver,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    pub agent_id: String,
    pub agent_name: String,
    pub action: EventKind,
    pub detail: String,
    pub tick: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentAction {
    Commit,
    Move { x: i32, y: i32 },
    Consume,
}

impl AgentAction {
    pub fn parse(name: &str, params: &Value) -> Result<Self, EngineError> {
        match name {
            "commit" => Ok(Self::Commit),
            "consume" => Ok(Self::Consume),
            "move" => {
                let x = required_coord(params, "x")?;
                let y = required_coord(params, "y")?;
                Ok(Self::Move { x, y })
            }
            other => Err(EngineError::InvalidAction(format!(
                "unknown action '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvironmentItem {
    Pizza,
    EnergyDrink,
    Headphones,
    ServerCrash,
}

impl EnvironmentItem {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "place_pizza" => Some(Self::Pizza),
            "place_energy_drink" => Some(Self::EnergyDrink),
            "place_headphones" => Some(Self::Headphones),
            "server_crash" => Some(Self::ServerCrash),
            _ => None,
        }
    }

    pub fn cell_kind(self) -> Option<CellKind> {
        match self {
            Self::Pizza => Some(CellKind::Pizza),
            Self::EnergyDrink => Some(CellKind::EnergyDrink),
            Self::Headphones => Some(CellKind::Headphones),
            Self::ServerCrash => None,
        }
    }
}

fn required_coord(params: &Value, key: &str) -> Result<i32, EngineError> {
    let value = params
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| EngineError::InvalidAction(format!("'{key}' must be an integer")))?;
    i32::try_from(value)
        .map_err(|_| EngineError::InvalidAction(format!("'{key}' is out of range")))
}

/// Canonical persisted form of one game. The collaborator stores this and
/// hands it back through `GameEngine::from_state`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub id: String,
    pub phase: GamePhase,
    pub sub_phase: SubPhase,
    pub grid: Grid,
    pub tick_count: u32,
    pub max_ticks: u32,
    pub total_score: u32,
    pub target_score: u32,
    pub feature_progress: f32,
    pub time_remaining_percent: f32,
    pub outcome: Option<GameOutcome>,
    pub agents: Vec<Agent>,
    pub event_log: BoundedLog<GameEvent>,
    pub logs: BoundedLog<String>,
    pub current_actor: Option<CurrentActor>,
    pub next_agent_number: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentActor {
    pub name: String,
    pub activity: ActorActivity,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub id: String,
    pub phase: GamePhase,
    pub sub_phase: SubPhase,
    pub tick_count: u32,
    pub max_ticks: u32,
    pub time_remaining_percent: f32,
    pub feature_progress: f32,
    pub total_score: u32,
    pub target_score: u32,
    pub outcome: Option<GameOutcome>,
    pub grid: Vec<Vec<Cell>>,
    pub agents: Vec<AgentView>,
    pub event_log: Vec<GameEvent>,
    pub logs: Vec<String>,
    pub current_actor_name: Option<String>,
    pub current_actor_state: Option<ActorActivity>,
}
