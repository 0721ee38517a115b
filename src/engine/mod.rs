use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::constants::{get_spawn_positions, get_time_pressure, SYSTEM_ACTOR};
use crate::error::{ConfigError, EngineError};
use crate::event_log::BoundedLog;
use crate::movement::{step_toward, step_toward_n};
use crate::rng::{RandomSource, Rng};
use crate::types::{
    ActorActivity, Agent, AgentAction, AgentView, BehaviorState, Cell, CellKind, CurrentActor,
    EnvironmentItem, EventKind, GameEvent, GameOutcome, GamePhase, GameSnapshot, GameState,
    Participant, SubPhase, Vec2,
};
use crate::world::{cells_in_range, nearest_of_kind, random_empty_cell, Grid};

mod behavior_system;
mod conflict_system;
mod environment_system;
mod outcome_system;
mod utils;

use self::utils::{format_pos, sanitize_name, DISTRACTION_KINDS};

/// One game instance. Every mutation goes through `&mut self`, so a caller
/// holding the engine holds the whole game.
#[derive(Clone, Debug)]
pub struct GameEngine<R = Rng, C = SystemClock> {
    pub config: EngineConfig,
    state: GameState,
    rng: R,
    clock: C,
}

impl<R: RandomSource, C: Clock> GameEngine<R, C> {
    pub fn new(
        id: impl Into<String>,
        config: EngineConfig,
        rng: R,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = GameState {
            id: id.into(),
            phase: GamePhase::Lobby,
            sub_phase: SubPhase::Normal,
            grid: Grid::default(),
            tick_count: 0,
            max_ticks: config.max_ticks,
            total_score: 0,
            target_score: config.target_score,
            feature_progress: 0.0,
            time_remaining_percent: 100.0,
            outcome: None,
            agents: Vec::new(),
            event_log: BoundedLog::new(config.event_log_capacity),
            logs: BoundedLog::new(config.text_log_capacity),
            current_actor: None,
            next_agent_number: 1,
        };
        Ok(Self {
            config,
            state,
            rng,
            clock,
        })
    }

    /// Rebuilds an engine around a state the caller persisted earlier.
    /// `max_ticks` and `target_score` come from the state, not the config;
    /// log capacities come from the config. Pass the generator saved by
    /// [`GameEngine::into_parts`] to continue the same random sequence.
    pub fn from_state(
        mut state: GameState,
        config: EngineConfig,
        rng: R,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if state.phase != GamePhase::Lobby
            && (state.grid.width != config.width || state.grid.height != config.height)
        {
            return Err(ConfigError::GridMismatch {
                expected_width: config.width,
                expected_height: config.height,
                width: state.grid.width,
                height: state.grid.height,
            });
        }
        state.event_log.set_capacity(config.event_log_capacity);
        state.logs.set_capacity(config.text_log_capacity);
        Ok(Self {
            config,
            state,
            rng,
            clock,
        })
    }

    pub fn id(&self) -> &str {
        &self.state.id
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    pub fn is_over(&self) -> bool {
        self.state.phase == GamePhase::Over
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    pub fn rng(&self) -> &R {
        &self.rng
    }

    /// State plus the generator positioned after the last draw.
    pub fn into_parts(self) -> (GameState, R) {
        (self.state, self.rng)
    }

    pub fn admit(&mut self, participant: Participant) -> Result<AgentView, EngineError> {
        self.require_phase(GamePhase::Lobby)?;
        if self
            .state
            .agents
            .iter()
            .any(|agent| agent.participant_id == participant.id)
        {
            return Err(EngineError::InvalidAction(format!(
                "participant {} already joined",
                participant.id
            )));
        }

        let id = format!("agent_{}", self.state.next_agent_number);
        self.state.next_agent_number = self.state.next_agent_number.saturating_add(1);
        let agent = Agent {
            id,
            participant_id: participant.id,
            name: sanitize_name(&participant.name),
            x: 0,
            y: 0,
            state: BehaviorState::Idle,
            score_count: 0,
            has_headphones: false,
            headphone_ticks_left: 0,
            speed_multiplier: 1.0,
            last_action_tick: 0,
            distraction_time: 0,
            conflict_penalty_ticks_left: 0,
            conflict_count: 0,
            force_action_count: 0,
        };
        let view = agent.to_view();
        self.state.agents.push(agent);
        let idx = self.state.agents.len() - 1;
        self.log_agent(idx, EventKind::Joined, "joined the hackathon");
        Ok(view)
    }

    pub fn start(&mut self) -> Result<(), EngineError> {
        self.require_phase(GamePhase::Lobby)?;
        let count = self.state.agents.len();
        if count < self.config.min_participants {
            return Err(EngineError::InsufficientParticipants {
                required: self.config.min_participants,
                actual: count,
            });
        }

        self.state.grid = Grid::with_layout(self.config.width, self.config.height);
        let slots = get_spawn_positions(count, self.config.width, self.config.height);
        for (agent, slot) in self.state.agents.iter_mut().zip(slots) {
            agent.x = slot.x;
            agent.y = slot.y;
        }
        self.state.phase = GamePhase::Active;
        self.recalculate_progress();
        self.log_system(
            EventKind::GameStarted,
            format!(
                "Hackathon started with {count} agents. Ship {} commits within {} ticks.",
                self.state.target_score, self.state.max_ticks
            ),
        );
        info!(game_id = %self.state.id, agents = count, "game started");
        Ok(())
    }

    /// Runs one tick of the pipeline. Returns `false` without touching the
    /// state when the game is not active.
    pub fn advance_tick(&mut self) -> bool {
        if self.state.phase != GamePhase::Active {
            return false;
        }
        self.state.tick_count += 1;

        self.sweep_expired();
        self.inject_events();
        let sat_out = self.resolve_agents();
        self.detect_conflicts(&sat_out);
        self.recalculate_progress();
        self.evaluate_outcome();
        true
    }

    pub fn apply_action(
        &mut self,
        participant_id: &str,
        action: AgentAction,
    ) -> Result<String, EngineError> {
        self.require_phase(GamePhase::Active)?;
        let idx = self.agent_index(participant_id)?;
        self.require_unblocked(idx)?;

        let pos = self.state.agents[idx].pos();
        let message = match action {
            AgentAction::Commit => {
                let on_repo = self
                    .state
                    .grid
                    .cell(pos.x, pos.y)
                    .map(|cell| cell.kind == CellKind::Repo && cell.active)
                    .unwrap_or(false);
                if !on_repo {
                    return Err(EngineError::NotOnRequiredCell {
                        required: "an active repo",
                    });
                }
                self.commit(idx, false);
                format!(
                    "Committed. Team total {}/{}",
                    self.state.total_score, self.state.target_score
                )
            }
            AgentAction::Move { x, y } => {
                let bounds = self.state.grid.bounds();
                let target = bounds.clamp(x, y);
                let next = step_toward(pos.x, pos.y, target.x, target.y, bounds);
                let agent = &mut self.state.agents[idx];
                agent.x = next.x;
                agent.y = next.y;
                agent.last_action_tick = self.state.tick_count;
                self.log_agent(
                    idx,
                    EventKind::Moved,
                    format!("moved to {}", format_pos(next)),
                );
                format!("Moved to {}", format_pos(next))
            }
            AgentAction::Consume => {
                let Some(kind) = self.consume_at(idx, pos) else {
                    return Err(EngineError::NotOnRequiredCell {
                        required: "a consumable",
                    });
                };
                format!("Consumed {}", kind.label())
            }
        };

        self.recalculate_progress();
        self.evaluate_outcome();
        Ok(message)
    }

    /// Parses a named action with JSON params, then applies it. Phase and
    /// agent checks run before parsing.
    pub fn apply_named_action(
        &mut self,
        participant_id: &str,
        name: &str,
        params: &Value,
    ) -> Result<String, EngineError> {
        self.require_phase(GamePhase::Active)?;
        self.agent_index(participant_id)?;
        let action = AgentAction::parse(name, params)?;
        self.apply_action(participant_id, action)
    }

    pub fn place_environment_item(
        &mut self,
        item: EnvironmentItem,
        x: Option<i32>,
        y: Option<i32>,
    ) -> Result<String, EngineError> {
        self.require_phase(GamePhase::Active)?;

        let Some(kind) = item.cell_kind() else {
            return Ok(self.crash_all_nodes());
        };
        let (Some(x), Some(y)) = (x, y) else {
            return Err(EngineError::InvalidAction(format!(
                "{} needs x and y",
                kind.label()
            )));
        };
        let grid = &self.state.grid;
        let Some(cell) = grid.cell(x, y) else {
            return Err(EngineError::OutOfBounds {
                x,
                y,
                width: grid.width,
                height: grid.height,
            });
        };
        if cell.kind != CellKind::Empty {
            return Err(EngineError::CellOccupied { x, y });
        }

        let pos = Vec2 { x, y };
        self.state.grid.place_consumable(
            pos,
            kind,
            self.state.tick_count,
            self.config.consumable_lifetime_ticks,
        );
        let message = format!("Placed {} at {}", kind.label(), format_pos(pos));
        self.log_system(EventKind::ItemPlaced, message.clone());
        Ok(message)
    }

    pub fn place_named_item(
        &mut self,
        name: &str,
        x: Option<i32>,
        y: Option<i32>,
    ) -> Result<String, EngineError> {
        let item = EnvironmentItem::parse(name).ok_or_else(|| {
            EngineError::InvalidAction(format!("unknown environment action '{name}'"))
        })?;
        self.place_environment_item(item, x, y)
    }

    /// Marks which participant is deliberating, or clears the marker.
    pub fn set_actor_activity(
        &mut self,
        participant_id: &str,
        activity: Option<ActorActivity>,
    ) -> Result<(), EngineError> {
        if self.state.phase == GamePhase::Over {
            return Err(EngineError::InvalidPhase {
                expected: GamePhase::Active,
                actual: GamePhase::Over,
            });
        }
        let idx = self.agent_index(participant_id)?;
        self.state.current_actor = activity.map(|activity| CurrentActor {
            name: self.state.agents[idx].name.clone(),
            activity,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let state = &self.state;
        GameSnapshot {
            id: state.id.clone(),
            phase: state.phase,
            sub_phase: state.sub_phase,
            tick_count: state.tick_count,
            max_ticks: state.max_ticks,
            time_remaining_percent: state.time_remaining_percent,
            feature_progress: state.feature_progress,
            total_score: state.total_score,
            target_score: state.target_score,
            outcome: state.outcome,
            grid: state.grid.rows.clone(),
            agents: state.agents.iter().map(Agent::to_view).collect(),
            event_log: state.event_log.to_vec(),
            logs: state.logs.to_vec(),
            current_actor_name: state.current_actor.as_ref().map(|actor| actor.name.clone()),
            current_actor_state: state.current_actor.as_ref().map(|actor| actor.activity),
        }
    }

    fn require_phase(&self, expected: GamePhase) -> Result<(), EngineError> {
        if self.state.phase != expected {
            return Err(EngineError::InvalidPhase {
                expected,
                actual: self.state.phase,
            });
        }
        Ok(())
    }

    fn require_unblocked(&self, idx: usize) -> Result<(), EngineError> {
        if self.state.agents[idx].is_penalized() {
            return Err(EngineError::InvalidAction(format!(
                "{} is stuck in a merge conflict",
                self.state.agents[idx].name
            )));
        }
        Ok(())
    }

    fn agent_index(&self, participant_id: &str) -> Result<usize, EngineError> {
        self.state
            .agents
            .iter()
            .position(|agent| agent.participant_id == participant_id)
            .ok_or_else(|| EngineError::NotFound(format!("participant {participant_id}")))
    }

    fn log_system(&mut self, action: EventKind, detail: impl Into<String>) {
        self.push_event(
            SYSTEM_ACTOR.to_string(),
            SYSTEM_ACTOR.to_string(),
            action,
            detail.into(),
        );
    }

    fn log_agent(&mut self, idx: usize, action: EventKind, detail: impl Into<String>) {
        let agent = &self.state.agents[idx];
        let (id, name) = (agent.id.clone(), agent.name.clone());
        self.push_event(id, name, action, detail.into());
    }

    fn push_event(&mut self, agent_id: String, agent_name: String, action: EventKind, detail: String) {
        let tick = self.state.tick_count;
        debug!(game_id = %self.state.id, tick, ?action, agent = %agent_name, "{detail}");

        let line = if agent_id == SYSTEM_ACTOR {
            format!("[tick {tick}] {detail}")
        } else {
            format!("[tick {tick}] {agent_name} {detail}")
        };
        self.state.logs.push(line);
        self.state.event_log.push(GameEvent {
            agent_id,
            agent_name,
            action,
            detail,
            tick,
            timestamp: self.clock.now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::clock::FixedClock;
    use crate::constants::{GRID_HEIGHT, GRID_WIDTH};
    use crate::rng::{Rng, ScriptedRng};

    type TestEngine = GameEngine<ScriptedRng, FixedClock>;

    fn participant(n: usize) -> Participant {
        Participant {
            id: format!("p{n}"),
            name: format!("Dev {n}"),
        }
    }

    fn lobby(config: EngineConfig, players: usize) -> TestEngine {
        let mut engine = GameEngine::new("g1", config, ScriptedRng::quiet(), FixedClock::epoch())
            .expect("config should be valid");
        for n in 1..=players {
            engine.admit(participant(n)).expect("admit in lobby");
        }
        engine
    }

    fn started(config: EngineConfig, players: usize) -> TestEngine {
        let mut engine = lobby(config, players);
        engine.start().expect("enough participants");
        engine
    }

    fn quiet_config() -> EngineConfig {
        EngineConfig::default().without_random_events()
    }

    fn place_agent(engine: &mut TestEngine, idx: usize, x: i32, y: i32) {
        engine.state.agents[idx].x = x;
        engine.state.agents[idx].y = y;
    }

    fn score_sum(state: &GameState) -> u32 {
        state.agents.iter().map(|agent| agent.score_count).sum()
    }

    #[test]
    fn start_needs_three_participants() {
        let mut two = lobby(quiet_config(), 2);
        assert_eq!(
            two.start(),
            Err(EngineError::InsufficientParticipants {
                required: 3,
                actual: 2
            })
        );
        assert_eq!(two.phase(), GamePhase::Lobby);

        let mut three = lobby(quiet_config(), 3);
        three.start().expect("three participants should start");
        assert_eq!(three.phase(), GamePhase::Active);
        assert_eq!(three.state().grid.width, GRID_WIDTH);
    }

    #[test]
    fn start_spreads_agents_along_bottom_edge() {
        let engine = started(quiet_config(), 3);
        let positions: Vec<Vec2> = engine.state().agents.iter().map(Agent::pos).collect();
        assert_eq!(
            positions,
            vec![
                Vec2 { x: 5, y: GRID_HEIGHT - 1 },
                Vec2 { x: 10, y: GRID_HEIGHT - 1 },
                Vec2 { x: 15, y: GRID_HEIGHT - 1 },
            ]
        );
    }

    #[test]
    fn admit_rejects_duplicates_and_late_joiners() {
        let mut engine = lobby(quiet_config(), 3);
        assert!(matches!(
            engine.admit(participant(2)),
            Err(EngineError::InvalidAction(_))
        ));
        engine.start().expect("start");
        assert!(matches!(
            engine.admit(participant(9)),
            Err(EngineError::InvalidPhase {
                expected: GamePhase::Lobby,
                actual: GamePhase::Active
            })
        ));
    }

    #[test]
    fn admit_assigns_agent_ids_and_sanitizes_names() {
        let mut engine = lobby(quiet_config(), 0);
        let first = engine
            .admit(Participant {
                id: "u1".to_string(),
                name: "   ".to_string(),
            })
            .expect("admit");
        let second = engine
            .admit(Participant {
                id: "u2".to_string(),
                name: "  Grace Hopper  ".to_string(),
            })
            .expect("admit");
        assert_eq!(first.id, "agent_1");
        assert_eq!(first.name, "Agent");
        assert_eq!(second.id, "agent_2");
        assert_eq!(second.name, "Grace Hopper");
        assert_eq!(second.state, BehaviorState::Idle);
    }

    #[test]
    fn tick_count_advances_by_one_and_stops_when_over() {
        let mut engine = started(quiet_config(), 3);
        for expected in 1..=5 {
            assert!(engine.advance_tick());
            assert_eq!(engine.state().tick_count, expected);
        }

        let mut lobby_only = lobby(quiet_config(), 3);
        assert!(!lobby_only.advance_tick());
        assert_eq!(lobby_only.state().tick_count, 0);
    }

    #[test]
    fn timeout_ends_game_at_max_ticks() {
        let config = EngineConfig {
            max_ticks: 6,
            target_score: 1_000,
            ..quiet_config()
        };
        let mut engine = started(config, 3);
        while engine.advance_tick() {}
        assert_eq!(engine.state().tick_count, 6);
        assert_eq!(engine.state().outcome, Some(GameOutcome::Timeout));
        assert!(!engine.advance_tick());
        assert_eq!(engine.state().tick_count, 6);
    }

    #[test]
    fn win_freezes_state() {
        let config = EngineConfig {
            target_score: 1,
            ..quiet_config()
        };
        let mut engine = started(config, 3);
        place_agent(&mut engine, 0, 3, 4);

        assert!(engine.advance_tick());
        assert_eq!(engine.state().tick_count, 1);
        assert_eq!(engine.state().total_score, 1);
        assert_eq!(engine.phase(), GamePhase::Over);
        assert_eq!(engine.state().outcome, Some(GameOutcome::Win));
        assert_eq!(
            engine.state().event_log.last().map(|event| event.action),
            Some(EventKind::GameOver)
        );

        let frozen = engine.state().clone();
        assert!(!engine.advance_tick());
        assert_eq!(engine.state(), &frozen);
        assert!(matches!(
            engine.apply_action("p1", AgentAction::Commit),
            Err(EngineError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn shared_repo_causes_conflict_that_clears_after_five_ticks() {
        let mut engine = started(quiet_config(), 3);
        place_agent(&mut engine, 0, 3, 4);
        place_agent(&mut engine, 1, 4, 3);

        engine.advance_tick();
        for idx in 0..2 {
            let agent = &engine.state().agents[idx];
            assert_eq!(agent.pos(), Vec2 { x: 3, y: 3 });
            assert_eq!(agent.state, BehaviorState::MergeConflict);
            assert_eq!(agent.conflict_penalty_ticks_left, 5);
            assert_eq!(agent.conflict_count, 1);
        }

        for _ in 0..4 {
            engine.advance_tick();
            assert_eq!(engine.state().agents[0].state, BehaviorState::MergeConflict);
        }
        engine.advance_tick();
        for idx in 0..2 {
            let agent = &engine.state().agents[idx];
            assert_eq!(agent.state, BehaviorState::Coding);
            assert_eq!(agent.conflict_penalty_ticks_left, 0);
            assert_eq!(agent.pos(), Vec2 { x: 3, y: 3 });
        }
    }

    #[test]
    fn explicit_commit_requires_active_repo() {
        let mut engine = started(quiet_config(), 3);
        assert_eq!(
            engine.apply_action("p1", AgentAction::Commit),
            Err(EngineError::NotOnRequiredCell {
                required: "an active repo"
            })
        );

        place_agent(&mut engine, 0, 3, 3);
        engine.state.grid.cell_mut(3, 3).expect("repo").active = false;
        assert!(engine.apply_action("p1", AgentAction::Commit).is_err());

        engine.state.grid.cell_mut(3, 3).expect("repo").active = true;
        engine
            .apply_action("p1", AgentAction::Commit)
            .expect("commit on repo");
        assert_eq!(engine.state().total_score, 1);
        assert_eq!(engine.state().agents[0].score_count, 1);
    }

    #[test]
    fn explicit_commit_never_gambles_under_crunch() {
        let config = EngineConfig {
            max_ticks: 10,
            ..quiet_config()
        };
        let mut engine = started(config, 3);
        engine.rng = ScriptedRng::new(&[], 0.0);
        engine.state.tick_count = 9;
        engine.state.total_score = 3;
        engine.state.agents[1].score_count = 3;
        place_agent(&mut engine, 0, 16, 3);

        engine
            .apply_action("p1", AgentAction::Commit)
            .expect("commit");
        assert_eq!(engine.state().total_score, 4);
        assert_eq!(engine.state().agents[0].force_action_count, 0);
    }

    #[test]
    fn explicit_move_takes_one_clamped_step() {
        let mut engine = started(quiet_config(), 3);
        let message = engine
            .apply_named_action("p1", "move", &json!({"x": -40, "y": 99}))
            .expect("move");
        assert_eq!(message, "Moved to (4, 14)");
        assert_eq!(engine.state().agents[0].pos(), Vec2 { x: 4, y: 14 });
    }

    #[test]
    fn explicit_consume_applies_item_effect() {
        let mut engine = started(quiet_config(), 3);
        assert_eq!(
            engine.apply_action("p1", AgentAction::Consume),
            Err(EngineError::NotOnRequiredCell {
                required: "a consumable"
            })
        );

        engine
            .place_environment_item(EnvironmentItem::Headphones, Some(5), Some(14))
            .expect("empty spawn-row cell");
        engine
            .apply_action("p1", AgentAction::Consume)
            .expect("consume headphones");
        let agent = &engine.state().agents[0];
        assert!(agent.has_headphones);
        assert_eq!(agent.headphone_ticks_left, 15);
        assert_eq!(
            engine.state().grid.cell(5, 14).map(|cell| cell.kind),
            Some(CellKind::Empty)
        );
    }

    #[test]
    fn unknown_action_and_participant_are_rejected() {
        let mut engine = started(quiet_config(), 3);
        assert!(matches!(
            engine.apply_named_action("p1", "deploy", &Value::Null),
            Err(EngineError::InvalidAction(_))
        ));
        assert!(matches!(
            engine.apply_named_action("nobody", "commit", &Value::Null),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn penalized_agent_cannot_act() {
        let mut engine = started(quiet_config(), 3);
        engine.state.agents[0].conflict_penalty_ticks_left = 2;
        engine.state.agents[0].state = BehaviorState::MergeConflict;
        assert!(matches!(
            engine.apply_action("p1", AgentAction::Move { x: 0, y: 0 }),
            Err(EngineError::InvalidAction(_))
        ));
    }

    #[test]
    fn placement_validates_bounds_and_occupancy() {
        let mut engine = started(quiet_config(), 3);
        assert_eq!(
            engine.place_environment_item(EnvironmentItem::Pizza, Some(3), Some(3)),
            Err(EngineError::CellOccupied { x: 3, y: 3 })
        );
        assert_eq!(
            engine.place_environment_item(EnvironmentItem::Pizza, Some(20), Some(0)),
            Err(EngineError::OutOfBounds {
                x: 20,
                y: 0,
                width: GRID_WIDTH,
                height: GRID_HEIGHT
            })
        );
        assert!(matches!(
            engine.place_environment_item(EnvironmentItem::Pizza, None, Some(0)),
            Err(EngineError::InvalidAction(_))
        ));
        assert!(matches!(
            engine.place_named_item("place_coffee", Some(1), Some(1)),
            Err(EngineError::InvalidAction(_))
        ));

        engine
            .place_named_item("place_pizza", Some(1), Some(1))
            .expect("empty cell");
        let cell = engine.state().grid.cell(1, 1).expect("in bounds");
        assert_eq!(cell.kind, CellKind::Pizza);
        assert_eq!(cell.expires_at_tick, Some(30));
        assert_eq!(
            engine.place_environment_item(EnvironmentItem::EnergyDrink, Some(1), Some(1)),
            Err(EngineError::CellOccupied { x: 1, y: 1 })
        );
    }

    #[test]
    fn placement_requires_active_game() {
        let mut engine = lobby(quiet_config(), 3);
        assert!(matches!(
            engine.place_environment_item(EnvironmentItem::ServerCrash, None, None),
            Err(EngineError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn actor_activity_shows_in_snapshot() {
        let mut engine = started(quiet_config(), 3);
        engine
            .set_actor_activity("p2", Some(ActorActivity::Typing))
            .expect("known participant");
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.current_actor_name.as_deref(), Some("Dev 2"));
        assert_eq!(snapshot.current_actor_state, Some(ActorActivity::Typing));

        engine.set_actor_activity("p2", None).expect("clear");
        assert_eq!(engine.snapshot().current_actor_name, None);
        assert!(matches!(
            engine.set_actor_activity("nobody", None),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn snapshot_hides_participant_ids() {
        let engine = started(quiet_config(), 3);
        let value = serde_json::to_value(engine.snapshot()).expect("snapshot serializes");
        assert_eq!(value["phase"], json!("ACTIVE"));
        assert_eq!(value["agents"][0]["id"], json!("agent_1"));
        assert!(value["agents"][0].get("participantId").is_none());
        assert!(value["agents"][0].get("conflictPenaltyTicksLeft").is_none());
        assert_eq!(value["grid"].as_array().map(Vec::len), Some(GRID_HEIGHT as usize));
    }

    #[test]
    fn event_log_stays_bounded() {
        let config = EngineConfig {
            event_log_capacity: 4,
            text_log_capacity: 2,
            ..quiet_config()
        };
        let mut engine = started(config, 3);
        for _ in 0..10 {
            engine
                .apply_action("p1", AgentAction::Move { x: 0, y: 14 })
                .expect("move");
        }
        assert_eq!(engine.state().event_log.len(), 4);
        assert_eq!(engine.state().logs.len(), 2);
    }

    #[test]
    fn same_seed_runs_are_identical() {
        let config = EngineConfig {
            resource_spawn_chance: 0.3,
            bonus_event_chance: 0.1,
            outage_chance: 0.05,
            ..EngineConfig::default()
        };
        let run = |seed: u32| {
            let mut engine =
                GameEngine::new("g", config.clone(), Rng::new(seed), FixedClock::epoch())
                    .expect("valid config");
            for n in 1..=4 {
                engine.admit(participant(n)).expect("admit");
            }
            engine.start().expect("start");
            while engine.advance_tick() {}
            engine.into_state()
        };
        assert_eq!(run(2024), run(2024));
    }

    #[test]
    fn persisted_state_replays_identically() {
        let config = EngineConfig {
            resource_spawn_chance: 0.25,
            bonus_event_chance: 0.1,
            outage_chance: 0.05,
            ..EngineConfig::default()
        };
        let mut engine = GameEngine::new("g", config.clone(), Rng::new(77), FixedClock::epoch())
            .expect("valid config");
        for n in 1..=3 {
            engine.admit(participant(n)).expect("admit");
        }
        engine.start().expect("start");
        for _ in 0..20 {
            engine.advance_tick();
        }

        let json = serde_json::to_string(engine.state()).expect("state serializes");
        let restored: GameState = serde_json::from_str(&json).expect("state deserializes");
        assert_eq!(&restored, engine.state());

        let mut original = engine.clone();
        original.rng = Rng::new(500);
        let mut replay =
            GameEngine::from_state(restored, config, Rng::new(500), FixedClock::epoch())
                .expect("restorable");
        for _ in 0..40 {
            assert_eq!(original.advance_tick(), replay.advance_tick());
            assert_eq!(original.state(), replay.state());
        }
    }

    #[test]
    fn rebuilding_every_tick_with_saved_rng_matches_continuous_run() {
        let config = EngineConfig {
            resource_spawn_chance: 0.5,
            bonus_event_chance: 0.1,
            outage_chance: 0.05,
            ..EngineConfig::default()
        };
        let mut continuous =
            GameEngine::new("g", config.clone(), Rng::new(3), FixedClock::epoch())
                .expect("valid config");
        for n in 1..=3 {
            continuous.admit(participant(n)).expect("admit");
        }
        continuous.start().expect("start");
        let mut rebuilt = continuous.clone();

        for _ in 0..20 {
            let stored = serde_json::to_string(&rebuilt.into_parts()).expect("parts serialize");
            let (state, rng): (GameState, Rng) =
                serde_json::from_str(&stored).expect("parts deserialize");
            rebuilt = GameEngine::from_state(state, config.clone(), rng, FixedClock::epoch())
                .expect("restorable");

            assert_eq!(continuous.advance_tick(), rebuilt.advance_tick());
            assert_eq!(continuous.state(), rebuilt.state());
            assert_eq!(continuous.rng(), rebuilt.rng());
        }
        let spawned = continuous
            .state()
            .event_log
            .iter()
            .filter(|event| event.action == EventKind::ResourceSpawned)
            .count();
        assert!(spawned > 0);
    }

    #[test]
    fn from_state_applies_configured_log_capacities() {
        let config = quiet_config();
        let mut state = started(config.clone(), 3).into_state();
        state.event_log =
            serde_json::from_str(r#"{"capacity":0,"entries":[]}"#).expect("log deserializes");

        let mut engine =
            GameEngine::from_state(state, config.clone(), ScriptedRng::quiet(), FixedClock::epoch())
                .expect("restorable");
        assert_eq!(engine.state().event_log.capacity(), config.event_log_capacity);
        for _ in 0..5 {
            engine.advance_tick();
        }
        assert!(engine.state().event_log.len() <= config.event_log_capacity);
        assert_eq!(engine.state().logs.capacity(), config.text_log_capacity);
    }

    #[test]
    fn from_state_rejects_mismatched_grid() {
        let engine = started(quiet_config(), 3);
        let state = engine.into_state();
        let config = EngineConfig {
            width: 30,
            ..quiet_config()
        };
        assert!(GameEngine::from_state(state, config, Rng::new(1), FixedClock::epoch()).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn total_score_matches_agent_scores(seed in any::<u32>(), agents in 3usize..7, max_ticks in 20u32..80) {
            let config = EngineConfig {
                max_ticks,
                target_score: 25,
                resource_spawn_chance: 0.2,
                bonus_event_chance: 0.1,
                outage_chance: 0.05,
                crunch_threshold: 0.4,
                ..EngineConfig::default()
            };
            let mut engine = GameEngine::new("p", config, Rng::new(seed), FixedClock::epoch())
                .expect("valid config");
            for n in 1..=agents {
                engine.admit(participant(n)).expect("admit");
            }
            engine.start().expect("start");

            let mut last_tick = 0;
            while engine.advance_tick() {
                let state = engine.state();
                prop_assert_eq!(state.tick_count, last_tick + 1);
                last_tick = state.tick_count;
                prop_assert_eq!(state.total_score, score_sum(state));
                for agent in &state.agents {
                    prop_assert!(state.grid.in_bounds(agent.x, agent.y));
                    if agent.is_penalized() {
                        prop_assert_eq!(agent.state, BehaviorState::MergeConflict);
                    }
                }
            }
            prop_assert!(engine.state().outcome.is_some());
        }
    }
}
