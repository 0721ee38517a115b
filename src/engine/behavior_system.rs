use super::*;

impl<R: RandomSource, C: Clock> GameEngine<R, C> {
    /// Moves every agent once, in list order. Returns the agents that sat
    /// out the tick serving a conflict penalty.
    pub(super) fn resolve_agents(&mut self) -> HashSet<usize> {
        let mut sat_out = HashSet::new();
        for idx in 0..self.state.agents.len() {
            if self.tick_penalty(idx) {
                sat_out.insert(idx);
                continue;
            }
            self.tick_headphones(idx);
            self.resolve_agent(idx);
        }
        sat_out
    }

    fn tick_penalty(&mut self, idx: usize) -> bool {
        let agent = &mut self.state.agents[idx];
        if agent.conflict_penalty_ticks_left == 0 {
            return false;
        }
        agent.conflict_penalty_ticks_left -= 1;
        if agent.conflict_penalty_ticks_left == 0 {
            agent.state = BehaviorState::Coding;
            self.log_agent(idx, EventKind::ConflictResolved, "resolved the merge conflict");
        }
        true
    }

    fn tick_headphones(&mut self, idx: usize) {
        let agent = &mut self.state.agents[idx];
        if !agent.has_headphones {
            return;
        }
        agent.headphone_ticks_left = agent.headphone_ticks_left.saturating_sub(1);
        if agent.headphone_ticks_left == 0 {
            agent.has_headphones = false;
            self.log_agent(idx, EventKind::HeadphonesExpired, "took the headphones off");
        }
    }

    fn resolve_agent(&mut self, idx: usize) {
        let crunch = self.is_crunch_time();
        let steps = if crunch { self.config.crunch_steps } else { 1 };
        let bounds = self.state.grid.bounds();
        let agent = &mut self.state.agents[idx];
        agent.speed_multiplier = steps as f32;
        if crunch {
            agent.state = BehaviorState::Panicking;
        }
        let pos = agent.pos();

        if !self.state.agents[idx].has_headphones {
            let lure = cells_in_range(
                &self.state.grid,
                pos.x,
                pos.y,
                &DISTRACTION_KINDS,
                self.config.distraction_radius,
            )
            .first()
            .map(|cell| (cell.kind, cell.pos()));

            if let Some((kind, target)) = lure {
                let agent = &mut self.state.agents[idx];
                let newly_distracted = !crunch && agent.state != BehaviorState::Distracted;
                if !crunch {
                    agent.state = BehaviorState::Distracted;
                }
                let next = step_toward_n(pos, target, steps, bounds);
                agent.x = next.x;
                agent.y = next.y;
                if newly_distracted {
                    self.log_agent(
                        idx,
                        EventKind::Distracted,
                        format!("smelled {} at {}", kind.label(), format_pos(target)),
                    );
                }
                if next == target {
                    self.consume_at(idx, target);
                }
                return;
            }
        }

        if !crunch {
            self.state.agents[idx].state = BehaviorState::Coding;
        }
        let Some(repo) =
            nearest_of_kind(&self.state.grid, pos.x, pos.y, CellKind::Repo, true).map(Cell::pos)
        else {
            return;
        };
        let next = step_toward_n(pos, repo, steps, bounds);
        let agent = &mut self.state.agents[idx];
        agent.x = next.x;
        agent.y = next.y;
        if next == repo {
            self.commit(idx, crunch);
        }
    }

    /// Claims the consumable under `pos` for agent `idx`. Returns `None`
    /// when there is nothing to claim.
    pub(super) fn consume_at(&mut self, idx: usize, pos: Vec2) -> Option<CellKind> {
        let kind = self
            .state
            .grid
            .cell(pos.x, pos.y)
            .filter(|cell| cell.active && cell.kind.is_consumable())
            .map(|cell| cell.kind)?;

        let config = &self.config;
        let agent = &mut self.state.agents[idx];
        let detail = match kind {
            CellKind::Pizza => {
                agent.distraction_time += config.pizza_distraction_ticks;
                format!("ate pizza (+{} distraction)", config.pizza_distraction_ticks)
            }
            CellKind::EnergyDrink => {
                agent.distraction_time += config.energy_drink_distraction_ticks;
                format!(
                    "downed an energy drink (+{} distraction)",
                    config.energy_drink_distraction_ticks
                )
            }
            CellKind::Headphones => {
                agent.has_headphones = true;
                agent.headphone_ticks_left = config.headphone_duration_ticks;
                format!(
                    "put on noise-cancelling headphones ({} ticks)",
                    config.headphone_duration_ticks
                )
            }
            _ => return None,
        };
        agent.last_action_tick = self.state.tick_count;
        self.state.grid.clear_cell(pos);
        self.log_agent(idx, EventKind::Consumed, detail);
        Some(kind)
    }

    /// One scoring attempt. Under time pressure a coin flip may turn it into
    /// a force push that erases team progress instead.
    pub(super) fn commit(&mut self, idx: usize, under_time_pressure: bool) {
        self.state.agents[idx].last_action_tick = self.state.tick_count;
        if under_time_pressure && self.rng.bool(self.config.force_action_chance) {
            self.force_push(idx);
            return;
        }

        self.state.agents[idx].score_count += 1;
        self.state.total_score += 1;
        self.log_agent(
            idx,
            EventKind::Commit,
            format!(
                "committed code ({}/{})",
                self.state.total_score, self.state.target_score
            ),
        );
    }

    fn force_push(&mut self, idx: usize) {
        let wanted = self.rng.int(
            self.config.force_action_min as i32,
            self.config.force_action_max as i32,
        );
        let erased = (wanted.max(0) as u32).min(self.state.total_score);
        self.state.agents[idx].force_action_count += 1;
        self.remove_score(idx, erased);
        self.log_agent(
            idx,
            EventKind::ForcePush,
            format!(
                "force-pushed and wiped {erased} commits ({}/{})",
                self.state.total_score, self.state.target_score
            ),
        );
    }

    /// Takes `amount` off the team total, drawing from the pusher's own
    /// commits first and then teammates in list order.
    fn remove_score(&mut self, first: usize, amount: u32) {
        let others = (0..self.state.agents.len()).filter(|idx| *idx != first);
        let mut remaining = amount;
        for idx in std::iter::once(first).chain(others) {
            if remaining == 0 {
                break;
            }
            let agent = &mut self.state.agents[idx];
            let taken = remaining.min(agent.score_count);
            agent.score_count -= taken;
            remaining -= taken;
        }
        self.state.total_score = self.state.total_score.saturating_sub(amount - remaining);
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::FixedClock;
    use crate::config::EngineConfig;
    use crate::engine::GameEngine;
    use crate::rng::ScriptedRng;
    use crate::types::{BehaviorState, CellKind, EnvironmentItem, EventKind, Participant, Vec2};

    type TestEngine = GameEngine<ScriptedRng, FixedClock>;

    fn engine_with(config: EngineConfig) -> TestEngine {
        let mut engine = GameEngine::new("beh", config, ScriptedRng::quiet(), FixedClock::epoch())
            .expect("valid config");
        for n in 1..=3 {
            engine
                .admit(Participant {
                    id: format!("p{n}"),
                    name: format!("P{n}"),
                })
                .expect("admit");
        }
        engine.start().expect("start");
        engine
    }

    fn quiet() -> TestEngine {
        engine_with(EngineConfig::default().without_random_events())
    }

    fn place(engine: &mut TestEngine, idx: usize, x: i32, y: i32) {
        engine.state.agents[idx].x = x;
        engine.state.agents[idx].y = y;
    }

    #[test]
    fn agent_walks_to_nearest_repo_and_commits() {
        let mut engine = quiet();
        place(&mut engine, 0, 3, 6);
        engine.resolve_agent(0);
        assert_eq!(engine.state().agents[0].pos(), Vec2 { x: 3, y: 5 });
        assert_eq!(engine.state().agents[0].state, BehaviorState::Coding);
        engine.resolve_agent(0);
        engine.resolve_agent(0);
        assert_eq!(engine.state().agents[0].pos(), Vec2 { x: 3, y: 3 });
        assert_eq!(engine.state().agents[0].score_count, 1);
        assert_eq!(engine.state().total_score, 1);
    }

    #[test]
    fn nearby_pizza_distracts_and_is_eaten() {
        let mut engine = quiet();
        place(&mut engine, 0, 7, 10);
        engine
            .place_environment_item(EnvironmentItem::Pizza, Some(9), Some(10))
            .expect("empty cell");

        engine.resolve_agent(0);
        let agent = &engine.state().agents[0];
        assert_eq!(agent.state, BehaviorState::Distracted);
        assert_eq!(agent.pos(), Vec2 { x: 8, y: 10 });
        assert_eq!(
            engine.state().event_log.last().map(|event| event.action),
            Some(EventKind::Distracted)
        );

        engine.resolve_agent(0);
        let agent = &engine.state().agents[0];
        assert_eq!(agent.distraction_time, 5);
        assert_eq!(
            engine.state().grid.cell(9, 10).map(|cell| cell.kind),
            Some(CellKind::Empty)
        );
    }

    #[test]
    fn headphones_block_distraction_until_they_expire() {
        let mut engine = quiet();
        place(&mut engine, 0, 7, 10);
        engine.state.agents[0].has_headphones = true;
        engine.state.agents[0].headphone_ticks_left = 2;
        engine
            .place_environment_item(EnvironmentItem::EnergyDrink, Some(8), Some(10))
            .expect("empty cell");

        let resolved = engine.resolve_agents();
        assert!(resolved.is_empty());
        assert_eq!(engine.state().agents[0].state, BehaviorState::Coding);
        assert_eq!(engine.state().agents[0].pos(), Vec2 { x: 6, y: 10 });

        engine.resolve_agents();
        let agent = &engine.state().agents[0];
        assert!(!agent.has_headphones);
        assert_eq!(agent.state, BehaviorState::Distracted);
        assert_eq!(agent.pos(), Vec2 { x: 7, y: 10 });
    }

    #[test]
    fn headphones_are_picked_up_like_any_consumable() {
        let mut engine = quiet();
        place(&mut engine, 0, 1, 1);
        engine
            .place_environment_item(EnvironmentItem::Headphones, Some(1), Some(1))
            .expect("empty cell");
        assert_eq!(engine.consume_at(0, Vec2 { x: 1, y: 1 }), Some(CellKind::Headphones));
        assert_eq!(engine.consume_at(0, Vec2 { x: 1, y: 1 }), None);
        assert!(engine.state().agents[0].has_headphones);
    }

    #[test]
    fn crunch_time_doubles_steps_and_panics() {
        let config = EngineConfig {
            max_ticks: 20,
            ..EngineConfig::default().without_random_events()
        };
        let mut engine = engine_with(config);
        engine.state.tick_count = 18;
        place(&mut engine, 0, 3, 6);
        engine.resolve_agent(0);
        let agent = &engine.state().agents[0];
        assert_eq!(agent.state, BehaviorState::Panicking);
        assert_eq!(agent.pos(), Vec2 { x: 3, y: 4 });
        assert_eq!(agent.speed_multiplier, 2.0);
    }

    #[test]
    fn force_push_erases_own_commits_first() {
        let mut engine = quiet();
        engine.state.agents[0].score_count = 1;
        engine.state.agents[1].score_count = 4;
        engine.state.total_score = 5;
        // coin flip lands, erase count draws the maximum of three
        engine.rng = ScriptedRng::new(&[0.1, 0.99], 0.999);

        engine.commit(0, true);
        let state = engine.state();
        assert_eq!(state.total_score, 2);
        assert_eq!(state.agents[0].score_count, 0);
        assert_eq!(state.agents[1].score_count, 2);
        assert_eq!(state.agents[0].force_action_count, 1);
        assert_eq!(
            state.event_log.last().map(|event| event.action),
            Some(EventKind::ForcePush)
        );
    }

    #[test]
    fn force_push_is_capped_at_team_total() {
        let mut engine = quiet();
        engine.state.agents[2].score_count = 1;
        engine.state.total_score = 1;
        engine.rng = ScriptedRng::new(&[0.0, 0.99], 0.999);
        engine.commit(0, true);
        assert_eq!(engine.state().total_score, 0);
        assert_eq!(engine.state().agents[2].score_count, 0);
    }

    #[test]
    fn losing_coin_flip_under_pressure_still_commits() {
        let mut engine = quiet();
        engine.rng = ScriptedRng::new(&[0.7], 0.999);
        engine.commit(1, true);
        assert_eq!(engine.state().agents[1].score_count, 1);
        assert_eq!(engine.state().total_score, 1);
    }
}
