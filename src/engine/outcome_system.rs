use super::*;

impl<R: RandomSource, C: Clock> GameEngine<R, C> {
    pub(super) fn is_crunch_time(&self) -> bool {
        get_time_pressure(self.state.tick_count, self.state.max_ticks) <= self.config.crunch_threshold
    }

    pub(super) fn recalculate_progress(&mut self) {
        let crunch = self.is_crunch_time();
        let state = &mut self.state;
        state.feature_progress = if state.target_score == 0 {
            100.0
        } else {
            (state.total_score as f32 / state.target_score as f32 * 100.0).min(100.0)
        };
        state.time_remaining_percent =
            (get_time_pressure(state.tick_count, state.max_ticks) * 100.0).max(0.0);
        state.sub_phase = if crunch {
            SubPhase::CrunchTime
        } else {
            SubPhase::Normal
        };
    }

    /// First matching rule wins; a match closes the game for good.
    pub(super) fn evaluate_outcome(&mut self) {
        if self.state.phase != GamePhase::Active {
            return;
        }
        let state = &self.state;
        let agents = &state.agents;
        let outcome = if state.total_score >= state.target_score {
            GameOutcome::Win
        } else if state.tick_count >= state.max_ticks {
            GameOutcome::Timeout
        } else if !agents.is_empty()
            && agents
                .iter()
                .all(|agent| agent.state == BehaviorState::MergeConflict)
        {
            GameOutcome::AllBlocked
        } else if !agents.is_empty()
            && state.tick_count > self.config.starvation_min_tick
            && agents
                .iter()
                .all(|agent| agent.distraction_time.saturating_mul(2) > state.max_ticks)
        {
            GameOutcome::ResourceStarvation
        } else {
            return;
        };
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: GameOutcome) {
        self.state.phase = GamePhase::Over;
        self.state.outcome = Some(outcome);
        self.state.current_actor = None;
        let message = match outcome {
            GameOutcome::Win => format!(
                "Shipped! The team landed {}/{} commits.",
                self.state.total_score, self.state.target_score
            ),
            GameOutcome::Timeout => format!(
                "Time's up at {}/{} commits.",
                self.state.total_score, self.state.target_score
            ),
            GameOutcome::AllBlocked => "Every agent is stuck in a merge conflict.".to_string(),
            GameOutcome::ResourceStarvation => {
                "The team burned out on snacks before shipping.".to_string()
            }
        };
        self.log_system(EventKind::GameOver, message);
        info!(
            game_id = %self.state.id,
            tick = self.state.tick_count,
            outcome = outcome.key(),
            total_score = self.state.total_score,
            "game over"
        );
    }
}
