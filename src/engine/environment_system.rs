use super::*;

impl<R: RandomSource, C: Clock> GameEngine<R, C> {
    /// Reverts every timed cell whose window has closed: consumables go back
    /// to empty, downed repos come back online.
    pub(super) fn sweep_expired(&mut self) {
        let tick = self.state.tick_count;
        let mut expired: Vec<(CellKind, Vec2)> = Vec::new();
        for row in &mut self.state.grid.rows {
            for cell in row.iter_mut() {
                let Some(expires_at) = cell.expires_at_tick else {
                    continue;
                };
                if expires_at > tick {
                    continue;
                }
                expired.push((cell.kind, cell.pos()));
                if cell.kind.is_consumable() {
                    *cell = Cell::empty(cell.x, cell.y);
                } else {
                    cell.active = true;
                    cell.spawned_at_tick = None;
                    cell.expires_at_tick = None;
                }
            }
        }

        for (kind, pos) in expired {
            if kind.is_consumable() {
                self.log_system(
                    EventKind::ItemExpired,
                    format!("{} at {} went stale", kind.label(), format_pos(pos)),
                );
            } else {
                self.log_system(
                    EventKind::OutageResolved,
                    format!("{} at {} is back online", kind.label(), format_pos(pos)),
                );
            }
        }
    }

    /// Resource, bonus and outage rolls, always drawn in that order.
    pub(super) fn inject_events(&mut self) {
        self.maybe_spawn_resource();
        self.maybe_award_bonus();
        self.maybe_trigger_outage();
    }

    fn maybe_spawn_resource(&mut self) {
        if !self.rng.bool(self.config.resource_spawn_chance) {
            return;
        }
        let kind = if self.rng.pick_index(DISTRACTION_KINDS.len()) == 0 {
            CellKind::Pizza
        } else {
            CellKind::EnergyDrink
        };
        let Some(pos) = random_empty_cell(&self.state.grid, &mut self.rng) else {
            return;
        };
        self.state.grid.place_consumable(
            pos,
            kind,
            self.state.tick_count,
            self.config.consumable_lifetime_ticks,
        );
        self.log_system(
            EventKind::ResourceSpawned,
            format!("{} appeared at {}", kind.label(), format_pos(pos)),
        );
    }

    fn maybe_award_bonus(&mut self) {
        if !self.rng.bool(self.config.bonus_event_chance) || self.state.agents.is_empty() {
            return;
        }
        let idx = self.rng.pick_index(self.state.agents.len());
        if self.state.agents[idx].is_penalized() {
            return;
        }
        let bonus = self.config.bonus_score;
        self.state.agents[idx].score_count += bonus;
        self.state.total_score += bonus;
        self.log_agent(
            idx,
            EventKind::BonusAwarded,
            format!(
                "got a mentor shout-out (+{bonus}, total {}/{})",
                self.state.total_score, self.state.target_score
            ),
        );
    }

    fn maybe_trigger_outage(&mut self) {
        if !self.rng.bool(self.config.outage_chance) {
            return;
        }
        let nodes = self.state.grid.scoring_nodes(true);
        if nodes.is_empty() {
            return;
        }
        let pos = nodes[self.rng.pick_index(nodes.len())];
        self.take_node_offline(pos);
        warn!(game_id = %self.state.id, tick = self.state.tick_count, x = pos.x, y = pos.y, "repo outage");
        self.log_system(
            EventKind::Outage,
            format!(
                "repo at {} is down for {} ticks",
                format_pos(pos),
                self.config.outage_duration_ticks
            ),
        );
    }

    /// Server crash: every active repo goes down at once.
    pub(super) fn crash_all_nodes(&mut self) -> String {
        let nodes = self.state.grid.scoring_nodes(true);
        for pos in &nodes {
            self.take_node_offline(*pos);
        }
        warn!(game_id = %self.state.id, tick = self.state.tick_count, repos = nodes.len(), "server crash");
        let message = format!(
            "Server crash! {} repos offline for {} ticks",
            nodes.len(),
            self.config.outage_duration_ticks
        );
        self.log_system(EventKind::Outage, message.clone());
        message
    }

    fn take_node_offline(&mut self, pos: Vec2) {
        let tick = self.state.tick_count;
        let duration = self.config.outage_duration_ticks;
        if let Some(cell) = self.state.grid.cell_mut(pos.x, pos.y) {
            cell.active = false;
            cell.spawned_at_tick = Some(tick);
            cell.expires_at_tick = Some(tick.saturating_add(duration));
        }
    }
}
