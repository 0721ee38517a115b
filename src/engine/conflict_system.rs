use super::*;

impl<R: RandomSource, C: Clock> GameEngine<R, C> {
    /// Agents sharing a repo cell after movement all land in a merge
    /// conflict. Agents already penalized, or who sat out this tick, are
    /// left alone.
    pub(super) fn detect_conflicts(&mut self, sat_out: &HashSet<usize>) {
        let mut groups: BTreeMap<(i32, i32), Vec<usize>> = BTreeMap::new();
        for (idx, agent) in self.state.agents.iter().enumerate() {
            if agent.is_penalized() || sat_out.contains(&idx) {
                continue;
            }
            let on_repo = self
                .state
                .grid
                .cell(agent.x, agent.y)
                .map(|cell| cell.kind == CellKind::Repo)
                .unwrap_or(false);
            if on_repo {
                groups.entry((agent.y, agent.x)).or_default().push(idx);
            }
        }

        for ((y, x), members) in groups {
            if members.len() < 2 {
                continue;
            }
            let size = members.len();
            for idx in members {
                let agent = &mut self.state.agents[idx];
                agent.state = BehaviorState::MergeConflict;
                agent.conflict_penalty_ticks_left = self.config.conflict_penalty_ticks;
                agent.conflict_count += 1;
                self.log_agent(
                    idx,
                    EventKind::MergeConflict,
                    format!(
                        "hit a merge conflict at repo {} with {} agents",
                        format_pos(Vec2 { x, y }),
                        size
                    ),
                );
            }
        }
    }
}
