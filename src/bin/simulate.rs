use chrono::Utc;
use clap::Parser;
use hackathon_sim::config::EngineConfig;
use hackathon_sim::registry::GameRegistry;
use hackathon_sim::types::{
    BehaviorState, EventKind, GameOutcome, GamePhase, GameState, Participant,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

const TICK_SAFETY_MARGIN: u32 = 10;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, default_value_t = 2)]
    games: usize,
    #[arg(long, default_value_t = 4)]
    agents: usize,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    max_ticks: Option<u32>,
    #[arg(long)]
    target: Option<u32>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventCounts {
    commits: u32,
    force_pushes: u32,
    conflicts: u32,
    bonuses: u32,
    outages: u32,
    resources_spawned: u32,
    items_consumed: u32,
}

impl EventCounts {
    fn record(&mut self, action: EventKind) {
        match action {
            EventKind::Commit => self.commits += 1,
            EventKind::ForcePush => self.force_pushes += 1,
            EventKind::MergeConflict => self.conflicts += 1,
            EventKind::BonusAwarded => self.bonuses += 1,
            EventKind::Outage => self.outages += 1,
            EventKind::ResourceSpawned => self.resources_spawned += 1,
            EventKind::Consumed => self.items_consumed += 1,
            _ => {}
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GameResultLine {
    game_id: String,
    seed: u32,
    agents: usize,
    outcome: Option<GameOutcome>,
    ticks: u32,
    total_score: u32,
    target_score: u32,
    feature_progress: f32,
    #[serde(flatten)]
    counts: EventCounts,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u32,
    message: String,
}

/// Per-game bookkeeping while the batch runs.
#[derive(Clone, Debug)]
struct GameRun {
    game_id: String,
    seed: u32,
    last_tick: u32,
    was_active: bool,
    counts: EventCounts,
    anomalies: Vec<String>,
    anomaly_records: Vec<AnomalyRecord>,
    anomaly_seen: HashSet<String>,
    final_state: Option<GameState>,
}

impl GameRun {
    fn new(game_id: String, seed: u32) -> Self {
        Self {
            game_id,
            seed,
            last_tick: 0,
            was_active: true,
            counts: EventCounts::default(),
            anomalies: Vec::new(),
            anomaly_records: Vec::new(),
            anomaly_seen: HashSet::new(),
            final_state: None,
        }
    }

    fn observe(&mut self, state: &GameState) {
        let expected_tick = if self.was_active {
            self.last_tick + 1
        } else {
            self.last_tick
        };
        if state.tick_count != expected_tick {
            self.push_anomaly(
                state.tick_count,
                format!(
                    "tick jumped from {} to {}",
                    self.last_tick, state.tick_count
                ),
            );
        }
        if self.was_active {
            for event in state.event_log.iter().filter(|e| e.tick == state.tick_count) {
                self.counts.record(event.action);
            }
        }
        for message in collect_state_anomalies(state) {
            self.push_anomaly(state.tick_count, message);
        }
        self.last_tick = state.tick_count;
        self.was_active = state.phase == GamePhase::Active;
    }

    fn push_anomaly(&mut self, tick: u32, message: String) {
        push_anomaly(
            &mut self.anomalies,
            &mut self.anomaly_records,
            &mut self.anomaly_seen,
            tick,
            message,
        );
    }

    fn result_line(&self, agents: usize) -> GameResultLine {
        let state = self.final_state.as_ref();
        GameResultLine {
            game_id: self.game_id.clone(),
            seed: self.seed,
            agents,
            outcome: state.and_then(|state| state.outcome),
            ticks: self.last_tick,
            total_score: state.map(|state| state.total_score).unwrap_or(0),
            target_score: state.map(|state| state.target_score).unwrap_or(0),
            feature_progress: state.map(|state| state.feature_progress).unwrap_or(0.0),
            counts: self.counts.clone(),
            anomalies: self.anomalies.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary {
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    game_count: usize,
    anomaly_count: usize,
    average_ticks: u32,
    outcome_counts: BTreeMap<String, usize>,
    games: Vec<GameResultLine>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredLogLine {
    timestamp_ms: u64,
    level: String,
    event: String,
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u32>,
    details: Value,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let run_started_at_ms = now_ms();
    let base_seed = normalize_seed(cli.seed.unwrap_or(run_started_at_ms));
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(base_seed, run_started_at_ms));

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(message) => {
            emit_log(
                "error",
                "config_invalid",
                &match_id,
                None,
                None,
                None,
                json!({ "error": message }),
            );
            std::process::exit(2);
        }
    };
    let agent_count = cli.agents.max(config.min_participants);

    let setup = setup_games(&config, &cli, base_seed, agent_count).await;
    let (registry, mut runs_by_id) = match setup {
        Ok(setup) => setup,
        Err(message) => {
            emit_log(
                "error",
                "setup_failed",
                &match_id,
                None,
                None,
                None,
                json!({ "error": message }),
            );
            std::process::exit(2);
        }
    };

    for run in runs_by_id.values() {
        emit_log(
            "info",
            "game_started",
            &match_id,
            Some(&run.game_id),
            Some(run.seed),
            None,
            json!({
                "agents": agent_count,
                "maxTicks": config.max_ticks,
                "targetScore": config.target_score,
            }),
        );
    }

    let tick_limit = config.max_ticks.saturating_add(TICK_SAFETY_MARGIN);
    let mut rounds = 0u32;
    loop {
        let advanced = registry.advance_all().await;
        rounds += 1;
        for run in runs_by_id.values_mut() {
            match registry.export_state(&run.game_id).await {
                Ok(state) => run.observe(&state),
                Err(error) => run.push_anomaly(run.last_tick, error.to_string()),
            }
        }
        if advanced == 0 {
            break;
        }
        if rounds > tick_limit {
            for run in runs_by_id.values_mut() {
                run.push_anomaly(run.last_tick, "tick safety limit exceeded".to_string());
            }
            break;
        }
    }

    for state in registry.remove_finished().await {
        if let Some(run) = runs_by_id.get_mut(&state.id) {
            run.final_state = Some(state);
        }
    }
    for run in runs_by_id.values_mut() {
        if run.final_state.is_none() {
            run.push_anomaly(run.last_tick, "game never finished".to_string());
        }
    }

    let mut has_anomaly = false;
    let mut results = Vec::new();
    let mut outcome_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_ticks = 0u64;
    let mut total_anomalies = 0usize;
    for run in runs_by_id.values() {
        for anomaly in &run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &match_id,
                Some(&run.game_id),
                Some(run.seed),
                Some(anomaly.tick),
                json!({ "message": anomaly.message }),
            );
        }
        let line = run.result_line(agent_count);
        has_anomaly |= !line.anomalies.is_empty();
        total_anomalies += run.anomaly_records.len();
        total_ticks += u64::from(line.ticks);
        *outcome_counts
            .entry(outcome_key(line.outcome))
            .or_insert(0) += 1;

        emit_log(
            "info",
            "game_finished",
            &match_id,
            Some(&run.game_id),
            Some(run.seed),
            Some(line.ticks),
            json!({
                "outcome": line.outcome,
                "totalScore": line.total_score,
                "featureProgress": line.feature_progress,
                "anomalyCount": run.anomaly_records.len(),
            }),
        );
        match serde_json::to_string(&line) {
            Ok(text) => println!("{text}"),
            Err(error) => eprintln!("failed to serialize result line: {error}"),
        }
        results.push(line);
    }

    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        now_ms(),
        results,
        outcome_counts,
        total_anomalies,
        total_ticks,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &match_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &match_id,
        None,
        None,
        None,
        json!({
            "gameCount": summary.game_count,
            "anomalyCount": summary.anomaly_count,
            "averageTicks": summary.average_ticks,
            "outcomeCounts": summary.outcome_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn resolve_config(cli: &Cli) -> Result<EngineConfig, String> {
    let mut config = match cli.config.as_ref() {
        Some(path) => EngineConfig::from_json_file(path).map_err(|error| error.to_string())?,
        None => EngineConfig::default(),
    };
    if let Some(max_ticks) = cli.max_ticks {
        config.max_ticks = max_ticks;
    }
    if let Some(target) = cli.target {
        config.target_score = target;
    }
    config.validate().map_err(|error| error.to_string())?;
    Ok(config)
}

async fn setup_games(
    config: &EngineConfig,
    cli: &Cli,
    base_seed: u32,
    agent_count: usize,
) -> Result<(GameRegistry, BTreeMap<String, GameRun>), String> {
    let registry = GameRegistry::new(config.clone()).map_err(|error| error.to_string())?;
    let mut runs = BTreeMap::new();
    for game_idx in 0..cli.games.max(1) {
        let seed = base_seed.wrapping_add(game_idx as u32);
        let game_id = registry
            .create_game(Some(seed))
            .await
            .map_err(|error| error.to_string())?;
        for agent_idx in 0..agent_count {
            registry
                .admit(
                    &game_id,
                    Participant {
                        id: format!("bot_{}", agent_idx + 1),
                        name: format!("Bot-{:02}", agent_idx + 1),
                    },
                )
                .await
                .map_err(|error| error.to_string())?;
        }
        registry
            .start(&game_id)
            .await
            .map_err(|error| error.to_string())?;
        runs.insert(game_id.clone(), GameRun::new(game_id, seed));
    }
    Ok((registry, runs))
}

fn collect_state_anomalies(state: &GameState) -> Vec<String> {
    let mut anomalies = Vec::new();
    let score_sum: u32 = state.agents.iter().map(|agent| agent.score_count).sum();
    if score_sum != state.total_score {
        anomalies.push(format!(
            "team total {} differs from agent sum {score_sum}",
            state.total_score
        ));
    }

    for agent in &state.agents {
        if !state.grid.in_bounds(agent.x, agent.y) {
            anomalies.push(format!(
                "agent out of bounds: {} at ({}, {})",
                agent.id, agent.x, agent.y
            ));
        }
        if agent.is_penalized() && agent.state != BehaviorState::MergeConflict {
            anomalies.push(format!("penalized agent not blocked: {}", agent.id));
        }
    }

    if !(0.0..=100.0).contains(&state.feature_progress) {
        anomalies.push(format!(
            "feature progress out of range: {}",
            state.feature_progress
        ));
    }
    if (state.phase == GamePhase::Over) != state.outcome.is_some() {
        anomalies.push(format!(
            "phase {:?} does not match outcome {:?}",
            state.phase, state.outcome
        ));
    }
    anomalies
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u32,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn outcome_key(outcome: Option<GameOutcome>) -> String {
    outcome.map(GameOutcome::key).unwrap_or("unfinished").to_string()
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    games: Vec<GameResultLine>,
    outcome_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_ticks: u64,
) -> RunSummary {
    let game_count = games.len();
    let average_ticks = if game_count == 0 {
        0
    } else {
        (total_ticks / game_count as u64) as u32
    };
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        game_count,
        anomaly_count,
        average_ticks,
        outcome_counts,
        games,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    match_id: &str,
    game_id: Option<&str>,
    seed: Option<u32>,
    tick: Option<u32>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        game_id: game_id.map(|value| value.to_string()),
        seed,
        tick,
        details,
    };
    match serde_json::to_string(&log_line) {
        Ok(text) => eprintln!("{text}"),
        Err(error) => eprintln!("failed to serialize log line: {error}"),
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}
