use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::clock::SystemClock;
use crate::config::EngineConfig;
use crate::engine::GameEngine;
use crate::error::{ConfigError, EngineError};
use crate::rng::Rng;
use crate::types::{AgentView, GameSnapshot, GameState, Participant};

pub type SharedGame = Arc<Mutex<GameEngine<Rng, SystemClock>>>;

/// In-memory home for many independent games. Each game sits behind its own
/// mutex, so a tick and an explicit action on the same game never overlap
/// while different games run side by side.
pub struct GameRegistry {
    config: EngineConfig,
    games: RwLock<BTreeMap<String, SharedGame>>,
    next_id: AtomicU64,
}

impl GameRegistry {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            games: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Opens a new lobby. Without a seed a fresh one is drawn.
    pub async fn create_game(&self, seed: Option<u32>) -> Result<String, ConfigError> {
        let seed = seed.unwrap_or_else(rand::random::<u32>);
        let id = format!("game_{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let engine = GameEngine::new(id.clone(), self.config.clone(), Rng::new(seed), SystemClock)?;
        self.games
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(engine)));
        info!(game_id = %id, seed, "game created");
        Ok(id)
    }

    /// Re-registers a game from a persisted state and the generator exported
    /// with it, replacing any game with the same id.
    pub async fn restore_game(&self, state: GameState, rng: Rng) -> Result<String, ConfigError> {
        let id = state.id.clone();
        let engine = GameEngine::from_state(state, self.config.clone(), rng, SystemClock)?;
        self.games
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(engine)));
        Ok(id)
    }

    pub async fn game(&self, game_id: &str) -> Result<SharedGame, EngineError> {
        self.games
            .read()
            .await
            .get(game_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("game {game_id}")))
    }

    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }

    pub async fn admit(
        &self,
        game_id: &str,
        participant: Participant,
    ) -> Result<AgentView, EngineError> {
        let game = self.game(game_id).await?;
        let mut engine = game.lock().await;
        engine.admit(participant)
    }

    pub async fn start(&self, game_id: &str) -> Result<(), EngineError> {
        let game = self.game(game_id).await?;
        let mut engine = game.lock().await;
        engine.start()
    }

    pub async fn advance(&self, game_id: &str) -> Result<bool, EngineError> {
        let game = self.game(game_id).await?;
        let mut engine = game.lock().await;
        Ok(engine.advance_tick())
    }

    pub async fn apply_action(
        &self,
        game_id: &str,
        participant_id: &str,
        action: &str,
        params: &Value,
    ) -> Result<String, EngineError> {
        let game = self.game(game_id).await?;
        let mut engine = game.lock().await;
        engine.apply_named_action(participant_id, action, params)
    }

    pub async fn place_environment_item(
        &self,
        game_id: &str,
        item: &str,
        x: Option<i32>,
        y: Option<i32>,
    ) -> Result<String, EngineError> {
        let game = self.game(game_id).await?;
        let mut engine = game.lock().await;
        engine.place_named_item(item, x, y)
    }

    pub async fn snapshot(&self, game_id: &str) -> Result<GameSnapshot, EngineError> {
        let game = self.game(game_id).await?;
        let engine = game.lock().await;
        Ok(engine.snapshot())
    }

    pub async fn export_state(&self, game_id: &str) -> Result<GameState, EngineError> {
        let game = self.game(game_id).await?;
        let engine = game.lock().await;
        Ok(engine.state().clone())
    }

    /// State plus generator, everything `restore_game` needs to resume the
    /// game with the same random sequence.
    pub async fn export_game(&self, game_id: &str) -> Result<(GameState, Rng), EngineError> {
        let game = self.game(game_id).await?;
        let engine = game.lock().await;
        Ok((engine.state().clone(), engine.rng().clone()))
    }

    pub async fn game_ids(&self) -> Vec<String> {
        self.games.read().await.keys().cloned().collect()
    }

    /// Ticks every game once, each on its own task. Returns how many games
    /// actually advanced.
    pub async fn advance_all(&self) -> usize {
        let games: Vec<SharedGame> = self.games.read().await.values().cloned().collect();
        let handles: Vec<JoinHandle<bool>> = games
            .into_iter()
            .map(|game| {
                tokio::spawn(async move {
                    let mut engine = game.lock().await;
                    engine.advance_tick()
                })
            })
            .collect();

        let mut advanced = 0;
        for handle in handles {
            match handle.await {
                Ok(true) => advanced += 1,
                Ok(false) => {}
                Err(error) => error!(%error, "tick task failed"),
            }
        }
        advanced
    }

    /// Drops finished games and hands back their final states.
    pub async fn remove_finished(&self) -> Vec<GameState> {
        let mut games = self.games.write().await;
        let mut finished_ids = Vec::new();
        for (id, game) in games.iter() {
            if game.lock().await.is_over() {
                finished_ids.push(id.clone());
            }
        }

        let mut finished = Vec::new();
        for id in finished_ids {
            if let Some(game) = games.remove(&id) {
                finished.push(game.lock().await.state().clone());
            }
        }
        finished
    }
}

pub fn spawn_tick_loop(registry: Arc<GameRegistry>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            registry.advance_all().await;
        }
    })
}
