//! Room registry: creates rooms, looks them up by code, tears them down.

use std::collections::HashMap;
use std::sync::Arc;

use buzzline_protocol::{NewTeam, RoomCode, RoomSettings, RoomStatus};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;

use crate::code::generate_room_code;
use crate::room::spawn_room;
use crate::{QuestionCatalog, RoomConfig, RoomError, RoomHandle, RoomSnapshot, RoomStore, StoreError, Team};

/// Colours handed to teams declared without one, in order.
const TEAM_COLORS: [&str; 12] = [
    "#e53935", "#1e88e5", "#43a047", "#fdd835", "#8e24aa", "#fb8c00", "#00acc1", "#d81b60", "#6d4c41", "#3949ab",
    "#7cb342", "#546e7a",
];

/// The single place rooms are looked up by code.
///
/// Rooms never share state with each other; the registry only holds
/// handles. The map lock is only taken for lookups and inserts, never
/// across a store call or a room actor round trip, so one slow room
/// cannot stall the rest.
pub struct RoomManager<C, S> {
    rooms: Mutex<HashMap<RoomCode, RoomHandle>>,
    catalog: Arc<C>,
    store: Arc<S>,
    config: RoomConfig,
}

impl<C: QuestionCatalog, S: RoomStore> RoomManager<C, S> {
    pub fn new(catalog: Arc<C>, store: Arc<S>, config: RoomConfig) -> Self {
        Self { rooms: Mutex::new(HashMap::new()), catalog, store, config }
    }

    /// Creates a room in `Lobby` with a fresh code and spawns its actor.
    pub async fn create_room(&self, settings: RoomSettings, teams: &[NewTeam]) -> Result<RoomHandle, RoomError> {
        let mut rng = StdRng::from_rng(&mut rand::rng());
        self.create_room_with_rng(&mut rng, settings, teams).await
    }

    /// Like [`create_room`](Self::create_room) with a caller-supplied code
    /// source. A code already live here or already in the store is
    /// regenerated, up to `max_code_attempts` times.
    pub async fn create_room_with_rng(
        &self,
        rng: &mut StdRng,
        settings: RoomSettings,
        teams: &[NewTeam],
    ) -> Result<RoomHandle, RoomError> {
        let teams = declare_teams(teams);

        for attempt in 1..=self.config.max_code_attempts {
            let code = generate_room_code(rng);
            if self.rooms.lock().await.contains_key(&code) {
                tracing::debug!(%code, attempt, "room code in use, regenerating");
                continue;
            }
            // The store is the arbiter for codes raced by concurrent creates.
            match self.store.create_room(&code, &settings, &teams).await {
                Ok(()) => {}
                Err(StoreError::DuplicateRoom(_)) => {
                    tracing::debug!(%code, attempt, "room code stored already, regenerating");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            let handle = spawn_room(
                code.clone(),
                settings,
                teams,
                self.config.clone(),
                Arc::clone(&self.catalog),
                Arc::clone(&self.store),
            );
            let count = {
                let mut rooms = self.rooms.lock().await;
                rooms.insert(code.clone(), handle.clone());
                rooms.len()
            };
            tracing::info!(%code, attempt, rooms = count, "room created");
            return Ok(handle);
        }

        tracing::error!(attempts = self.config.max_code_attempts, "room code space exhausted");
        Err(RoomError::CodeSpaceExhausted(self.config.max_code_attempts))
    }

    pub async fn get(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms.lock().await.get(code).cloned().ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    pub async fn destroy_room(&self, code: &RoomCode) -> Result<(), RoomError> {
        let (handle, count) = {
            let mut rooms = self.rooms.lock().await;
            let handle = rooms.remove(code).ok_or_else(|| RoomError::NotFound(code.clone()))?;
            (handle, rooms.len())
        };
        let _ = handle.shutdown().await;
        tracing::info!(%code, rooms = count, "room destroyed");
        Ok(())
    }

    /// Destroys rooms that have ended with nobody subscribed, rooms nobody
    /// has been subscribed to for `idle_ttl`, and forgets rooms whose actor
    /// is gone. Returns the removed codes.
    ///
    /// Rooms are queried from a copy of the handle list, so lookups and
    /// creates proceed while a busy room answers.
    pub async fn reap_finished(&self) -> Vec<RoomCode> {
        let handles: Vec<RoomHandle> = self.rooms.lock().await.values().cloned().collect();

        let mut finished = Vec::new();
        for handle in handles {
            match handle.info().await {
                Ok(info) if info.status == RoomStatus::Ended && info.subscribers == 0 => {
                    finished.push(info.code);
                }
                Ok(info) if info.idle_for.is_some_and(|idle| idle >= self.config.idle_ttl) => {
                    tracing::info!(code = %info.code, status = %info.status, "room idle past ttl");
                    finished.push(info.code);
                }
                Ok(_) => {}
                Err(_) => finished.push(handle.code().clone()),
            }
        }
        for code in &finished {
            let _ = self.destroy_room(code).await;
        }
        finished
    }

    /// Live snapshot if the room is running, otherwise what the store
    /// holds.
    pub async fn snapshot(&self, code: &RoomCode) -> Result<RoomSnapshot, RoomError> {
        let live = self.rooms.lock().await.get(code).cloned();
        if let Some(handle) = live {
            return handle.snapshot().await;
        }
        self.store.read_room_snapshot(code).await?.ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.lock().await.keys().cloned().collect()
    }

    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

fn declare_teams(teams: &[NewTeam]) -> Vec<Team> {
    teams
        .iter()
        .zip(1..)
        .map(|(team, n)| Team {
            id: format!("T{n}"),
            name: team.name.trim().to_string(),
            color: team.color.clone().unwrap_or_else(|| TEAM_COLORS[(n - 1) % TEAM_COLORS.len()].to_string()),
        })
        .collect()
}
