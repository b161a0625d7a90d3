//! Durable record of rooms, participants, responses and buzzes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use buzzline_protocol::{PlayerId, PublicPlayer, RoomCode, RoomSettings, RoomStatus};
use tokio::sync::Mutex;

use crate::leaderboard::team_scores;
use crate::{BuzzRecord, NewParticipant, Participant, ResponseRecord, RoomSnapshot, StoreError, Team};

/// Persistence collaborator.
///
/// The room actor awaits only `create_participant` (it needs the id);
/// every other write goes through the room's write-behind queue and is
/// applied in order.
pub trait RoomStore: Send + Sync + 'static {
    /// Fails with [`StoreError::DuplicateRoom`] if the code is taken.
    fn create_room(
        &self,
        code: &RoomCode,
        settings: &RoomSettings,
        teams: &[Team],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn set_status(&self, code: &RoomCode, status: RoomStatus) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn create_participant(
        &self,
        code: &RoomCode,
        participant: &NewParticipant,
    ) -> impl Future<Output = Result<PlayerId, StoreError>> + Send;

    /// Adds `delta` (possibly negative) to a participant's stored score.
    fn increment_score(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        delta: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn record_response(
        &self,
        code: &RoomCode,
        response: &ResponseRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn record_buzz(&self, code: &RoomCode, buzz: &BuzzRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// `Ok(None)` for an unknown code.
    fn read_room_snapshot(&self, code: &RoomCode)
    -> impl Future<Output = Result<Option<RoomSnapshot>, StoreError>> + Send;
}

#[derive(Debug)]
struct StoredParticipant {
    participant: Participant,
    score: i64,
}

#[derive(Debug)]
struct StoredRoom {
    status: RoomStatus,
    settings: RoomSettings,
    teams: Vec<Team>,
    participants: Vec<StoredParticipant>,
    responses: Vec<ResponseRecord>,
    buzzes: Vec<BuzzRecord>,
}

impl StoredRoom {
    fn snapshot(&self, code: &RoomCode) -> RoomSnapshot {
        let participants: Vec<Participant> = self
            .participants
            .iter()
            .map(|p| p.participant.clone().with_score(p.score.clamp(0, i64::from(u32::MAX)) as u32))
            .collect();
        let scores = team_scores(&participants);

        RoomSnapshot {
            code: code.clone(),
            status: self.status,
            settings: self.settings.clone(),
            players: participants
                .iter()
                .map(|p| PublicPlayer { connected: false, ..p.public() })
                .collect(),
            teams: self.teams.iter().map(|t| t.public(scores.get(&t.id).copied().unwrap_or(0))).collect(),
            current_question: None,
            responses: self.responses.clone(),
            buzzes: self.buzzes.clone(),
        }
    }
}

/// Process-local store. Player ids are unique across all rooms.
#[derive(Debug)]
pub struct MemoryStore {
    rooms: Mutex<HashMap<RoomCode, StoredRoom>>,
    next_player_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { rooms: Mutex::new(HashMap::new()), next_player_id: AtomicU64::new(1) }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    async fn with_room<T>(
        &self,
        code: &RoomCode,
        f: impl FnOnce(&mut StoredRoom) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.get_mut(code).ok_or_else(|| StoreError::RoomNotFound(code.clone()))?;
        f(room)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomStore for MemoryStore {
    async fn create_room(&self, code: &RoomCode, settings: &RoomSettings, teams: &[Team]) -> Result<(), StoreError> {
        let mut rooms = self.rooms.lock().await;
        if rooms.contains_key(code) {
            return Err(StoreError::DuplicateRoom(code.clone()));
        }
        rooms.insert(
            code.clone(),
            StoredRoom {
                status: RoomStatus::Lobby,
                settings: settings.clone(),
                teams: teams.to_vec(),
                participants: Vec::new(),
                responses: Vec::new(),
                buzzes: Vec::new(),
            },
        );
        Ok(())
    }

    async fn set_status(&self, code: &RoomCode, status: RoomStatus) -> Result<(), StoreError> {
        self.with_room(code, |room| {
            room.status = status;
            Ok(())
        })
        .await
    }

    async fn create_participant(&self, code: &RoomCode, new: &NewParticipant) -> Result<PlayerId, StoreError> {
        let id = PlayerId(self.next_player_id.fetch_add(1, Ordering::Relaxed));
        self.with_room(code, |room| {
            let mut participant = Participant::new(id, new.nickname.clone());
            participant.avatar = new.avatar.clone();
            participant.team_id = new.team_id.clone();
            room.participants.push(StoredParticipant { participant, score: 0 });
            Ok(id)
        })
        .await
    }

    async fn increment_score(&self, code: &RoomCode, player_id: PlayerId, delta: i64) -> Result<(), StoreError> {
        self.with_room(code, |room| {
            let stored = room
                .participants
                .iter_mut()
                .find(|p| p.participant.id == player_id)
                .ok_or_else(|| StoreError::Backend(format!("no participant {player_id}")))?;
            stored.score += delta;
            Ok(())
        })
        .await
    }

    async fn record_response(&self, code: &RoomCode, response: &ResponseRecord) -> Result<(), StoreError> {
        self.with_room(code, |room| {
            // An answer change replaces the earlier record.
            room.responses
                .retain(|r| !(r.question_id == response.question_id && r.player_id == response.player_id));
            room.responses.push(response.clone());
            Ok(())
        })
        .await
    }

    async fn record_buzz(&self, code: &RoomCode, buzz: &BuzzRecord) -> Result<(), StoreError> {
        self.with_room(code, |room| {
            room.buzzes.push(buzz.clone());
            Ok(())
        })
        .await
    }

    async fn read_room_snapshot(&self, code: &RoomCode) -> Result<Option<RoomSnapshot>, StoreError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms.get(code).map(|room| room.snapshot(code)))
    }
}
