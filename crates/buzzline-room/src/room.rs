//! Room actor: one Tokio task per live room.
//!
//! The actor owns every piece of mutable room state (participants, the
//! current question, the buzzer window and the countdown) and processes
//! commands strictly one at a time, in receipt order. Countdown ticks are
//! polled from the same `select!` loop, so a tick can never interleave
//! with a half-applied command.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use buzzline_protocol::{
    Answer, ConnectionId, PlayerId, PublicQuestion, QuestionId, QuestionKind, RoomCode, RoomSettings,
    RoomStateView, RoomStatus, ServerEvent,
};
use buzzline_timer::Tick;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::buzzer::BuzzerArbiter;
use crate::leaderboard::{leaderboard, team_scores};
use crate::persist::{StoreWrite, StoreWriter};
use crate::scoring::{Grade, grade, score};
use crate::timer::TimerSlot;
use crate::{
    Broadcaster, BuzzRecord, CatalogQuestion, ConnectionSender, NewParticipant, Participant, Phase,
    QuestionCatalog, ResponseRecord, RoomConfig, RoomError, RoomSnapshot, RoomStore, Team,
};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// What a participant asks to join with. The nickname is trimmed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub nickname: String,
    pub avatar: Option<String>,
    pub team_id: Option<String>,
}

impl JoinRequest {
    pub fn new(nickname: impl AsRef<str>) -> Self {
        Self { nickname: nickname.as_ref().trim().to_string(), avatar: None, team_id: None }
    }

    pub fn with_avatar(mut self, avatar: Option<String>) -> Self {
        self.avatar = avatar;
        self
    }

    pub fn with_team(mut self, team_id: Option<String>) -> Self {
        self.team_id = team_id;
        self
    }
}

/// Participant-gated actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerAction {
    Answer { question_id: QuestionId, answer: Answer },
    Buzz { question_id: QuestionId },
}

/// Host-gated actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    StartQuestion { question_id: QuestionId },
    StartBuzzer { question_id: QuestionId, top_n: Option<u32> },
    PauseTimer,
    ResumeTimer,
    Reveal { question_id: QuestionId },
    MarkCorrect { question_id: QuestionId, player_id: PlayerId },
    NextQuestion,
    ShowLeaderboard,
    EndGame,
}

impl HostAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartQuestion { .. } => "startQuestion",
            Self::StartBuzzer { .. } => "startBuzzer",
            Self::PauseTimer => "pauseTimer",
            Self::ResumeTimer => "resumeTimer",
            Self::Reveal { .. } => "reveal",
            Self::MarkCorrect { .. } => "markCorrect",
            Self::NextQuestion => "nextQuestion",
            Self::ShowLeaderboard => "showLeaderboard",
            Self::EndGame => "endGame",
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

enum RoomCommand {
    Attach { connection_id: ConnectionId, sender: ConnectionSender, reply: Reply<()> },
    Join { connection_id: ConnectionId, sender: ConnectionSender, request: JoinRequest, reply: Reply<PlayerId> },
    Leave { connection_id: ConnectionId },
    Play { connection_id: ConnectionId, action: PlayerAction, reply: Reply<()> },
    Host { connection_id: ConnectionId, action: HostAction, reply: Reply<()> },
    Snapshot { reply: oneshot::Sender<RoomSnapshot> },
    Info { reply: oneshot::Sender<RoomInfo> },
    Shutdown,
}

/// Room metadata for the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub status: RoomStatus,
    pub phase: Phase,
    pub participants: usize,
    pub subscribers: usize,
    /// How long the room has had no subscribers, `None` while anyone is
    /// attached.
    pub idle_for: Option<Duration>,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable address of a running room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx.await.map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    /// Subscribes a host connection and sends it the room state.
    pub async fn attach_host(&self, connection_id: ConnectionId, sender: ConnectionSender) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Attach { connection_id, sender, reply }).await?
    }

    pub async fn join(
        &self,
        connection_id: ConnectionId,
        sender: ConnectionSender,
        request: JoinRequest,
    ) -> Result<PlayerId, RoomError> {
        self.request(|reply| RoomCommand::Join { connection_id, sender, request, reply }).await?
    }

    /// Fire-and-forget: the connection is already gone.
    pub async fn leave(&self, connection_id: ConnectionId) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Leave { connection_id })
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    pub async fn play(&self, connection_id: ConnectionId, action: PlayerAction) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Play { connection_id, action, reply }).await?
    }

    pub async fn answer(
        &self,
        connection_id: ConnectionId,
        question_id: impl Into<QuestionId>,
        answer: Answer,
    ) -> Result<(), RoomError> {
        self.play(connection_id, PlayerAction::Answer { question_id: question_id.into(), answer }).await
    }

    pub async fn buzz(&self, connection_id: ConnectionId, question_id: impl Into<QuestionId>) -> Result<(), RoomError> {
        self.play(connection_id, PlayerAction::Buzz { question_id: question_id.into() }).await
    }

    pub async fn host(&self, connection_id: ConnectionId, action: HostAction) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Host { connection_id, action, reply }).await?
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Info { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

// ---------------------------------------------------------------------------
// Actor state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Member {
    is_host: bool,
    player_id: Option<PlayerId>,
}

#[derive(Debug, Clone)]
struct Response {
    answer: Answer,
    elapsed_ms: u64,
    correct: bool,
    /// Points granted for this response, revoked if it is replaced.
    awarded: u32,
    /// Streak of the participant before this response was graded.
    streak_before: u32,
}

struct ActiveQuestion {
    question: CatalogQuestion,
    prompt: PublicQuestion,
    started_at: Instant,
    started_at_unix_ms: u64,
    responses: BTreeMap<PlayerId, Response>,
    buzzer_started_at: Option<Instant>,
    buzzer_awarded: HashSet<PlayerId>,
}

impl ActiveQuestion {
    fn new(question: CatalogQuestion, prompt: PublicQuestion) -> Self {
        Self {
            question,
            prompt,
            started_at: Instant::now(),
            started_at_unix_ms: unix_millis(),
            responses: BTreeMap::new(),
            buzzer_started_at: None,
            buzzer_awarded: HashSet::new(),
        }
    }

    fn id(&self) -> &str {
        &self.question.id
    }

    fn record(&self, player_id: PlayerId, response: &Response) -> ResponseRecord {
        ResponseRecord {
            question_id: self.question.id.clone(),
            player_id,
            answer: response.answer.clone(),
            elapsed_ms: response.elapsed_ms,
            correct: response.correct,
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default()
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn find_participant(participants: &mut [Participant], player_id: PlayerId) -> Option<&mut Participant> {
    participants.iter_mut().find(|p| p.id == player_id)
}

struct RoomActor<C, S> {
    code: RoomCode,
    config: RoomConfig,
    settings: RoomSettings,
    phase: Phase,
    /// Last status queued for the store.
    stored_status: RoomStatus,
    /// Join order.
    participants: Vec<Participant>,
    teams: Vec<Team>,
    members: HashMap<ConnectionId, Member>,
    broadcaster: Broadcaster,
    active: Option<ActiveQuestion>,
    buzzer: BuzzerArbiter,
    timer: TimerSlot,
    catalog: Arc<C>,
    writer: StoreWriter,
    store: Arc<S>,
    receiver: mpsc::Receiver<RoomCommand>,
    /// Set while nobody is subscribed.
    empty_since: Option<Instant>,
}

impl<C: QuestionCatalog, S: RoomStore> RoomActor<C, S> {
    async fn run(mut self) {
        tracing::info!(code = %self.code, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(RoomCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle(cmd).await,
                    }
                }
                (question_id, tick) = self.timer.next_tick() => self.on_tick(question_id, tick),
            }
        }

        tracing::info!(code = %self.code, "room actor stopped");
    }

    async fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Attach { connection_id, sender, reply } => {
                let result = self.handle_attach(connection_id, sender);
                let _ = reply.send(self.log_result("attach", connection_id, result));
            }
            RoomCommand::Join { connection_id, sender, request, reply } => {
                let result = self.handle_join(connection_id, sender, request).await;
                let _ = reply.send(self.log_result("join", connection_id, result));
            }
            RoomCommand::Leave { connection_id } => self.handle_leave(connection_id),
            RoomCommand::Play { connection_id, action, reply } => {
                let name = match &action {
                    PlayerAction::Answer { .. } => "answer",
                    PlayerAction::Buzz { .. } => "buzz",
                };
                let result = self.handle_play(connection_id, action);
                let _ = reply.send(self.log_result(name, connection_id, result));
            }
            RoomCommand::Host { connection_id, action, reply } => {
                let name = action.name();
                let result = self.handle_host(connection_id, action).await;
                let _ = reply.send(self.log_result(name, connection_id, result));
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            // handled by the run loop
            RoomCommand::Shutdown => {}
        }
    }

    fn log_result<T>(&self, event: &str, connection_id: ConnectionId, result: Result<T, RoomError>) -> Result<T, RoomError> {
        match &result {
            Ok(_) => tracing::debug!(code = %self.code, conn_id = %connection_id, event, "event handled"),
            Err(e) if e.is_internal() => {
                tracing::error!(code = %self.code, conn_id = %connection_id, event, error = %e, "event failed")
            }
            Err(e) => tracing::warn!(code = %self.code, conn_id = %connection_id, event, error = %e, "event rejected"),
        }
        result
    }

    // -- membership --------------------------------------------------------

    fn handle_attach(&mut self, connection_id: ConnectionId, sender: ConnectionSender) -> Result<(), RoomError> {
        self.members.insert(connection_id, Member { is_host: true, player_id: None });
        self.broadcaster.subscribe(connection_id, sender);
        self.empty_since = None;
        self.broadcaster.send_to(connection_id, ServerEvent::RoomState(self.state_view()));
        tracing::info!(code = %self.code, conn_id = %connection_id, "host attached");
        Ok(())
    }

    async fn handle_join(
        &mut self,
        connection_id: ConnectionId,
        sender: ConnectionSender,
        request: JoinRequest,
    ) -> Result<PlayerId, RoomError> {
        if self.phase == Phase::Ended {
            return Err(RoomError::Ended);
        }
        if let Some(member) = self.members.get(&connection_id) {
            let reason = if member.is_host { "the host cannot join as a participant" } else { "already joined" };
            return Err(RoomError::Validation(reason.to_string()));
        }
        if let Some(team_id) = &request.team_id {
            if !self.teams.iter().any(|t| &t.id == team_id) {
                return Err(RoomError::Validation(format!("unknown team {team_id}")));
            }
        }

        let nickname = request.nickname.trim().to_string();
        if self.participants.iter().any(|p| p.nickname == nickname) {
            return Err(RoomError::NicknameTaken(nickname));
        }

        let new = NewParticipant {
            nickname: nickname.clone(),
            avatar: request.avatar.clone(),
            team_id: request.team_id.clone(),
        };
        let player_id = self.store.create_participant(&self.code, &new).await?;
        let mut participant = Participant::new(player_id, nickname.clone());
        participant.avatar = new.avatar;
        participant.team_id = new.team_id;
        self.participants.push(participant);

        self.members.insert(connection_id, Member { is_host: false, player_id: Some(player_id) });
        self.broadcaster.subscribe(connection_id, sender);
        self.empty_since = None;

        if let Some(player) = self.participants.iter().find(|p| p.id == player_id).map(Participant::public) {
            self.broadcaster.publish_except(connection_id, ServerEvent::PlayerJoined { player });
        }
        self.broadcaster.send_to(connection_id, ServerEvent::RoomState(self.state_view()));

        tracing::info!(
            code = %self.code,
            conn_id = %connection_id,
            %player_id,
            %nickname,
            participants = self.participants.len(),
            "participant joined"
        );
        Ok(player_id)
    }

    fn handle_leave(&mut self, connection_id: ConnectionId) {
        self.broadcaster.unsubscribe(connection_id);
        if self.broadcaster.is_empty() && self.empty_since.is_none() {
            self.empty_since = Some(Instant::now());
        }
        let Some(member) = self.members.remove(&connection_id) else {
            return;
        };
        let Some(player_id) = member.player_id else {
            tracing::info!(code = %self.code, conn_id = %connection_id, "host detached");
            return;
        };

        // The stored participant keeps its score; the live room forgets it
        // and frees the nickname.
        self.participants.retain(|p| p.id != player_id);
        self.broadcaster.publish(ServerEvent::PlayerLeft { player_id });
        tracing::info!(
            code = %self.code,
            conn_id = %connection_id,
            %player_id,
            participants = self.participants.len(),
            "participant left"
        );
    }

    fn player_of(&self, connection_id: ConnectionId) -> Result<PlayerId, RoomError> {
        self.members.get(&connection_id).and_then(|m| m.player_id).ok_or(RoomError::NotJoined)
    }

    // -- participant actions -----------------------------------------------

    fn handle_play(&mut self, connection_id: ConnectionId, action: PlayerAction) -> Result<(), RoomError> {
        let player_id = self.player_of(connection_id)?;
        match action {
            PlayerAction::Answer { question_id, answer } => {
                self.submit_answer(player_id, &question_id, answer)?;
                self.broadcaster.send_to(connection_id, ServerEvent::AnswerAccepted { question_id });
            }
            PlayerAction::Buzz { question_id } => self.submit_buzz(player_id, question_id)?,
        }
        Ok(())
    }

    fn submit_answer(&mut self, player_id: PlayerId, question_id: &str, answer: Answer) -> Result<(), RoomError> {
        let active = match &mut self.active {
            Some(active) if active.id() == question_id && self.phase.accepts_answers() => active,
            _ => return Err(RoomError::InvalidQuestion(question_id.to_string())),
        };
        let question = &active.question;

        match (question.kind, &answer) {
            (QuestionKind::Buzzer, _) => {
                return Err(RoomError::Validation("buzzer questions are answered by buzzing".into()));
            }
            (QuestionKind::Text, Answer::Text(_)) => {}
            (QuestionKind::Text, Answer::Choice(_)) => {
                return Err(RoomError::Validation("text questions need a textAnswer".into()));
            }
            (_, Answer::Text(_)) => return Err(RoomError::Validation("choose from the options".into())),
            (_, Answer::Choice(ids)) => {
                if let Some(unknown) = ids.iter().find(|id| !question.has_option(id)) {
                    return Err(RoomError::Validation(format!("unknown option {unknown}")));
                }
            }
        }

        let participant = find_participant(&mut self.participants, player_id).ok_or(RoomError::NotJoined)?;

        if let Some(previous) = active.responses.get(&player_id) {
            if !self.settings.allow_answer_change {
                return Err(RoomError::AlreadyAnswered);
            }
            // Undo the earlier response before regrading.
            participant.score = participant.score.saturating_sub(previous.awarded);
            participant.streak = previous.streak_before;
            if previous.awarded > 0 {
                self.writer.enqueue(StoreWrite::IncrementScore { player_id, delta: -i64::from(previous.awarded) });
            }
        }

        let elapsed = elapsed_ms(active.started_at);
        let streak_before = participant.streak;
        let correct_ids = question.correct_option_ids();
        let (correct, awarded) = match grade(question.kind, &correct_ids, &answer) {
            Grade::Correct => {
                let points = score(question.score_basis(&self.settings), elapsed, &self.settings, streak_before);
                participant.streak += 1;
                (true, points)
            }
            Grade::Incorrect => {
                participant.streak = 0;
                (false, 0)
            }
            Grade::Pending | Grade::Ungraded => (false, 0),
        };
        participant.score = participant.score.saturating_add(awarded);

        let response = Response { answer, elapsed_ms: elapsed, correct, awarded, streak_before };
        if awarded > 0 {
            self.writer.enqueue(StoreWrite::IncrementScore { player_id, delta: i64::from(awarded) });
        }
        self.writer.enqueue(StoreWrite::RecordResponse(active.record(player_id, &response)));
        active.responses.insert(player_id, response);

        tracing::debug!(code = %self.code, %player_id, question_id, elapsed, correct, awarded, "answer recorded");
        Ok(())
    }

    fn submit_buzz(&mut self, player_id: PlayerId, question_id: QuestionId) -> Result<(), RoomError> {
        let started = self.active.as_ref().filter(|a| a.id() == question_id).and_then(|a| a.buzzer_started_at);
        let elapsed = started.map(elapsed_ms).unwrap_or(0);

        let buzz = self.buzzer.record(&question_id, player_id, elapsed)?;
        self.writer.enqueue(StoreWrite::RecordBuzz(BuzzRecord {
            question_id: question_id.clone(),
            player_id,
            rank: buzz.rank,
            elapsed_ms: buzz.time_ms,
        }));
        tracing::debug!(code = %self.code, %player_id, %question_id, rank = buzz.rank, elapsed, "buzz accepted");

        let ranks = self.buzzer.rankings(&question_id).to_vec();
        self.broadcaster.publish(ServerEvent::BuzzRankings { question_id, ranks });
        Ok(())
    }

    // -- host actions ------------------------------------------------------

    async fn handle_host(&mut self, connection_id: ConnectionId, action: HostAction) -> Result<(), RoomError> {
        if !self.members.get(&connection_id).is_some_and(|m| m.is_host) {
            return Err(RoomError::NotHost);
        }
        if self.phase == Phase::Ended {
            return Err(RoomError::Ended);
        }

        match action {
            HostAction::StartQuestion { question_id } => self.start_question(question_id).await,
            HostAction::StartBuzzer { question_id, top_n } => self.start_buzzer(question_id, top_n).await,
            HostAction::PauseTimer => {
                if self.timer.pause() {
                    self.publish_state();
                }
                Ok(())
            }
            HostAction::ResumeTimer => {
                if self.timer.resume() {
                    self.publish_state();
                }
                Ok(())
            }
            HostAction::Reveal { question_id } => self.reveal(&question_id),
            HostAction::MarkCorrect { question_id, player_id } => self.mark_correct(&question_id, player_id),
            HostAction::NextQuestion => {
                self.transition(Phase::Lobby)?;
                self.active = None;
                self.timer.cancel();
                self.buzzer.clear();
                self.publish_state();
                Ok(())
            }
            HostAction::ShowLeaderboard => {
                self.broadcaster.publish(ServerEvent::Leaderboard(self.leaderboard()));
                Ok(())
            }
            HostAction::EndGame => {
                self.transition(Phase::Ended)?;
                self.timer.cancel();
                self.buzzer.close();
                self.publish_state();
                self.broadcaster.publish(ServerEvent::Leaderboard(self.leaderboard()));
                tracing::info!(code = %self.code, participants = self.participants.len(), "game ended");
                Ok(())
            }
        }
    }

    fn transition(&mut self, target: Phase) -> Result<(), RoomError> {
        if !self.phase.can_transition_to(target) {
            return Err(RoomError::InvalidTransition { from: self.phase, to: target });
        }
        tracing::debug!(code = %self.code, from = %self.phase, to = %target, "phase transition");
        self.phase = target;
        Ok(())
    }

    async fn fetch_question(&self, question_id: &str) -> Result<CatalogQuestion, RoomError> {
        self.catalog
            .get_question(question_id)
            .await?
            .ok_or_else(|| RoomError::QuestionNotFound(question_id.to_string()))
    }

    async fn start_question(&mut self, question_id: QuestionId) -> Result<(), RoomError> {
        if !self.phase.can_transition_to(Phase::QuestionActive) {
            return Err(RoomError::InvalidTransition { from: self.phase, to: Phase::QuestionActive });
        }
        let question = self.fetch_question(&question_id).await?;
        let prompt = question.public(&self.settings);
        let limit = Duration::from_secs(u64::from(prompt.time_limit_seconds));

        self.transition(Phase::QuestionActive)?;
        self.buzzer.clear();
        self.timer.start(question_id.clone(), limit);
        self.active = Some(ActiveQuestion::new(question, prompt.clone()));
        self.sync_status();

        tracing::info!(code = %self.code, %question_id, kind = %prompt.kind, limit_secs = limit.as_secs(), "question started");
        self.broadcaster.publish(ServerEvent::Question(prompt));
        Ok(())
    }

    async fn start_buzzer(&mut self, question_id: QuestionId, top_n: Option<u32>) -> Result<(), RoomError> {
        if !self.phase.can_transition_to(Phase::BuzzerArmed) {
            return Err(RoomError::InvalidTransition { from: self.phase, to: Phase::BuzzerArmed });
        }
        let current = self.active.as_ref().is_some_and(|a| a.id() == question_id);
        let question = match &self.active {
            Some(active) if current => active.question.clone(),
            _ => self.fetch_question(&question_id).await?,
        };
        if question.kind != QuestionKind::Buzzer {
            return Err(RoomError::Validation(format!("question {question_id} is not a buzzer question")));
        }

        let capacity = top_n.unwrap_or(self.settings.buzzer_top_n);
        let prompt = question.buzzer_prompt(&self.settings);
        let limit = Duration::from_secs(u64::from(prompt.time_limit_seconds));

        self.transition(Phase::BuzzerArmed)?;
        let active = match self.active.take() {
            Some(mut active) if current => {
                active.prompt = prompt.clone();
                active
            }
            _ => ActiveQuestion::new(question, prompt.clone()),
        };
        let active = self.active.insert(active);
        active.buzzer_started_at = Some(Instant::now());
        self.buzzer.arm(question_id.clone(), capacity);
        self.timer.start(question_id.clone(), limit);
        self.sync_status();

        tracing::info!(code = %self.code, %question_id, capacity, "buzzer armed");
        self.broadcaster.publish(ServerEvent::Question(prompt));
        Ok(())
    }

    fn reveal(&mut self, question_id: &str) -> Result<(), RoomError> {
        if !self.active.as_ref().is_some_and(|a| a.id() == question_id) {
            return Err(RoomError::InvalidQuestion(question_id.to_string()));
        }
        self.transition(Phase::Revealed)?;
        self.timer.cancel();
        self.buzzer.close();
        self.sync_status();

        let Some(active) = &self.active else {
            return Err(RoomError::InvalidQuestion(question_id.to_string()));
        };
        let question = &active.question;
        let distribution = question.kind.is_choice().then(|| {
            let mut counts: BTreeMap<String, u32> = question.options.iter().map(|o| (o.id.clone(), 0)).collect();
            for response in active.responses.values() {
                if let Answer::Choice(ids) = &response.answer {
                    for id in ids {
                        *counts.entry(id.clone()).or_insert(0) += 1;
                    }
                }
            }
            counts
        });
        let correct_option_ids =
            matches!(question.kind, QuestionKind::Single | QuestionKind::Multi).then(|| question.correct_option_ids());

        tracing::info!(code = %self.code, question_id, responses = active.responses.len(), "answer revealed");
        self.broadcaster.publish(ServerEvent::Reveal {
            question_id: question_id.to_string(),
            correct_option_ids,
            distribution,
            explanation: question.explanation.clone(),
        });
        self.publish_state();
        Ok(())
    }

    fn mark_correct(&mut self, question_id: &str, player_id: PlayerId) -> Result<(), RoomError> {
        let active = match &mut self.active {
            Some(active) if active.id() == question_id => active,
            _ => return Err(RoomError::InvalidQuestion(question_id.to_string())),
        };
        let participant = find_participant(&mut self.participants, player_id)
            .ok_or_else(|| RoomError::Validation(format!("unknown player {player_id}")))?;

        let awarded = match active.question.kind {
            QuestionKind::Text => {
                let basis = active.question.score_basis(&self.settings);
                let record = {
                    let Some(response) = active.responses.get_mut(&player_id) else {
                        return Err(RoomError::Validation(format!("{player_id} has not answered")));
                    };
                    if response.correct {
                        return Ok(());
                    }
                    let points = score(basis, response.elapsed_ms, &self.settings, participant.streak);
                    response.correct = true;
                    response.awarded = points;
                    response.streak_before = participant.streak;
                    participant.streak += 1;
                    response.clone()
                };
                self.writer.enqueue(StoreWrite::RecordResponse(active.record(player_id, &record)));
                record.awarded
            }
            QuestionKind::Buzzer => {
                if !self.buzzer.has_buzzed(question_id, player_id) {
                    return Err(RoomError::Validation(format!("{player_id} holds no accepted buzz")));
                }
                if !active.buzzer_awarded.insert(player_id) {
                    return Ok(());
                }
                active.question.points(&self.settings)
            }
            kind => return Err(RoomError::Validation(format!("{kind} questions are graded automatically"))),
        };

        participant.score = participant.score.saturating_add(awarded);
        if awarded > 0 {
            self.writer.enqueue(StoreWrite::IncrementScore { player_id, delta: i64::from(awarded) });
        }
        tracing::debug!(code = %self.code, %player_id, question_id, awarded, "marked correct");
        self.publish_state();
        Ok(())
    }

    // -- ticks -------------------------------------------------------------

    fn on_tick(&mut self, question_id: QuestionId, tick: Tick) {
        let time_remaining_ms = tick.remaining_ms();
        tracing::trace!(code = %self.code, %question_id, time_remaining_ms, "time");
        if tick.finished {
            tracing::debug!(code = %self.code, %question_id, "countdown expired");
        }
        self.broadcaster.publish(ServerEvent::Time { question_id, time_remaining_ms });
    }

    // -- projections -------------------------------------------------------

    fn status(&self) -> RoomStatus {
        self.phase.status(self.timer.is_paused())
    }

    fn sync_status(&mut self) {
        let status = self.status();
        if status != self.stored_status {
            self.stored_status = status;
            self.writer.enqueue(StoreWrite::SetStatus(status));
        }
    }

    fn publish_state(&mut self) {
        self.sync_status();
        self.broadcaster.publish(ServerEvent::RoomState(self.state_view()));
    }

    fn leaderboard(&self) -> buzzline_protocol::LeaderboardView {
        leaderboard(&self.participants, &self.teams, self.settings.team_mode, self.config.leaderboard_size)
    }

    fn public_teams(&self) -> Vec<buzzline_protocol::PublicTeam> {
        let scores = team_scores(&self.participants);
        self.teams.iter().map(|t| t.public(scores.get(&t.id).copied().unwrap_or(0))).collect()
    }

    fn state_view(&self) -> RoomStateView {
        RoomStateView {
            code: self.code.clone(),
            status: self.status(),
            players: self.participants.iter().map(Participant::public).collect(),
            teams: self.public_teams(),
            current_question: self.active.as_ref().map(|a| a.prompt.clone()),
            time_remaining_ms: self.timer.remaining_ms(),
            question_start_time: self.active.as_ref().map(|a| a.started_at_unix_ms),
            settings: self.settings.clone(),
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        let (responses, buzzes) = match &self.active {
            Some(active) => (
                active.responses.iter().map(|(pid, r)| active.record(*pid, r)).collect(),
                self.buzzer
                    .rankings(active.id())
                    .iter()
                    .map(|b| BuzzRecord {
                        question_id: active.question.id.clone(),
                        player_id: b.player_id,
                        rank: b.rank,
                        elapsed_ms: b.time_ms,
                    })
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        RoomSnapshot {
            code: self.code.clone(),
            status: self.status(),
            settings: self.settings.clone(),
            players: self.participants.iter().map(Participant::public).collect(),
            teams: self.public_teams(),
            current_question: self.active.as_ref().map(|a| a.prompt.clone()),
            responses,
            buzzes,
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            status: self.status(),
            phase: self.phase,
            participants: self.participants.len(),
            subscribers: self.broadcaster.len(),
            idle_for: self.empty_since.map(|since| since.elapsed()),
        }
    }
}

/// Spawns the actor and its store writer. The room record must already
/// exist in the store.
pub(crate) fn spawn_room<C: QuestionCatalog, S: RoomStore>(
    code: RoomCode,
    settings: RoomSettings,
    teams: Vec<Team>,
    config: RoomConfig,
    catalog: Arc<C>,
    store: Arc<S>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);
    let (writer, _writer_task) = StoreWriter::spawn(code.clone(), Arc::clone(&store));

    let actor = RoomActor {
        code: code.clone(),
        timer: TimerSlot::new(config.countdown.clone()),
        config,
        settings,
        phase: Phase::Lobby,
        stored_status: RoomStatus::Lobby,
        participants: Vec::new(),
        teams,
        members: HashMap::new(),
        broadcaster: Broadcaster::new(code.clone()),
        active: None,
        buzzer: BuzzerArbiter::new(),
        catalog,
        writer,
        store,
        receiver: rx,
        empty_since: Some(Instant::now()),
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
