mod chat;
mod consensus;
mod resolution;
mod room;
mod roster;
mod turn;

pub use consensus::{resolve_decisions, resolve_votes, tally_votes, VoteOutcome};
pub use resolution::{end_game, new_game_instance};
pub use room::{generate_room_id, lookup_room, normalize_room_id, RoomJoined};
pub use turn::{advance_turn, shuffled_turn_order};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{GameError, GameResult};
use crate::store::{MemoryStore, Subscription, SyncStore};
use crate::types::*;
use crate::view::{LocalFlags, RoomView};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub fn room_path(room_id: &str) -> String {
    format!("rooms/{}", room_id)
}

pub fn players_path(room_id: &str) -> String {
    format!("rooms/{}/players", room_id)
}

pub fn player_path(room_id: &str, participant_id: &str) -> String {
    format!("rooms/{}/players/{}", room_id, participant_id)
}

pub fn game_path(room_id: &str) -> String {
    format!("rooms/{}/game", room_id)
}

pub fn decisions_path(room_id: &str) -> String {
    format!("rooms/{}/game/decisions", room_id)
}

pub fn votes_path(room_id: &str) -> String {
    format!("rooms/{}/game/votes", room_id)
}

pub fn chat_path(room_id: &str) -> String {
    format!("rooms/{}/chat", room_id)
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SyncStore>,
    pub catalog: Arc<Catalog>,
    pub config: Arc<Config>,
    sessions_opened: Arc<AtomicU64>,
}

impl AppState {
    /// In-memory store, built-in catalog, default config
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(MemoryStore::new()),
            Catalog::builtin(),
            Config::default(),
        )
    }

    pub fn with_parts(store: Arc<dyn SyncStore>, catalog: Catalog, config: Config) -> Self {
        Self {
            store,
            catalog: Arc::new(catalog),
            config: Arc::new(config),
            sessions_opened: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open the local state for one participant connection.
    ///
    /// With a configured seed every session gets its own deterministic RNG
    /// stream; otherwise it is seeded from the OS.
    pub fn open_session(&self) -> Session {
        let n = self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        let rng = match self.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n)),
            None => StdRng::from_os_rng(),
        };
        Session::new(self.store.clone(), self.catalog.clone(), rng)
    }

    pub async fn lookup_room(&self, room_id: &str) -> GameResult<Room> {
        lookup_room(self.store.as_ref(), room_id).await
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Which room a session is in, and as whom
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
    pub is_host: bool,
}

/// What happened when a snapshot was observed
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Updated(Box<RoomView>),
    /// The room document disappeared; the session is back at home
    RoomClosed,
}

/// One participant's process.
///
/// Holds the participant's identity and local-only flags, issues path-scoped
/// writes for that participant, and reacts to room snapshots. It never assumes
/// any other session is running.
pub struct Session {
    store: Arc<dyn SyncStore>,
    catalog: Arc<Catalog>,
    rng: StdRng,
    membership: Option<Membership>,
    room: Option<Room>,
    role_revealed: bool,
    /// Decision already sent, with the round it was sent in
    my_decision: Option<(u32, Decision)>,
    my_vote: Option<ParticipantId>,
    instance_id: Option<InstanceId>,
}

impl Session {
    pub fn new(store: Arc<dyn SyncStore>, catalog: Arc<Catalog>, rng: StdRng) -> Self {
        Self {
            store,
            catalog,
            rng,
            membership: None,
            room: None,
            role_revealed: false,
            my_decision: None,
            my_vote: None,
            instance_id: None,
        }
    }

    pub fn membership(&self) -> Option<&Membership> {
        self.membership.as_ref()
    }

    /// Last room snapshot this session observed
    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    fn require_membership(&self) -> GameResult<Membership> {
        self.membership.clone().ok_or(GameError::NotInRoom)
    }

    fn require_host(&self, action: &'static str) -> GameResult<Membership> {
        let membership = self.require_membership()?;
        if !membership.is_host {
            return Err(GameError::NotHost(action));
        }
        Ok(membership)
    }

    /// Fresh one-shot read of the room this session is in
    async fn load_room(&self, membership: &Membership) -> GameResult<Room> {
        lookup_room(self.store.as_ref(), &membership.room_id).await
    }

    /// Open a live subscription on the current room document
    pub async fn subscribe(&self) -> GameResult<Subscription> {
        let membership = self.require_membership()?;
        Ok(self
            .store
            .subscribe(&room_path(&membership.room_id))
            .await?)
    }

    /// Local opt-in to show (or hide again) the own role
    pub fn reveal_role(&mut self, revealed: bool) -> RoomView {
        self.role_revealed = revealed;
        self.view()
    }

    fn enter(&mut self, membership: Membership) {
        self.reset_local();
        self.membership = Some(membership);
    }

    /// Back to the home state
    fn reset_local(&mut self) {
        self.membership = None;
        self.room = None;
        self.role_revealed = false;
        self.my_decision = None;
        self.my_vote = None;
        self.instance_id = None;
    }

    pub fn view(&self) -> RoomView {
        match (&self.membership, &self.room) {
            (Some(membership), Some(room)) => {
                RoomView::build(room, &membership.participant_id, &self.local_flags())
            }
            _ => RoomView::home(),
        }
    }

    fn local_flags(&self) -> LocalFlags {
        let round = self
            .room
            .as_ref()
            .and_then(|r| r.game.as_ref())
            .map(|g| g.round);
        LocalFlags {
            role_revealed: self.role_revealed,
            my_decision: self
                .my_decision
                .filter(|(r, _)| Some(*r) == round)
                .map(|(_, d)| d),
            my_vote: self.my_vote.clone(),
        }
    }

    /// React to a room snapshot delivered by the subscription.
    ///
    /// Finished decision or voting rounds are resolved here by every session
    /// that sees them. Each one re-checks a fresh read first, so a session
    /// holding an old snapshot does not undo a later phase.
    pub async fn on_snapshot(
        &mut self,
        snapshot: Option<serde_json::Value>,
    ) -> GameResult<SessionEvent> {
        let Some(membership) = self.membership.clone() else {
            return Ok(SessionEvent::Updated(Box::new(RoomView::home())));
        };

        let Some(value) = snapshot else {
            tracing::info!("Room {} was closed", membership.room_id);
            self.reset_local();
            return Ok(SessionEvent::RoomClosed);
        };

        let room = Room::from_value(&membership.room_id, value)?;
        self.track_instance(&room);

        if let Err(e) = self.resolve_pending(&membership, &room).await {
            tracing::warn!(
                "Failed to write resolution for room {}: {}",
                membership.room_id,
                e
            );
        }

        self.room = Some(room);
        Ok(SessionEvent::Updated(Box::new(self.view())))
    }

    /// A restart replaces the game instance; local per-game memory goes with it
    fn track_instance(&mut self, room: &Room) {
        let current = room
            .game
            .as_ref()
            .filter(|_| room.game_started)
            .map(|g| g.instance_id.clone());
        if current != self.instance_id {
            if current.is_some() {
                tracing::debug!("Observed new game instance {:?}", current);
            }
            self.role_revealed = false;
            self.my_decision = None;
            self.my_vote = None;
            self.instance_id = current;
        }
    }

    /// Write the resolution of a finished decision or voting round, if any.
    ///
    /// The snapshot only tells us a round is open. It may trail writes that
    /// already landed, so the round is resolved against a fresh read.
    async fn resolve_pending(&self, membership: &Membership, snapshot: &Room) -> GameResult<()> {
        if !in_open_round(snapshot) {
            return Ok(());
        }
        let room = match self.load_room(membership).await {
            Ok(room) => room,
            Err(GameError::RoomNotFound) => return Ok(()),
            Err(e) => return Err(e),
        };
        let Some(game) = room.game.as_ref().filter(|_| room.game_started) else {
            return Ok(());
        };
        let roster = room.player_ids();

        if let Some(patch) = resolve_decisions(game, &roster) {
            tracing::debug!("Resolving decision round {} in {}", game.round, room.room_id);
            self.store
                .patch(&game_path(&membership.room_id), patch.into_fields())
                .await?;
        } else if let Some(outcome) = resolve_votes(game, &roster) {
            tracing::info!(
                "Vote resolved in {}: {} voted out, {:?} win",
                room.room_id,
                outcome.voted_out,
                outcome.winner
            );
            let patch = end_game(
                game,
                outcome.winner,
                &outcome.voted_out,
                outcome.spy_id.as_deref(),
            );
            self.store
                .patch(&game_path(&membership.room_id), patch.into_fields())
                .await?;
        }
        Ok(())
    }
}

fn in_open_round(room: &Room) -> bool {
    room.game.as_ref().is_some_and(|g| {
        room.game_started && !g.game_over && (g.decision_phase || g.voting_phase)
    })
}
