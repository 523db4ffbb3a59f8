//! Per-participant view model.
//!
//! Rebuilt from the canonical room snapshot on every notification. Nothing in
//! here is ever written back to the store.

use crate::state::tally_votes;
use crate::types::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Home,
    Lobby,
    Turn,
    Decision,
    Voting,
    Resolved,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RosterEntry {
    pub id: ParticipantId,
    pub name: String,
    pub is_host: bool,
    pub is_me: bool,
    /// Submitted a decision in the open decision round
    pub has_decided: bool,
    /// Cast a vote in the open voting round
    pub has_voted: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TurnView {
    pub current_player: ParticipantId,
    pub current_player_name: Option<String>,
    pub index: usize,
    pub round: u32,
    pub is_my_turn: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DecisionTally {
    pub vote: usize,
    #[serde(rename = "continue")]
    pub continue_count: usize,
    pub submitted: usize,
    pub total: usize,
    pub my_decision: Option<Decision>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TargetCount {
    pub target: ParticipantId,
    pub name: Option<String>,
    pub votes: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoteTally {
    pub counts: Vec<TargetCount>,
    pub submitted: usize,
    pub total: usize,
    pub my_vote: Option<ParticipantId>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolutionView {
    pub winner: Side,
    pub voted_out: Option<ParticipantId>,
    pub voted_out_name: Option<String>,
    pub spy_id: Option<ParticipantId>,
    pub spy_name: Option<String>,
    pub item: Item,
    pub i_won: bool,
}

/// Own role, present only after the participant chose to reveal it
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoleView {
    pub role: Role,
    /// The secret item; never shown to the spy
    pub item: Option<Item>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatLine {
    pub id: MessageId,
    pub player_id: ParticipantId,
    pub player_name: String,
    pub message: String,
    pub timestamp: i64,
}

/// Session-local inputs that are not part of the shared document
#[derive(Debug, Clone, Default)]
pub struct LocalFlags {
    pub role_revealed: bool,
    pub my_decision: Option<Decision>,
    pub my_vote: Option<ParticipantId>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoomView {
    pub screen: Screen,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_players: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub me: Option<ParticipantId>,
    pub is_host: bool,
    pub roster: Vec<RosterEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<TurnView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionTally>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voting: Option<VoteTally>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_role: Option<RoleView>,
    pub chat: Vec<ChatLine>,
}

fn name_of(room: &Room, id: &str) -> Option<String> {
    room.players.get(id).map(|p| p.name.clone())
}

impl RoomView {
    pub fn home() -> Self {
        Self {
            screen: Screen::Home,
            room_id: None,
            room_name: None,
            max_players: None,
            me: None,
            is_host: false,
            roster: Vec::new(),
            turn: None,
            decision: None,
            voting: None,
            resolution: None,
            my_role: None,
            chat: Vec::new(),
        }
    }

    /// Derive what participant `me` sees of `room`
    pub fn build(room: &Room, me: &str, local: &LocalFlags) -> Self {
        let game = room.game.as_ref().filter(|_| room.game_started);

        let screen = match game {
            None => Screen::Lobby,
            Some(g) if g.game_over => Screen::Resolved,
            Some(g) if g.voting_phase => Screen::Voting,
            Some(g) if g.decision_phase => Screen::Decision,
            Some(_) => Screen::Turn,
        };

        let roster = room
            .roster()
            .into_iter()
            .map(|p| RosterEntry {
                id: p.id.clone(),
                name: p.name.clone(),
                is_host: p.is_host,
                is_me: p.id == me,
                has_decided: game.is_some_and(|g| g.decision_phase && g.decisions.contains_key(&p.id)),
                has_voted: game.is_some_and(|g| g.voting_phase && g.votes.contains_key(&p.id)),
            })
            .collect();

        let total = room.players.len();

        let turn = game.filter(|g| !g.game_over).map(|g| TurnView {
            current_player: g.current_turn_player.clone(),
            current_player_name: name_of(room, &g.current_turn_player),
            index: g.current_turn_index,
            round: g.round,
            is_my_turn: g.in_turn_phase() && g.current_turn_player == me,
        });

        let decision = game.filter(|g| g.decision_phase && !g.game_over).map(|g| {
            let vote = g.decisions.values().filter(|d| **d == Decision::Vote).count();
            DecisionTally {
                vote,
                continue_count: g.decisions.len() - vote,
                submitted: g.decisions.len(),
                total,
                my_decision: g.decisions.get(me).copied().or(local.my_decision),
            }
        });

        let voting = game.filter(|g| g.voting_phase && !g.game_over).map(|g| VoteTally {
            counts: tally_votes(g.votes.values())
                .into_iter()
                .map(|(target, votes)| TargetCount {
                    name: name_of(room, &target),
                    target,
                    votes,
                })
                .collect(),
            submitted: g.votes.len(),
            total,
            my_vote: g.votes.get(me).cloned().or_else(|| local.my_vote.clone()),
        });

        let my_role = game
            .filter(|_| local.role_revealed)
            .and_then(|g| g.role_of(me).map(|role| (g, role)))
            .map(|(g, role)| RoleView {
                role,
                item: (role == Role::Civilian).then(|| g.item.clone()),
            });

        let resolution = game.filter(|g| g.game_over).and_then(|g| {
            let winner = g.winner?;
            let spy_id = g.spy_id.clone().or_else(|| g.spy().cloned());
            let my_role = g.role_of(me);
            let i_won = match winner {
                Side::Civilians => my_role == Some(Role::Civilian),
                Side::Spy => my_role == Some(Role::Spy),
            };
            Some(ResolutionView {
                winner,
                voted_out: g.voted_out_player.clone(),
                voted_out_name: g.voted_out_player.as_deref().and_then(|id| name_of(room, id)),
                spy_name: spy_id.as_deref().and_then(|id| name_of(room, id)),
                spy_id,
                item: g.item.clone(),
                i_won,
            })
        });

        let chat = room
            .chat_log()
            .into_iter()
            .map(|m| ChatLine {
                id: m.id.clone(),
                player_id: m.player_id.clone(),
                player_name: m.player_name.clone(),
                message: m.message.clone(),
                timestamp: m.timestamp,
            })
            .collect();

        Self {
            screen,
            room_id: Some(room.room_id.clone()),
            room_name: Some(room.room_name.clone()),
            max_players: Some(room.max_players),
            me: Some(me.to_string()),
            is_host: room.players.get(me).is_some_and(|p| p.is_host),
            roster,
            turn,
            decision,
            voting,
            resolution,
            my_role,
            chat,
        }
    }
}
