//! Decision and voting rounds.
//!
//! Each participant writes only its own child key under `decisions` or
//! `votes`, so concurrent submissions merge. Resolution is a pure function of
//! the persisted game and the current roster, and any session may apply it.

use super::{decisions_path, votes_path, Session};
use crate::error::{GameError, GameResult};
use crate::types::*;
use serde_json::{Map, Value};

/// Decide what happens after everyone has submitted a decision.
///
/// Returns `None` while submissions from current roster members are still
/// missing, or when the game is not in the decision phase. A strict majority
/// for voting opens the vote; anything else, ties included, sends the game
/// back to the first speaker.
pub fn resolve_decisions(game: &GameInstance, roster: &[ParticipantId]) -> Option<GamePatch> {
    if !game.decision_phase || game.game_over || roster.is_empty() {
        return None;
    }

    let mut vote = 0;
    let mut keep_going = 0;
    for id in roster {
        match game.decisions.get(id) {
            Some(Decision::Vote) => vote += 1,
            Some(Decision::Continue) => keep_going += 1,
            None => return None,
        }
    }

    let patch = GamePatch::new()
        .set("decisionPhase", false)
        .clear("decisions");
    if vote > keep_going {
        Some(patch.set("votingPhase", true).clear("votes"))
    } else {
        let first = game.turn_order.first().cloned().unwrap_or_default();
        Some(
            patch
                .set("currentTurnIndex", 0)
                .set("currentTurnPlayer", first),
        )
    }
}

/// Count votes per target.
///
/// Targets keep the order they were first seen in. Callers pass votes in
/// voter-id order, which makes the result deterministic.
pub fn tally_votes<'a>(
    targets: impl IntoIterator<Item = &'a ParticipantId>,
) -> Vec<(ParticipantId, usize)> {
    let mut counts: Vec<(ParticipantId, usize)> = Vec::new();
    for target in targets {
        match counts.iter_mut().find(|(id, _)| id == target) {
            Some((_, n)) => *n += 1,
            None => counts.push((target.clone(), 1)),
        }
    }
    counts
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteOutcome {
    pub voted_out: ParticipantId,
    pub winner: Side,
    pub spy_id: Option<ParticipantId>,
    pub counts: Vec<(ParticipantId, usize)>,
}

/// Decide the vote once every current roster member has voted.
///
/// The first target to reach the highest count is voted out. Civilians win
/// exactly when that target is the spy.
pub fn resolve_votes(game: &GameInstance, roster: &[ParticipantId]) -> Option<VoteOutcome> {
    if !game.voting_phase || game.game_over || roster.is_empty() {
        return None;
    }
    if roster.iter().any(|id| !game.votes.contains_key(id)) {
        return None;
    }

    let counts = tally_votes(
        game.votes
            .iter()
            .filter(|(voter, _)| roster.contains(*voter))
            .map(|(_, target)| target),
    );

    let mut leader: Option<&(ParticipantId, usize)> = None;
    for entry in &counts {
        match leader {
            Some(best) if entry.1 <= best.1 => {}
            _ => leader = Some(entry),
        }
    }
    let voted_out = leader?.0.clone();

    let winner = if game.role_of(&voted_out) == Some(Role::Spy) {
        Side::Civilians
    } else {
        Side::Spy
    };

    Some(VoteOutcome {
        voted_out,
        winner,
        spy_id: game.spy().cloned(),
        counts,
    })
}

fn single_entry(key: &str, value: impl Into<Value>) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value.into());
    map
}

impl Session {
    /// Vote to go to a vote, or to keep describing. Once per decision round.
    pub async fn submit_decision(&mut self, decision: Decision) -> GameResult<()> {
        let membership = self.require_membership()?;
        let room = self.load_room(&membership).await?;
        let game = room
            .game
            .as_ref()
            .filter(|g| room.game_started && g.decision_phase && !g.game_over)
            .ok_or(GameError::WrongPhase("no decision is open"))?;

        if game.decisions.contains_key(&membership.participant_id) {
            return Err(GameError::AlreadyDecided);
        }

        self.store
            .patch(
                &decisions_path(&membership.room_id),
                single_entry(&membership.participant_id, serde_json::to_value(decision)?),
            )
            .await?;
        self.my_decision = Some((game.round, decision));

        tracing::debug!(
            "{} decided {:?} in round {} of {}",
            membership.participant_id,
            decision,
            game.round,
            membership.room_id
        );
        Ok(())
    }

    /// Vote out a participant. Voting for oneself is allowed.
    pub async fn cast_vote(&mut self, target: &str) -> GameResult<()> {
        let membership = self.require_membership()?;
        let room = self.load_room(&membership).await?;
        let game = room
            .game
            .as_ref()
            .filter(|g| room.game_started && g.voting_phase && !g.game_over)
            .ok_or(GameError::WrongPhase("voting is not open"))?;

        if !room.is_member(target) {
            return Err(GameError::UnknownParticipant(target.to_string()));
        }
        // The stored votes are authoritative; a local vote missing there was lost
        if game.votes.contains_key(&membership.participant_id) {
            return Err(GameError::AlreadyVoted);
        }
        if let Some(lost) = &self.my_vote {
            tracing::warn!(
                "Vote of {} for {} is no longer stored, voting again",
                membership.participant_id,
                lost
            );
        }

        self.store
            .patch(
                &votes_path(&membership.room_id),
                single_entry(&membership.participant_id, target),
            )
            .await?;
        self.my_vote = Some(target.to_string());

        tracing::debug!(
            "{} voted for {} in {}",
            membership.participant_id,
            target,
            membership.room_id
        );
        Ok(())
    }
}
