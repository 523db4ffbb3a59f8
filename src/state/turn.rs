use super::{game_path, Session};
use crate::error::{GameError, GameResult};
use crate::types::*;
use rand::seq::SliceRandom;
use rand::Rng;

/// Uniformly random speaking order over the given participants
pub fn shuffled_turn_order<R: Rng + ?Sized>(ids: &[ParticipantId], rng: &mut R) -> Vec<ParticipantId> {
    let mut order = ids.to_vec();
    order.shuffle(rng);
    order
}

/// Pass the turn to the next speaker.
///
/// Wrapping past the last speaker ends the round: the decision phase opens
/// with an empty decision map and the round counter moves on. The turn
/// pointer is left on the last speaker until the decision resolves.
pub fn advance_turn(game: &GameInstance) -> GamePatch {
    let len = game.turn_order.len().max(1);
    let next = (game.current_turn_index + 1) % len;

    if next == 0 {
        GamePatch::new()
            .set("decisionPhase", true)
            .clear("decisions")
            .set("round", game.round + 1)
    } else {
        let player = game.turn_order.get(next).cloned().unwrap_or_default();
        GamePatch::new()
            .set("currentTurnIndex", next)
            .set("currentTurnPlayer", player)
    }
}

impl Session {
    /// End this participant's turn. Only the current speaker may do this,
    /// unless the speaker has left the room, in which case anyone may pass on.
    pub async fn advance_turn(&mut self) -> GameResult<()> {
        let membership = self.require_membership()?;
        let room = self.load_room(&membership).await?;
        let game = match (&room.game, room.game_started) {
            (Some(game), true) => game,
            _ => return Err(GameError::WrongPhase("game has not started")),
        };
        if !game.in_turn_phase() {
            return Err(GameError::WrongPhase("not in the describing phase"));
        }
        let speaker_left = !room.is_member(&game.current_turn_player);
        if game.current_turn_player != membership.participant_id && !speaker_left {
            return Err(GameError::NotYourTurn);
        }
        if speaker_left {
            tracing::debug!(
                "Skipping departed speaker {} in {}",
                game.current_turn_player,
                membership.room_id
            );
        }

        let patch = advance_turn(game);
        if patch.get("decisionPhase").is_some() {
            tracing::debug!(
                "Round {} of {} complete, opening decision",
                game.round,
                membership.room_id
            );
        }
        self.store
            .patch(&game_path(&membership.room_id), patch.into_fields())
            .await?;
        Ok(())
    }
}
