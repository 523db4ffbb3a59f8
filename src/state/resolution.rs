use super::turn::shuffled_turn_order;
use super::{room_path, Session};
use crate::catalog::Catalog;
use crate::error::{GameError, GameResult};
use crate::types::*;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Deal a fresh game for the given participants.
///
/// One uniformly chosen spy, a uniformly chosen item, a shuffled speaking
/// order, round 1, and every phase flag off.
pub fn new_game_instance<R: Rng + ?Sized>(
    roster: &[ParticipantId],
    catalog: &Catalog,
    rng: &mut R,
) -> GameResult<GameInstance> {
    if roster.len() < MIN_PLAYERS {
        return Err(GameError::InsufficientPlayers {
            min: MIN_PLAYERS,
            have: roster.len(),
        });
    }
    let spy = roster
        .choose(rng)
        .cloned()
        .ok_or(GameError::InsufficientPlayers {
            min: MIN_PLAYERS,
            have: 0,
        })?;

    let roles: BTreeMap<ParticipantId, Role> = roster
        .iter()
        .map(|id| {
            let role = if *id == spy { Role::Spy } else { Role::Civilian };
            (id.clone(), role)
        })
        .collect();
    let item = catalog.pick_random(rng).clone();
    let turn_order = shuffled_turn_order(roster, rng);
    let current_turn_player = turn_order[0].clone();

    Ok(GameInstance {
        instance_id: ulid::Ulid::new().to_string(),
        item,
        roles,
        turn_order,
        current_turn_index: 0,
        current_turn_player,
        round: 1,
        decision_phase: false,
        decisions: BTreeMap::new(),
        voting_phase: false,
        votes: BTreeMap::new(),
        game_over: false,
        winner: None,
        voted_out_player: None,
        spy_id: None,
    })
}

/// Final state of a game. Without an explicit spy id it is read from the roles.
pub fn end_game(
    game: &GameInstance,
    winner: Side,
    voted_out: &str,
    spy_id: Option<&str>,
) -> GamePatch {
    let spy_id = spy_id
        .map(str::to_string)
        .or_else(|| game.spy().cloned())
        .unwrap_or_default();

    GamePatch::new()
        .set("gameOver", true)
        .set("winner", winner)
        .set("votedOutPlayer", voted_out)
        .set("spyId", spy_id)
        .set("decisionPhase", false)
        .set("votingPhase", false)
}

impl Session {
    /// Host only: deal the first game for everyone currently in the room
    pub async fn start_game(&mut self) -> GameResult<()> {
        let membership = self.require_host("start the game")?;
        let room = self.load_room(&membership).await?;
        if room.game_started {
            return Err(GameError::GameAlreadyStarted);
        }

        let game = new_game_instance(&room.player_ids(), &self.catalog, &mut self.rng)?;
        tracing::info!(
            "Starting game {} in room {} with {} players",
            game.instance_id,
            membership.room_id,
            game.turn_order.len()
        );

        let fields = GamePatch::new()
            .set("gameStarted", true)
            .set("game", serde_json::to_value(&game)?)
            .into_fields();
        self.store.patch(&room_path(&membership.room_id), fields).await?;
        Ok(())
    }

    /// Host only: replace the game with a fresh one for the current roster.
    ///
    /// Allowed at any point after the first start, including mid-round.
    pub async fn restart_game(&mut self) -> GameResult<()> {
        let membership = self.require_host("restart the game")?;
        let room = self.load_room(&membership).await?;
        if !room.game_started {
            return Err(GameError::WrongPhase("game has not started"));
        }

        let game = new_game_instance(&room.player_ids(), &self.catalog, &mut self.rng)?;
        tracing::info!(
            "Restarting room {} as game {}",
            membership.room_id,
            game.instance_id
        );

        let fields = GamePatch::new()
            .set("game", serde_json::to_value(&game)?)
            .into_fields();
        self.store.patch(&room_path(&membership.room_id), fields).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{game_path, lookup_room};
    use super::*;
    use crate::store::SyncStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ids(names: &[&str]) -> Vec<ParticipantId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_game_has_exactly_one_spy() {
        let roster = ids(&["a", "b", "c", "d", "e"]);
        let catalog = Catalog::builtin();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..30 {
            let game = new_game_instance(&roster, &catalog, &mut rng).unwrap();
            let spies = game.roles.values().filter(|r| **r == Role::Spy).count();
            assert_eq!(spies, 1);
            assert_eq!(game.roles.len(), roster.len());

            let mut order = game.turn_order.clone();
            order.sort();
            assert_eq!(order, roster);
            assert_eq!(game.current_turn_index, 0);
            assert_eq!(game.current_turn_player, game.turn_order[0]);
            assert_eq!(game.round, 1);
            assert!(game.in_turn_phase());
            assert!(catalog.items().contains(&game.item));
        }
    }

    #[test]
    fn test_every_participant_can_be_spy() {
        let roster = ids(&["a", "b", "c"]);
        let catalog = Catalog::builtin();
        let mut rng = StdRng::seed_from_u64(8);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            let game = new_game_instance(&roster, &catalog, &mut rng).unwrap();
            seen.insert(game.spy().unwrap().clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_new_game_needs_three() {
        let catalog = Catalog::builtin();
        let mut rng = StdRng::seed_from_u64(1);
        let result = new_game_instance(&ids(&["a", "b"]), &catalog, &mut rng);
        assert!(matches!(
            result,
            Err(GameError::InsufficientPlayers { min: 3, have: 2 })
        ));
    }

    #[test]
    fn test_end_game_recomputes_spy() {
        let catalog = Catalog::builtin();
        let mut rng = StdRng::seed_from_u64(2);
        let mut game = new_game_instance(&ids(&["a", "b", "c"]), &catalog, &mut rng).unwrap();
        game.voting_phase = true;
        let spy = game.spy().unwrap().clone();

        let done = end_game(&game, Side::Spy, "b", None).apply_to(&game).unwrap();
        assert!(done.game_over);
        assert!(!done.voting_phase);
        assert!(!done.decision_phase);
        assert_eq!(done.winner, Some(Side::Spy));
        assert_eq!(done.voted_out_player.as_deref(), Some("b"));
        assert_eq!(done.spy_id, Some(spy));
    }

    #[tokio::test]
    async fn test_start_requires_host() {
        let mut table = Table::new();
        let (_host, mut guests) = room_with(&mut table, &["Bob", "Carol"]).await;
        assert!(matches!(
            guests[0].start_game().await,
            Err(GameError::NotHost(_))
        ));
    }

    #[tokio::test]
    async fn test_start_with_two_rejected_and_nothing_written() {
        let mut table = Table::new();
        let (mut host, _guests) = room_with(&mut table, &["Bob"]).await;
        let result = host.start_game().await;
        assert!(matches!(
            result,
            Err(GameError::InsufficientPlayers { min: 3, have: 2 })
        ));

        let room_id = host.membership().unwrap().room_id.clone();
        let room = lookup_room(&*table.store, &room_id).await.unwrap();
        assert!(!room.game_started);
        assert!(room.game.is_none());
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let mut table = Table::new();
        let (mut host, _guests) = room_with(&mut table, &["Bob", "Carol"]).await;
        host.start_game().await.unwrap();
        assert!(matches!(
            host.start_game().await,
            Err(GameError::GameAlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_restart_keeps_roster_and_resets_game() {
        let mut table = Table::new();
        let (mut host, _guests) = room_with(&mut table, &["Bob", "Carol"]).await;
        let room_id = host.membership().unwrap().room_id.clone();

        assert!(matches!(
            host.restart_game().await,
            Err(GameError::WrongPhase(_))
        ));

        host.start_game().await.unwrap();
        let before = lookup_room(&*table.store, &room_id).await.unwrap();
        let first = before.game.clone().unwrap();

        // Finish the first game by hand
        let done = end_game(&first, Side::Spy, &first.turn_order[0], None);
        table
            .store
            .patch(&game_path(&room_id), done.into_fields())
            .await
            .unwrap();

        host.restart_game().await.unwrap();
        let after = lookup_room(&*table.store, &room_id).await.unwrap();
        let second = after.game.unwrap();

        assert_eq!(after.room_id, before.room_id);
        assert_eq!(after.players, before.players);
        assert!(after.game_started);
        assert_ne!(second.instance_id, first.instance_id);
        assert_eq!(second.round, 1);
        assert!(!second.game_over);
        assert!(second.winner.is_none());
        assert!(second.votes.is_empty());
    }

    #[tokio::test]
    async fn test_restart_requires_host() {
        let mut table = Table::new();
        let (mut host, mut guests) = room_with(&mut table, &["Bob", "Carol"]).await;
        host.start_game().await.unwrap();
        assert!(matches!(
            guests[1].restart_game().await,
            Err(GameError::NotHost(_))
        ));
    }
}
