//! WebSocket message dispatch
//!
//! Maps one client message onto the participant's session. Host-only and
//! turn checks live in the session operations themselves, so every failure
//! comes back as a `GameError` and is turned into an error message here.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::Session;
use crate::view::RoomView;

/// Handle a client message and return the direct response, if any.
///
/// Successful game actions answer with nothing: their effect arrives through
/// the room subscription like everyone else's.
pub async fn handle_message(msg: ClientMessage, session: &mut Session) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateRoom {
            host_name,
            room_name,
            max_players,
        } => {
            tracing::info!("Create room request from {}", host_name);
            match session.create_room(&host_name, &room_name, max_players).await {
                Ok(joined) => Some(ServerMessage::RoomJoined {
                    room_id: joined.room_id,
                    participant_id: joined.participant_id,
                }),
                Err(e) => Some(e.into()),
            }
        }

        ClientMessage::JoinRoom { room_id, name } => {
            tracing::info!("Join request for room {} from {}", room_id, name);
            match session.join_room(&room_id, &name).await {
                Ok(joined) => Some(ServerMessage::RoomJoined {
                    room_id: joined.room_id,
                    participant_id: joined.participant_id,
                }),
                Err(e) => Some(e.into()),
            }
        }

        ClientMessage::LeaveRoom => match session.leave_room().await {
            Ok(()) => Some(ServerMessage::view(RoomView::home())),
            Err(e) => Some(e.into()),
        },

        ClientMessage::StartGame => session.start_game().await.err().map(Into::into),

        ClientMessage::RestartGame => session.restart_game().await.err().map(Into::into),

        ClientMessage::AdvanceTurn => session.advance_turn().await.err().map(Into::into),

        ClientMessage::MakeDecision { decision } => session
            .submit_decision(decision)
            .await
            .err()
            .map(Into::into),

        ClientMessage::CastVote { target } => {
            session.cast_vote(&target).await.err().map(Into::into)
        }

        ClientMessage::SendChat { message } => session.send_chat(&message).await.err().map(Into::into),

        ClientMessage::RevealRole { revealed } => {
            Some(ServerMessage::view(session.reveal_role(revealed)))
        }
    }
}
