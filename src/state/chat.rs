use super::{chat_path, Session};
use crate::error::GameResult;
use crate::types::*;

/// Shown when the sender's participant record is already gone
const UNKNOWN_SENDER: &str = "Unknown";

impl Session {
    /// Post a chat line to the room. Blank messages are dropped without a write.
    ///
    /// Returns the new message id, if anything was sent.
    pub async fn send_chat(&mut self, text: &str) -> GameResult<Option<MessageId>> {
        let membership = self.require_membership()?;
        let message = text.trim();
        if message.is_empty() {
            return Ok(None);
        }

        let room = self.load_room(&membership).await?;
        let player_name = room
            .players
            .get(&membership.participant_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

        let chat = ChatMessage {
            id: String::new(),
            player_id: membership.participant_id.clone(),
            player_name,
            message: message.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        let id = self
            .store
            .create_unique(&chat_path(&membership.room_id), serde_json::to_value(&chat)?)
            .await?;

        tracing::debug!("Chat {} from {} in {}", id, chat.player_id, membership.room_id);
        Ok(Some(id))
    }
}
