//! Conversation state persisted between turns of a session.
use crate::turn::{Route, Source};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub turn_index: u32,
}

/// Full per-session state. The orchestrator is the sole mutator during a
/// turn; the checkpoint store owns it between turns.
///
/// `messages` is append-only and its order is the turn order.
/// `last_route`/`last_answer`/`last_sources` always describe the most
/// recently completed turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub last_route: Option<Route>,
    #[serde(default)]
    pub last_answer: Option<String>,
    #[serde(default)]
    pub last_sources: Vec<Source>,
}

impl ConversationState {
    /// Index the next turn will carry. Messages are appended in turn
    /// order, so the maximum seen so far plus one is always correct.
    pub fn next_turn_index(&self) -> u32 {
        self.messages
            .iter()
            .map(|m| m.turn_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// The most recent messages, oldest first.
    pub fn recent_messages(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    /// Appends the user/assistant pair for a completed turn.
    pub fn push_turn(&mut self, turn_index: u32, user_content: String, assistant_content: String) {
        self.messages.push(Message {
            role: Role::User,
            content: user_content,
            turn_index,
        });
        self.messages.push(Message {
            role: Role::Assistant,
            content: assistant_content,
            turn_index,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_index_starts_at_zero_and_advances() {
        let mut state = ConversationState::default();
        assert_eq!(state.next_turn_index(), 0);

        state.push_turn(0, "hello".into(), "hi".into());
        assert_eq!(state.next_turn_index(), 1);

        state.push_turn(1, "more".into(), "sure".into());
        assert_eq!(state.next_turn_index(), 2);
        assert_eq!(state.messages.len(), 4);
    }

    #[test]
    fn messages_keep_turn_order() {
        let mut state = ConversationState::default();
        state.push_turn(0, "q1".into(), "a1".into());
        state.push_turn(1, "q2".into(), "a2".into());

        let contents: Vec<&str> = state.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
        assert_eq!(state.messages[0].role, Role::User);
        assert_eq!(state.messages[1].role, Role::Assistant);
    }

    #[test]
    fn recent_messages_returns_tail() {
        let mut state = ConversationState::default();
        state.push_turn(0, "q1".into(), "a1".into());
        state.push_turn(1, "q2".into(), "a2".into());

        let recent = state.recent_messages(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "q2");
        assert_eq!(recent[1].content, "a2");

        assert_eq!(state.recent_messages(100).len(), 4);
    }

    #[test]
    fn state_survives_json_round_trip() {
        let mut state = ConversationState::default();
        state.push_turn(0, "what about pricing?".into(), "See [S1].".into());
        state.last_route = Some(Route::Retrieve);
        state.last_answer = Some("See [S1].".into());

        let json = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.messages.len(), 2);
        assert_eq!(back.last_route, Some(Route::Retrieve));
        assert_eq!(back.last_answer.as_deref(), Some("See [S1]."));
    }
}
