//! Append-only conversation state.
//!
//! The model keeps no memory between calls; the caller resends the whole
//! history every turn. [`Conversation`] is that history.

use crate::message::{Message, Role};

/// Ordered, append-only sequence of messages for one session.
///
/// Insertion order is turn order. Nothing is ever removed or rewritten;
/// bounding what is *sent* is done with [`Conversation::recent`], which
/// leaves the stored history untouched.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation with a leading system entry.
    pub fn with_system(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(content)],
        }
    }

    /// Add a message to the end of the history.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append several messages in order.
    pub fn extend<I: IntoIterator<Item = Message>>(&mut self, messages: I) {
        self.messages.extend(messages);
    }

    /// The full history in append order.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of user turns recorded.
    pub fn turns(&self) -> usize {
        self.messages.iter().filter(|m| m.is_user_turn()).count()
    }

    /// Most recent assistant reply, if any.
    pub fn last_reply(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.has_tool_calls())
    }

    /// History trimmed to the last `max_turns` user turns.
    ///
    /// A leading system entry is always kept. The cut is made at a user
    /// message so that tool calls and their results are never separated.
    /// `None` returns the whole history.
    pub fn recent(&self, max_turns: Option<usize>) -> Vec<Message> {
        let Some(max_turns) = max_turns else {
            return self.messages.clone();
        };

        let (system, rest) = match self.messages.first() {
            Some(first) if first.role == Role::System => (Some(first), &self.messages[1..]),
            _ => (None, &self.messages[..]),
        };

        let user_positions: Vec<usize> = rest
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_user_turn())
            .map(|(i, _)| i)
            .collect();

        let start = if user_positions.len() > max_turns {
            user_positions[user_positions.len() - max_turns]
        } else {
            0
        };

        system
            .into_iter()
            .chain(rest[start..].iter())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(conversation: &mut Conversation, question: &str, answer: &str) {
        conversation.append(Message::user(question));
        conversation.append(Message::assistant(answer));
    }

    #[test]
    fn test_snapshot_preserves_append_order() {
        let mut conversation = Conversation::new();
        let messages: Vec<Message> = (0..25)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("question {}", i))
                } else {
                    Message::assistant(format!("answer {}", i))
                }
            })
            .collect();

        for message in messages.iter().cloned() {
            conversation.append(message);
        }

        assert_eq!(conversation.len(), 25);
        assert_eq!(conversation.snapshot(), messages.as_slice());
    }

    #[test]
    fn test_with_system_leads() {
        let mut conversation = Conversation::with_system("You are terse.");
        exchange(&mut conversation, "hi", "hello");

        assert_eq!(conversation.snapshot()[0].role, Role::System);
        assert_eq!(conversation.turns(), 1);
        assert_eq!(conversation.last_reply().unwrap().content, "hello");
    }

    #[test]
    fn test_recent_unbounded_returns_everything() {
        let mut conversation = Conversation::new();
        exchange(&mut conversation, "a", "1");
        exchange(&mut conversation, "b", "2");

        assert_eq!(conversation.recent(None), conversation.snapshot().to_vec());
    }

    #[test]
    fn test_recent_keeps_last_turns_and_system() {
        let mut conversation = Conversation::with_system("sys");
        exchange(&mut conversation, "a", "1");
        exchange(&mut conversation, "b", "2");
        exchange(&mut conversation, "c", "3");

        let window = conversation.recent(Some(2));
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["sys", "b", "2", "c", "3"]);

        // Stored history is untouched
        assert_eq!(conversation.len(), 7);
    }

    #[test]
    fn test_recent_does_not_split_tool_exchange() {
        use crate::message::{ToolCall, ToolResult};

        let mut conversation = Conversation::new();
        exchange(&mut conversation, "a", "1");
        conversation.append(Message::user("weather?"));
        conversation.append(Message::assistant_with_tools(
            "",
            vec![ToolCall::new("c1", "get_weather", serde_json::json!({"location": "Miami"}))],
        ));
        conversation.append(Message::tool_result(&ToolResult {
            call_id: "c1".to_string(),
            name: "get_weather".to_string(),
            output: "sunny".to_string(),
            is_error: false,
        }));
        conversation.append(Message::assistant("It is sunny."));

        let window = conversation.recent(Some(1));
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].content, "weather?");
        assert_eq!(window[2].role, Role::Tool);
    }

    #[test]
    fn test_recent_with_more_budget_than_turns() {
        let mut conversation = Conversation::new();
        exchange(&mut conversation, "a", "1");

        assert_eq!(conversation.recent(Some(10)).len(), 2);
    }
}
