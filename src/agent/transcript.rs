use crate::llm::provider::{ChatMessage, ChatRole};

/// Ordered conversation history. The first turn is always the system persona;
/// turns are only ever appended, and `clear` truncates back to that first turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![ChatMessage::new(ChatRole::System, system_prompt)],
        }
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.turns.last()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ChatMessage::new(ChatRole::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ChatMessage::new(ChatRole::Assistant, content));
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        self.turns.push(ChatMessage::new(ChatRole::System, content));
    }

    pub fn push_tool(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.turns.push(ChatMessage::tool(name, content));
    }

    pub fn clear(&mut self) {
        self.turns.truncate(1);
    }

    /// The last `k` user/assistant turns in order. System and tool turns are
    /// skipped so the window never carries looked-up facts.
    pub fn recent_window(&self, k: usize) -> Vec<ChatMessage> {
        let mut window = self
            .turns
            .iter()
            .filter(|turn| matches!(turn.role, ChatRole::User | ChatRole::Assistant))
            .rev()
            .take(k)
            .cloned()
            .collect::<Vec<_>>();
        window.reverse();
        window
    }
}
