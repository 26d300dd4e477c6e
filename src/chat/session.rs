//! In-memory conversation state for one interactive session.

/// Greeting seeded into every fresh session.
pub const GREETING: &str =
    "Assalam-o-Alaikum! I am the NADRA SOP Assistant. How can I help you today?";

/// Greeting a reset session is reseeded with.
pub const RESET_GREETING: &str = "Conversation reset. How can I assist you further?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the visible transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Ordered conversation history, held for the lifetime of one chat process
/// and never persisted. Passed by reference into each turn handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    /// A fresh session containing only the seed greeting.
    #[inline]
    pub fn new() -> Self {
        Self {
            turns: vec![Turn {
                role: Role::Assistant,
                content: GREETING.to_string(),
            }],
        }
    }

    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::User,
            content: content.into(),
        });
    }

    #[inline]
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    /// Replace the whole history with a single reset greeting. A pure state
    /// replacement, regardless of prior length; the persistent collection is
    /// untouched.
    #[inline]
    pub fn reset(&mut self) {
        self.turns = vec![Turn {
            role: Role::Assistant,
            content: RESET_GREETING.to_string(),
        }];
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
