//! Message log
//!
//! Append-only ordered record of the utterances exchanged in a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A logged utterance. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier (UUID v4)
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered message log, owned by the orchestrator
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    ///
    /// Returns the appended message, or `None` if `text` is empty after trimming.
    pub fn append(&mut self, role: Role, text: &str) -> Option<&Message> {
        if text.trim().is_empty() {
            return None;
        }
        self.messages.push(Message::new(role, text.to_string()));
        self.messages.last()
    }

    /// Remove every message
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages in insertion order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_append_keeps_insertion_order() {
        let mut log = MessageLog::new();
        log.append(Role::User, "oi");
        log.append(Role::Assistant, "Olá!");

        let messages = log.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "oi");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].text, "Olá!");
        assert!(messages[0].timestamp <= messages[1].timestamp);
    }

    #[test]
    fn test_append_ignores_blank_text() {
        let mut log = MessageLog::new();
        assert!(log.append(Role::User, "").is_none());
        assert!(log.append(Role::User, "  \n\t").is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_append_keeps_text_verbatim() {
        let mut log = MessageLog::new();
        log.append(Role::Assistant, " Olá! ");
        assert_eq!(log.last().unwrap().text, " Olá! ");
    }

    #[test]
    fn test_ids_unique_under_rapid_creation() {
        let mut log = MessageLog::new();
        for i in 0..500 {
            log.append(Role::User, &format!("message {}", i));
        }
        let ids: HashSet<&str> = log.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_clear_empties_log() {
        let mut log = MessageLog::new();
        log.append(Role::User, "oi");
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(log.last().is_none());
    }

    #[test]
    fn test_message_serialisation() {
        let mut log = MessageLog::new();
        log.append(Role::Assistant, "Olá!");
        let json = serde_json::to_string(log.last().unwrap()).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
        assert!(json.contains("\"timestamp\""));
    }
}
