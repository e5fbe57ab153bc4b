//! Support chat sessions and the escalation log.
//!
//! Auto-replies come from a pluggable [`Classifier`]; the production
//! implementation may call an external text-generation service, and the
//! built-in [`CannedClassifier`] covers its absence. Escalation behaves
//! identically either way, and nothing in here can touch ledger state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SenderKind {
    User,
    Bot,
    Admin,
}

#[derive(Serialize, Clone, Debug)]
pub struct ChatMessage {
    pub id: String,
    pub sender: SenderKind,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Open,
    Escalated,
    Closed,
}

#[derive(Serialize, Clone, Debug)]
pub struct ChatSession {
    pub user_id: String,
    pub messages: Vec<ChatMessage>,
    pub status: SessionStatus,
    pub unread: bool,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SupportKind {
    Complaint,
    Alert,
    Support,
}

/// Append-only support log entry, listed by admins
#[derive(Serialize, Clone, Debug)]
pub struct SupportEntry {
    pub id: String,
    pub user_name: String,
    pub message: String,
    pub kind: SupportKind,
    pub created_at: DateTime<Utc>,
}

/// Outcome of classifying one user message
#[derive(Clone, Debug)]
pub struct Verdict {
    pub reply: String,
    pub escalate: bool,
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct ClassifierUnavailable;

impl std::fmt::Display for ClassifierUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "classifier unavailable")
    }
}

impl std::error::Error for ClassifierUnavailable {}

/// Message classifier seam. Implementations may call out to an LLM; the
/// support desk falls back to canned behavior when they fail.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Verdict, ClassifierUnavailable>;
}

const ESCALATION_KEYWORDS: &[&str] = &[
    "withdraw", "pending", "complaint", "refund", "scam", "locked", "stuck",
];

/// Keyword-heuristic classifier used when no external service is wired up
pub struct CannedClassifier;

impl CannedClassifier {
    fn keyword_hit(text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        ESCALATION_KEYWORDS.iter().find(|k| lower.contains(**k)).copied()
    }

    /// The verdict used whenever no classifier answer is available
    pub fn fallback(text: &str) -> Verdict {
        match Self::keyword_hit(text) {
            Some(keyword) => Verdict {
                reply: "Thanks for reaching out. Your message has been forwarded to our support team."
                    .to_string(),
                escalate: true,
                reason: Some(format!("keyword match: {}", keyword)),
            },
            None => Verdict {
                reply: "Thanks for your message! A member of our team will get back to you shortly."
                    .to_string(),
                escalate: false,
                reason: None,
            },
        }
    }
}

impl Classifier for CannedClassifier {
    fn classify(&self, text: &str) -> Result<Verdict, ClassifierUnavailable> {
        Ok(Self::fallback(text))
    }
}

/// All conversational state: one chat session per user plus the support log
#[derive(Default)]
pub struct SupportDesk {
    sessions: HashMap<String, ChatSession>,
    log: Vec<SupportEntry>,
}

impl SupportDesk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or lazily create) a user's chat session
    pub fn session_for(&mut self, user_id: &str) -> &ChatSession {
        self.sessions
            .entry(user_id.to_string())
            .or_insert_with(|| ChatSession {
                user_id: user_id.to_string(),
                messages: Vec::new(),
                status: SessionStatus::Open,
                unread: false,
            })
    }

    /// Append a user message, auto-reply via the classifier, and escalate
    /// when the verdict (or the user's own issue flag) asks for it.
    pub fn send_message(
        &mut self,
        user_id: &str,
        user_name: &str,
        body: &str,
        flagged_issue: bool,
        classifier: &dyn Classifier,
    ) -> ChatSession {
        let verdict = classifier
            .classify(body)
            .unwrap_or_else(|_| CannedClassifier::fallback(body));
        let escalated = verdict.escalate || flagged_issue;

        let session = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| ChatSession {
                user_id: user_id.to_string(),
                messages: Vec::new(),
                status: SessionStatus::Open,
                unread: false,
            });
        session.messages.push(ChatMessage {
            id: format!("msg-{}", Uuid::new_v4()),
            sender: SenderKind::User,
            body: body.to_string(),
            timestamp: Utc::now(),
        });
        session.messages.push(ChatMessage {
            id: format!("msg-{}", Uuid::new_v4()),
            sender: SenderKind::Bot,
            body: verdict.reply.clone(),
            timestamp: Utc::now(),
        });
        session.unread = true;
        if escalated {
            session.status = SessionStatus::Escalated;
        }
        let snapshot = session.clone();

        if escalated {
            self.log.push(SupportEntry {
                id: format!("sup-{}", Uuid::new_v4()),
                user_name: user_name.to_string(),
                message: body.to_string(),
                kind: SupportKind::Complaint,
                created_at: Utc::now(),
            });
        }

        snapshot
    }

    /// Clear a session's unread flag
    pub fn mark_read(&mut self, user_id: &str) {
        if let Some(session) = self.sessions.get_mut(user_id) {
            session.unread = false;
        }
    }

    /// Append a system alert to the support log
    pub fn record_alert(&mut self, message: &str) {
        self.log.push(SupportEntry {
            id: format!("sup-{}", Uuid::new_v4()),
            user_name: "System".to_string(),
            message: message.to_string(),
            kind: SupportKind::Alert,
            created_at: Utc::now(),
        });
    }

    pub fn list_log(&self) -> &[SupportEntry] {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DownClassifier;

    impl Classifier for DownClassifier {
        fn classify(&self, _text: &str) -> Result<Verdict, ClassifierUnavailable> {
            Err(ClassifierUnavailable)
        }
    }

    #[test]
    fn test_plain_message_stays_open() {
        let mut desk = SupportDesk::new();
        let session =
            desk.send_message("user-1", "Alice", "hello there", false, &CannedClassifier);

        assert_eq!(session.status, SessionStatus::Open);
        assert_eq!(session.messages.len(), 2); // user msg + bot reply
        assert!(desk.list_log().is_empty());
    }

    #[test]
    fn test_keyword_escalates_and_logs() {
        let mut desk = SupportDesk::new();
        let session = desk.send_message(
            "user-1",
            "Alice",
            "Why is my withdrawal pending?",
            false,
            &CannedClassifier,
        );

        assert_eq!(session.status, SessionStatus::Escalated);
        assert_eq!(desk.list_log().len(), 1);
        assert_eq!(desk.list_log()[0].kind, SupportKind::Complaint);
    }

    #[test]
    fn test_user_issue_flag_escalates() {
        let mut desk = SupportDesk::new();
        let session = desk.send_message("user-1", "Alice", "hello", true, &CannedClassifier);
        assert_eq!(session.status, SessionStatus::Escalated);
    }

    #[test]
    fn test_classifier_failure_falls_back_to_canned() {
        let mut desk = SupportDesk::new();
        let session = desk.send_message(
            "user-1",
            "Alice",
            "my account is locked",
            false,
            &DownClassifier,
        );

        // fallback still replies and still escalates on keywords
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.status, SessionStatus::Escalated);
    }

    #[test]
    fn test_mark_read() {
        let mut desk = SupportDesk::new();
        desk.send_message("user-1", "Alice", "hello", false, &CannedClassifier);
        desk.mark_read("user-1");
        assert!(!desk.session_for("user-1").unread);
    }
}
