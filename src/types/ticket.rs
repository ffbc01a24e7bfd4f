//! Ticket input model: Ticket, TicketMessage, status/priority enums

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprintable;

/// Valid CSAT survey answers
pub const CSAT_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Lifecycle status of a support ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Pending,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Pending => "pending",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    /// Resolved and closed tickets count as done for workload purposes
    pub fn is_done(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

/// Customer-facing priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

/// Who wrote a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRole {
    Customer,
    Agent,
    System,
}

/// One message in a ticket conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketMessage {
    pub author_role: AuthorRole,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// A support ticket as exported by the helpdesk.
///
/// Free-text fields (`subject`, `description`, message bodies) may contain
/// customer PII and must never be forwarded to inference without passing
/// through [`crate::privacy::Redactor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    /// Agent the ticket is assigned to
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// CSAT rating 1-5, when the customer answered the survey
    #[serde(default)]
    pub satisfaction: Option<u8>,
    #[serde(default)]
    pub messages: Vec<TicketMessage>,
}

impl Ticket {
    /// Hours from creation to resolution, if resolved
    pub fn resolution_hours(&self) -> Option<f64> {
        let resolved = self.resolved_at?;
        let minutes = (resolved - self.created_at).num_minutes();
        if minutes < 0 {
            return None;
        }
        Some(minutes as f64 / 60.0)
    }

    /// CSAT rating, or `None` when unanswered or outside 1-5
    pub fn csat(&self) -> Option<u8> {
        self.satisfaction.filter(|score| CSAT_RANGE.contains(score))
    }
}

impl Fingerprintable for Ticket {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn content_signature(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.status.as_str(),
            self.priority.as_str(),
            self.assignee_id.as_deref().unwrap_or("-"),
            self.resolved_at.map(|t| t.timestamp()).unwrap_or(0),
            self.satisfaction.unwrap_or(0),
            self.messages.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ticket() -> Ticket {
        let created = Utc::now();
        Ticket {
            id: "T-1".to_string(),
            subject: "Cannot log in".to_string(),
            description: String::new(),
            status: TicketStatus::Resolved,
            priority: TicketPriority::High,
            category: None,
            channel: None,
            assignee_id: Some("agent-1".to_string()),
            customer_id: None,
            created_at: created,
            resolved_at: Some(created + Duration::minutes(90)),
            satisfaction: Some(4),
            messages: Vec::new(),
        }
    }

    #[test]
    fn resolution_hours_from_timestamps() {
        assert_eq!(ticket().resolution_hours(), Some(1.5));
    }

    #[test]
    fn resolution_before_creation_is_ignored() {
        let mut t = ticket();
        t.resolved_at = Some(t.created_at - Duration::hours(1));
        assert_eq!(t.resolution_hours(), None);
    }

    #[test]
    fn deserializes_minimal_ticket() {
        let json = r#"{
            "id": "T-9",
            "subject": "Refund",
            "status": "in_progress",
            "priority": "urgent",
            "created_at": "2024-03-01T10:00:00Z"
        }"#;
        let t: Ticket = serde_json::from_str(json).unwrap();
        assert_eq!(t.status, TicketStatus::InProgress);
        assert!(t.messages.is_empty());
        assert!(t.assignee_id.is_none());
    }

    #[test]
    fn out_of_range_csat_is_ignored() {
        let mut t = ticket();
        assert_eq!(t.csat(), Some(4));
        t.satisfaction = Some(9);
        assert_eq!(t.csat(), None);
        t.satisfaction = Some(0);
        assert_eq!(t.csat(), None);
    }

    #[test]
    fn content_signature_tracks_status() {
        let a = ticket();
        let mut b = ticket();
        b.status = TicketStatus::Open;
        assert_ne!(a.content_signature(), b.content_signature());
    }
}
