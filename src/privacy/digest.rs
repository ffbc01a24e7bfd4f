//! Scrubbed, size-bounded views of tickets as sent to inference

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Redactor, ScrubbedText};
use crate::types::{AuthorRole, Ticket, TicketPriority, TicketStatus};

#[derive(Debug, Clone, Serialize)]
pub struct MessageDigest {
    pub author_role: AuthorRole,
    pub body: ScrubbedText,
    pub sent_at: DateTime<Utc>,
}

/// One ticket with every free-text field redacted.
///
/// The customer identifier is dropped entirely; structured fields (status,
/// priority, category, channel, assignee) pass through unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct TicketDigest {
    pub id: String,
    pub subject: ScrubbedText,
    pub description: ScrubbedText,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub category: Option<String>,
    pub channel: Option<String>,
    pub assignee_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolution_hours: Option<f64>,
    pub satisfaction: Option<u8>,
    pub message_count: usize,
    /// The first `max_messages` messages of the conversation
    pub messages: Vec<MessageDigest>,
}

impl TicketDigest {
    pub fn from_ticket(ticket: &Ticket, redactor: &Redactor, max_messages: usize) -> Self {
        Self {
            id: ticket.id.clone(),
            subject: redactor.redact(&ticket.subject),
            description: redactor.redact(&ticket.description),
            status: ticket.status,
            priority: ticket.priority,
            category: ticket.category.clone(),
            channel: ticket.channel.clone(),
            assignee_id: ticket.assignee_id.clone(),
            created_at: ticket.created_at,
            resolution_hours: ticket.resolution_hours(),
            satisfaction: ticket.csat(),
            message_count: ticket.messages.len(),
            messages: ticket
                .messages
                .iter()
                .take(max_messages)
                .map(|m| MessageDigest {
                    author_role: m.author_role,
                    body: redactor.redact(&m.body),
                    sent_at: m.sent_at,
                })
                .collect(),
        }
    }

    pub fn from_tickets(tickets: &[Ticket], redactor: &Redactor, max_messages: usize) -> Vec<Self> {
        tickets
            .iter()
            .map(|t| Self::from_ticket(t, redactor, max_messages))
            .collect()
    }
}
