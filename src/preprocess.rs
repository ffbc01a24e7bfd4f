//! Aggregate ticket statistics handed to the pipeline phases
//!
//! Only counts and averages leave this module; no free text is read.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::Ticket;

/// Collection-level statistics over a ticket set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TicketSummary {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_channel: BTreeMap<String, usize>,
    pub resolved: usize,
    pub unassigned: usize,
    pub avg_resolution_hours: Option<f64>,
    pub avg_satisfaction: Option<f64>,
    pub rated: usize,
}

const UNSET: &str = "unknown";

impl TicketSummary {
    pub fn from_tickets(tickets: &[Ticket]) -> Self {
        let mut summary = Self {
            total: tickets.len(),
            ..Self::default()
        };

        let mut resolution_total = 0.0;
        let mut resolution_count = 0usize;
        let mut satisfaction_total = 0u64;

        for ticket in tickets {
            *summary
                .by_status
                .entry(ticket.status.as_str().to_string())
                .or_default() += 1;
            *summary
                .by_priority
                .entry(ticket.priority.as_str().to_string())
                .or_default() += 1;
            *summary
                .by_category
                .entry(ticket.category.clone().unwrap_or_else(|| UNSET.to_string()))
                .or_default() += 1;
            *summary
                .by_channel
                .entry(ticket.channel.clone().unwrap_or_else(|| UNSET.to_string()))
                .or_default() += 1;

            if ticket.status.is_done() {
                summary.resolved += 1;
            }
            if ticket.assignee_id.is_none() {
                summary.unassigned += 1;
            }
            if let Some(hours) = ticket.resolution_hours() {
                resolution_total += hours;
                resolution_count += 1;
            }
            if let Some(score) = ticket.csat() {
                satisfaction_total += u64::from(score);
                summary.rated += 1;
            }
        }

        if resolution_count > 0 {
            summary.avg_resolution_hours = Some(resolution_total / resolution_count as f64);
        }
        if summary.rated > 0 {
            summary.avg_satisfaction = Some(satisfaction_total as f64 / summary.rated as f64);
        }
        summary
    }

    /// Fraction of tickets in a done state (0.0 for an empty set)
    pub fn resolution_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.resolved as f64 / self.total as f64
    }
}
