// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Collaborator Sinks

//! Collaborator interfaces consumed by the engine.
//!
//! Notification and audit delivery are external concerns: the engine calls
//! these traits fire-and-forget, logs failures, and never rolls back
//! financial state because a sink was unreachable.

use serde_json::Value;

use crate::types::{Kwacha, MemberId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A sink failed to accept a message. Always non-fatal to the caller.
#[derive(Debug, thiserror::Error)]
#[error("sink unavailable: {0}")]
pub struct SinkError(pub String);

// ---------------------------------------------------------------------------
// Notification sink
// ---------------------------------------------------------------------------

/// Outbound member notifications (delivery channel unspecified).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, member: MemberId, kind: &str, payload: Value) -> Result<(), SinkError>;
}

/// Discards every notification.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn notify(&self, _member: MemberId, _kind: &str, _payload: Value) -> Result<(), SinkError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Audit sink
// ---------------------------------------------------------------------------

/// One append-only audit event.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: String,
    pub subject: MemberId,
    pub actor: Option<MemberId>,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub amount: Option<Kwacha>,
    pub reference: Option<String>,
    pub metadata: Option<Value>,
}

impl AuditEvent {
    pub fn new(event_type: impl Into<String>, subject: MemberId) -> Self {
        Self {
            event_type: event_type.into(),
            subject,
            actor: None,
            before: None,
            after: None,
            amount: None,
            reference: None,
            metadata: None,
        }
    }

    pub fn amount(mut self, amount: Kwacha) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn change(mut self, before: Value, after: Value) -> Self {
        self.before = Some(before);
        self.after = Some(after);
        self
    }
}

/// Append-only audit log collaborator.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), SinkError>;
}

/// Discards every audit event.
#[derive(Debug, Default)]
pub struct NoopAudit;

impl AuditSink for NoopAudit {
    fn record(&self, _event: AuditEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
