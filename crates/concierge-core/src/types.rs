// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the store, the engine, and the delegate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Storage format for every persisted timestamp.
///
/// Fixed-width with microsecond precision so lexicographic order in SQLite
/// matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Current time truncated to the precision the store persists.
///
/// Records built in memory and records read back from the store must compare
/// equal, otherwise a push-delivered copy and a poll-delivered copy of the
/// same message would sort differently.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Formats a timestamp with [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Delegate,
}

/// Conversation flavour chosen by the guest; decides the initial handler.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    /// Staffed from the start.
    Concierge,
    /// Answered by the automated assistant until escalated or taken over.
    Assisted,
}

impl ConversationType {
    /// Handler a freshly created conversation of this type starts with.
    pub fn default_handler(self) -> Handler {
        match self {
            ConversationType::Assisted => Handler::Ai,
            ConversationType::Concierge => Handler::Human,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Escalated,
}

/// The party currently responsible for answering the guest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    Ai,
    Human,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Guest,
    Staff,
    Ai,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    System,
}

/// Why a handler transition happened. Persisted as free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum HandoffReason {
    GuestRequest,
    AiError,
    StaffTakeover,
    /// Caller-supplied free text.
    Other(String),
}

impl fmt::Display for HandoffReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffReason::GuestRequest => f.write_str("Guest Request"),
            HandoffReason::AiError => f.write_str("AI Error"),
            HandoffReason::StaffTakeover => f.write_str("Staff Takeover"),
            HandoffReason::Other(text) => f.write_str(text),
        }
    }
}

impl From<String> for HandoffReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Guest Request" => HandoffReason::GuestRequest,
            "AI Error" => HandoffReason::AiError,
            "Staff Takeover" => HandoffReason::StaffTakeover,
            _ => HandoffReason::Other(value),
        }
    }
}

impl From<HandoffReason> for String {
    fn from(value: HandoffReason) -> Self {
        value.to_string()
    }
}

impl FromStr for HandoffReason {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(HandoffReason::from(s.to_string()))
    }
}

/// Guest identity as known to the client when the conversation is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestIdentity {
    pub guest_id: String,
    pub name: String,
    pub email: Option<String>,
    pub room_number: Option<String>,
}

/// Staff member acting on conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffIdentity {
    pub staff_id: String,
    pub name: String,
}

/// A guest-to-support conversation.
///
/// Guest fields are a snapshot taken at creation and are never re-synced with
/// the guest's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub guest_id: String,
    pub guest_name: String,
    pub guest_email: Option<String>,
    pub room_number: Option<String>,
    pub conversation_type: ConversationType,
    pub status: ConversationStatus,
    pub current_handler: Handler,
    pub assigned_staff_id: Option<String>,
    /// Bumped on every handler transition; the optimistic-concurrency token.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Builds a new active conversation for `guest` with the type's default handler.
    pub fn new(guest: &GuestIdentity, conversation_type: ConversationType) -> Self {
        let now = timestamp_now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            guest_id: guest.guest_id.clone(),
            guest_name: guest.name.clone(),
            guest_email: guest.email.clone(),
            room_number: guest.room_number.clone(),
            conversation_type,
            status: ConversationStatus::Active,
            current_handler: conversation_type.default_handler(),
            assigned_staff_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshot of the fields a transition is conditioned on.
    pub fn handler_state(&self) -> HandlerState {
        HandlerState {
            current_handler: self.current_handler,
            status: self.status,
            version: self.version,
        }
    }
}

/// The `(current_handler, status, version)` triple a transition expects to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerState {
    pub current_handler: Handler,
    pub status: ConversationStatus,
    pub version: i64,
}

/// A conditional update of a conversation's handler fields.
///
/// Applied only if the stored row still matches `expected`; on success the
/// store bumps `version` by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerTransition {
    pub conversation_id: String,
    pub expected: HandlerState,
    pub current_handler: Handler,
    pub status: ConversationStatus,
    /// `Some` assigns the staff member; `None` leaves the column untouched.
    pub assigned_staff_id: Option<String>,
}

/// A single immutable chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub sender_name: String,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A regular text message authored by a guest, staff member, or the assistant.
    pub fn text(
        conversation_id: impl Into<String>,
        sender_type: SenderType,
        sender_id: Option<String>,
        sender_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            sender_type,
            sender_id,
            sender_name: sender_name.into(),
            content: content.into(),
            message_type: MessageType::Text,
            created_at: timestamp_now(),
        }
    }

    /// An engine-generated notice (welcome, apology, escalation).
    pub fn system(
        conversation_id: impl Into<String>,
        sender_type: SenderType,
        sender_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            message_type: MessageType::System,
            ..Self::text(conversation_id, sender_type, None, sender_name, content)
        }
    }
}

/// Append-only audit record of a handler transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingLogEntry {
    pub id: String,
    pub conversation_id: String,
    pub from_handler: Handler,
    pub to_handler: Handler,
    pub reason: HandoffReason,
    pub staff_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RoutingLogEntry {
    pub fn new(
        conversation_id: impl Into<String>,
        from_handler: Handler,
        to_handler: Handler,
        reason: HandoffReason,
        staff_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            from_handler,
            to_handler,
            reason,
            staff_id,
            created_at: timestamp_now(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderStatus,
    BookingStatus,
    General,
}

/// An order/booking status notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// The order or booking this notification is about, if any.
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        reference_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            kind,
            title: title.into(),
            body: body.into(),
            reference_id,
            created_at: timestamp_now(),
        }
    }
}

/// Payload handed to the automated assistant.
///
/// Field names follow the serverless function's JSON contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateRequest {
    pub message: String,
    pub user_id: String,
    pub user_name: String,
    pub room_number: Option<String>,
    pub conversation_id: String,
}
