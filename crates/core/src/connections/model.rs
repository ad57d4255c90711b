//! Cached connection entities mirrored from the backend.

use serde::{Deserialize, Serialize};

/// Lifecycle of a connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionRequestStatus {
    Pending,
    Accepted,
    Rejected,
    Canceled,
}

impl ConnectionRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An undirected relationship between two users.
///
/// The backend stores the pair in canonical order (`user_id1 < user_id2`);
/// the local schema enforces the same ordering so a pair is unique
/// regardless of which side fetched it. The per-side profile fields are a
/// denormalized caching convenience and are refreshed wholesale on every
/// resync together with the identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub connection_id: i64,
    pub user_id1: String,
    pub user_id1_username: Option<String>,
    pub user_id1_first_name: Option<String>,
    pub user_id1_last_name: Option<String>,
    pub user_id1_image_url: Option<String>,
    pub user_id2: String,
    pub user_id2_username: Option<String>,
    pub user_id2_first_name: Option<String>,
    pub user_id2_last_name: Option<String>,
    pub user_id2_image_url: Option<String>,
    /// Unix timestamp (seconds) the connection was established.
    pub connected_at: i64,
}

/// A directed connection request from `requester_id` to `receiver_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub request_id: i64,
    pub requester_id: String,
    pub requester_username: Option<String>,
    pub requester_first_name: Option<String>,
    pub requester_last_name: Option<String>,
    pub requester_image_url: Option<String>,
    pub receiver_id: String,
    pub receiver_username: Option<String>,
    pub receiver_first_name: Option<String>,
    pub receiver_last_name: Option<String>,
    pub receiver_image_url: Option<String>,
    pub greeting_text: Option<String>,
    pub status: ConnectionRequestStatus,
    /// Unix timestamp (seconds) the request was created.
    pub created_at: i64,
    /// Unix timestamp (seconds) the request was resolved, when it has been.
    pub responded_at: Option<i64>,
}
