//! Outbound operation records

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::endpoint::Endpoint;
use crate::models::Checklist;

/// Operation-specific payload; the `type` field is the persisted discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationPayload {
    /// Check an item in (`visited`) or out of a checklist.
    CheckinToggle {
        list: Checklist,
        item_id: i64,
        visited: bool,
    },
    /// Photo bytes live in a content-addressed file named `file_name`.
    PhotoUpload {
        file_name: String,
        caption: String,
        location_id: i64,
        mime_type: String,
    },
    PostPublish {
        location_id: i64,
        text: String,
    },
    ProfileUpdate {
        fields: BTreeMap<String, String>,
    },
}

impl OperationPayload {
    /// Discriminator, also used as the report event kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CheckinToggle { .. } => "checkin_toggle",
            Self::PhotoUpload { .. } => "photo_upload",
            Self::PostPublish { .. } => "post_publish",
            Self::ProfileUpdate { .. } => "profile_update",
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::CheckinToggle {
                list,
                item_id,
                visited,
            } => Endpoint::set_visited(*list, *item_id, *visited),
            Self::PhotoUpload {
                caption,
                location_id,
                ..
            } => Endpoint::upload_photo(*location_id, caption),
            Self::PostPublish { location_id, text } => Endpoint::publish_post(*location_id, text),
            Self::ProfileUpdate { fields } => Endpoint::update_profile(fields),
        }
    }

    /// Whether `status` means the server already applied this operation.
    ///
    /// 409 is a duplicate for every operation. Check-in toggles also treat
    /// 500 as a duplicate: the server answers a repeated toggle that way.
    /// That 500 mapping is unverified against a documented contract and is
    /// not extended to other operations.
    pub const fn is_duplicate_status(&self, status: u16) -> bool {
        match status {
            409 => true,
            500 => matches!(self, Self::CheckinToggle { .. }),
            _ => false,
        }
    }

    /// Default list title for this payload.
    pub fn describe(&self) -> String {
        match self {
            Self::CheckinToggle {
                list,
                item_id,
                visited: true,
            } => format!("Check in to {} #{item_id}", list.title()),
            Self::CheckinToggle {
                list,
                item_id,
                visited: false,
            } => format!("Check out of {} #{item_id}", list.title()),
            Self::PhotoUpload { location_id, .. } => {
                format!("Upload photo to location #{location_id}")
            }
            Self::PostPublish { location_id, .. } => {
                format!("Publish post on location #{location_id}")
            }
            Self::ProfileUpdate { .. } => "Update profile".to_string(),
        }
    }

    pub fn photo_file(&self) -> Option<&str> {
        match self {
            Self::PhotoUpload { file_name, .. } => Some(file_name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    #[default]
    Queued,
    Sending,
}

/// One pending mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundOperation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Monotonic position assigned at enqueue.
    pub creation_order: u64,
    pub title: String,
    /// Status text shown under the title.
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub failure_count: u32,
    /// Earliest time the background worker retries this operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// [`crate::auth::account_key`] of the account that queued it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(flatten)]
    pub payload: OperationPayload,
    /// Not persisted; every reloaded operation starts queued.
    #[serde(skip)]
    pub state: OperationState,
}

pub(crate) const SUBTITLE_WAITING: &str = "Waiting to send";
pub(crate) const SUBTITLE_SENDING: &str = "Sending";

impl OutboundOperation {
    pub(crate) fn new(creation_order: u64, title: Option<String>, payload: OperationPayload) -> Self {
        let title = crate::util::normalize_text_option(title).unwrap_or_else(|| payload.describe());
        Self {
            id: Uuid::now_v7(),
            created_at: crate::util::now(),
            creation_order,
            title,
            subtitle: SUBTITLE_WAITING.to_string(),
            failure_count: 0,
            next_attempt_at: None,
            account: None,
            payload,
            state: OperationState::Queued,
        }
    }

    pub(crate) fn owned_by(mut self, account: Option<String>) -> Self {
        self.account = account;
        self
    }

    /// Whether the backoff allows an attempt at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !matches!(self.next_attempt_at, Some(at) if at > now)
    }
}
