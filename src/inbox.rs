use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::gallery::{Item, Pairing};

pub const DEFAULT_DEADLINE: &str = "26.04.09";
const DEADLINE_FORMAT: &str = "%y.%m.%d";
const INBOX_FILE: &str = "inbox.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoKind {
    Packages,
    Letters,
}

impl PhotoKind {
    pub const ALL: [PhotoKind; 2] = [PhotoKind::Packages, PhotoKind::Letters];

    /// Packages are photographed front and back, so they come in pairs.
    pub fn pairing(self) -> Pairing {
        match self {
            PhotoKind::Packages => Pairing::Paired,
            PhotoKind::Letters => Pairing::Single,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PhotoKind::Packages => "Packages",
            PhotoKind::Letters => "Letters",
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            PhotoKind::Packages => "pkg",
            PhotoKind::Letters => "let",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "packages" | "package" | "pkg" => Some(PhotoKind::Packages),
            "letters" | "letter" | "let" => Some(PhotoKind::Letters),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Forward the physical items to the customer.
    Send,
    Scan,
    Discard,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Send, ActionKind::Scan, ActionKind::Discard];

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Send => "Forward",
            ActionKind::Scan => "Scan",
            ActionKind::Discard => "Discard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboxStatus {
    Received,
    ActionRequested,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: String,
    pub action: ActionKind,
    pub item_ids: Vec<String>,
    pub status: InboxStatus,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerInbox {
    pub packages: Vec<Item>,
    pub letters: Vec<Item>,
    pub deadline: String,
    pub requests: Vec<ActionRequest>,
}

impl Default for CustomerInbox {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            letters: Vec::new(),
            deadline: DEFAULT_DEADLINE.to_string(),
            requests: Vec::new(),
        }
    }
}

impl CustomerInbox {
    pub fn photos(&self, kind: PhotoKind) -> &[Item] {
        match kind {
            PhotoKind::Packages => &self.packages,
            PhotoKind::Letters => &self.letters,
        }
    }

    pub fn photos_mut(&mut self, kind: PhotoKind) -> &mut Vec<Item> {
        match kind {
            PhotoKind::Packages => &mut self.packages,
            PhotoKind::Letters => &mut self.letters,
        }
    }

    pub fn item_count(&self) -> usize {
        self.packages.len() + self.letters.len()
    }

    pub fn pending_requests(&self) -> impl Iterator<Item = &ActionRequest> {
        self.requests
            .iter()
            .filter(|r| r.status == InboxStatus::ActionRequested)
    }
}

/// Checks a deadline in the `yy.mm.dd` form shown to customers.
pub fn parse_deadline(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DEADLINE_FORMAT)
        .with_context(|| format!("deadline {value:?} is not a yy.mm.dd date"))
}

/// Customer-keyed inbox storage.
///
/// Implementors provide whole-inbox reads and writes; the mutations are
/// read-modify-write on top of them and return the inbox as saved.
pub trait InboxStore {
    /// The stored inbox, or the default inbox when nothing usable is stored.
    fn inbox(&self, customer_id: &str) -> CustomerInbox;

    fn save_inbox(&mut self, customer_id: &str, inbox: CustomerInbox) -> anyhow::Result<()>;

    /// Ids of every customer with a stored inbox.
    fn customer_ids(&self) -> Vec<String>;

    fn append_photos(
        &mut self,
        customer_id: &str,
        kind: PhotoKind,
        photos: Vec<Item>,
    ) -> anyhow::Result<CustomerInbox> {
        let mut inbox = self.inbox(customer_id);
        inbox.photos_mut(kind).extend(photos);
        self.save_inbox(customer_id, inbox.clone())?;
        Ok(inbox)
    }

    fn remove_photo(
        &mut self,
        customer_id: &str,
        kind: PhotoKind,
        photo_id: &str,
    ) -> anyhow::Result<CustomerInbox> {
        let mut inbox = self.inbox(customer_id);
        inbox.photos_mut(kind).retain(|photo| photo.id != photo_id);
        self.save_inbox(customer_id, inbox.clone())?;
        Ok(inbox)
    }

    fn update_deadline(&mut self, customer_id: &str, deadline: &str) -> anyhow::Result<CustomerInbox> {
        parse_deadline(deadline)?;
        let mut inbox = self.inbox(customer_id);
        inbox.deadline = deadline.trim().to_string();
        self.save_inbox(customer_id, inbox.clone())?;
        Ok(inbox)
    }

    fn record_request(
        &mut self,
        customer_id: &str,
        action: ActionKind,
        item_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ActionRequest> {
        let mut inbox = self.inbox(customer_id);
        let request = ActionRequest {
            id: format!("req-{}-{}", now.timestamp_millis(), inbox.requests.len() + 1),
            action,
            item_ids,
            status: InboxStatus::ActionRequested,
            requested_at: now,
        };
        inbox.requests.push(request.clone());
        self.save_inbox(customer_id, inbox)?;
        Ok(request)
    }

    fn complete_request(&mut self, customer_id: &str, request_id: &str) -> anyhow::Result<CustomerInbox> {
        let mut inbox = self.inbox(customer_id);
        for request in inbox.requests.iter_mut().filter(|r| r.id == request_id) {
            request.status = InboxStatus::Completed;
        }
        self.save_inbox(customer_id, inbox.clone())?;
        Ok(inbox)
    }
}

/// All inboxes in one JSON document under the data directory.
pub struct JsonInboxStore {
    path: PathBuf,
    default_deadline: String,
}

impl JsonInboxStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(INBOX_FILE),
            default_deadline: DEFAULT_DEADLINE.to_string(),
        }
    }

    pub fn with_default_deadline(mut self, deadline: impl Into<String>) -> Self {
        self.default_deadline = deadline.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the whole document. Missing or malformed data reads as empty.
    fn load(&self) -> HashMap<String, CustomerInbox> {
        let Ok(json) = std::fs::read_to_string(&self.path) else {
            return HashMap::new();
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("Ignoring malformed inbox data in {}: {e}", self.path.display());
            HashMap::new()
        })
    }

    fn store(&self, all: &HashMap<String, CustomerInbox>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(all)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

impl InboxStore for JsonInboxStore {
    fn inbox(&self, customer_id: &str) -> CustomerInbox {
        self.load().remove(customer_id).unwrap_or_else(|| CustomerInbox {
            deadline: self.default_deadline.clone(),
            ..CustomerInbox::default()
        })
    }

    fn save_inbox(&mut self, customer_id: &str, inbox: CustomerInbox) -> anyhow::Result<()> {
        let mut all = self.load();
        all.insert(customer_id.to_string(), inbox);
        self.store(&all)
    }

    fn customer_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.load().into_keys().collect();
        ids.sort();
        ids
    }
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryInboxStore {
    inboxes: HashMap<String, CustomerInbox>,
}

#[cfg(test)]
impl InboxStore for MemoryInboxStore {
    fn inbox(&self, customer_id: &str) -> CustomerInbox {
        self.inboxes.get(customer_id).cloned().unwrap_or_default()
    }

    fn save_inbox(&mut self, customer_id: &str, inbox: CustomerInbox) -> anyhow::Result<()> {
        self.inboxes.insert(customer_id.to_string(), inbox);
        Ok(())
    }

    fn customer_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inboxes.keys().cloned().collect();
        ids.sort();
        ids
    }
}
