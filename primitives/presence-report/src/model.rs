//! Member presence records.

use chrono::{DateTime, Utc};

/// Presence data reported for a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Active on the website. Any last-seen time is ignored.
    OnWebsite,

    /// Carries a last-seen time, if the source provided a readable one.
    Timestamped {
        last_online: Option<DateTime<Utc>>,
    },
}

/// One tracked member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    /// Display name. Not guaranteed unique.
    pub name: String,

    /// `None` when the source had no presence data for this member.
    pub presence: Option<Presence>,
}

impl MemberRecord {
    /// Creates a member without presence data.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            presence: None,
        }
    }

    /// Creates a member currently on the website.
    pub fn on_website(name: impl Into<String>) -> Self {
        Self::new(name).with_presence(Presence::OnWebsite)
    }

    /// Creates a member last seen at `at`.
    pub fn last_online(name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(name).with_presence(Presence::Timestamped {
            last_online: Some(at),
        })
    }

    pub fn with_presence(mut self, presence: Presence) -> Self {
        self.presence = Some(presence);
        self
    }
}

/// One fetched batch of member presence data, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub members: Vec<MemberRecord>,
}

impl Snapshot {
    pub fn new(members: Vec<MemberRecord>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
