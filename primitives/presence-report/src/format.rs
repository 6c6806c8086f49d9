//! Presence classification and report rendering.

use crate::model::{MemberRecord, Presence, Snapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_TITLE: &str = "C4T6 Offline Members";
pub const DEFAULT_FOOTER: &str = "Shiba offline checker for C4T6";

/// Red.
pub const DEFAULT_COLOR: u32 = 0xFF_00_00;

/// Body used when no member produced a line.
pub const ALL_ONLINE: &str = "All users are online.";

/// Minutes of silence after which a member counts as offline.
pub const DEFAULT_OFFLINE_THRESHOLD_MINUTES: f64 = 20.0;

/// Minutes of silence after which no duration is shown (48 hours).
pub const DEFAULT_LONG_GONE_THRESHOLD_MINUTES: f64 = 2880.0;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Minute cutoffs between "online", "offline for a while" and "long gone".
///
/// Both comparisons are strict: a member exactly at a threshold stays in the
/// lower bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub offline_minutes: f64,
    pub long_gone_minutes: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            offline_minutes: DEFAULT_OFFLINE_THRESHOLD_MINUTES,
            long_gone_minutes: DEFAULT_LONG_GONE_THRESHOLD_MINUTES,
        }
    }
}

/// How long an offline member has been gone, as displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineFor {
    Minutes(u64),
    HoursMinutes { hours: u64, minutes: u64 },
    LongGone,
}

/// Classification of a single member at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    /// No presence data at all.
    Untracked,

    /// Presence present but neither on the website nor carrying a usable
    /// timestamp. Dropped from the report like an untracked member.
    Unknown,

    /// Seen within the offline threshold.
    Online,

    Website,

    Offline(OfflineFor),
}

/// Places an elapsed time into its display bucket.
///
/// Returns `None` while the member is still considered online. The elapsed
/// time is compared unrounded; flooring only happens for display.
pub fn bucket(elapsed_minutes: f64, thresholds: &Thresholds) -> Option<OfflineFor> {
    if elapsed_minutes <= thresholds.offline_minutes {
        return None;
    }

    if elapsed_minutes > thresholds.long_gone_minutes {
        return Some(OfflineFor::LongGone);
    }

    let hours = (elapsed_minutes / 60.0).floor() as u64;
    if hours > 0 {
        Some(OfflineFor::HoursMinutes {
            hours,
            minutes: (elapsed_minutes % 60.0).floor() as u64,
        })
    } else {
        Some(OfflineFor::Minutes(elapsed_minutes.floor() as u64))
    }
}

/// Renders the report line for a member, if its status produces one.
pub fn render_line(name: &str, status: MemberStatus) -> Option<String> {
    match status {
        MemberStatus::Website => Some(format!("🔵 **{name}** - Website")),
        MemberStatus::Offline(OfflineFor::LongGone) => Some(format!("🔴 **{name}** - OFFLINE")),
        MemberStatus::Offline(OfflineFor::HoursMinutes { hours, minutes }) => {
            Some(format!("🔴 **{name}** - Offline for {hours}h {minutes}m"))
        }
        MemberStatus::Offline(OfflineFor::Minutes(minutes)) => {
            Some(format!("🔴 **{name}** - Offline for {minutes}m"))
        }
        MemberStatus::Untracked | MemberStatus::Unknown | MemberStatus::Online => None,
    }
}

/// Chat markup rendering `now` as a relative time ("2 minutes ago").
pub fn relative_timestamp(now: DateTime<Utc>) -> String {
    format!("<t:{}:R>", now.timestamp())
}

/// The rendered summary for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub footer: String,
    pub offline_count: usize,
    pub website_count: usize,
}

/// Formats snapshots into reports.
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    title: String,
    footer: String,
    color: u32,
    thresholds: Thresholds,
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            footer: DEFAULT_FOOTER.to_string(),
            color: DEFAULT_COLOR,
            thresholds: Thresholds::default(),
        }
    }
}

impl ReportFormatter {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Classifies one member as of `now`.
    pub fn classify(&self, member: &MemberRecord, now: DateTime<Utc>) -> MemberStatus {
        match member.presence {
            None => MemberStatus::Untracked,
            Some(Presence::OnWebsite) => MemberStatus::Website,
            Some(Presence::Timestamped { last_online: None }) => MemberStatus::Unknown,
            Some(Presence::Timestamped {
                last_online: Some(last_online),
            }) => {
                let elapsed_minutes =
                    (now - last_online).num_milliseconds() as f64 / MILLIS_PER_MINUTE;
                match bucket(elapsed_minutes, &self.thresholds) {
                    Some(offline_for) => MemberStatus::Offline(offline_for),
                    None => MemberStatus::Online,
                }
            }
        }
    }

    /// Builds the report for `snapshot` as of `now`.
    pub fn format(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Report {
        let mut offline_count = 0;
        let mut website_count = 0;
        let mut lines = Vec::new();

        for member in &snapshot.members {
            let status = self.classify(member, now);
            match status {
                MemberStatus::Offline(_) => offline_count += 1,
                MemberStatus::Website => website_count += 1,
                _ => {}
            }
            lines.extend(render_line(&member.name, status));
        }

        let body = if lines.is_empty() {
            ALL_ONLINE.to_string()
        } else {
            lines.join("\n")
        };

        let description = format!(
            "[🔴] Total offline: {offline_count}\n[🔵] Total on website: {website_count}\n\n{body}\n*Last updated {}*",
            relative_timestamp(now)
        );

        Report {
            title: self.title.clone(),
            description,
            color: self.color,
            footer: self.footer.clone(),
            offline_count,
            website_count,
        }
    }
}
