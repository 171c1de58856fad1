use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::dates::parse_instant;
use super::palette::{color_for_key, Rgb};

/// A record as supplied by the data source, before any validation.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RawId>,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Text(text) => f.write_str(text),
            RawId::Number(number) => write!(f, "{number}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    fn synthesize() -> Self {
        Self(format!("auto-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemKind {
    Event,
    Period,
}

impl ItemKind {
    pub fn lane(self) -> Lane {
        match self {
            ItemKind::Period => Lane::Above,
            ItemKind::Event => Lane::Below,
        }
    }
}

/// Vertical region of the canvas relative to the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Lane {
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("missing start date")]
    MissingStart,
    #[error("unparseable start date {0:?}")]
    InvalidStart(String),
    #[error("unparseable end date {0:?}, treating as absent")]
    InvalidEnd(String),
    #[error("unknown item type {0:?}, treating as event")]
    UnknownKind(String),
    #[error("duplicate id {0:?}, assigned a generated id")]
    DuplicateId(String),
}

#[derive(Debug, Clone)]
pub struct ItemReport {
    /// Position in the input list.
    pub index: usize,
    pub title: String,
    pub error: ItemError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    pub id: ItemId,
    pub title: String,
    pub kind: ItemKind,
    pub lane: Lane,
    pub start: OffsetDateTime,
    /// For periods without an end this is the load time, frozen.
    pub end: Option<OffsetDateTime>,
    pub open_ended: bool,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub color: Rgb,
    pub raw_start: String,
    pub raw_end: Option<String>,
    pub input_order: usize,
}

impl NormalizedItem {
    /// The later of end and start; what the timeline horizon has to cover.
    pub fn latest(&self) -> OffsetDateTime {
        self.end.map_or(self.start, |end| end.max(self.start))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub items: Vec<NormalizedItem>,
    pub rejected: Vec<ItemReport>,
    pub defaulted: Vec<ItemReport>,
}

/// Validates raw records and sorts the survivors by start, keeping input
/// order among equal starts. `now` closes open-ended periods.
pub fn normalize_items(records: Vec<TimelineItem>, now: OffsetDateTime) -> Normalized {
    let mut out = Normalized::default();
    let mut seen_ids = HashSet::new();

    for (index, record) in records.into_iter().enumerate() {
        let report = |error: ItemError| ItemReport {
            index,
            title: record.title.clone(),
            error,
        };

        let Some(raw_start) = record.start.clone().filter(|s| !s.trim().is_empty()) else {
            let rejected = report(ItemError::MissingStart);
            tracing::warn!(index, title = %rejected.title, "dropping timeline item without start date");
            out.rejected.push(rejected);
            continue;
        };
        let Some(start) = parse_instant(&raw_start) else {
            let rejected = report(ItemError::InvalidStart(raw_start.clone()));
            tracing::warn!(index, title = %rejected.title, start = %raw_start, "dropping timeline item with invalid start date");
            out.rejected.push(rejected);
            continue;
        };

        let kind = match record.kind.as_deref().map(str::trim) {
            None | Some("") => ItemKind::Event,
            Some(raw) => match raw.to_ascii_lowercase().parse::<ItemKind>() {
                Ok(kind) => kind,
                Err(_) => {
                    tracing::warn!(index, kind = raw, "unknown timeline item type");
                    out.defaulted
                        .push(report(ItemError::UnknownKind(raw.to_string())));
                    ItemKind::Event
                }
            },
        };

        let raw_end = record.end.clone().filter(|s| !s.trim().is_empty());
        let parsed_end = match raw_end.as_deref() {
            Some(raw) => match parse_instant(raw) {
                Some(end) => Some(end),
                None => {
                    tracing::warn!(index, end = raw, "ignoring invalid end date");
                    out.defaulted
                        .push(report(ItemError::InvalidEnd(raw.to_string())));
                    None
                }
            },
            None => None,
        };
        let open_ended = kind == ItemKind::Period && parsed_end.is_none();
        let end = if open_ended { Some(now) } else { parsed_end };

        let raw_id = record
            .id
            .as_ref()
            .map(RawId::to_string)
            .filter(|id| !id.is_empty());
        let id = match &raw_id {
            Some(raw) if seen_ids.contains(raw.as_str()) => {
                tracing::warn!(index, id = %raw, "duplicate timeline item id");
                out.defaulted.push(report(ItemError::DuplicateId(raw.clone())));
                ItemId::synthesize()
            }
            Some(raw) => ItemId::new(raw.clone()),
            None => ItemId::synthesize(),
        };
        seen_ids.insert(id.as_str().to_string());

        let color_key = match &raw_id {
            Some(raw) => raw.clone(),
            None => format!("{}{}", record.title, raw_start),
        };

        let mut tags: Vec<String> = Vec::with_capacity(record.tags.len());
        for tag in &record.tags {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        out.items.push(NormalizedItem {
            id,
            title: record.title.clone(),
            kind,
            lane: kind.lane(),
            start,
            end,
            open_ended,
            tags,
            description: record.description.clone(),
            color: color_for_key(&color_key),
            raw_start,
            raw_end,
            input_order: index,
        });
    }

    // stable: equal starts keep input order
    out.items.sort_by(|a, b| a.start.cmp(&b.start));
    tracing::debug!(
        kept = out.items.len(),
        rejected = out.rejected.len(),
        defaulted = out.defaulted.len(),
        "normalized timeline items"
    );
    out
}
