use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::geometry::{Geometry, Position};

/// One place's current ownership, as supplied by the data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointClaim {
    pub coordinates: Position,
    pub faction_id: String,
    #[serde(default)]
    pub color: String,
    /// Whole likes. Fractional JSON numbers are floored.
    #[serde(default, deserialize_with = "deserialize_likes")]
    pub likes: i64,
}

fn deserialize_likes<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Likes {
        Whole(i64),
        Fractional(f64),
    }

    match Likes::deserialize(deserializer)? {
        Likes::Whole(likes) => Ok(likes),
        Likes::Fractional(likes) if likes.is_finite() => Ok(likes.floor() as i64),
        Likes::Fractional(likes) => Err(D::Error::custom(format!("likes must be finite, got {likes}"))),
    }
}

impl PointClaim {
    pub fn lon(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }
}

/// Caller -> engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRequest {
    #[serde(default)]
    pub points: Vec<PointClaim>,
    pub focus: Position,
}

/// Final per-faction shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryFeature {
    pub faction_id: String,
    pub color: String,
    pub total_likes: i64,
    pub geometry: Geometry,
}

/// Engine -> caller. Every message carries the generation of the request
/// that produced it so callers can drop output from superseded runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EngineMessage {
    Progress {
        generation: u64,
        phase: String,
        percent: u8,
    },
    Territories {
        generation: u64,
        partial: bool,
        territories: Vec<TerritoryFeature>,
    },
    /// The run for `generation` ended without a final result.
    Failed { generation: u64, reason: String },
}

impl EngineMessage {
    pub fn generation(&self) -> u64 {
        match self {
            EngineMessage::Progress { generation, .. }
            | EngineMessage::Territories { generation, .. }
            | EngineMessage::Failed { generation, .. } => *generation,
        }
    }

    /// SSE event name for this message.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineMessage::Progress { .. } => "progress",
            EngineMessage::Territories { .. } => "territories",
            EngineMessage::Failed { .. } => "failed",
        }
    }

    /// True for the non-partial territories message that ends a run.
    pub fn is_final(&self) -> bool {
        matches!(self, EngineMessage::Territories { partial: false, .. })
    }

    /// True for any message after which its generation emits nothing more.
    pub fn is_terminal(&self) -> bool {
        self.is_final() || matches!(self, EngineMessage::Failed { .. })
    }
}
