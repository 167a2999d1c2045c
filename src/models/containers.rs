use crate::common::error::{AppError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The parent entity a message belongs to
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Direct,
    Group,
    Community,
}

impl ContainerKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Direct => "direct",
            ContainerKind::Group => "group",
            ContainerKind::Community => "community",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "direct" => Some(ContainerKind::Direct),
            "group" => Some(ContainerKind::Group),
            "community" => Some(ContainerKind::Community),
            _ => None,
        }
    }

    /// Direct messages carry a single read timestamp,
    /// everything else tracks receipts per viewer.
    pub const fn uses_receipts(&self) -> bool {
        !matches!(self, ContainerKind::Direct)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerRef {
    pub kind: ContainerKind,
    pub id: i64,
}

impl ContainerRef {
    pub const fn direct(conversation_id: i64) -> Self {
        Self {
            kind: ContainerKind::Direct,
            id: conversation_id,
        }
    }

    pub const fn group(group_id: i64) -> Self {
        Self {
            kind: ContainerKind::Group,
            id: group_id,
        }
    }

    pub const fn community(community_id: i64) -> Self {
        Self {
            kind: ContainerKind::Community,
            id: community_id,
        }
    }

    pub fn from_key(key: &str) -> ServiceResult<Self> {
        let (kind, id) = key
            .split_once(':')
            .ok_or(AppError::ContainersInvalidKey)?;
        let kind = ContainerKind::from_key(kind).ok_or(AppError::ContainersInvalidKey)?;
        let id = i64::from_str(id).map_err(|_| AppError::ContainersInvalidKey)?;
        Ok(Self { kind, id })
    }
}

impl Display for ContainerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for ContainerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for ContainerRef {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s)
    }
}
