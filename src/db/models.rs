use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};

/// Respondent group attached to every vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ГДф")]
    Gdf,
    #[serde(rename = "СВ")]
    Sv,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Gdf, Role::Sv];

    pub fn code(self) -> &'static str {
        match self {
            Role::Gdf => "ГДф",
            Role::Sv => "СВ",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.code() == s.trim())
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

pub const MIN_VOTE_VALUE: i32 = 10;
pub const MAX_VOTE_VALUE: i32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub role: Role,
    pub value: i32,
    pub date_created: DateTime<Utc>,
}

/// The slice of a vote the aggregator needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub role: Role,
    pub value: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Settings {
    pub id: Option<i32>,
    pub course_test_percent: Option<i32>,
    pub course_test_percent_gdf: Option<i32>,
    pub course_test_percent_sv: Option<i32>,
}

/// Partial settings update. The outer `None` leaves a field untouched, the
/// inner `None` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub course_test_percent_gdf: Option<Option<i32>>,
    pub course_test_percent_sv: Option<Option<i32>>,
}

impl Settings {
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(gdf) = patch.course_test_percent_gdf {
            self.course_test_percent_gdf = gdf;
        }
        if let Some(sv) = patch.course_test_percent_sv {
            self.course_test_percent_sv = sv;
        }
    }
}
