use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Jpy,
    Usd,
    Eur,
    Gbp,
    Krw,
    Cny,
}

impl Currency {
    /// Canonical currency code, matching the engine/database encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpy => "JPY",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Krw => "KRW",
            Self::Cny => "CNY",
        }
    }
}

/// Rounding mode applied when a share does not divide evenly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    Floor,
    Ceil,
    #[default]
    #[serde(rename = "round")]
    Nearest,
}

impl Rounding {
    /// Canonical rounding code, matching the engine/database encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Nearest => "round",
        }
    }
}

pub mod group {
    use super::*;

    /// A group member: opaque id plus display name.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MemberView {
        pub id: Uuid,
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Group {
        pub id: String,
        pub name: String,
        pub owner: String,
        pub members: Vec<MemberView>,
        pub created_at: DateTime<Utc>,
    }

    /// Request body for appending a single member.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberAdd {
        pub name: String,
    }

    /// Request body replacing the whole member set.
    ///
    /// There is no single-member removal: any removal rewrites the full set.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MembersReplace {
        pub members: Vec<MemberView>,
    }
}

pub mod split {
    use super::*;

    /// A directed transfer between two participants, by index into the
    /// event's participant list.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SettlementView {
        pub from: usize,
        pub to: usize,
        pub amount: i64,
    }

    /// The cached calculation result stored verbatim on the event.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SplitResult {
        pub per: i64,
        pub details: Vec<i64>,
        pub settlements: Vec<SettlementView>,
        pub total: i64,
    }
}

pub mod event {
    use super::*;
    use crate::group::MemberView;
    use crate::split::SplitResult;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EventNew {
        pub name: String,
        pub memo: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EventSummary {
        pub id: String,
        pub name: String,
        pub total: i64,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EventList {
        pub events: Vec<EventSummary>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EventView {
        pub id: String,
        pub name: String,
        /// Copy of the group member list taken at event creation.
        pub participants: Vec<MemberView>,
        pub total: i64,
        pub memo: String,
        pub rounding: Rounding,
        pub tip_rate: f64,
        pub currency: Currency,
        pub fixed_amounts: Vec<Option<i64>>,
        /// Participant index → share weight; empty means even split.
        pub weights: BTreeMap<usize, f64>,
        /// Participant id → amount paid so far; missing means unrecorded.
        pub payments: BTreeMap<Uuid, i64>,
        pub result: Option<SplitResult>,
        pub created_at: DateTime<Utc>,
    }

    /// Partial update of the calculation inputs. Absent fields are kept.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct EventUpdate {
        pub total: Option<i64>,
        pub memo: Option<String>,
        pub rounding: Option<Rounding>,
        pub tip_rate: Option<f64>,
        pub currency: Option<Currency>,
        pub fixed_amounts: Option<Vec<Option<i64>>>,
        pub weights: Option<BTreeMap<usize, f64>>,
    }

    /// Replaces the payments map wholesale (last write wins).
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PaymentsReplace {
        pub payments: BTreeMap<Uuid, i64>,
    }
}

pub mod export {
    use super::*;

    /// Human-readable share text plus a base64 link payload.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ShareView {
        pub text: String,
        pub payload: String,
    }
}
