use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Monthly request quota of the Free plan.
pub const FREE_MONTHLY_QUOTA: i32 = 1000;
/// Monthly request quota of the Pro plan.
pub const PRO_MONTHLY_QUOTA: i32 = 10000;

/// Subscription plan.
///
/// The quota of a subscription is always derived from its plan and is never set
/// on its own. Stored in PostgreSQL as the `subscription_plan` enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_plan")]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    pub fn monthly_quota(&self) -> i32 {
        match self {
            Plan::Free => FREE_MONTHLY_QUOTA,
            Plan::Pro => PRO_MONTHLY_QUOTA,
        }
    }

    /// Whether subscriptions on this plan carry an end date.
    pub fn expires(&self) -> bool {
        matches!(self, Plan::Pro)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Pro => "Pro",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plan names are case sensitive, matching what clients send over the wire.
impl FromStr for Plan {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Free" => Ok(Plan::Free),
            "Pro" => Ok(Plan::Pro),
            other => Err(AppError::InvalidPlan(other.to_string())),
        }
    }
}
