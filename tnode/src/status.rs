//! Tnode lifecycle status and its transition table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TnodeStatus {
    /// Registered, waiting for the liveness window
    New,
    Enabled,
    /// No ping within the expiration window
    Expired,
    /// Silent for so long that a fresh broadcast is needed
    NewStartRequired,
    /// Collateral spent; terminal
    OutpointSpent,
}

impl TnodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TnodeStatus::New => "NEW",
            TnodeStatus::Enabled => "ENABLED",
            TnodeStatus::Expired => "EXPIRED",
            TnodeStatus::NewStartRequired => "NEW_START_REQUIRED",
            TnodeStatus::OutpointSpent => "OUTPOINT_SPENT",
        }
    }

    /// Whether `self -> to` is in the transition table
    pub fn can_transition_to(&self, to: TnodeStatus) -> bool {
        use TnodeStatus::*;
        matches!(
            (self, to),
            (New, Enabled)
                | (New, OutpointSpent)
                | (New, NewStartRequired)
                | (Enabled, Expired)
                | (Enabled, NewStartRequired)
                | (Enabled, OutpointSpent)
                | (Expired, Enabled)
                | (Expired, New)
                | (Expired, NewStartRequired)
                | (Expired, OutpointSpent)
                | (NewStartRequired, New)
                | (NewStartRequired, OutpointSpent)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TnodeStatus::OutpointSpent)
    }

    /// Re-registration through a new broadcast is allowed
    pub fn accepts_restart(&self) -> bool {
        matches!(self, TnodeStatus::NewStartRequired | TnodeStatus::Expired)
    }
}

impl fmt::Display for TnodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TnodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(TnodeStatus::New),
            "ENABLED" => Ok(TnodeStatus::Enabled),
            "EXPIRED" => Ok(TnodeStatus::Expired),
            "NEW_START_REQUIRED" => Ok(TnodeStatus::NewStartRequired),
            "OUTPOINT_SPENT" => Ok(TnodeStatus::OutpointSpent),
            other => Err(format!("unknown tnode status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TnodeStatus; 5] = [
        TnodeStatus::New,
        TnodeStatus::Enabled,
        TnodeStatus::Expired,
        TnodeStatus::NewStartRequired,
        TnodeStatus::OutpointSpent,
    ];

    #[test]
    fn test_outpoint_spent_is_terminal() {
        for to in ALL {
            assert!(!TnodeStatus::OutpointSpent.can_transition_to(to));
        }
    }

    #[test]
    fn test_every_live_status_can_lose_collateral() {
        for from in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(TnodeStatus::OutpointSpent));
        }
    }

    #[test]
    fn test_restart_path() {
        assert!(TnodeStatus::NewStartRequired.can_transition_to(TnodeStatus::New));
        assert!(!TnodeStatus::NewStartRequired.can_transition_to(TnodeStatus::Enabled));
        assert!(!TnodeStatus::Enabled.can_transition_to(TnodeStatus::New));
        assert!(!TnodeStatus::New.can_transition_to(TnodeStatus::Expired));
    }

    #[test]
    fn test_string_form() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<TnodeStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&TnodeStatus::NewStartRequired).unwrap(),
            "\"NEW_START_REQUIRED\""
        );
    }
}
