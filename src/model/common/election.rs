use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Phases in the election lifecycle.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Being configured, no ballots accepted.
    #[default]
    Draft,
    /// Ballots accepted, subject to the schedule.
    Voting,
    /// Closed, either manually or because the schedule ran out.
    Ended,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Draft => "Draft",
            Self::Voting => "Voting",
            Self::Ended => "Ended",
        };
        f.write_str(name)
    }
}

/// Admin-triggered phase transitions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseAction {
    Start,
    Close,
    Refresh,
    Reset,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown phase action.")]
pub struct UnknownPhaseAction;

impl FromStr for PhaseAction {
    type Err = UnknownPhaseAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "start" => Ok(Self::Start),
            "close" => Ok(Self::Close),
            "refresh" => Ok(Self::Refresh),
            "reset" => Ok(Self::Reset),
            _ => Err(UnknownPhaseAction),
        }
    }
}

/// Department/year allow-lists. An empty list imposes no restriction.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    pub years: Vec<String>,
}

/// Why a voter failed the eligibility check.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Ineligible {
    #[error("Voting is restricted to: {}", .0.join(", "))]
    Department(Vec<String>),
    #[error("Voting is restricted to years: {}", .0.join(", "))]
    Year(Vec<String>),
}

impl Eligibility {
    /// Check a voter's department and year against the allow-lists.
    /// Departments are checked first.
    pub fn check(&self, department: Option<&str>, year: Option<&str>) -> Result<(), Ineligible> {
        if !Self::admits(&self.departments, department) {
            return Err(Ineligible::Department(self.departments.clone()));
        }
        if !Self::admits(&self.years, year) {
            return Err(Ineligible::Year(self.years.clone()));
        }
        Ok(())
    }

    fn admits(allowed: &[String], value: Option<&str>) -> bool {
        allowed.is_empty() || value.map_or(false, |v| allowed.iter().any(|a| a == v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs_only() -> Eligibility {
        Eligibility {
            departments: vec!["CS".to_string()],
            years: vec![],
        }
    }

    #[test]
    fn empty_lists_admit_everyone() {
        let open = Eligibility::default();
        assert_eq!(open.check(None, None), Ok(()));
        assert_eq!(open.check(Some("ECE"), Some("1")), Ok(()));
    }

    #[test]
    fn department_restriction() {
        let eligibility = cs_only();
        assert_eq!(eligibility.check(Some("CS"), None), Ok(()));
        assert_eq!(eligibility.check(Some("CS"), Some("4")), Ok(()));
        let err = eligibility.check(Some("ECE"), Some("4")).unwrap_err();
        assert_eq!(err.to_string(), "Voting is restricted to: CS");
        assert!(eligibility.check(None, None).is_err());
    }

    #[test]
    fn year_restriction_after_department() {
        let eligibility = Eligibility {
            departments: vec!["CS".to_string(), "ME".to_string()],
            years: vec!["1".to_string(), "2".to_string()],
        };
        assert_eq!(
            eligibility.check(Some("EE"), Some("3")).unwrap_err().to_string(),
            "Voting is restricted to: CS, ME"
        );
        assert_eq!(
            eligibility.check(Some("ME"), Some("3")).unwrap_err().to_string(),
            "Voting is restricted to years: 1, 2"
        );
        assert_eq!(eligibility.check(Some("ME"), Some("2")), Ok(()));
    }

    #[test]
    fn parse_actions() {
        assert_eq!("start".parse(), Ok(PhaseAction::Start));
        assert_eq!("reset".parse(), Ok(PhaseAction::Reset));
        assert_eq!("launch".parse::<PhaseAction>(), Err(UnknownPhaseAction));
    }
}
