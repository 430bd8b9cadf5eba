//! Contributor account model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered contributor.
///
/// Profile fields stay empty until onboarding; the quality-check fields are
/// written by the quality check and drive `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: Option<String>,
    pub country: Option<String>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub experience: Option<ExperienceLevel>,
    pub status: ContributorStatus,
    pub quality_check_passed: bool,
    pub quality_check_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New pending contributor. The password must already be hashed.
    pub fn new(email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email,
            password_hash,
            name: None,
            country: None,
            phone_number: None,
            bio: None,
            experience: None,
            status: ContributorStatus::Pending,
            quality_check_passed: false,
            quality_check_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Profile setup has been completed
    pub fn has_profile(&self) -> bool {
        self.name.is_some() && self.country.is_some() && self.experience.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.status == ContributorStatus::Active
    }

    /// Name shown in notifications and emails
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// Contributor account state, driven by the quality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContributorStatus {
    #[default]
    Pending,
    Active,
    Rejected,
}

impl fmt::Display for ContributorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributorStatus::Pending => write!(f, "PENDING"),
            ContributorStatus::Active => write!(f, "ACTIVE"),
            ContributorStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl FromStr for ContributorStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(ContributorStatus::Pending),
            "ACTIVE" => Ok(ContributorStatus::Active),
            "REJECTED" => Ok(ContributorStatus::Rejected),
            _ => Err(anyhow::anyhow!("Invalid contributor status: {}", s)),
        }
    }
}

/// Self-reported photography experience, chosen during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
    Professional,
    Student,
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExperienceLevel::Beginner => "beginner",
            ExperienceLevel::Intermediate => "intermediate",
            ExperienceLevel::Advanced => "advanced",
            ExperienceLevel::Professional => "professional",
            ExperienceLevel::Student => "student",
        };
        f.write_str(s)
    }
}

impl FromStr for ExperienceLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(ExperienceLevel::Beginner),
            "intermediate" => Ok(ExperienceLevel::Intermediate),
            "advanced" => Ok(ExperienceLevel::Advanced),
            "professional" => Ok(ExperienceLevel::Professional),
            "student" => Ok(ExperienceLevel::Student),
            _ => Err(anyhow::anyhow!("Invalid experience level: {}", s)),
        }
    }
}

/// Profile fields submitted during contributor setup
#[derive(Debug, Clone)]
pub struct ProfileInput {
    pub name: String,
    pub country: String,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub experience: ExperienceLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_pending_without_profile() {
        let user = User::new("ada@example.com".to_string(), "hash".to_string());
        assert_eq!(user.status, ContributorStatus::Pending);
        assert!(!user.quality_check_passed);
        assert!(!user.has_profile());
        assert_eq!(user.display_name(), "ada@example.com");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("ada@example.com".to_string(), "secret-hash".to_string());
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["qualityCheckPassed"], false);
        assert_eq!(json["status"], "PENDING");
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("active".parse::<ContributorStatus>().unwrap(), ContributorStatus::Active);
        assert_eq!("REJECTED".parse::<ContributorStatus>().unwrap(), ContributorStatus::Rejected);
        assert!("banned".parse::<ContributorStatus>().is_err());
    }

    #[test]
    fn test_experience_roundtrip() {
        for level in [
            ExperienceLevel::Beginner,
            ExperienceLevel::Intermediate,
            ExperienceLevel::Advanced,
            ExperienceLevel::Professional,
            ExperienceLevel::Student,
        ] {
            assert_eq!(level.to_string().parse::<ExperienceLevel>().unwrap(), level);
        }
        assert!("guru".parse::<ExperienceLevel>().is_err());
    }
}
