use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only patient projection used for existence checks and reminders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "phone_number")]
    pub phone: Option<String>,
}

/// Where a reminder for this patient should be delivered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientContact {
    pub name: String,
    pub email: String,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Contact projection, or `None` when no usable email is on file.
    pub fn contact(&self) -> Option<PatientContact> {
        let email = self.email.as_deref()?.trim();
        if !is_valid_email(email) {
            return None;
        }

        Some(PatientContact {
            name: self.full_name(),
            email: email.to_string(),
        })
    }
}

fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"))
        .is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(email: Option<&str>) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: email.map(str::to_string),
            phone: None,
        }
    }

    #[test]
    fn contact_requires_wellformed_email() {
        assert_eq!(
            patient(Some(" john@example.com ")).contact(),
            Some(PatientContact {
                name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
            })
        );
        assert_eq!(patient(Some("not-an-email")).contact(), None);
        assert_eq!(patient(Some("")).contact(), None);
        assert_eq!(patient(None).contact(), None);
    }
}
