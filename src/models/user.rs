use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Student => "STUDENT",
            Role::Instructor => "INSTRUCTOR",
            Role::Admin => "ADMIN",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "INSTRUCTOR" => Ok(Role::Instructor),
            "ADMIN" => Ok(Role::Admin),
            other => Err(AppError::BadRequest(format!("unknown role: {other}"))),
        }
    }
}

/// A student identifier of the form `YYYY` + branch letters + roll digits,
/// e.g. `2023CSB1042`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct EntryNumber {
    raw: String,
    branch_end: usize,
}

impl EntryNumber {
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let raw = input.trim().to_ascii_uppercase();
        let malformed = || AppError::MalformedEntryNumber(input.to_string());

        let bytes = raw.as_bytes();
        if bytes.len() < 4 || !bytes[..4].iter().all(u8::is_ascii_digit) {
            return Err(malformed());
        }

        let letters = bytes[4..]
            .iter()
            .take_while(|b| b.is_ascii_uppercase())
            .count();
        if !(2..=4).contains(&letters) {
            return Err(malformed());
        }

        let branch_end = 4 + letters;
        let roll = &bytes[branch_end..];
        if roll.is_empty() || !roll.iter().all(u8::is_ascii_digit) {
            return Err(malformed());
        }

        Ok(Self { raw, branch_end })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn admission_year(&self) -> &str {
        &self.raw[..4]
    }

    pub fn branch(&self) -> &str {
        &self.raw[4..self.branch_end]
    }

    /// True when this student was admitted in `batch_year` into `branch`.
    pub fn in_cohort(&self, batch_year: &str, branch: &str) -> bool {
        self.admission_year() == batch_year && self.branch() == branch
    }
}

impl fmt::Display for EntryNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<EntryNumber> for String {
    fn from(value: EntryNumber) -> Self {
        value.raw
    }
}

impl FromStr for EntryNumber {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryNumber::parse(s)
    }
}

/// Normalises a branch code (2 to 4 letters) to upper case.
pub fn normalize_branch(code: &str) -> Result<String, AppError> {
    let code = code.trim().to_ascii_uppercase();
    if (2..=4).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(code)
    } else {
        Err(AppError::BadRequest(format!("invalid branch code: {code}")))
    }
}

/// Checks a four-digit batch (admission) year.
pub fn normalize_batch_year(year: &str) -> Result<String, AppError> {
    let year = year.trim();
    if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) {
        Ok(year.to_string())
    } else {
        Err(AppError::BadRequest(format!("invalid batch year: {year}")))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub entry_number: Option<String>,
    pub department: Option<String>,
    pub is_faculty_advisor: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role-specific attributes. Only students carry an entry number and only
/// instructors carry a department.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserProfile {
    Student {
        entry_number: EntryNumber,
    },
    Instructor {
        department: String,
        is_faculty_advisor: bool,
    },
    Admin,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    #[serde(flatten)]
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        match self.profile {
            UserProfile::Student { .. } => Role::Student,
            UserProfile::Instructor { .. } => Role::Instructor,
            UserProfile::Admin => Role::Admin,
        }
    }

    pub fn entry_number(&self) -> Option<&EntryNumber> {
        match &self.profile {
            UserProfile::Student { entry_number } => Some(entry_number),
            _ => None,
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let profile = match row.role {
            Role::Student => {
                let raw = row
                    .entry_number
                    .ok_or_else(|| AppError::MalformedEntryNumber(String::new()))?;
                UserProfile::Student {
                    entry_number: EntryNumber::parse(&raw)?,
                }
            }
            Role::Instructor => UserProfile::Instructor {
                department: row
                    .department
                    .ok_or_else(|| AppError::invalid_state("instructor has no department"))?,
                is_faculty_advisor: row.is_faculty_advisor,
            },
            Role::Admin => UserProfile::Admin,
        };

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            is_active: row.is_active,
            profile,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NewUserProfile {
    Student {
        entry_number: String,
    },
    Instructor {
        department: String,
        #[serde(default)]
        is_faculty_advisor: bool,
    },
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserRequest {
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub profile: NewUserProfile,
}

impl NewUserRequest {
    /// Validates the request into a profile that can be stored as-is.
    pub fn validate(&self) -> Result<UserProfile, AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("name must not be empty".to_string()));
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(AppError::BadRequest(format!("invalid email: {email}"))),
        }

        match &self.profile {
            NewUserProfile::Student { entry_number } => Ok(UserProfile::Student {
                entry_number: EntryNumber::parse(entry_number)?,
            }),
            NewUserProfile::Instructor {
                department,
                is_faculty_advisor,
            } => {
                let department = department.trim();
                if department.is_empty() {
                    return Err(AppError::BadRequest(
                        "instructors need a department".to_string(),
                    ));
                }
                Ok(UserProfile::Instructor {
                    department: department.to_string(),
                    is_faculty_advisor: *is_faculty_advisor,
                })
            }
            NewUserProfile::Admin => Ok(UserProfile::Admin),
        }
    }
}
