use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub const GENDERS: &[&str] = &["Male", "Female", "Other", "Prefer Not To Say"];
pub const DIETS: &[&str] = &["Vegetarian"];

/// Profile captured at enrollment and persisted alongside the credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub name: String,
    pub age: u8,
    pub gender: String,
    #[serde(rename = "height")]
    pub height_cm: u16,
    #[serde(rename = "weight")]
    pub weight_kg: u16,
    pub diet: Vec<String>,
    pub username: String,
}

impl Enrollment {
    pub fn validate(&self) -> Result<(), String> {
        if self.age > 120 {
            return Err("Age must be between 0 and 120".into());
        }
        if !(50..=250).contains(&self.height_cm) {
            return Err("Height must be between 50 and 250 cm".into());
        }
        if !(10..=300).contains(&self.weight_kg) {
            return Err("Weight must be between 10 and 300 kg".into());
        }
        if !GENDERS.contains(&self.gender.as_str()) {
            return Err(format!("Unknown gender option: {}", self.gender));
        }
        if let Some(diet) = self.diet.iter().find(|d| !DIETS.contains(&d.as_str())) {
            return Err(format!("Unknown dietary preference: {}", diet));
        }
        Ok(())
    }
}

/// The single record held by the credentials file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub username: String,
    pub password_hash: String,
    #[serde(default = "empty_object")]
    pub enrollment: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl CredentialRecord {
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password_hash == hash_password(password)
    }

    /// The stored profile, if it is a complete enrollment.
    pub fn enrollment(&self) -> Option<Enrollment> {
        serde_json::from_value(self.enrollment.clone()).ok()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("could not write credentials file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode credentials: {0}")]
    Json(#[from] serde_json::Error),
}

/// Hex SHA-256 digest of the UTF-8 password bytes. Unsalted.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Single-record JSON credential file. Every save replaces the whole file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(
        &self,
        username: &str,
        password: &str,
        profile: Option<&Enrollment>,
    ) -> Result<CredentialRecord, CredentialError> {
        let enrollment = match profile {
            Some(profile) => serde_json::to_value(profile)?,
            None => empty_object(),
        };
        let record = CredentialRecord {
            username: username.to_string(),
            password_hash: hash_password(password),
            enrollment,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string(&record)?)?;
        tracing::info!("Saved credentials for {} to {}", username, self.path.display());
        Ok(record)
    }

    /// Read the persisted record. Missing or unreadable files count as no record.
    pub fn load(&self) -> Option<CredentialRecord> {
        let json = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Ignoring malformed credentials file: {}", e);
                None
            }
        }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.load()
            .map(|record| record.matches(username, password))
            .unwrap_or(false)
    }
}
