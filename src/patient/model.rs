use serde::{Deserialize, Serialize};

use crate::blockchain::LedgerError;

/// Oldest age the intake form accepts.
pub const MAX_AGE: u32 = 150;

pub const GENDERS: [&str; 3] = ["Male", "Female", "Other"];

pub const BLOOD_TYPES: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

/// One patient's record as embedded in a block.
///
/// Field order is part of the block hash preimage; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub blood_type: String,
    pub diagnosis: String,
    pub treatment: String,
    pub doctor: String,
    pub timestamp: i64, // capture time, ms since epoch
}

impl PatientRecord {
    /// Sentinel payload carried by the genesis block.
    pub fn genesis() -> Self {
        Self {
            id: String::from("0"),
            name: String::from("Genesis Block"),
            age: 0,
            gender: String::new(),
            blood_type: String::new(),
            diagnosis: String::new(),
            treatment: String::new(),
            doctor: String::new(),
            timestamp: 0,
        }
    }
}

/// Age as submitted: intake forms post it as text, API clients as a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Age {
    Number(i64),
    Text(String),
}

/// A patient submission before validation. Every field may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientForm {
    pub id: Option<String>,
    pub name: Option<String>,
    pub age: Option<Age>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub doctor: Option<String>,
}

impl PatientForm {
    /// Validate the form and stamp it with the capture time.
    ///
    /// Blank strings count as missing. All missing fields are reported
    /// together, in form order.
    pub fn into_record(self, captured_at: i64) -> Result<PatientRecord, LedgerError> {
        let mut missing = Vec::new();
        let id = required(self.id, "id", &mut missing);
        let name = required(self.name, "name", &mut missing);
        let age = match self.age {
            Some(Age::Text(ref t)) if t.trim().is_empty() => None,
            age => age,
        };
        if age.is_none() {
            missing.push("age");
        }
        let gender = required(self.gender, "gender", &mut missing);
        let blood_type = required(self.blood_type, "bloodType", &mut missing);
        let diagnosis = required(self.diagnosis, "diagnosis", &mut missing);
        let treatment = required(self.treatment, "treatment", &mut missing);
        let doctor = required(self.doctor, "doctor", &mut missing);

        if !missing.is_empty() {
            return Err(LedgerError::Validation { fields: missing });
        }

        let age = parse_age(age.unwrap_or(Age::Number(0)))?;
        if !GENDERS.contains(&gender.as_str()) {
            return Err(LedgerError::InvalidField {
                field: "gender",
                reason: format!("expected one of {}", GENDERS.join(", ")),
            });
        }
        if !BLOOD_TYPES.contains(&blood_type.as_str()) {
            return Err(LedgerError::InvalidField {
                field: "bloodType",
                reason: format!("expected one of {}", BLOOD_TYPES.join(", ")),
            });
        }

        Ok(PatientRecord {
            id,
            name,
            age,
            gender,
            blood_type,
            diagnosis,
            treatment,
            doctor,
            timestamp: captured_at,
        })
    }
}

fn parse_age(age: Age) -> Result<u32, LedgerError> {
    let n = match age {
        Age::Number(n) => n,
        Age::Text(t) => t.trim().parse::<i64>().map_err(|_| LedgerError::InvalidField {
            field: "age",
            reason: String::from("must be a whole number"),
        })?,
    };
    u32::try_from(n)
        .ok()
        .filter(|a| *a <= MAX_AGE)
        .ok_or_else(|| LedgerError::InvalidField {
            field: "age",
            reason: format!("must be between 0 and {MAX_AGE}"),
        })
}

/// Trimmed value of a required text field, or record it as missing.
fn required(value: Option<String>, field: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push(field);
            String::new()
        }
    }
}
