/*!
 * Data type definitions for practice records
 *
 * Typed representations of the five practice resources, plus the coercion
 * rules that turn raw cell text into amounts and calendar dates.
 */

use serde::{Deserialize, Serialize};
use chrono::{NaiveDate, NaiveDateTime};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new<S: Into<String>>(id: S) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }
    };
}

identifier!(
    /// Patient ID
    PatientId
);
identifier!(
    /// Provider ID of a doctor
    ProviderId
);
identifier!(
    /// Location ID of a hospital or clinic
    LocationId
);
identifier!(
    /// Procedure Record ID, shared by a procedure and its billing row
    ProcedureRecordId
);

/// A patient of the practice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: PatientId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl PatientRecord {
    /// First and last name joined by a space, skipping blanks
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A procedure performed by one provider on one patient at one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureRecord {
    pub record_id: ProcedureRecordId,
    pub patient_id: PatientId,
    pub provider_id: ProviderId,
    pub location_id: Option<LocationId>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub date_of_service: Option<NaiveDate>,
}

impl ProcedureRecord {
    /// Location ID as text, if the procedure has one
    pub fn location_str(&self) -> Option<&str> {
        self.location_id.as_ref().map(LocationId::as_str)
    }
}

/// Billing for a single procedure
///
/// Amounts are never negative: blank or unparseable cells are stored as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub procedure_record_id: Option<ProcedureRecordId>,
    pub billed_amount: f64,
    pub outstanding_amount: f64,
    pub paid_medical_aid: f64,
    pub paid_patient: f64,
    pub date_billed: Option<NaiveDate>,
    pub date_paid_medical_aid: Option<NaiveDate>,
    pub date_paid_patient: Option<NaiveDate>,
    pub mbt_percentage: f64,
}

impl BillingRecord {
    /// Total received from both payment sources
    pub fn total_paid(&self) -> f64 {
        self.paid_medical_aid + self.paid_patient
    }

    /// Payment date for one source
    pub fn paid_date(&self, source: PaymentSource) -> Option<NaiveDate> {
        match source {
            PaymentSource::MedicalAid => self.date_paid_medical_aid,
            PaymentSource::Patient => self.date_paid_patient,
        }
    }

    /// Amount received from one source
    pub fn paid_amount(&self, source: PaymentSource) -> f64 {
        match source {
            PaymentSource::MedicalAid => self.paid_medical_aid,
            PaymentSource::Patient => self.paid_patient,
        }
    }
}

/// A doctor (provider)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub provider_id: ProviderId,
    pub name: String,
}

/// A hospital or clinic (location)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalRecord {
    pub location_id: LocationId,
    pub name: Option<String>,
}

/// The two parties that settle a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    MedicalAid,
    Patient,
}

impl PaymentSource {
    pub const ALL: [PaymentSource; 2] = [PaymentSource::MedicalAid, PaymentSource::Patient];

    pub fn label(&self) -> &'static str {
        match self {
            PaymentSource::MedicalAid => "Medical Aid",
            PaymentSource::Patient => "Patient",
        }
    }
}

impl std::fmt::Display for PaymentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Date formats accepted in date columns, tried in order
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parse a calendar date, returning `None` for blank or unrecognised text
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc().date());
    }

    let stripped = value.trim_end_matches('Z');
    DATETIME_FORMATS.iter()
        .find_map(|format| NaiveDateTime::parse_from_str(stripped, format).ok())
        .map(|dt| dt.date())
}

/// Parse a monetary amount or percentage
///
/// Blank, unparseable, non-finite and negative values all coerce to 0.
pub fn parse_amount(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v,
        _ => 0.0,
    }
}

/// Whether a non-blank cell failed amount parsing
pub fn is_malformed_amount(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !matches!(value.parse::<f64>(), Ok(v) if v.is_finite() && v >= 0.0)
}

/// Whether a non-blank cell failed date parsing
pub fn is_malformed_date(value: &str) -> bool {
    !value.trim().is_empty() && parse_date(value).is_none()
}
