/*!
 * Schema definitions for practice data files
 *
 * This module contains the column names of the five practice resources and
 * the subset of columns each one must carry for its records to be usable.
 */

use serde::{Deserialize, Serialize};

use crate::{PracticeError, Result};

/// Column names shared across resources
pub mod columns {
    pub const PATIENT_ID: &str = "Patient ID";
    pub const PATIENT_FIRST_NAME: &str = "Patient First Name";
    pub const PATIENT_LAST_NAME: &str = "Patient Last Name";

    pub const PROCEDURE_RECORD_ID: &str = "Procedure Record ID";
    pub const PROVIDER_ID: &str = "Provider ID";
    pub const LOCATION_ID: &str = "Location ID";
    pub const PROCEDURE_CODE: &str = "Procedure Code";
    pub const PROCEDURE_DESCRIPTION: &str = "Procedure Description";
    pub const DATE_OF_SERVICE: &str = "Date of Service";

    pub const BILLED_AMOUNT: &str = "Billed Amount";
    pub const OUTSTANDING_AMOUNT: &str = "Outstanding Amount";
    pub const PAID_MEDICAL_AID: &str = "Amount Paid - Medical Aid";
    pub const PAID_PATIENT: &str = "Amount Paid - Patient";
    pub const DATE_BILLED: &str = "Date Billed / Claim Submit Date";
    pub const DATE_PAID_MEDICAL_AID: &str = "Date Paid - Medical Aid";
    pub const DATE_PAID_PATIENT: &str = "Date Paid - Patient";
    pub const MBT_PERCENTAGE: &str = "MBT Percentage";

    pub const PROVIDER_NAME: &str = "Provider Name";
    pub const LOCATION_NAME: &str = "Location Name";
}

use columns::*;

/// The five flat-file resources a practice export consists of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Patients,
    Procedures,
    Billing,
    Doctors,
    Hospitals,
}

impl Resource {
    /// All resources, in load order
    pub const ALL: [Resource; 5] = [
        Resource::Patients,
        Resource::Procedures,
        Resource::Billing,
        Resource::Doctors,
        Resource::Hospitals,
    ];

    /// Resource name as used in logs and cache keys
    pub fn name(&self) -> &'static str {
        match self {
            Resource::Patients => "patients",
            Resource::Procedures => "procedures",
            Resource::Billing => "billing",
            Resource::Doctors => "doctors",
            Resource::Hospitals => "hospitals",
        }
    }

    /// File name inside the data directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Resource::Patients => "patients.csv",
            Resource::Procedures => "procedures.csv",
            Resource::Billing => "billing.csv",
            Resource::Doctors => "doctors.csv",
            Resource::Hospitals => "hospitals.csv",
        }
    }

    /// Parse a resource from its name or file name
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().trim_end_matches(".csv").to_lowercase();
        Resource::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Schema for this resource
    pub fn schema(&self) -> &'static ResourceSchema {
        match self {
            Resource::Patients => &PATIENTS_SCHEMA,
            Resource::Procedures => &PROCEDURES_SCHEMA,
            Resource::Billing => &BILLING_SCHEMA,
            Resource::Doctors => &DOCTORS_SCHEMA,
            Resource::Hospitals => &HOSPITALS_SCHEMA,
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Column layout of one resource
#[derive(Debug)]
pub struct ResourceSchema {
    /// Columns the typed record reads
    pub columns: &'static [&'static str],
    /// Columns that must appear in the header row
    pub required_columns: &'static [&'static str],
    /// Identity column, required on every row at any validation level
    pub identity: Option<&'static str>,
    /// Row fields that must be non-blank under standard validation
    pub required_fields: &'static [&'static str],
}

pub static PATIENTS_SCHEMA: ResourceSchema = ResourceSchema {
    columns: &[PATIENT_ID, PATIENT_FIRST_NAME, PATIENT_LAST_NAME],
    required_columns: &[PATIENT_ID],
    identity: Some(PATIENT_ID),
    required_fields: &[PATIENT_ID],
};

pub static PROCEDURES_SCHEMA: ResourceSchema = ResourceSchema {
    columns: &[
        PROCEDURE_RECORD_ID,
        PATIENT_ID,
        PROVIDER_ID,
        LOCATION_ID,
        PROCEDURE_CODE,
        PROCEDURE_DESCRIPTION,
        DATE_OF_SERVICE,
    ],
    required_columns: &[PROCEDURE_RECORD_ID, PATIENT_ID, PROVIDER_ID, DATE_OF_SERVICE],
    identity: Some(PROCEDURE_RECORD_ID),
    required_fields: &[PROCEDURE_RECORD_ID, PATIENT_ID, PROVIDER_ID],
};

pub static BILLING_SCHEMA: ResourceSchema = ResourceSchema {
    columns: &[
        PROCEDURE_RECORD_ID,
        BILLED_AMOUNT,
        OUTSTANDING_AMOUNT,
        PAID_MEDICAL_AID,
        PAID_PATIENT,
        DATE_BILLED,
        DATE_PAID_MEDICAL_AID,
        DATE_PAID_PATIENT,
        MBT_PERCENTAGE,
    ],
    required_columns: &[PROCEDURE_RECORD_ID, BILLED_AMOUNT, DATE_BILLED],
    identity: None,
    required_fields: &[],
};

pub static DOCTORS_SCHEMA: ResourceSchema = ResourceSchema {
    columns: &[PROVIDER_ID, PROVIDER_NAME],
    required_columns: &[PROVIDER_ID, PROVIDER_NAME],
    identity: Some(PROVIDER_ID),
    required_fields: &[PROVIDER_ID, PROVIDER_NAME],
};

pub static HOSPITALS_SCHEMA: ResourceSchema = ResourceSchema {
    columns: &[LOCATION_ID, LOCATION_NAME],
    required_columns: &[LOCATION_ID, LOCATION_NAME],
    identity: Some(LOCATION_ID),
    required_fields: &[LOCATION_ID],
};

impl ResourceSchema {
    /// Validate that a header row carries every required column
    ///
    /// Extra columns are allowed and column order is irrelevant.
    pub fn validate_headers(&self, resource: Resource, headers: &[String]) -> Result<()> {
        let missing: Vec<String> = self.required_columns.iter()
            .filter(|required| !headers.iter().any(|h| h == *required))
            .map(|required| required.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PracticeError::missing_columns(resource.name(), missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resource_names_round_trip() {
        for resource in Resource::ALL {
            assert_eq!(Resource::from_name(resource.name()), Some(resource));
            assert_eq!(Resource::from_name(resource.file_name()), Some(resource));
        }
        assert_eq!(Resource::from_name("appointments"), None);
    }

    #[test]
    fn test_header_validation_accepts_reordered_and_extra_columns() {
        let hdrs = headers(&["Provider Name", "Specialty", "Provider ID"]);
        assert!(DOCTORS_SCHEMA.validate_headers(Resource::Doctors, &hdrs).is_ok());
    }

    #[test]
    fn test_header_validation_reports_missing_columns() {
        let hdrs = headers(&["Procedure Record ID", "Billed Amount"]);
        let err = BILLING_SCHEMA.validate_headers(Resource::Billing, &hdrs).unwrap_err();
        match err {
            PracticeError::SchemaMismatch { missing_columns, resource, .. } => {
                assert_eq!(resource, "billing");
                assert_eq!(missing_columns, vec![DATE_BILLED.to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_required_columns_are_known_columns() {
        for resource in Resource::ALL {
            let schema = resource.schema();
            for required in schema.required_columns {
                assert!(schema.columns.contains(required), "{required} not in {resource}");
            }
        }
    }
}
