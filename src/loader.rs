/*!
 * CSV loader for practice data files
 *
 * Reads a named resource into raw header-keyed rows, then converts those rows
 * into typed records. Rows that cannot become a usable record are quarantined
 * rather than passed on with blank identifiers.
 */

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use csv::ReaderBuilder;
use serde::Serialize;

use crate::{
    Result, PracticeError, ErrorContext,
    config::ValidationLevel,
    data_types::*,
    schema::{columns::*, Resource},
};

/// One data row keyed by header name
///
/// Values are trimmed. A row shorter than the header is padded with empty
/// strings; cells beyond the header are dropped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    /// 1-based line in the source file (the header is line 1)
    pub line: usize,
    fields: HashMap<String, String>,
}

impl RawRecord {
    /// Build a record from header/value pairs
    pub fn from_pairs<I, K, V>(line: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            line,
            fields: pairs.into_iter()
                .map(|(k, v)| (k.into(), v.into().trim().to_string()))
                .collect(),
        }
    }

    /// Raw value of a column, `None` when the column is absent
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Value of a column, `None` when absent or blank
    pub fn non_blank(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.is_empty())
    }

    /// Owned value of a column, `None` when absent or blank
    pub fn string(&self, column: &str) -> Option<String> {
        self.non_blank(column).map(str::to_string)
    }

    /// Amount in a column, coerced to 0 when absent or unparseable
    pub fn amount(&self, column: &str) -> f64 {
        self.get(column).map(parse_amount).unwrap_or(0.0)
    }

    /// Date in a column, `None` when absent or unparseable
    pub fn date(&self, column: &str) -> Option<chrono::NaiveDate> {
        self.get(column).and_then(parse_date)
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether every cell is blank
    pub fn is_blank(&self) -> bool {
        self.fields.values().all(|v| v.is_empty())
    }
}

/// A row that was kept out of the typed table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarantinedRow {
    pub resource: Resource,
    pub line: usize,
    pub reason: String,
}

/// Typed records plus the rows that were set aside
#[derive(Debug, Clone)]
pub struct LoadOutcome<T> {
    pub records: Vec<T>,
    pub quarantined: Vec<QuarantinedRow>,
}

impl<T> Default for LoadOutcome<T> {
    fn default() -> Self {
        Self { records: Vec::new(), quarantined: Vec::new() }
    }
}

/// Conversion from a raw row into a typed record
pub trait FromRawRecord: Sized {
    /// Resource this record type is read from
    const RESOURCE: Resource;

    /// Build the record; `Err` quarantines the row
    fn from_raw(raw: &RawRecord, level: ValidationLevel) -> Result<Self>;
}

/// CSV reader for the practice resources
#[derive(Debug, Clone)]
pub struct RecordLoader {
    /// Directory holding the resource files
    data_dir: PathBuf,
    /// Whether to validate CSV headers against the resource schema
    validate_headers: bool,
    /// How strictly typed conversion treats rows
    validation_level: ValidationLevel,
}

impl RecordLoader {
    /// Create a loader rooted at a data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            validate_headers: true,
            validation_level: ValidationLevel::default(),
        }
    }

    /// Enable or disable header validation
    pub fn with_header_validation(mut self, validate: bool) -> Self {
        self.validate_headers = validate;
        self
    }

    /// Set the validation level for typed conversion
    pub fn with_validation_level(mut self, level: ValidationLevel) -> Self {
        self.validation_level = level;
        self
    }

    /// Directory this loader reads from
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Validation level used by [`RecordLoader::load_typed`]
    pub fn validation_level(&self) -> ValidationLevel {
        self.validation_level
    }

    /// Path of a resource file
    pub fn path_for(&self, resource: Resource) -> PathBuf {
        self.data_dir.join(resource.file_name())
    }

    /// Load a resource into raw rows
    pub fn load(&self, resource: Resource) -> Result<Vec<RawRecord>> {
        let path = self.path_for(resource);

        if !path.exists() {
            return Err(PracticeError::resource_not_found(path));
        }

        let start_time = Instant::now();
        let file = File::open(&path).map_err(|e| PracticeError::from(e).with_path(path.clone()))?;
        let records = self.read_rows(resource, file)
            .map_err(|e| e.with_path(path.clone()))?;

        log::info!(
            "Loaded {} {} rows from {} in {:.2}s",
            records.len(),
            resource,
            path.display(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(records)
    }

    /// Load a resource, degrading to an empty table on failure
    ///
    /// The failure is logged and returned alongside so the caller can show
    /// an empty state instead of a partial result.
    pub fn load_or_empty(&self, resource: Resource) -> (Vec<RawRecord>, Option<PracticeError>) {
        match self.load(resource) {
            Ok(records) => (records, None),
            Err(e) => {
                log::error!("Failed to load {} resource: {}", resource, e);
                (Vec::new(), Some(e))
            }
        }
    }

    /// Parse CSV text from any reader into raw rows
    pub fn read_rows<R: Read>(&self, resource: Resource, input: R) -> Result<Vec<RawRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let headers: Vec<String> = reader.headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        if self.validate_headers {
            resource.schema().validate_headers(resource, &headers)?;
        }

        let mut records = Vec::new();

        for (idx, result) in reader.records().enumerate() {
            let line = idx + 2;
            let csv_record = result.map_err(|e| PracticeError::CsvParse {
                message: e.to_string(),
                line: Some(line),
                column: None,
                context: ErrorContext {
                    line_number: Some(line),
                    ..Default::default()
                },
            })?;

            let raw = RawRecord::from_pairs(
                line,
                headers.iter().enumerate().map(|(i, header)| {
                    (header.as_str(), csv_record.get(i).unwrap_or_default())
                }),
            );

            // Trailing blank lines are common in spreadsheet exports
            if !raw.is_blank() {
                records.push(raw);
            }
        }

        Ok(records)
    }

    /// Convert raw rows into typed records under this loader's validation level
    pub fn load_typed<T: FromRawRecord>(&self, rows: &[RawRecord]) -> Result<LoadOutcome<T>> {
        convert_rows(rows, self.validation_level)
    }
}

/// Convert raw rows into typed records
///
/// Under [`ValidationLevel::Strict`] the first invalid row fails the whole
/// resource; otherwise invalid rows are quarantined.
pub fn convert_rows<T: FromRawRecord>(rows: &[RawRecord], level: ValidationLevel) -> Result<LoadOutcome<T>> {
    let mut outcome = LoadOutcome::default();

    for raw in rows {
        match T::from_raw(raw, level) {
            Ok(record) => outcome.records.push(record),
            Err(e) if level == ValidationLevel::Strict => return Err(e),
            Err(e) => {
                if outcome.quarantined.len() < 10 {
                    log::warn!("Quarantining {} row {}: {}", T::RESOURCE, raw.line, e);
                }
                outcome.quarantined.push(QuarantinedRow {
                    resource: T::RESOURCE,
                    line: raw.line,
                    reason: e.to_string(),
                });
            }
        }
    }

    if outcome.quarantined.len() > 10 {
        log::warn!("Quarantined {} {} rows in total", outcome.quarantined.len(), T::RESOURCE);
    }

    Ok(outcome)
}

/// Read a field that the validation level requires
fn required(raw: &RawRecord, resource: Resource, column: &str, level: ValidationLevel) -> Result<Option<String>> {
    let schema = resource.schema();
    let is_required = match level {
        ValidationLevel::Lenient => schema.identity == Some(column),
        ValidationLevel::Standard | ValidationLevel::Strict => schema.required_fields.contains(&column),
    };

    match raw.string(column) {
        Some(value) => Ok(Some(value)),
        None if is_required => Err(PracticeError::missing_field(column, raw.line)),
        None => Ok(None),
    }
}

/// Strict validation also rejects cells that are present but malformed
fn check_strict(raw: &RawRecord, level: ValidationLevel, dates: &[&str], amounts: &[&str]) -> Result<()> {
    if level != ValidationLevel::Strict {
        return Ok(());
    }

    for column in dates {
        if let Some(value) = raw.get(column).filter(|v| is_malformed_date(v)) {
            return Err(PracticeError::DataValidation {
                message: format!("Unparseable date in {}", column),
                field: Some(column.to_string()),
                value: Some(value.to_string()),
                context: ErrorContext { line_number: Some(raw.line), ..Default::default() },
            });
        }
    }

    for column in amounts {
        if let Some(value) = raw.get(column).filter(|v| is_malformed_amount(v)) {
            return Err(PracticeError::DataValidation {
                message: format!("Unparseable amount in {}", column),
                field: Some(column.to_string()),
                value: Some(value.to_string()),
                context: ErrorContext { line_number: Some(raw.line), ..Default::default() },
            });
        }
    }

    Ok(())
}

impl FromRawRecord for PatientRecord {
    const RESOURCE: Resource = Resource::Patients;

    fn from_raw(raw: &RawRecord, level: ValidationLevel) -> Result<Self> {
        let patient_id = required(raw, Self::RESOURCE, PATIENT_ID, level)?.unwrap_or_default();

        Ok(PatientRecord {
            patient_id: PatientId(patient_id),
            first_name: raw.string(PATIENT_FIRST_NAME),
            last_name: raw.string(PATIENT_LAST_NAME),
        })
    }
}

impl FromRawRecord for ProcedureRecord {
    const RESOURCE: Resource = Resource::Procedures;

    fn from_raw(raw: &RawRecord, level: ValidationLevel) -> Result<Self> {
        check_strict(raw, level, &[DATE_OF_SERVICE], &[])?;

        let record_id = required(raw, Self::RESOURCE, PROCEDURE_RECORD_ID, level)?.unwrap_or_default();
        let patient_id = required(raw, Self::RESOURCE, PATIENT_ID, level)?.unwrap_or_default();
        let provider_id = required(raw, Self::RESOURCE, PROVIDER_ID, level)?.unwrap_or_default();

        Ok(ProcedureRecord {
            record_id: ProcedureRecordId(record_id),
            patient_id: PatientId(patient_id),
            provider_id: ProviderId(provider_id),
            location_id: raw.string(LOCATION_ID).map(LocationId),
            code: raw.string(PROCEDURE_CODE),
            description: raw.string(PROCEDURE_DESCRIPTION),
            date_of_service: raw.date(DATE_OF_SERVICE),
        })
    }
}

impl FromRawRecord for BillingRecord {
    const RESOURCE: Resource = Resource::Billing;

    fn from_raw(raw: &RawRecord, level: ValidationLevel) -> Result<Self> {
        check_strict(
            raw,
            level,
            &[DATE_BILLED, DATE_PAID_MEDICAL_AID, DATE_PAID_PATIENT],
            &[BILLED_AMOUNT, OUTSTANDING_AMOUNT, PAID_MEDICAL_AID, PAID_PATIENT, MBT_PERCENTAGE],
        )?;

        Ok(BillingRecord {
            procedure_record_id: raw.string(PROCEDURE_RECORD_ID).map(ProcedureRecordId),
            billed_amount: raw.amount(BILLED_AMOUNT),
            outstanding_amount: raw.amount(OUTSTANDING_AMOUNT),
            paid_medical_aid: raw.amount(PAID_MEDICAL_AID),
            paid_patient: raw.amount(PAID_PATIENT),
            date_billed: raw.date(DATE_BILLED),
            date_paid_medical_aid: raw.date(DATE_PAID_MEDICAL_AID),
            date_paid_patient: raw.date(DATE_PAID_PATIENT),
            mbt_percentage: raw.amount(MBT_PERCENTAGE),
        })
    }
}

impl FromRawRecord for DoctorRecord {
    const RESOURCE: Resource = Resource::Doctors;

    fn from_raw(raw: &RawRecord, level: ValidationLevel) -> Result<Self> {
        let provider_id = required(raw, Self::RESOURCE, PROVIDER_ID, level)?.unwrap_or_default();
        let name = required(raw, Self::RESOURCE, PROVIDER_NAME, level)?
            .unwrap_or_else(|| provider_id.clone());

        Ok(DoctorRecord {
            provider_id: ProviderId(provider_id),
            name,
        })
    }
}

impl FromRawRecord for HospitalRecord {
    const RESOURCE: Resource = Resource::Hospitals;

    fn from_raw(raw: &RawRecord, level: ValidationLevel) -> Result<Self> {
        let location_id = required(raw, Self::RESOURCE, LOCATION_ID, level)?.unwrap_or_default();

        Ok(HospitalRecord {
            location_id: LocationId(location_id),
            name: raw.string(LOCATION_NAME),
        })
    }
}
