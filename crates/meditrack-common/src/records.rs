//! Input records and usable-record filtering.
//!
//! Both engines receive plain JSON batches. A record that fails to parse is
//! dropped from the batch and counted; it never aborts the whole batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::RecordError;

// ---------------------------------------------------------------------------
// Batch preparation
// ---------------------------------------------------------------------------

/// A record type that can be parsed out of one element of a raw batch.
pub trait FromRecord: Sized {
    /// Human-readable record kind, used in log lines.
    const KIND: &'static str;

    fn from_value(value: &Value) -> Result<Self, RecordError>;
}

/// Usable records of a batch plus how many raw records were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBatch<T> {
    pub records: Vec<T>,
    pub dropped: usize,
}

/// Parse every element of `raw`, keeping the usable ones in input order.
pub fn parse_batch<T: FromRecord>(raw: &[Value]) -> ParsedBatch<T> {
    let mut records = Vec::with_capacity(raw.len());
    let mut dropped = 0;

    for (index, value) in raw.iter().enumerate() {
        match T::from_value(value) {
            Ok(record) => records.push(record),
            Err(reason) => {
                dropped += 1;
                debug!(kind = T::KIND, index, %reason, "dropping unusable record");
            }
        }
    }

    ParsedBatch { records, dropped }
}

/// Read a finite number from a JSON number or a numeric string.
fn finite_number(value: &Value, field: &'static str) -> Result<f64, RecordError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(RecordError::NotNumeric { field }),
    }
}

fn as_object(value: &Value) -> Result<&serde_json::Map<String, Value>, RecordError> {
    value.as_object().ok_or(RecordError::NotAnObject)
}

// ---------------------------------------------------------------------------
// Consultations (anomaly engine input)
// ---------------------------------------------------------------------------

/// One analyte measurement and the lab's abnormal flag for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyteReading {
    pub value: f64,
    pub is_abnormal: bool,
}

impl AnalyteReading {
    pub fn new(value: f64, is_abnormal: bool) -> Self {
        Self { value, is_abnormal }
    }
}

/// A consultation with the three analytes the classifier is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsultationRecord {
    pub hemoglobin: AnalyteReading,
    pub wbc: AnalyteReading,
    pub glucose: AnalyteReading,
}

/// (analyte key, value path, flag path) in feature order.
const ANALYTE_FIELDS: [(&str, &str, &str); 3] = [
    ("hemoglobin", "hemoglobin.value", "hemoglobin.isAbnormal"),
    ("wbc", "wbc.value", "wbc.isAbnormal"),
    ("glucose", "glucose.value", "glucose.isAbnormal"),
];

impl ConsultationRecord {
    /// Feature names in the order used by [`ConsultationRecord::features`].
    pub const FEATURES: [&'static str; 3] = ["hemoglobin", "wbc", "glucose"];

    pub fn features(&self) -> [f64; 3] {
        [self.hemoglobin.value, self.wbc.value, self.glucose.value]
    }

    /// A consultation is abnormal when any of its analytes is.
    pub fn is_abnormal(&self) -> bool {
        self.hemoglobin.is_abnormal || self.wbc.is_abnormal || self.glucose.is_abnormal
    }

    pub fn label(&self) -> u8 {
        u8::from(self.is_abnormal())
    }
}

fn parse_analyte(
    record: &serde_json::Map<String, Value>,
    (key, value_path, flag_path): (&'static str, &'static str, &'static str),
) -> Result<AnalyteReading, RecordError> {
    let analyte = record
        .get(key)
        .ok_or(RecordError::MissingField(key))?
        .as_object()
        .ok_or(RecordError::WrongType { field: key, expected: "object" })?;

    let value = analyte
        .get("value")
        .ok_or(RecordError::MissingField(value_path))?;
    let flag = analyte
        .get("isAbnormal")
        .ok_or(RecordError::MissingField(flag_path))?;

    Ok(AnalyteReading {
        value: finite_number(value, value_path)?,
        is_abnormal: flag
            .as_bool()
            .ok_or(RecordError::WrongType { field: flag_path, expected: "boolean" })?,
    })
}

impl FromRecord for ConsultationRecord {
    const KIND: &'static str = "consultation";

    fn from_value(value: &Value) -> Result<Self, RecordError> {
        let record = as_object(value)?;
        Ok(Self {
            hemoglobin: parse_analyte(record, ANALYTE_FIELDS[0])?,
            wbc: parse_analyte(record, ANALYTE_FIELDS[1])?,
            glucose: parse_analyte(record, ANALYTE_FIELDS[2])?,
        })
    }
}

// ---------------------------------------------------------------------------
// Providers (similarity engine input)
// ---------------------------------------------------------------------------

/// The six performance metrics of a provider, in feature order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetrics {
    pub total_visits: f64,
    pub unique_patients: f64,
    pub average_consultation_fee: f64,
    /// 0.0–1.0
    pub visit_completion_rate: f64,
    /// 0.0–1.0
    pub prescription_frequency: f64,
    pub repeat_patient_percentage: f64,
}

/// JSON keys of the provider metrics, in feature order.
const METRIC_FIELDS: [&str; 6] = [
    "totalVisits",
    "uniquePatients",
    "averageConsultationFee",
    "visitCompletionRate",
    "prescriptionFrequency",
    "repeatPatientPercentage",
];

impl ProviderMetrics {
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.total_visits,
            self.unique_patients,
            self.average_consultation_fee,
            self.visit_completion_rate,
            self.prescription_frequency,
            self.repeat_patient_percentage,
        ]
    }

    /// Storage precision: fee and repeat percentage to 2 decimals, rates to 4.
    /// Visit and patient counts are kept as given.
    pub fn rounded(&self) -> Self {
        Self {
            total_visits: self.total_visits,
            unique_patients: self.unique_patients,
            average_consultation_fee: crate::round_to(self.average_consultation_fee, 2),
            visit_completion_rate: crate::round_to(self.visit_completion_rate, 4),
            prescription_frequency: crate::round_to(self.prescription_frequency, 4),
            repeat_patient_percentage: crate::round_to(self.repeat_patient_percentage, 2),
        }
    }
}

/// A provider (doctor) with display metadata and raw metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: String,
    pub name: String,
    pub department: String,
    #[serde(flatten)]
    pub metrics: ProviderMetrics,
}

const UNKNOWN: &str = "Unknown";

fn label_or_unknown(record: &serde_json::Map<String, Value>, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => UNKNOWN.to_string(),
        Some(other) => other.to_string(),
    }
}

impl FromRecord for ProviderRecord {
    const KIND: &'static str = "provider";

    fn from_value(value: &Value) -> Result<Self, RecordError> {
        let record = as_object(value)?;

        let id = match record.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(RecordError::MissingField("id"))
            }
            Some(_) => {
                return Err(RecordError::WrongType { field: "id", expected: "string" })
            }
        };

        // An absent metric counts as zero; a present one must be numeric.
        let mut values = [0.0; 6];
        for (slot, field) in values.iter_mut().zip(METRIC_FIELDS) {
            if let Some(raw) = record.get(field) {
                *slot = finite_number(raw, field)?;
            }
        }

        Ok(Self {
            id,
            name: label_or_unknown(record, "name"),
            department: label_or_unknown(record, "department"),
            metrics: ProviderMetrics {
                total_visits: values[0],
                unique_patients: values[1],
                average_consultation_fee: values[2],
                visit_completion_rate: values[3],
                prescription_frequency: values[4],
                repeat_patient_percentage: values[5],
            },
        })
    }
}
