//! QIDO-RS series search results.

use anyhow::{Result, bail};
use serde_json::Value;

use crate::dicom_json::{RETRIEVE_URL, first_text};

pub const PATIENT_NAME: &str = "00100010";
pub const PATIENT_ID: &str = "00100020";
pub const STUDY_DESCRIPTION: &str = "00081030";
pub const SERIES_DESCRIPTION: &str = "0008103E";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesMatch {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub study_description: Option<String>,
    pub series_description: Option<String>,
    pub retrieve_url: Option<String>,
}

impl SeriesMatch {
    pub fn from_dataset(dataset: &Value) -> Self {
        Self {
            patient_id: first_text(dataset, PATIENT_ID),
            patient_name: first_text(dataset, PATIENT_NAME),
            study_description: first_text(dataset, STUDY_DESCRIPTION),
            series_description: first_text(dataset, SERIES_DESCRIPTION),
            retrieve_url: first_text(dataset, RETRIEVE_URL),
        }
    }

    /// `patient id - patient name - study - series - retrieve URL`, absent values left empty.
    pub fn summary(&self) -> String {
        [
            &self.patient_id,
            &self.patient_name,
            &self.study_description,
            &self.series_description,
            &self.retrieve_url,
        ]
        .iter()
        .map(|field| field.as_deref().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" - ")
    }
}

pub fn series_matches(response: &Value) -> Result<Vec<SeriesMatch>> {
    let Some(datasets) = response.as_array() else {
        bail!("QIDO-RS response is not a JSON array of datasets");
    };
    Ok(datasets.iter().map(SeriesMatch::from_dataset).collect())
}

/// Parses a `key=value` search parameter such as `PatientID=1234` or `00100020=1234`.
pub fn parse_query_param(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{arg}'")),
    }
}
