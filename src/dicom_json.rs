//! Reading DICOMweb responses in the DICOM JSON model (PS3.18 F.2).
//!
//! Responses are walked as untyped JSON so that a missing or oddly shaped
//! attribute degrades to "absent" instead of failing the whole report.

use serde_json::Value;

pub const FAILURE_REASON: &str = "00081197";
pub const FAILED_SOP_SEQUENCE: &str = "00081198";
pub const REFERENCED_SOP_SEQUENCE: &str = "00081199";
pub const REFERENCED_SOP_INSTANCE_UID: &str = "00081155";
pub const RETRIEVE_URL: &str = "00081190";

/// The `Value` array of `tag` in `dataset`, if present.
pub fn values<'a>(dataset: &'a Value, tag: &str) -> Option<&'a Vec<Value>> {
    dataset.get(tag)?.get("Value")?.as_array()
}

pub fn first_string<'a>(dataset: &'a Value, tag: &str) -> Option<&'a str> {
    values(dataset, tag)?.first()?.as_str()
}

/// First value of `tag` as display text. Person names use their alphabetic form.
pub fn first_text(dataset: &Value, tag: &str) -> Option<String> {
    match values(dataset, tag)?.first()? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Object(name) => name.get("Alphabetic")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// Sequence items of `tag`. Absent sequences have no items.
pub fn items<'a>(dataset: &'a Value, tag: &str) -> impl Iterator<Item = &'a Value> {
    values(dataset, tag)
        .into_iter()
        .flatten()
        .filter(|item| item.is_object())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedInstance {
    pub sop_instance_uid: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StowReport {
    pub instance_urls: Vec<String>,
    pub failed_instances: Vec<FailedInstance>,
    pub study_url: Option<String>,
}

impl StowReport {
    pub fn from_response(response: &Value) -> Self {
        // Instances without a retrieve URL were discarded by the server.
        let instance_urls = items(response, REFERENCED_SOP_SEQUENCE)
            .filter_map(|instance| first_string(instance, RETRIEVE_URL))
            .map(str::to_string)
            .collect();

        let failed_instances = items(response, FAILED_SOP_SEQUENCE)
            .map(|instance| FailedInstance {
                sop_instance_uid: first_string(instance, REFERENCED_SOP_INSTANCE_UID)
                    .map(str::to_string),
                failure_reason: values(instance, FAILURE_REASON)
                    .and_then(|reason| reason.first())
                    .and_then(failure_reason),
            })
            .collect();

        Self {
            instance_urls,
            failed_instances,
            study_url: first_string(response, RETRIEVE_URL).map(str::to_string),
        }
    }
}

// Failure Reason has VR US; servers send either the number or its hex spelling.
fn failure_reason(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => number.as_u64().map(|code| format!("{code:04X}")),
        Value::String(code) => Some(code.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_accepted_instances_are_reported() {
        let response = json!({
            "00081190": {
                "vr": "UR",
                "Value": ["http://localhost:8042/dicom-web/studies/1.2.3"]
            },
            "00081199": {
                "vr": "SQ",
                "Value": [
                    {
                        "00081155": { "vr": "UI", "Value": ["1.2.3.4.1"] },
                        "00081190": {
                            "vr": "UR",
                            "Value": ["http://localhost:8042/dicom-web/studies/1.2.3/series/1.2.3.4/instances/1.2.3.4.1"]
                        }
                    },
                    {
                        "00081155": { "vr": "UI", "Value": ["1.2.3.4.2"] }
                    }
                ]
            }
        });

        let report = StowReport::from_response(&response);
        assert_eq!(
            report.instance_urls,
            vec!["http://localhost:8042/dicom-web/studies/1.2.3/series/1.2.3.4/instances/1.2.3.4.1"]
        );
        assert_eq!(
            report.study_url.as_deref(),
            Some("http://localhost:8042/dicom-web/studies/1.2.3")
        );
        assert!(report.failed_instances.is_empty());
    }

    #[test]
    fn test_missing_study_url_is_not_an_error() {
        let response = json!({
            "00081199": { "vr": "SQ", "Value": [] }
        });

        let report = StowReport::from_response(&response);
        assert!(report.instance_urls.is_empty());
        assert_eq!(report.study_url, None);
    }

    #[test]
    fn test_missing_structure_yields_empty_report() {
        assert_eq!(StowReport::from_response(&json!({})), StowReport::default());
        assert_eq!(StowReport::from_response(&json!([])), StowReport::default());
        assert_eq!(
            StowReport::from_response(&json!({ "00081199": { "vr": "SQ" } })),
            StowReport::default()
        );
    }

    #[test]
    fn test_failed_instances_are_collected() {
        let response = json!({
            "00081198": {
                "vr": "SQ",
                "Value": [
                    {
                        "00081155": { "vr": "UI", "Value": ["1.2.3.9"] },
                        "00081197": { "vr": "US", "Value": [272] }
                    },
                    {
                        "00081197": { "vr": "US", "Value": ["A700"] }
                    }
                ]
            }
        });

        let report = StowReport::from_response(&response);
        assert_eq!(
            report.failed_instances,
            vec![
                FailedInstance {
                    sop_instance_uid: Some("1.2.3.9".to_string()),
                    failure_reason: Some("0110".to_string()),
                },
                FailedInstance {
                    sop_instance_uid: None,
                    failure_reason: Some("A700".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_first_text_reads_person_names_and_numbers() {
        let dataset = json!({
            "00100010": { "vr": "PN", "Value": [{ "Alphabetic": "Doe^John" }] },
            "00201208": { "vr": "IS", "Value": [12] },
            "00081030": { "vr": "LO" }
        });
        assert_eq!(first_text(&dataset, "00100010").as_deref(), Some("Doe^John"));
        assert_eq!(first_text(&dataset, "00201208").as_deref(), Some("12"));
        assert_eq!(first_text(&dataset, "00081030"), None);
    }

    #[test]
    fn test_first_string_ignores_non_string_values() {
        let dataset = json!({ "00081190": { "vr": "UR", "Value": [42] } });
        assert_eq!(first_string(&dataset, RETRIEVE_URL), None);
    }
}
