//! Wire shapes published by the laboratory system.
//!
//! Everything here mirrors the upstream JSON document (camelCase keys).
//! Unknown keys are ignored so new upstream fields never break a fetch.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Status string the laboratory uses for a test that was withdrawn.
pub const STATUS_CANCELED: &str = "Canceled";

/// Result type marker for numeric results. Anything else is stored as text.
pub const RESULT_TYPE_NUMERIC: &str = "N";

/// One notification: "the accession behind `content` changed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessionEvent {
    pub event_id: String,
    /// Path of the accession document relative to the lab system base uri,
    /// e.g. `/ws/rest/accession/<uuid>`.
    pub content: String,
}

impl AccessionEvent {
    pub fn new(event_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            content: content.into(),
        }
    }

    /// Accession identifier carried by the event (last non-empty path segment).
    pub fn accession_key(&self) -> &str {
        self.content
            .trim()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accession {
    pub accession_uuid: String,
    pub patient_uuid: String,
    /// Ordering timestamp; used as the effective date of encounters created for it.
    pub date_time: DateTime<Utc>,
    #[serde(default)]
    pub test_details: Vec<TestDetail>,
}

impl Accession {
    /// Ordering timestamp at the microsecond precision the store keeps.
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.date_time.trunc_subsecs(6)
    }

    /// Test details that carry a result, in document order.
    pub fn resulted_tests(&self) -> impl Iterator<Item = &TestDetail> {
        self.test_details.iter().filter(|t| t.has_result())
    }

    /// Distinct non-blank provider identifiers referenced by resulted tests.
    pub fn provider_uuids(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for t in self.resulted_tests() {
            if let Some(p) = t.provider() {
                if !out.contains(&p) {
                    out.push(p);
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDetail {
    pub test_uuid: String,
    #[serde(default)]
    pub panel_uuid: Option<String>,
    #[serde(default)]
    pub test_name: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub result_type: Option<String>,
    #[serde(default)]
    pub test_unit_of_measurement: Option<String>,
    #[serde(default)]
    pub abnormal: Option<bool>,
    #[serde(default)]
    pub provider_uuid: Option<String>,
    /// Result timestamp. Absent until the test is resulted.
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl TestDetail {
    /// A blank result means "no result yet".
    pub fn has_result(&self) -> bool {
        non_blank(&self.result).is_some()
    }

    pub fn result_value(&self) -> Option<&str> {
        non_blank(&self.result)
    }

    pub fn panel(&self) -> Option<&str> {
        non_blank(&self.panel_uuid)
    }

    pub fn provider(&self) -> Option<&str> {
        non_blank(&self.provider_uuid)
    }

    /// Concept the upstream order was placed for: the panel when the test is
    /// a panel member, the test itself otherwise.
    pub fn orderable_uuid(&self) -> &str {
        self.panel().unwrap_or(self.test_uuid.as_str())
    }

    pub fn is_canceled(&self) -> bool {
        non_blank(&self.status)
            .map(|s| s.eq_ignore_ascii_case(STATUS_CANCELED))
            .unwrap_or(false)
    }

    pub fn is_numeric(&self) -> bool {
        non_blank(&self.result_type)
            .map(|t| t.eq_ignore_ascii_case(RESULT_TYPE_NUMERIC))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "accessionUuid": "acc-1",
        "patientUuid": "pat-1",
        "dateTime": "2024-03-01T08:00:00Z",
        "someNewUpstreamField": 42,
        "testDetails": [
            {
                "testUuid": "hb",
                "panelUuid": "",
                "result": "12.5",
                "resultType": "N",
                "providerUuid": "prov-9",
                "dateTime": "2024-03-01T10:15:00Z"
            },
            {
                "testUuid": "wbc",
                "panelUuid": "cbc",
                "result": "   ",
                "status": "Canceled"
            }
        ]
    }"#;

    #[test]
    fn parses_upstream_document_and_ignores_unknown_keys() {
        let acc: Accession = serde_json::from_str(DOC).unwrap();
        assert_eq!(acc.accession_uuid, "acc-1");
        assert_eq!(acc.test_details.len(), 2);

        let hb = &acc.test_details[0];
        assert!(hb.has_result());
        assert!(hb.is_numeric());
        assert_eq!(hb.panel(), None, "blank panel uuid means no panel");
        assert_eq!(hb.orderable_uuid(), "hb");

        let wbc = &acc.test_details[1];
        assert!(!wbc.has_result(), "whitespace result is blank");
        assert!(wbc.is_canceled());
        assert_eq!(wbc.orderable_uuid(), "cbc");
        assert_eq!(wbc.date_time, None);
    }

    #[test]
    fn provider_uuids_are_distinct_and_only_from_resulted_tests() {
        let mut acc: Accession = serde_json::from_str(DOC).unwrap();
        let mut dup = acc.test_details[0].clone();
        dup.test_uuid = "plt".to_string();
        acc.test_details.push(dup);
        acc.test_details[1].provider_uuid = Some("prov-unresulted".to_string());

        assert_eq!(acc.provider_uuids(), vec!["prov-9"]);
    }

    #[test]
    fn effective_date_is_cut_to_microseconds() {
        let mut acc: Accession = serde_json::from_str(DOC).unwrap();
        acc.date_time = "2024-03-01T08:00:00.123456789Z".parse().unwrap();
        let expected: DateTime<Utc> = "2024-03-01T08:00:00.123456Z".parse().unwrap();
        assert_eq!(acc.effective_date(), expected);
    }

    #[test]
    fn accession_key_is_last_path_segment() {
        let ev = AccessionEvent::new("e1", "/openelis/ws/rest/accession/abc-123/");
        assert_eq!(ev.accession_key(), "abc-123");

        let bare = AccessionEvent::new("e2", "abc-456");
        assert_eq!(bare.accession_key(), "abc-456");
    }
}
