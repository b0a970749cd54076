use crate::ir::{ConnectionType, DeviceRecord, DeviceType};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordValidation {
    pub index: usize,
    pub id: Option<String>,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_items: usize,
    pub valid_items: usize,
    pub invalid_items: usize,
    pub error_count: usize,
    pub warning_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub summary: ValidationSummary,
    pub validation_results: Vec<RecordValidation>,
    pub supported_device_types: Vec<DeviceType>,
}

/// Structural check of input records. Never fails; problems are reported per record.
pub fn validate_devices(records: &[DeviceRecord]) -> ValidationReport {
    let results: Vec<RecordValidation> = records
        .iter()
        .enumerate()
        .map(|(index, record)| validate_record(index, record))
        .collect();

    let valid_items = results.iter().filter(|r| r.valid).count();
    let summary = ValidationSummary {
        total_items: results.len(),
        valid_items,
        invalid_items: results.len() - valid_items,
        error_count: results.iter().map(|r| r.errors.len()).sum(),
        warning_count: results.iter().map(|r| r.warnings.len()).sum(),
    };
    ValidationReport {
        valid: valid_items == results.len(),
        summary,
        validation_results: results,
        supported_device_types: DeviceType::ALL.to_vec(),
    }
}

fn validate_record(index: usize, record: &DeviceRecord) -> RecordValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match record.device_type.as_deref().map(str::trim) {
        None | Some("") => errors.push("deviceType is required".to_string()),
        Some(token) if DeviceType::from_token(token).is_none() => errors.push(format!(
            "Unsupported device type: {}. Supported types: {}",
            token,
            DeviceType::supported_list()
        )),
        Some(_) => {}
    }

    if record.original_label().is_none() {
        warnings.push("label is recommended for better diagram readability".to_string());
    }
    if record.external_id().is_none() {
        warnings.push("id is missing; the record index will be used as its key".to_string());
    }
    if let Some(capacity) = &record.capacity {
        if capacity.as_i64().is_none() {
            warnings.push(format!("capacity `{}` is not numeric and counts as 0", capacity.as_string()));
        }
    }
    if let Some(critical) = &record.critical {
        if critical.as_bool().is_none() {
            warnings.push("critical should be a boolean; treating it as false".to_string());
        }
    }
    if let Some(connection) = record.connection_type.as_deref() {
        if ConnectionType::from_token(connection).is_none() {
            warnings.push(format!(
                "unknown connectionType `{}`; the device type default applies",
                connection
            ));
        }
    }

    RecordValidation {
        index,
        id: record.external_id(),
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BoolOrString, NumberOrString};

    #[test]
    fn reports_errors_and_warnings() {
        let mut good = DeviceRecord::new("smart-meter", "Main");
        good.id = Some(NumberOrString::Number(1.0));
        let mut odd = DeviceRecord::new("smart-meter", "");
        odd.capacity = Some(NumberOrString::String("lots".to_string()));
        odd.critical = Some(BoolOrString::String("maybe".to_string()));
        odd.connection_type = Some("zigbee".to_string());
        let missing = DeviceRecord::default();
        let unsupported = DeviceRecord::new("heat-pump", "HP");

        let report = validate_devices(&[good, odd, missing, unsupported]);
        assert!(!report.valid);
        assert_eq!(report.summary.valid_items, 2);
        assert_eq!(report.summary.invalid_items, 2);

        let results = &report.validation_results;
        assert!(results[0].valid && results[0].warnings.is_empty());
        assert_eq!(results[1].warnings.len(), 5);
        assert_eq!(results[2].errors, ["deviceType is required"]);
        assert!(results[3].errors[0].contains("heat-pump"));
        assert!(results[3].errors[0].contains("auth-meter"));
    }

    #[test]
    fn empty_input_is_valid() {
        let report = validate_devices(&[]);
        assert!(report.valid);
        assert_eq!(report.summary.total_items, 0);
        assert_eq!(report.supported_device_types.len(), 6);
    }
}
