use crate::generator::ProjectInfo;
use crate::ir::{DeviceRecord, NumberOrString};
use anyhow::{anyhow, Result};
use serde_json::Value;

/// Device records plus the project they belong to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInput {
    pub devices: Vec<DeviceRecord>,
    pub project: ProjectInfo,
}

/// Accepts a bare array of records, or an object holding
/// `energyMonitoringData` (or `devices`) and an optional `projectData`.
///
/// Elements that do not deserialize become empty records, which generation
/// later skips as unsupported.
pub fn parse_devices(text: &str) -> Result<DeviceInput> {
    let document: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(strict) => json5::from_str(text).map_err(|_| anyhow!("invalid device input: {}", strict))?,
    };

    let (items, project) = match document {
        Value::Array(items) => (items, ProjectInfo::default()),
        Value::Object(mut map) => {
            let items = match map
                .remove("energyMonitoringData")
                .or_else(|| map.remove("devices"))
            {
                Some(Value::Array(items)) => items,
                Some(_) => return Err(anyhow!("energyMonitoringData must be an array")),
                None => return Err(anyhow!("input has no energyMonitoringData or devices array")),
            };
            let project = map
                .remove("projectData")
                .map(project_info)
                .unwrap_or_default();
            (items, project)
        }
        _ => return Err(anyhow!("device input must be an array or an object")),
    };

    let devices = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<DeviceRecord>(item).unwrap_or_else(|err| {
                log::warn!("device record {} is malformed: {}", index, err);
                DeviceRecord::default()
            })
        })
        .collect();

    Ok(DeviceInput { devices, project })
}

fn project_info(value: Value) -> ProjectInfo {
    let text = |key: &str| {
        value
            .get(key)
            .cloned()
            .and_then(|v| serde_json::from_value::<NumberOrString>(v).ok())
            .map(|v| v.as_string())
            .filter(|s| !s.trim().is_empty())
    };
    ProjectInfo {
        project_id: text("projectId"),
        project_name: text("projectName"),
    }
}

/// Three devices on three panels, for demos and smoke tests.
pub fn sample_devices() -> Vec<DeviceRecord> {
    let entry = |id: &str, label: &str, panel: &str, device_type: &str, description: &str, connection: &str| {
        DeviceRecord {
            id: Some(NumberOrString::String(id.to_string())),
            panel: Some(panel.to_string()),
            description: Some(description.to_string()),
            connection: Some(connection.to_string()),
            status: Some("active".to_string()),
            ..DeviceRecord::new(device_type, label)
        }
    };
    vec![
        entry(
            "1",
            "Main Smart Meter",
            "Panel A",
            "smart-meter",
            "Primary energy monitoring device",
            "wireless",
        ),
        entry(
            "2",
            "Secondary General Meter",
            "Panel B",
            "general-meter",
            "Secondary monitoring point",
            "rs485",
        ),
        entry(
            "3",
            "Memory Meter Unit",
            "Panel C",
            "memory-meter",
            "Data logging meter",
            "rs485",
        ),
    ]
}
