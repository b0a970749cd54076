use crate::ir::{DeviceType, NodeKind};
use serde::{Deserialize, Serialize};

/// Node and group colors, one per node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    pub cloud: String,
    pub onpremise: String,
    pub smart_meter: String,
    pub general_meter: String,
    pub memory_meter: String,
    pub auth_meter: String,
    pub transformer: String,
    pub load: String,
    pub infrastructure_border: String,
    pub fallback: String,
}

impl Palette {
    pub fn standard() -> Self {
        Self {
            cloud: "#607D8B".to_string(),
            onpremise: "#795548".to_string(),
            smart_meter: "#4CAF50".to_string(),
            general_meter: "#2196F3".to_string(),
            memory_meter: "#FF9800".to_string(),
            auth_meter: "#9C27B0".to_string(),
            transformer: "#F44336".to_string(),
            load: "#E91E63".to_string(),
            infrastructure_border: "#333333".to_string(),
            fallback: "#666666".to_string(),
        }
    }

    pub fn color_for(&self, kind: NodeKind) -> &str {
        match kind {
            NodeKind::Cloud => &self.cloud,
            NodeKind::OnPremise => &self.onpremise,
            NodeKind::Device(ty) => self.device_color(ty),
        }
    }

    pub fn device_color(&self, device_type: DeviceType) -> &str {
        let color = match device_type {
            DeviceType::SmartMeter => &self.smart_meter,
            DeviceType::GeneralMeter => &self.general_meter,
            DeviceType::MemoryMeter => &self.memory_meter,
            DeviceType::AuthMeter => &self.auth_meter,
            DeviceType::Transformer => &self.transformer,
            DeviceType::Load => &self.load,
        };
        if color.trim().is_empty() {
            &self.fallback
        } else {
            color
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::standard()
    }
}
