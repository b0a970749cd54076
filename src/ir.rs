use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Device kinds accepted from the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    SmartMeter,
    GeneralMeter,
    MemoryMeter,
    AuthMeter,
    Transformer,
    Load,
}

impl DeviceType {
    pub const ALL: [DeviceType; 6] = [
        DeviceType::SmartMeter,
        DeviceType::GeneralMeter,
        DeviceType::MemoryMeter,
        DeviceType::AuthMeter,
        DeviceType::Transformer,
        DeviceType::Load,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "smart-meter" => Some(Self::SmartMeter),
            "general-meter" => Some(Self::GeneralMeter),
            "memory-meter" => Some(Self::MemoryMeter),
            "auth-meter" => Some(Self::AuthMeter),
            "transformer" => Some(Self::Transformer),
            "load" => Some(Self::Load),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SmartMeter => "smart-meter",
            Self::GeneralMeter => "general-meter",
            Self::MemoryMeter => "memory-meter",
            Self::AuthMeter => "auth-meter",
            Self::Transformer => "transformer",
            Self::Load => "load",
        }
    }

    pub fn is_meter(self) -> bool {
        self.as_str().contains("meter")
    }

    /// Connection type a record gets when it declares none.
    pub fn default_connection_type(self) -> ConnectionType {
        match self {
            Self::SmartMeter => ConnectionType::Wireless,
            Self::AuthMeter | Self::Transformer | Self::Load => ConnectionType::Ethernet,
            Self::GeneralMeter | Self::MemoryMeter => ConnectionType::Rs485,
        }
    }

    /// Logical keys a device of this type links to when no rule says otherwise.
    pub fn default_targets(self) -> &'static [&'static str] {
        match self {
            Self::SmartMeter => &[CLOUD_KEY, ONPREMISE_KEY],
            Self::GeneralMeter | Self::MemoryMeter | Self::AuthMeter => &[ONPREMISE_KEY],
            Self::Transformer | Self::Load => &[],
        }
    }

    /// Logical key under which the first device of this type can be named
    /// as a link target by rules.
    pub fn link_key(self) -> Option<&'static str> {
        match self {
            Self::Transformer => Some(TRANSFORMER_KEY),
            Self::Load => Some(LOAD_KEY),
            _ => None,
        }
    }

    /// "smart-meter" -> "Smart Meter"
    pub fn display_name(self) -> String {
        self.as_str()
            .split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|ty| ty.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const CLOUD_KEY: &str = "cloud";
pub const ONPREMISE_KEY: &str = "onpremise";
pub const TRANSFORMER_KEY: &str = "transformer";
pub const LOAD_KEY: &str = "load";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub enum NodeKind {
    Cloud,
    OnPremise,
    Device(DeviceType),
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cloud => CLOUD_KEY,
            Self::OnPremise => ONPREMISE_KEY,
            Self::Device(ty) => ty.as_str(),
        }
    }

    pub fn device_type(self) -> Option<DeviceType> {
        match self {
            Self::Device(ty) => Some(ty),
            _ => None,
        }
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static link type table, keyed by source kind and target kind.
pub fn default_link_type(source: NodeKind, target: NodeKind) -> Option<ConnectionType> {
    use ConnectionType::*;
    use DeviceType::*;
    match (source, target) {
        (NodeKind::Device(SmartMeter), NodeKind::Cloud) => Some(Wireless),
        (NodeKind::Device(SmartMeter), NodeKind::OnPremise) => Some(Ethernet),
        (NodeKind::Device(SmartMeter), NodeKind::Device(Transformer)) => Some(Ethernet),
        (NodeKind::Device(GeneralMeter | MemoryMeter), NodeKind::OnPremise) => Some(Rs485),
        (NodeKind::Device(GeneralMeter | MemoryMeter), NodeKind::Device(Transformer)) => {
            Some(Rs485)
        }
        (NodeKind::Device(AuthMeter), NodeKind::OnPremise) => Some(Ethernet),
        (NodeKind::Device(AuthMeter), NodeKind::Device(Transformer)) => Some(Ethernet),
        (NodeKind::Device(Transformer), NodeKind::Device(Load)) => Some(Ethernet),
        (NodeKind::OnPremise, NodeKind::Cloud) => Some(Wireless),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Wireless,
    Ethernet,
    Rs485,
}

impl ConnectionType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "wireless" => Some(Self::Wireless),
            "ethernet" => Some(Self::Ethernet),
            "rs485" => Some(Self::Rs485),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wireless => "wireless",
            Self::Ethernet => "ethernet",
            Self::Rs485 => "rs485",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Top,
    Bottom,
    Left,
    Right,
    Center,
}

impl Anchor {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "center" => Some(Self::Center),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
            Self::Center => "center",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative grid coordinates, not pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrString::Number(val) if val.is_finite() => Some(val.trunc() as i64),
            NumberOrString::Number(_) => None,
            NumberOrString::String(val) => {
                let trimmed = val.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
            }
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrString::Number(val) => Some(*val),
            NumberOrString::String(val) => val.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            NumberOrString::Number(val) => format!("{}", val),
            NumberOrString::String(val) => val.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoolOrString {
    Bool(bool),
    String(String),
}

impl BoolOrString {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BoolOrString::Bool(val) => Some(*val),
            BoolOrString::String(val) => match val.trim() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

/// One monitoring device as stored by the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<NumberOrString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel: Option<String>,
    #[serde(default, alias = "monitoringDeviceType", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<NumberOrString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<BoolOrString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DeviceRecord {
    pub fn new(device_type: &str, label: &str) -> Self {
        Self {
            device_type: Some(device_type.to_string()),
            label: Some(label.to_string()),
            ..Default::default()
        }
    }

    pub fn external_id(&self) -> Option<String> {
        self.id
            .as_ref()
            .map(|id| id.as_string())
            .filter(|id| !id.trim().is_empty())
    }

    pub fn parsed_type(&self) -> Option<DeviceType> {
        self.device_type.as_deref().and_then(DeviceType::from_token)
    }

    /// `label`, falling back to `name`; blank and "undefined" values count as missing.
    pub fn original_label(&self) -> Option<&str> {
        [self.label.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty() && *value != "undefined")
    }

    pub fn capacity_value(&self) -> Option<i64> {
        self.capacity.as_ref().map(|cap| cap.as_i64().unwrap_or(0))
    }

    pub fn is_critical(&self) -> bool {
        self.critical
            .as_ref()
            .and_then(BoolOrString::as_bool)
            .unwrap_or(false)
    }
}

/// Fields no rule may change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIdentity {
    pub id: String,
    pub key: String,
    pub kind: NodeKind,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
}

/// Everything a rule patch may rewrite.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAttributes {
    pub position: Position,
    pub capacity: Option<i64>,
    pub critical: bool,
    pub priority: String,
    pub panel: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub connection: Option<String>,
    pub location: Option<String>,
    pub connection_type: ConnectionType,
    /// Set only when a rule chose the connection type.
    pub connection_override: Option<ConnectionType>,
    pub required_connections: Option<Vec<String>>,
    pub preferred_connection: Option<String>,
    pub backup_connection: Option<ConnectionType>,
    pub requires_backup: bool,
    pub requires_ethernet: bool,
    pub force_wired_to_onpremise: bool,
    pub block_direct_cloud: bool,
    pub wirelessly_connected: bool,
    pub special_area: Option<String>,
    pub style: NodeStyle,
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl NodeAttributes {
    pub fn new(position: Position, connection_type: ConnectionType) -> Self {
        Self {
            position,
            capacity: None,
            critical: false,
            priority: "normal".to_string(),
            panel: None,
            description: None,
            status: None,
            connection: None,
            location: None,
            connection_type,
            connection_override: None,
            required_connections: None,
            preferred_connection: None,
            backup_connection: None,
            requires_backup: false,
            requires_ethernet: false,
            force_wired_to_onpremise: false,
            block_direct_cloud: false,
            wirelessly_connected: false,
            special_area: None,
            style: NodeStyle::default(),
            extras: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramNode {
    pub identity: NodeIdentity,
    pub attrs: NodeAttributes,
}

impl DiagramNode {
    pub fn infrastructure(kind: NodeKind, id: &str, position: Position) -> Self {
        let connection_type = match kind {
            NodeKind::Cloud => ConnectionType::Wireless,
            _ => ConnectionType::Ethernet,
        };
        Self {
            identity: NodeIdentity {
                id: id.to_string(),
                key: kind.as_str().to_string(),
                kind,
                label: None,
            },
            attrs: NodeAttributes::new(position, connection_type),
        }
    }

    /// Normalizes a supported record into a device node.
    pub fn from_record(
        record: &DeviceRecord,
        device_type: DeviceType,
        id: String,
        key: String,
        position: Position,
    ) -> Self {
        let connection_type = record
            .connection_type
            .as_deref()
            .and_then(ConnectionType::from_token)
            .unwrap_or_else(|| device_type.default_connection_type());
        let mut attrs = NodeAttributes::new(position, connection_type);
        attrs.capacity = record.capacity_value();
        attrs.critical = record.is_critical();
        if let Some(priority) = record.priority.as_deref().filter(|p| !p.trim().is_empty()) {
            attrs.priority = priority.to_string();
        }
        attrs.panel = non_empty(&record.panel);
        attrs.description = non_empty(&record.description);
        attrs.status = non_empty(&record.status);
        attrs.connection = non_empty(&record.connection);
        attrs.location = non_empty(&record.location);
        Self {
            identity: NodeIdentity {
                id,
                key,
                kind: NodeKind::Device(device_type),
                label: record.original_label().map(str::to_string),
            },
            attrs,
        }
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn kind(&self) -> NodeKind {
        self.identity.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.identity.kind.as_str()
    }

    pub fn device_type(&self) -> Option<DeviceType> {
        self.identity.kind.device_type()
    }

    pub fn position(&self) -> Position {
        self.attrs.position
    }

    /// Capacity with the "absent means 0" coercion applied.
    pub fn capacity(&self) -> i64 {
        self.attrs.capacity.unwrap_or(0)
    }

    pub fn is_meter(&self) -> bool {
        self.device_type().is_some_and(DeviceType::is_meter)
    }

    /// Label to draw: the original label, or the type name in title case.
    pub fn display_label(&self) -> String {
        match &self.identity.label {
            Some(label) => label.clone(),
            None => match self.device_type() {
                Some(ty) => ty.display_name(),
                None => self.type_name().to_string(),
            },
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_tokens() {
        assert_eq!(DeviceType::from_token("smart-meter"), Some(DeviceType::SmartMeter));
        assert_eq!(DeviceType::from_token(" load "), Some(DeviceType::Load));
        assert_eq!(DeviceType::from_token("toaster"), None);
        assert_eq!(DeviceType::SmartMeter.display_name(), "Smart Meter");
        assert_eq!(DeviceType::AuthMeter.display_name(), "Auth Meter");
    }

    #[test]
    fn record_accepts_legacy_field_names() {
        let json = r#"{"_id": 7, "label": "Main", "monitoringDeviceType": "smart-meter",
            "capacity": "3000", "critical": "true"}"#;
        let record: DeviceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.external_id().as_deref(), Some("7"));
        assert_eq!(record.parsed_type(), Some(DeviceType::SmartMeter));
        assert_eq!(record.capacity_value(), Some(3000));
        assert!(record.is_critical());
    }

    #[test]
    fn coerces_capacity_and_critical() {
        let mut record = DeviceRecord::new("general-meter", "G");
        record.capacity = Some(NumberOrString::String("abc".to_string()));
        record.critical = Some(BoolOrString::String("yes".to_string()));
        assert_eq!(record.capacity_value(), Some(0));
        assert!(!record.is_critical());
        record.capacity = Some(NumberOrString::Number(2600.9));
        assert_eq!(record.capacity_value(), Some(2600));
    }

    #[test]
    fn label_falls_back_to_name_then_type() {
        let mut record = DeviceRecord::new("memory-meter", "  ");
        record.name = Some("Logger".to_string());
        assert_eq!(record.original_label(), Some("Logger"));
        record.name = Some("undefined".to_string());
        assert_eq!(record.original_label(), None);

        let node = DiagramNode::from_record(
            &record,
            DeviceType::MemoryMeter,
            "memory-meter-1".to_string(),
            "meter-0".to_string(),
            Position::new(0.0, 16.0),
        );
        assert_eq!(node.display_label(), "Memory Meter");
    }

    #[test]
    fn normalization_defaults() {
        let mut record = DeviceRecord::new("smart-meter", "S");
        record.connection_type = Some("bogus".to_string());
        let node = DiagramNode::from_record(
            &record,
            DeviceType::SmartMeter,
            "smart-meter-1".to_string(),
            "meter-0".to_string(),
            Position::default(),
        );
        assert_eq!(node.attrs.priority, "normal");
        assert_eq!(node.attrs.connection_type, ConnectionType::Wireless);
        assert_eq!(node.attrs.connection_override, None);
        assert_eq!(node.capacity(), 0);
    }

    #[test]
    fn link_table_lookups() {
        let smart = NodeKind::Device(DeviceType::SmartMeter);
        assert_eq!(default_link_type(smart, NodeKind::Cloud), Some(ConnectionType::Wireless));
        assert_eq!(
            default_link_type(NodeKind::Device(DeviceType::GeneralMeter), NodeKind::OnPremise),
            Some(ConnectionType::Rs485)
        );
        assert_eq!(default_link_type(NodeKind::Device(DeviceType::Load), NodeKind::Cloud), None);
    }
}
