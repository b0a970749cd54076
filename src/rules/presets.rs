//! Opinionated rule packs and rule templates.
//!
//! Nothing here is registered by default. Callers pick rules one by one, or
//! register a whole [`RulePreset`] through [`RuleEngine::apply_preset`].

use super::*;
use crate::ir::{DeviceType, NodeKind, CLOUD_KEY, ONPREMISE_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RulePreset {
    /// Every rule in this module.
    Custom,
    Industrial,
    Commercial,
    CriticalFocus,
}

impl RulePreset {
    pub const ALL: [RulePreset; 4] = [
        RulePreset::Custom,
        RulePreset::Industrial,
        RulePreset::Commercial,
        RulePreset::CriticalFocus,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "custom" | "all" => Some(Self::Custom),
            "industrial" => Some(Self::Industrial),
            "commercial" => Some(Self::Commercial),
            "criticalFocus" | "critical-focus" => Some(Self::CriticalFocus),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Industrial => "industrial",
            Self::Commercial => "commercial",
            Self::CriticalFocus => "criticalFocus",
        }
    }

    pub fn rules(self) -> Vec<(RuleCategory, AnyRule)> {
        use RuleCategory as C;
        match self {
            Self::Custom => vec![
                (C::Position, always_wireless_on_top().into()),
                (C::Position, high_capacity_special_positioning().into()),
                (C::Position, critical_devices_center().into()),
                (C::Position, panel_based_grouping().into()),
                (C::Connection, smart_meter_onpremise_wire().into()),
                (C::Connection, onpremise_cloud_wireless().into()),
                (C::Connection, use_ethernet_for_large_capacity().into()),
                (C::Connection, wireless_backup_for_critical().into()),
                (C::Connection, smart_meter_priority_routing().into()),
                (C::Connection, location_based_routing().into()),
                (C::Connection, no_smart_meter_cloud_direct().into()),
                (C::Anchor, top_to_bottom_anchoring().into()),
                (C::Styling, capacity_based_visual_coding().into()),
                (C::Styling, connection_type_indicators().into()),
                (C::Styling, status_with_animation().into()),
                (C::Layout, wireless_devices_top_cluster().into()),
                (C::Layout, capacity_based_zones().into()),
                (C::Layout, critical_device_highlighting_layout().into()),
            ],
            Self::Industrial => vec![
                (C::Position, always_wireless_on_top().into()),
                (C::Position, high_capacity_special_positioning().into()),
                (C::Connection, use_ethernet_for_large_capacity().into()),
                (C::Connection, wireless_backup_for_critical().into()),
            ],
            Self::Commercial => vec![
                (C::Styling, capacity_based_visual_coding().into()),
                (C::Styling, status_with_animation().into()),
                (C::Layout, wireless_devices_top_cluster().into()),
            ],
            Self::CriticalFocus => vec![
                (C::Position, critical_devices_center().into()),
                (C::Connection, wireless_backup_for_critical().into()),
                (C::Layout, critical_device_highlighting_layout().into()),
            ],
        }
    }
}

fn is_smart_meter(node: &DiagramNode) -> bool {
    node.device_type() == Some(DeviceType::SmartMeter)
}

fn is_wireless(node: &DiagramNode) -> bool {
    node.attrs.connection_type == ConnectionType::Wireless || node.attrs.wirelessly_connected
}

// Position

pub fn always_wireless_on_top() -> NodeRule {
    NodeRule::new(
        "always-wireless-on-top",
        "Always place wireless devices and connections at the top level",
        100,
        |node, _| {
            node.attrs.connection_type == ConnectionType::Wireless
                || node.kind() == NodeKind::Cloud
                || node
                    .attrs
                    .connection
                    .as_deref()
                    .is_some_and(|c| c.contains("wireless"))
        },
        |node, ctx| {
            NodePatch {
                position: Some(Position::new(node.position().x, ctx.levels.top)),
                wirelessly_connected: Some(true),
                ..Default::default()
            }
            .extra("level", 0)
        },
    )
}

pub fn high_capacity_special_positioning() -> NodeRule {
    NodeRule::new(
        "high-capacity-special-positioning",
        "Position high-capacity devices (>2500) in a dedicated area",
        95,
        |node, _| node.capacity() > 2500,
        |node, ctx| NodePatch {
            position: Some(Position::new(
                ctx.grid.start_x + ctx.grid.cell_width * 6.0,
                node.position().y,
            )),
            special_area: Some("high-capacity".to_string()),
            requires_ethernet: Some(true),
            ..Default::default()
        },
    )
}

pub fn critical_devices_center() -> NodeRule {
    NodeRule::new(
        "critical-devices-center",
        "Place critical devices in the center for visibility",
        90,
        |node, _| node.attrs.critical,
        |node, ctx| {
            let center = ctx.grid.start_x + ctx.total_devices as f64 * ctx.grid.cell_width / 2.0;
            NodePatch {
                position: Some(Position::new(center, node.position().y)),
                ..Default::default()
            }
            .extra("placement", "center")
            .extra("visibility", "high")
        },
    )
}

pub fn panel_based_grouping() -> NodeRule {
    NodeRule::new(
        "panel-based-grouping",
        "Group devices by electrical panel with spacing",
        70,
        |node, _| node.attrs.panel.is_some(),
        |node, ctx| {
            let offset = node
                .attrs
                .panel
                .as_deref()
                .map(|panel| ctx.panel_offset(panel))
                .unwrap_or(0.0);
            let position = node.position();
            NodePatch {
                position: Some(Position::new(position.x + offset, position.y)),
                ..Default::default()
            }
            .extra("groupedBy", "panel")
        },
    )
}

// Connection

pub fn smart_meter_onpremise_wire() -> NodeRule {
    NodeRule::new(
        "smart-meter-onpremise-wire",
        "All smart meters must connect to on-premise using wire (ethernet)",
        100,
        |node, _| is_smart_meter(node),
        |_, _| NodePatch {
            connection_type: Some(ConnectionType::Ethernet),
            preferred_connection: Some(ONPREMISE_KEY.to_string()),
            force_wired_to_onpremise: Some(true),
            ..Default::default()
        },
    )
}

pub fn onpremise_cloud_wireless() -> NodeRule {
    NodeRule::new(
        "onpremise-cloud-wireless",
        "On-premise connects to cloud with wireless",
        99,
        |node, _| node.kind() == NodeKind::OnPremise,
        |_, _| {
            NodePatch {
                connection_type: Some(ConnectionType::Wireless),
                preferred_connection: Some(CLOUD_KEY.to_string()),
                ..Default::default()
            }
            .extra("forceWirelessToCloud", true)
        },
    )
}

pub fn use_ethernet_for_large_capacity() -> NodeRule {
    NodeRule::new(
        "use-ethernet-for-large-capacity",
        "Use ethernet connection for devices with capacity > 2500",
        95,
        |node, _| node.capacity() > 2500,
        |_, _| {
            NodePatch {
                connection_type: Some(ConnectionType::Ethernet),
                preferred_connection: Some(ONPREMISE_KEY.to_string()),
                ..Default::default()
            }
            .extra("bandwidthPriority", "high")
        },
    )
}

pub fn wireless_backup_for_critical() -> NodeRule {
    NodeRule::new(
        "wireless-backup-for-critical",
        "Add wireless backup for critical ethernet devices",
        90,
        |node, _| node.attrs.critical && node.attrs.connection_type == ConnectionType::Ethernet,
        |_, _| {
            NodePatch {
                backup_connection: Some(ConnectionType::Wireless),
                ..Default::default()
            }
            .extra("redundancy", true)
        },
    )
}

pub fn smart_meter_priority_routing() -> NodeRule {
    NodeRule::new(
        "smart-meter-priority-routing",
        "Smart meters get priority routing through cloud",
        85,
        |node, _| is_smart_meter(node),
        |_, _| {
            NodePatch {
                required_connections: Some(vec![CLOUD_KEY.to_string(), ONPREMISE_KEY.to_string()]),
                ..Default::default()
            }
            .extra("connectionPriority", "high")
        },
    )
}

pub fn location_based_routing() -> NodeRule {
    NodeRule::new(
        "location-based-routing",
        "Route devices based on physical location proximity",
        65,
        |node, _| node.attrs.location.is_some(),
        |node, _| {
            // "remote" names no node, so it only ever yields a skipped link
            let target = match node.attrs.location.as_deref() {
                Some("building-a") => ONPREMISE_KEY,
                Some("building-b") => CLOUD_KEY,
                Some("remote") => "wireless",
                _ => ONPREMISE_KEY,
            };
            NodePatch {
                preferred_connection: Some(target.to_string()),
                ..Default::default()
            }
            .extra("locationAware", true)
        },
    )
}

pub fn no_smart_meter_cloud_direct() -> NodeRule {
    NodeRule::new(
        "no-smart-meter-cloud-direct",
        "Prevent smart meters from connecting directly to cloud - force through onpremise",
        98,
        |node, _| is_smart_meter(node),
        |_, _| NodePatch {
            connection_type: Some(ConnectionType::Ethernet),
            preferred_connection: Some(ONPREMISE_KEY.to_string()),
            required_connections: Some(vec![ONPREMISE_KEY.to_string()]),
            block_direct_cloud: Some(true),
            force_wired_to_onpremise: Some(true),
            ..Default::default()
        },
    )
}

// Anchor

pub fn top_to_bottom_anchoring() -> AnchorRule {
    AnchorRule::new(
        "top-to-bottom-anchoring",
        "Higher nodes anchor at their bottom, lower nodes at their top",
        90,
        |_, _, _| true,
        |source, target, _| anchor::by_height(source.position(), target.position()),
    )
}

// Styling

pub fn capacity_based_visual_coding() -> NodeRule {
    NodeRule::new(
        "capacity-based-visual-coding",
        "Visual coding based on device capacity",
        80,
        |node, _| node.capacity() != 0,
        |node, _| {
            let (size, color, border_width, shape, icon) = match node.capacity() {
                c if c > 5000 => ("extra-large", "#D32F2F", 4, "diamond", "high-voltage"),
                c if c > 2500 => ("large", "#FF5722", 3, "rectangle", "electrical"),
                _ => ("medium", "#4CAF50", 2, "circle", "meter"),
            };
            NodePatch {
                size: Some(size.to_string()),
                color: Some(color.to_string()),
                border_width: Some(border_width),
                shape: Some(shape.to_string()),
                ..Default::default()
            }
            .extra("icon", icon)
        },
    )
}

pub fn connection_type_indicators() -> NodeRule {
    NodeRule::new(
        "connection-type-indicators",
        "Visual indicators for connection types",
        75,
        |_, _| true,
        |node, _| {
            let (border, icon, badge) = match node.attrs.connection_type {
                ConnectionType::Wireless => ("dashed", "wifi", "#2196F3"),
                ConnectionType::Ethernet => ("solid", "ethernet", "#4CAF50"),
                ConnectionType::Rs485 => ("dotted", "serial", "#FF9800"),
            };
            NodePatch {
                border_style: Some(border.to_string()),
                ..Default::default()
            }
            .extra("connectionIcon", icon)
            .extra("badgeColor", badge)
        },
    )
}

pub fn status_with_animation() -> NodeRule {
    NodeRule::new(
        "status-with-animation",
        "Animated status indicators",
        70,
        |node, _| node.attrs.status.is_some(),
        |node, _| {
            let (animation, indicator) = match node.attrs.status.as_deref() {
                Some("active") => ("pulse-green", "active-dot"),
                Some("warning") => ("blink-orange", "warning-triangle"),
                Some("error") => ("flash-red", "error-x"),
                Some("maintenance") => ("rotate-blue", "maintenance-gear"),
                _ => return NodePatch::default(),
            };
            NodePatch {
                animation: Some(animation.to_string()),
                ..Default::default()
            }
            .extra("indicator", indicator)
        },
    )
}

// Layout

pub fn wireless_devices_top_cluster() -> LayoutRule {
    LayoutRule::new(
        "wireless-devices-top-cluster",
        "Cluster all wireless devices at the top of the diagram",
        85,
        |nodes, _| nodes.iter().any(is_wireless),
        |nodes, _| {
            let (wireless, wired): (Vec<&DiagramNode>, Vec<&DiagramNode>) =
                nodes.iter().partition(|n| is_wireless(n));
            LayoutPlan {
                clusters: vec![
                    NodeCluster::new("wireless", wireless).with_layout("horizontal"),
                    NodeCluster::new("wired", wired).with_layout("grid"),
                ],
                ..Default::default()
            }
        },
    )
}

pub fn capacity_based_zones() -> LayoutRule {
    LayoutRule::new(
        "capacity-based-zones",
        "Create zones based on device capacity levels",
        75,
        |nodes, _| nodes.iter().any(|n| n.capacity() > 2500),
        |nodes, _| {
            let (high, normal): (Vec<&DiagramNode>, Vec<&DiagramNode>) =
                nodes.iter().partition(|n| n.capacity() > 2500);
            LayoutPlan {
                zones: vec![
                    NodeCluster::new("high-capacity", high).with_style("background-color", "#FFEBEE"),
                    NodeCluster::new("normal-capacity", normal)
                        .with_style("background-color", "#E8F5E8"),
                ],
                ..Default::default()
            }
        },
    )
}

pub fn critical_device_highlighting_layout() -> LayoutRule {
    LayoutRule::new(
        "critical-device-highlighting-layout",
        "Special layout highlighting for critical devices",
        80,
        |nodes, _| nodes.iter().any(|n| n.attrs.critical),
        |nodes, _| LayoutPlan {
            sections: vec![
                NodeCluster::new("critical-devices", nodes.iter().filter(|n| n.attrs.critical))
                    .with_style("background-color", "#FFF3E0")
                    .with_style("border-color", "#FF5722")
                    .with_style("label", "CRITICAL DEVICES"),
            ],
            ..Default::default()
        },
    )
}

// Templates

/// `capacity-rule-<threshold>`: switch devices above `threshold` to `connection_type`.
pub fn capacity_rule(threshold: i64, connection_type: ConnectionType, priority: i32) -> NodeRule {
    NodeRule::new(
        format!("capacity-rule-{}", threshold),
        format!("Use {} for devices with capacity > {}", connection_type, threshold),
        priority,
        move |node, _| node.capacity() > threshold,
        move |_, _| NodePatch {
            connection_type: Some(connection_type),
            ..Default::default()
        },
    )
}

pub fn location_rule(location: &str, patch: NodePatch, priority: i32) -> NodeRule {
    let wanted = location.to_string();
    NodeRule::new(
        format!("location-rule-{}", location),
        format!("Special styling for devices in {}", location),
        priority,
        move |node, _| node.attrs.location.as_deref() == Some(wanted.as_str()),
        move |_, _| patch.clone(),
    )
}

pub fn device_type_rule(device_type: DeviceType, patch: NodePatch, priority: i32) -> NodeRule {
    NodeRule::new(
        format!("device-type-rule-{}", device_type),
        format!("Specific rules for {} devices", device_type),
        priority,
        move |node, _| node.device_type() == Some(device_type),
        move |_, _| patch.clone(),
    )
}
