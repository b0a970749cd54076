use super::*;
use crate::ir::{DeviceType, NodeKind, ONPREMISE_KEY, CLOUD_KEY};
use once_cell::sync::Lazy;

/// Rules every engine starts with. They cannot be unregistered.
pub(super) struct BuiltinRules {
    pub(super) position: Vec<NodeRule>,
    pub(super) connection: Vec<NodeRule>,
    pub(super) styling: Vec<NodeRule>,
    pub(super) layout: Vec<LayoutRule>,
    pub(super) anchor: Vec<AnchorRule>,
}

impl BuiltinRules {
    pub(super) fn node(&self, category: RuleCategory) -> &[NodeRule] {
        match category {
            RuleCategory::Position => &self.position,
            RuleCategory::Connection => &self.connection,
            RuleCategory::Styling => &self.styling,
            RuleCategory::Layout | RuleCategory::Anchor => &[],
        }
    }

    pub(super) fn infos(&self, category: RuleCategory) -> Vec<RuleInfo> {
        match category {
            RuleCategory::Layout => self.layout.iter().map(|r| r.info().clone()).collect(),
            RuleCategory::Anchor => self.anchor.iter().map(|r| r.info().clone()).collect(),
            other => self.node(other).iter().map(|r| r.info().clone()).collect(),
        }
    }

    pub(super) fn contains(&self, category: RuleCategory, name: &str) -> bool {
        self.infos(category).iter().any(|info| info.name == name)
    }
}

pub(super) static BUILTIN: Lazy<BuiltinRules> = Lazy::new(|| BuiltinRules {
    position: sorted(vec![
        NodeRule::new(
            "wireless-on-top",
            "Place wireless connections at the top level",
            100,
            |node, _| {
                node.attrs.connection_type == ConnectionType::Wireless
                    || node.kind() == NodeKind::Cloud
            },
            |node, ctx| NodePatch {
                position: Some(Position::new(node.position().x, ctx.levels.top)),
                ..Default::default()
            },
        ),
        NodeRule::new(
            "infrastructure-hierarchy",
            "Maintain infrastructure hierarchy (cloud > onpremise > devices)",
            95,
            |node, _| node.kind() == NodeKind::OnPremise,
            |node, ctx| NodePatch {
                position: Some(Position::new(node.position().x, ctx.levels.middle)),
                ..Default::default()
            },
        ),
        NodeRule::new(
            "meters-bottom-level",
            "Place meter devices at the bottom level",
            90,
            |node, _| node.is_meter(),
            |node, ctx| NodePatch {
                position: Some(Position::new(node.position().x, ctx.levels.bottom)),
                ..Default::default()
            },
        ),
    ]),
    connection: sorted(vec![
        NodeRule::new(
            "high-capacity-ethernet",
            "Use ethernet for devices with capacity > 2500",
            85,
            |node, _| node.capacity() > 2500,
            |_, _| NodePatch {
                connection_type: Some(ConnectionType::Ethernet),
                preferred_connection: Some(ONPREMISE_KEY.to_string()),
                ..Default::default()
            },
        ),
        NodeRule::new(
            "smart-meter-dual-connection",
            "Smart meters connect to both cloud and onpremise",
            90,
            |node, _| node.device_type() == Some(DeviceType::SmartMeter),
            |_, _| {
                NodePatch {
                    required_connections: Some(vec![
                        CLOUD_KEY.to_string(),
                        ONPREMISE_KEY.to_string(),
                    ]),
                    ..Default::default()
                }
                .extra("primaryConnection", CLOUD_KEY)
            },
        ),
        NodeRule::new(
            "critical-device-redundancy",
            "Critical devices get redundant connections",
            95,
            |node, _| node.attrs.critical,
            |_, _| NodePatch {
                requires_backup: Some(true),
                connection_type: Some(ConnectionType::Ethernet),
                ..Default::default()
            },
        ),
    ]),
    styling: sorted(vec![
        NodeRule::new(
            "status-based-coloring",
            "Color nodes based on their operational status",
            80,
            |node, _| node.attrs.status.is_some(),
            |node, _| {
                let color = match node.attrs.status.as_deref() {
                    Some("active") => "#4CAF50",
                    Some("warning") => "#FF9800",
                    Some("error") => "#F44336",
                    Some("inactive") => "#9E9E9E",
                    Some("maintenance") => "#2196F3",
                    _ => "#666666",
                };
                NodePatch {
                    color: Some(color.to_string()),
                    ..Default::default()
                }
                .extra("statusIndicator", true)
            },
        ),
        NodeRule::new(
            "capacity-based-sizing",
            "Size nodes based on their capacity",
            75,
            |node, _| node.capacity() != 0,
            |node, _| {
                let (size, border_width) = match node.capacity() {
                    c if c > 5000 => ("large", 3),
                    c if c > 2500 => ("medium", 2),
                    _ => ("small", 1),
                };
                NodePatch {
                    size: Some(size.to_string()),
                    border_width: Some(border_width),
                    ..Default::default()
                }
                .extra("capacityClass", size)
            },
        ),
        NodeRule::new(
            "priority-highlighting",
            "Highlight high-priority devices",
            85,
            |node, _| node.attrs.priority == "high",
            |_, _| {
                NodePatch {
                    border_color: Some("#FF5722".to_string()),
                    border_width: Some(3),
                    ..Default::default()
                }
                .extra("glow", true)
            },
        ),
    ]),
    layout: sorted(vec![
        LayoutRule::new(
            "panel-grouping",
            "Group devices by their electrical panel",
            70,
            |nodes, _| nodes.iter().any(|n| n.attrs.panel.is_some()),
            |nodes, _| LayoutPlan {
                groups: group_by(nodes, |n| n.attrs.panel.as_deref()),
                ..Default::default()
            },
        ),
        LayoutRule::new(
            "location-separation",
            "Separate devices by physical location",
            65,
            |nodes, _| nodes.iter().any(|n| n.attrs.location.is_some()),
            |nodes, _| LayoutPlan {
                groups: group_by(nodes, |n| n.attrs.location.as_deref()),
                ..Default::default()
            },
        ),
        LayoutRule::new(
            "critical-device-isolation",
            "Isolate critical devices in separate area",
            80,
            |nodes, _| nodes.iter().any(|n| n.attrs.critical),
            |nodes, _| {
                let (critical, normal): (Vec<&DiagramNode>, Vec<&DiagramNode>) =
                    nodes.iter().partition(|n| n.attrs.critical);
                LayoutPlan {
                    groups: vec![
                        NodeCluster::new("critical-devices", critical),
                        NodeCluster::new("normal-devices", normal),
                    ],
                    ..Default::default()
                }
            },
        ),
    ]),
    anchor: vec![AnchorRule::new(
        "hierarchical-anchoring",
        "Set anchor points based on node hierarchy and position",
        50,
        |_, _, _| true,
        |source, target, _| anchor::by_height(source.position(), target.position()),
    )],
});

fn sorted<R: Prioritized>(mut rules: Vec<R>) -> Vec<R> {
    rules.sort_by(|a, b| b.info().priority.cmp(&a.info().priority));
    rules
}

/// Groups nodes by a string attribute, in first-seen order. Nodes without the
/// attribute land in `default`.
pub(super) fn group_by<'a, F>(nodes: &'a [DiagramNode], key: F) -> Vec<NodeCluster>
where
    F: Fn(&'a DiagramNode) -> Option<&'a str>,
{
    let mut clusters: Vec<NodeCluster> = Vec::new();
    for node in nodes {
        let name = slug(key(node).unwrap_or("default"));
        match clusters.iter_mut().find(|c| c.name == name) {
            Some(cluster) => cluster.nodes.push(node.id().to_string()),
            None => clusters.push(NodeCluster {
                name,
                nodes: vec![node.id().to_string()],
                ..Default::default()
            }),
        }
    }
    clusters
}

/// "Panel A" -> "panel-a". Keeps group names safe for the command grammar.
pub(super) fn slug(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.trim().chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("default");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_priority_sorted() {
        let names: Vec<&str> = BUILTIN
            .connection
            .iter()
            .map(|r| r.info().name.as_str())
            .collect();
        assert_eq!(
            names,
            [
                "critical-device-redundancy",
                "smart-meter-dual-connection",
                "high-capacity-ethernet"
            ]
        );
        assert_eq!(BUILTIN.layout[0].info().name, "critical-device-isolation");
        assert!(BUILTIN.contains(RuleCategory::Anchor, "hierarchical-anchoring"));
        assert!(BUILTIN.node(RuleCategory::Layout).is_empty());
    }

    #[test]
    fn slugs_group_names() {
        assert_eq!(slug("Panel A"), "panel-a");
        assert_eq!(slug("  building, b "), "building-b");
        assert_eq!(slug("--"), "default");
    }
}
