use super::*;
use crate::command::LinkTag;
use crate::ir::{default_link_type, CLOUD_KEY, ONPREMISE_KEY};
use crate::rules::{LayoutPlan, NodeCluster};

impl Pass<'_> {
    /// Layout plan first, then per-device links, the fallback pass, and the
    /// gateway uplink.
    pub(super) fn resolve_connections(&mut self) {
        let devices: Vec<DiagramNode> = self.index.devices().cloned().collect();

        let layout = self.engine.apply_layout_rules(&devices, &self.ctx);
        if let Some(error) = layout.error {
            self.rule_errors.push(error);
        }
        self.emit_layout_plan(layout.value);

        for node in &devices {
            self.connect_device(node);
        }

        for node in &devices {
            if !self.linked.contains(node.id()) {
                self.connect_defaults(node);
            }
        }

        let uplink = (
            self.index.resolve(ONPREMISE_KEY).cloned(),
            self.index.resolve(CLOUD_KEY).cloned(),
        );
        if let (Some(onpremise), Some(cloud)) = uplink {
            self.emit_connect(&onpremise, &cloud, ConnectionType::Wireless, None);
        }
    }

    fn emit_layout_plan(&mut self, plan: LayoutPlan) {
        let populated = |cluster: &NodeCluster| !cluster.nodes.is_empty();

        for group in plan.groups.into_iter().filter(populated) {
            self.commands.push(Command::Group {
                name: group.name.clone(),
                nodes: group.nodes,
            });
            self.push_styles(&group.name, group.style, group_style);
        }
        for cluster in plan.clusters.into_iter().filter(populated) {
            self.commands.push(Command::Group {
                name: cluster.name.clone(),
                nodes: cluster.nodes,
            });
            if let Some(mode) = cluster.layout {
                self.commands.push(Command::LayoutGroup {
                    name: cluster.name.clone(),
                    mode,
                });
            }
            self.push_styles(&cluster.name, cluster.style, group_style);
        }
        for zone in plan.zones.into_iter().filter(populated) {
            self.commands.push(Command::CreateZone {
                name: zone.name.clone(),
                nodes: zone.nodes,
            });
            self.push_styles(&zone.name, zone.style, |name, prop, value| Command::StyleZone {
                name,
                prop,
                value,
            });
        }
        for section in plan.sections.into_iter().filter(populated) {
            self.commands.push(Command::CreateSection {
                name: section.name.clone(),
                nodes: section.nodes,
            });
            self.push_styles(&section.name, section.style, |name, prop, value| {
                Command::StyleSection { name, prop, value }
            });
        }
    }

    fn push_styles<F>(&mut self, name: &str, style: Vec<(String, String)>, build: F)
    where
        F: Fn(String, String, String) -> Command,
    {
        for (prop, value) in style {
            self.commands.push(build(name.to_string(), prop, value));
        }
    }

    fn connect_device(&mut self, node: &DiagramNode) {
        let Some(device_type) = node.device_type() else {
            return;
        };
        let attrs = &node.attrs;

        let mut forced: Option<&str> = None;
        if attrs.force_wired_to_onpremise {
            forced = Some(ONPREMISE_KEY);
            match self.index.resolve(ONPREMISE_KEY).cloned() {
                Some(target) => {
                    self.emit_connect(node, &target, ConnectionType::Ethernet, None);
                    self.emit_backup(node, &target);
                }
                None => log::debug!("{}: no on-premise node for forced link", node.id()),
            }
        }

        let candidates: Vec<String> = match &attrs.required_connections {
            Some(required) => required.clone(),
            None => device_type
                .default_targets()
                .iter()
                .map(|key| key.to_string())
                .collect(),
        };
        let mut seen: Vec<&str> = Vec::new();
        for key in &candidates {
            let key = key.as_str();
            if (attrs.block_direct_cloud && key == CLOUD_KEY)
                || forced == Some(key)
                || seen.contains(&key)
            {
                continue;
            }
            seen.push(key);
            let Some(target) = self.linkable(node, key) else {
                continue;
            };
            let connection = self.link_type(node, &target);
            self.emit_connect(node, &target, connection, None);
            self.emit_backup(node, &target);
        }

        if let Some(preferred) = attrs.preferred_connection.as_deref() {
            let blocked = attrs.block_direct_cloud && preferred == CLOUD_KEY;
            if !blocked && forced != Some(preferred) {
                if let Some(target) = self.linkable(node, preferred) {
                    let connection = self.link_type(node, &target);
                    self.emit_connect(node, &target, connection, Some(LinkTag::Preferred));
                }
            }
        }
    }

    /// Static defaults only; used for devices the rules left unconnected.
    fn connect_defaults(&mut self, node: &DiagramNode) {
        let Some(device_type) = node.device_type() else {
            return;
        };
        for key in device_type.default_targets() {
            if node.attrs.block_direct_cloud && *key == CLOUD_KEY {
                continue;
            }
            let Some(target) = self.linkable(node, key) else {
                continue;
            };
            let connection = if needs_ethernet(node) {
                ConnectionType::Ethernet
            } else {
                default_link_type(node.kind(), target.kind()).unwrap_or(ConnectionType::Ethernet)
            };
            self.emit_connect(node, &target, connection, None);
        }
    }

    fn linkable(&self, node: &DiagramNode, key: &str) -> Option<DiagramNode> {
        match self.index.resolve(key) {
            Some(target) if target.id() != node.id() => Some(target.clone()),
            Some(_) => None,
            None => {
                log::debug!("{}: no node for link target `{}`", node.id(), key);
                None
            }
        }
    }

    /// Rule choice, else the type-pair table, else ethernet. Heavy or
    /// ethernet-only devices always get ethernet.
    fn link_type(&self, node: &DiagramNode, target: &DiagramNode) -> ConnectionType {
        if needs_ethernet(node) {
            return ConnectionType::Ethernet;
        }
        node.attrs
            .connection_override
            .or_else(|| default_link_type(node.kind(), target.kind()))
            .unwrap_or(ConnectionType::Ethernet)
    }

    fn emit_backup(&mut self, node: &DiagramNode, target: &DiagramNode) {
        if !node.attrs.requires_backup {
            return;
        }
        if let Some(backup) = node.attrs.backup_connection {
            self.emit_connect(node, target, backup, Some(LinkTag::Backup));
        }
    }

    fn emit_connect(
        &mut self,
        source: &DiagramNode,
        target: &DiagramNode,
        connection: ConnectionType,
        tag: Option<LinkTag>,
    ) {
        let anchors = self.engine.resolve_anchors(source, target, &self.ctx);
        if let Some(error) = anchors.error {
            self.rule_errors.push(error);
        }
        self.commands.push(Command::Connect {
            source: source.id().to_string(),
            target: target.id().to_string(),
            connection,
            tag,
            source_anchor: anchors.value.source,
            target_anchor: anchors.value.target,
        });
        self.linked.insert(source.id().to_string());
        self.linked.insert(target.id().to_string());
        if let Some(&slot) = self.summary_slots.get(source.id()) {
            let connections = &mut self.summaries[slot].connections;
            if !connections.iter().any(|id| id == target.id()) {
                connections.push(target.id().to_string());
            }
        }
    }
}

/// Heavy or ethernet-only devices never link over anything but ethernet.
fn needs_ethernet(node: &DiagramNode) -> bool {
    node.capacity() > 2500 || node.attrs.requires_ethernet
}

fn group_style(name: String, prop: String, value: String) -> Command {
    Command::StyleGroup { name, prop, value }
}

#[cfg(test)]
mod tests {
    use crate::generator::DiagramGenerator;
    use crate::ir::{BoolOrString, DeviceRecord, DeviceType, NumberOrString};
    use crate::rules::{presets, NodePatch, RuleCategory, RuleEngine};

    fn connects(lines: &[String], id: &str) -> Vec<String> {
        lines
            .iter()
            .filter(|l| l.starts_with("connect,") && l.split(',').take(3).any(|f| f == id))
            .cloned()
            .collect()
    }

    #[test]
    fn default_smart_meter_links_both_sides() {
        let lines = DiagramGenerator::default()
            .generate(&[DeviceRecord::new("smart-meter", "S")])
            .command_lines();
        assert_eq!(
            connects(&lines, "smart-meter-1"),
            [
                "connect,smart-meter-1,cloud-1,wireless,top,bottom",
                "connect,smart-meter-1,onpremise-1,ethernet,top,bottom",
            ]
        );
    }

    #[test]
    fn heavy_devices_always_use_ethernet() {
        let mut record = DeviceRecord::new("general-meter", "G");
        record.capacity = Some(NumberOrString::Number(2600.0));
        let lines = DiagramGenerator::default().generate(&[record]).command_lines();
        let links = connects(&lines, "general-meter-1");
        assert!(!links.is_empty());
        assert!(links.iter().all(|l| l.contains(",ethernet,")));
        assert!(links.iter().any(|l| l.contains(",preferred,")));
    }

    #[test]
    fn transformers_and_loads_have_no_default_links() {
        let records = [
            DeviceRecord::new("transformer", "T1"),
            DeviceRecord::new("load", "L"),
        ];
        let lines = DiagramGenerator::default().generate(&records).command_lines();
        assert!(connects(&lines, "transformer-1").is_empty());
        assert!(connects(&lines, "load-2").is_empty());
    }

    #[test]
    fn rules_can_target_the_first_transformer_and_load() {
        let mut engine = RuleEngine::new();
        engine
            .register(
                RuleCategory::Connection,
                presets::device_type_rule(
                    DeviceType::Transformer,
                    NodePatch {
                        required_connections: Some(vec!["load".to_string()]),
                        ..Default::default()
                    },
                    50,
                ),
            )
            .unwrap();
        let records = [
            DeviceRecord::new("transformer", "T1"),
            DeviceRecord::new("load", "L1"),
            DeviceRecord::new("transformer", "T2"),
            DeviceRecord::new("load", "L2"),
        ];
        let lines = DiagramGenerator::new(engine).generate(&records).command_lines();
        assert!(lines.iter().any(|l| l.starts_with("connect,transformer-1,load-2,ethernet,")));
        assert!(lines.iter().any(|l| l.starts_with("connect,transformer-3,load-2,ethernet,")));
        assert!(connects(&lines, "load-4").is_empty());
    }

    #[test]
    fn fallback_links_keep_heavy_devices_on_ethernet() {
        let mut engine = RuleEngine::new();
        engine
            .register(
                RuleCategory::Connection,
                presets::device_type_rule(
                    DeviceType::GeneralMeter,
                    NodePatch {
                        required_connections: Some(vec!["nowhere".to_string()]),
                        preferred_connection: Some("nowhere".to_string()),
                        ..Default::default()
                    },
                    50,
                ),
            )
            .unwrap();
        let mut heavy = DeviceRecord::new("general-meter", "Heavy");
        heavy.capacity = Some(NumberOrString::Number(3000.0));
        let light = DeviceRecord::new("general-meter", "Light");
        let lines = DiagramGenerator::new(engine).generate(&[heavy, light]).command_lines();
        assert_eq!(
            connects(&lines, "general-meter-1"),
            ["connect,general-meter-1,onpremise-1,ethernet,top,bottom"]
        );
        assert_eq!(
            connects(&lines, "general-meter-2"),
            ["connect,general-meter-2,onpremise-1,rs485,top,bottom"]
        );
    }

    #[test]
    fn summaries_record_each_target_once() {
        let mut record = DeviceRecord::new("smart-meter", "S");
        record.capacity = Some(NumberOrString::Number(3000.0));
        let diagram = DiagramGenerator::default().generate(&[record]);
        assert_eq!(connects(&diagram.command_lines(), "smart-meter-1").len(), 3);
        let summary = &diagram.metadata.per_device_summary[0];
        assert_eq!(summary.connections, ["cloud-1", "onpremise-1"]);
    }

    #[test]
    fn security_rule_keeps_device_off_cloud() {
        let mut engine = RuleEngine::new();
        engine
            .register(RuleCategory::Connection, presets::no_smart_meter_cloud_direct())
            .unwrap();
        engine
            .register(RuleCategory::Connection, presets::wireless_backup_for_critical())
            .unwrap();
        let mut record = DeviceRecord::new("smart-meter", "S");
        record.capacity = Some(NumberOrString::Number(3000.0));
        record.critical = Some(BoolOrString::Bool(true));
        let lines = DiagramGenerator::new(engine).generate(&[record]).command_lines();
        assert_eq!(
            connects(&lines, "smart-meter-1"),
            [
                "connect,smart-meter-1,onpremise-1,ethernet,top,bottom",
                "connect,smart-meter-1,onpremise-1,wireless,backup,top,bottom",
            ]
        );
    }

    #[test]
    fn unconnected_devices_fall_back_to_defaults() {
        let mut engine = RuleEngine::new();
        engine
            .register(
                RuleCategory::Connection,
                presets::device_type_rule(
                    DeviceType::AuthMeter,
                    NodePatch {
                        required_connections: Some(vec!["nowhere".to_string()]),
                        ..Default::default()
                    },
                    50,
                ),
            )
            .unwrap();
        let lines = DiagramGenerator::new(engine)
            .generate(&[DeviceRecord::new("auth-meter", "A")])
            .command_lines();
        assert_eq!(
            connects(&lines, "auth-meter-1"),
            ["connect,auth-meter-1,onpremise-1,ethernet,top,bottom"]
        );
    }
}
