//! Turns device records into a replayable command stream.
//!
//! One [`DiagramGenerator::generate`] call runs four stages over a shared
//! [`NodeIndex`]: topology (cloud and gateway), devices, connections, and the
//! closing layout commands. Nothing in here fails; bad records and rule faults
//! end up in [`DiagramMetadata`].

mod assemble;
mod connections;
mod devices;
mod topology;

use crate::command::Command;
use crate::config::Config;
use crate::error::{RuleExecutionError, UnsupportedDeviceType};
use crate::ir::{ConnectionType, DeviceRecord, DeviceType, DiagramNode, Position};
use crate::rules::{RuleCategory, RuleContext, RuleEngine};
use crate::theme::Palette;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DIAGRAM_VERSION: &str = "1.0";
pub const DIAGRAM_TYPE: &str = "energy-monitoring";
pub const GENERATOR_NAME: &str = "energy-diagram";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub key: String,
    pub node_id: String,
    pub device_type: DeviceType,
    pub label: String,
    pub position: Position,
    pub connection_type: ConnectionType,
    pub applied_rules: Vec<String>,
    /// Ids of every node this device links to, in emission order.
    pub connections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramMetadata {
    pub generated_at: String,
    pub version: String,
    pub diagram_type: String,
    pub generator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub node_count: usize,
    pub command_count: usize,
    pub device_types_present: Vec<DeviceType>,
    pub per_device_summary: Vec<DeviceSummary>,
    pub skipped_devices: Vec<UnsupportedDeviceType>,
    pub rule_errors: Vec<RuleExecutionError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagram {
    #[serde(serialize_with = "serialize_commands")]
    pub commands: Vec<Command>,
    pub metadata: DiagramMetadata,
    pub node_position_index: BTreeMap<String, Position>,
    pub node_id_index: BTreeMap<String, String>,
}

impl Diagram {
    /// The commands in their textual form, ready for the renderer.
    pub fn command_lines(&self) -> Vec<String> {
        self.commands.iter().map(ToString::to_string).collect()
    }
}

fn serialize_commands<S: Serializer>(commands: &[Command], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(commands.iter().map(ToString::to_string))
}

/// Logical keys and generated ids for every node of one generation.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeIndex {
    keys: HashMap<String, String>,
    positions: HashMap<String, usize>,
    nodes: Vec<DiagramNode>,
}

impl NodeIndex {
    pub(crate) fn insert(&mut self, key: &str, node: DiagramNode) {
        self.keys.insert(key.to_string(), node.id().to_string());
        self.positions.insert(node.id().to_string(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Extra key for an existing node. The first node to claim a key keeps it.
    pub(crate) fn alias(&mut self, key: &str, id: &str) {
        if !self.keys.contains_key(key) {
            self.keys.insert(key.to_string(), id.to_string());
        }
    }

    pub(crate) fn has_key(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    pub(crate) fn get(&self, id: &str) -> Option<&DiagramNode> {
        self.positions.get(id).map(|&slot| &self.nodes[slot])
    }

    pub(crate) fn resolve(&self, key: &str) -> Option<&DiagramNode> {
        self.keys.get(key).and_then(|id| self.get(id))
    }

    /// Device nodes in processing order.
    pub(crate) fn devices(&self) -> impl Iterator<Item = &DiagramNode> {
        self.nodes.iter().filter(|node| node.device_type().is_some())
    }

    fn position_index(&self) -> BTreeMap<String, Position> {
        self.nodes
            .iter()
            .map(|node| (node.id().to_string(), node.position()))
            .collect()
    }

    fn id_index(&self) -> BTreeMap<String, String> {
        self.keys.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// State of a single `generate` call.
pub(crate) struct Pass<'a> {
    engine: &'a RuleEngine,
    palette: &'a Palette,
    ctx: RuleContext,
    commands: Vec<Command>,
    index: NodeIndex,
    device_counter: usize,
    device_types: Vec<DeviceType>,
    summaries: Vec<DeviceSummary>,
    /// Node id to its slot in `summaries`.
    summary_slots: HashMap<String, usize>,
    /// Ids with at least one `connect` on either end.
    linked: HashSet<String>,
    skipped: Vec<UnsupportedDeviceType>,
    rule_errors: Vec<RuleExecutionError>,
}

impl<'a> Pass<'a> {
    fn new(engine: &'a RuleEngine, palette: &'a Palette, ctx: RuleContext) -> Self {
        Self {
            engine,
            palette,
            ctx,
            commands: Vec::new(),
            index: NodeIndex::default(),
            device_counter: 0,
            device_types: Vec::new(),
            summaries: Vec::new(),
            summary_slots: HashMap::new(),
            linked: HashSet::new(),
            skipped: Vec::new(),
            rule_errors: Vec::new(),
        }
    }

    fn run_rules(
        &mut self,
        category: RuleCategory,
        node: DiagramNode,
        applied: &mut Vec<String>,
    ) -> DiagramNode {
        let evaluation = self.engine.apply_node_rules(category, &node, &self.ctx);
        applied.extend(evaluation.applied);
        if let Some(error) = evaluation.error {
            self.rule_errors.push(error);
        }
        evaluation.value
    }

    fn finish(self, project: &ProjectInfo) -> Diagram {
        let metadata = DiagramMetadata {
            generated_at: chrono::Utc::now().to_rfc3339(),
            version: DIAGRAM_VERSION.to_string(),
            diagram_type: DIAGRAM_TYPE.to_string(),
            generator: GENERATOR_NAME.to_string(),
            project_id: project.project_id.clone(),
            project_name: project.project_name.clone(),
            node_count: self.summaries.len() + 2,
            command_count: self.commands.len(),
            device_types_present: self.device_types,
            per_device_summary: self.summaries,
            skipped_devices: self.skipped,
            rule_errors: self.rule_errors,
        };
        Diagram {
            node_position_index: self.index.position_index(),
            node_id_index: self.index.id_index(),
            commands: self.commands,
            metadata,
        }
    }
}

/// A rule engine plus the palette used for default colors.
#[derive(Debug, Clone, Default)]
pub struct DiagramGenerator {
    engine: RuleEngine,
    palette: Palette,
}

impl DiagramGenerator {
    pub fn new(engine: RuleEngine) -> Self {
        Self {
            engine,
            palette: Palette::standard(),
        }
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            engine: RuleEngine::with_config(config),
            palette: config.palette.clone(),
        }
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut RuleEngine {
        &mut self.engine
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn generate(&self, devices: &[DeviceRecord]) -> Diagram {
        self.generate_for(devices, &ProjectInfo::default())
    }

    pub fn generate_for(&self, devices: &[DeviceRecord], project: &ProjectInfo) -> Diagram {
        let mut ctx = self.engine.context().clone();
        ctx.total_devices = devices.len();

        let mut pass = Pass::new(&self.engine, &self.palette, ctx);
        pass.build_topology();
        pass.process_devices(devices);
        pass.resolve_connections();
        pass.assemble();

        let diagram = pass.finish(project);
        log::debug!(
            "generated {} commands for {} devices ({} skipped)",
            diagram.metadata.command_count,
            diagram.metadata.per_device_summary.len(),
            diagram.metadata.skipped_devices.len()
        );
        diagram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_still_draws_infrastructure() {
        let diagram = DiagramGenerator::default().generate(&[]);
        let lines = diagram.command_lines();
        assert_eq!(lines[0], "add,cloud,4,0");
        assert_eq!(lines[1], "add,onpremise,4,8");
        assert!(lines.contains(&"connect,onpremise-1,cloud-1,wireless,top,bottom".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("fit"));
        assert_eq!(diagram.metadata.node_count, 2);
        assert_eq!(diagram.node_id_index.get("cloud").map(String::as_str), Some("cloud-1"));
    }

    #[test]
    fn commands_serialize_as_text() {
        let diagram = DiagramGenerator::default().generate(&[]);
        let json = serde_json::to_value(&diagram).unwrap();
        assert_eq!(json["commands"][0], "add,cloud,4,0");
        assert_eq!(json["metadata"]["diagramType"], "energy-monitoring");
        assert!(json["metadata"].get("projectId").is_none());
        assert_eq!(json["nodePositionIndex"]["onpremise-1"]["y"], 8.0);
    }

    #[test]
    fn index_aliases_do_not_steal_keys() {
        let mut index = NodeIndex::default();
        let node = DiagramNode::infrastructure(crate::ir::NodeKind::Cloud, "cloud-1", Position::default());
        index.insert("cloud", node);
        index.alias("cloud", "other-1");
        assert_eq!(index.resolve("cloud").map(|n| n.id()), Some("cloud-1"));
        assert!(index.resolve("other").is_none());
        assert_eq!(index.devices().count(), 0);
    }
}
