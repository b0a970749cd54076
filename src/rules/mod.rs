//! Priority-ordered rules that rewrite nodes, layouts, and link anchors.
//!
//! Five categories share one engine but differ in how matches combine:
//! position, connection, and styling rules patch a single node cumulatively;
//! layout rules replace a plan built over every device node; anchor rules stop
//! at the first match.

mod anchor;
mod builtin;
mod catalog;
mod evaluator;
pub mod presets;

pub use catalog::{RuleCatalog, RuleEngine, RuleExport, RuleListing, RuleStats};
pub use presets::RulePreset;

use crate::config::{GridConfig, Levels};
use crate::error::{RuleExecutionError, RuleFault};
use crate::ir::{Anchor, ConnectionType, DiagramNode, NodeAttributes, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Position,
    Connection,
    Styling,
    Layout,
    Anchor,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 5] = [
        RuleCategory::Position,
        RuleCategory::Connection,
        RuleCategory::Styling,
        RuleCategory::Layout,
        RuleCategory::Anchor,
    ];

    /// Accepts both `position` and the legacy `positionRules` spelling.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        let token = token.strip_suffix("Rules").unwrap_or(token);
        match token.to_ascii_lowercase().as_str() {
            "position" => Some(Self::Position),
            "connection" => Some(Self::Connection),
            "styling" => Some(Self::Styling),
            "layout" => Some(Self::Layout),
            "anchor" => Some(Self::Anchor),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Connection => "connection",
            Self::Styling => "styling",
            Self::Layout => "layout",
            Self::Anchor => "anchor",
        }
    }

    pub fn takes_node_rules(self) -> bool {
        matches!(self, Self::Position | Self::Connection | Self::Styling)
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared geometry handed to every rule during one generation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleContext {
    pub grid: GridConfig,
    pub levels: Levels,
    pub total_devices: usize,
    pub panel_offsets: BTreeMap<String, f64>,
}

impl Default for RuleContext {
    fn default() -> Self {
        let grid = GridConfig::default();
        Self {
            levels: Levels::from_grid(&grid),
            grid,
            total_devices: 0,
            panel_offsets: BTreeMap::new(),
        }
    }
}

impl RuleContext {
    /// Shallow merge: each field present in the patch replaces the current one.
    pub fn merge(&mut self, patch: ContextPatch) {
        if let Some(grid) = patch.grid {
            self.grid = grid;
        }
        if let Some(levels) = patch.levels {
            self.levels = levels;
        }
        if let Some(total) = patch.total_devices {
            self.total_devices = total;
        }
        if let Some(offsets) = patch.panel_offsets {
            self.panel_offsets = offsets;
        }
    }

    pub fn panel_offset(&self, panel: &str) -> f64 {
        self.panel_offsets.get(panel).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPatch {
    pub grid: Option<GridConfig>,
    pub levels: Option<Levels>,
    pub total_devices: Option<usize>,
    pub panel_offsets: Option<BTreeMap<String, f64>>,
}

/// Keys a rule may never write through `extras`.
const IDENTITY_KEYS: [&str; 6] = ["id", "key", "label", "type", "deviceType", "monitoringDeviceType"];

/// Partial update produced by a position, connection, or styling rule.
///
/// Only attributes are reachable from here; a node's id, key, kind, and label
/// live in [`crate::ir::NodeIdentity`] and survive every pass untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub position: Option<Position>,
    pub capacity: Option<i64>,
    pub critical: Option<bool>,
    pub priority: Option<String>,
    pub connection_type: Option<ConnectionType>,
    pub required_connections: Option<Vec<String>>,
    pub preferred_connection: Option<String>,
    pub backup_connection: Option<ConnectionType>,
    pub requires_backup: Option<bool>,
    pub requires_ethernet: Option<bool>,
    pub force_wired_to_onpremise: Option<bool>,
    pub block_direct_cloud: Option<bool>,
    pub wirelessly_connected: Option<bool>,
    pub special_area: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub border_width: Option<u32>,
    pub border_color: Option<String>,
    pub shape: Option<String>,
    pub border_style: Option<String>,
    pub animation: Option<String>,
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl NodePatch {
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub(crate) fn apply_to(self, attrs: &mut NodeAttributes) {
        if let Some(position) = self.position {
            attrs.position = position;
        }
        if let Some(capacity) = self.capacity {
            attrs.capacity = Some(capacity);
        }
        if let Some(critical) = self.critical {
            attrs.critical = critical;
        }
        if let Some(priority) = self.priority {
            attrs.priority = priority;
        }
        if let Some(connection_type) = self.connection_type {
            attrs.connection_type = connection_type;
            attrs.connection_override = Some(connection_type);
        }
        if let Some(required) = self.required_connections {
            attrs.required_connections = Some(required);
        }
        if let Some(preferred) = self.preferred_connection {
            attrs.preferred_connection = Some(preferred);
        }
        if let Some(backup) = self.backup_connection {
            attrs.backup_connection = Some(backup);
        }
        if let Some(flag) = self.requires_backup {
            attrs.requires_backup = flag;
        }
        if let Some(flag) = self.requires_ethernet {
            attrs.requires_ethernet = flag;
        }
        if let Some(flag) = self.force_wired_to_onpremise {
            attrs.force_wired_to_onpremise = flag;
        }
        if let Some(flag) = self.block_direct_cloud {
            attrs.block_direct_cloud = flag;
        }
        if let Some(flag) = self.wirelessly_connected {
            attrs.wirelessly_connected = flag;
        }
        if let Some(area) = self.special_area {
            attrs.special_area = Some(area);
        }

        let style = &mut attrs.style;
        if self.color.is_some() {
            style.color = self.color;
        }
        if self.size.is_some() {
            style.size = self.size;
        }
        if self.border_width.is_some() {
            style.border_width = self.border_width;
        }
        if self.border_color.is_some() {
            style.border_color = self.border_color;
        }
        if self.shape.is_some() {
            style.shape = self.shape;
        }
        if self.border_style.is_some() {
            style.border_style = self.border_style;
        }
        if self.animation.is_some() {
            style.animation = self.animation;
        }

        for (key, value) in self.extras {
            if IDENTITY_KEYS.contains(&key.as_str()) {
                log::debug!("ignoring rule write to identity field `{}`", key);
                continue;
            }
            attrs.extras.insert(key, value);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchors {
    pub source: Anchor,
    pub target: Anchor,
}

impl Default for Anchors {
    fn default() -> Self {
        Self {
            source: Anchor::Center,
            target: Anchor::Center,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnchorPatch {
    pub source_anchor: Option<Anchor>,
    pub target_anchor: Option<Anchor>,
}

impl AnchorPatch {
    pub fn new(source: Anchor, target: Anchor) -> Self {
        Self {
            source_anchor: Some(source),
            target_anchor: Some(target),
        }
    }
}

/// A named set of node ids with optional layout mode and style pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCluster {
    pub name: String,
    pub nodes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub style: Vec<(String, String)>,
}

impl NodeCluster {
    pub fn new<'a>(name: impl Into<String>, nodes: impl IntoIterator<Item = &'a DiagramNode>) -> Self {
        Self {
            name: name.into(),
            nodes: nodes.into_iter().map(|n| n.id().to_string()).collect(),
            layout: None,
            style: Vec::new(),
        }
    }

    pub fn with_layout(mut self, mode: impl Into<String>) -> Self {
        self.layout = Some(mode.into());
        self
    }

    pub fn with_style(mut self, prop: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.push((prop.into(), value.into()));
        self
    }
}

/// Result of the layout category, translated into group/zone/section commands.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPlan {
    pub groups: Vec<NodeCluster>,
    pub clusters: Vec<NodeCluster>,
    pub zones: Vec<NodeCluster>,
    pub sections: Vec<NodeCluster>,
}

impl LayoutPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
            && self.clusters.is_empty()
            && self.zones.is_empty()
            && self.sections.is_empty()
    }

    pub fn absorb(&mut self, other: LayoutPlan) {
        self.groups.extend(other.groups);
        self.clusters.extend(other.clusters);
        self.zones.extend(other.zones);
        self.sections.extend(other.sections);
    }
}

/// How matching layout rules combine.
///
/// `LastMatch` keeps the plan of the last (lowest-priority) matching rule,
/// which is the historical behavior renderers were built against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutPolicy {
    #[default]
    LastMatch,
    FirstMatch,
    Combine,
}

impl LayoutPolicy {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "lastMatch" | "last-match" | "replace" => Some(Self::LastMatch),
            "firstMatch" | "first-match" => Some(Self::FirstMatch),
            "combine" | "merge" => Some(Self::Combine),
            _ => None,
        }
    }
}

/// Output of evaluating one category against one subject.
#[derive(Debug, Clone)]
pub struct Evaluation<T> {
    pub value: T,
    pub applied: Vec<String>,
    pub error: Option<RuleExecutionError>,
}

/// Descriptor shared by every rule kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInfo {
    pub name: String,
    pub description: String,
    pub priority: i32,
}

pub(crate) trait Prioritized {
    fn info(&self) -> &RuleInfo;
}

type NodePredicate = dyn Fn(&DiagramNode, &RuleContext) -> Result<bool, RuleFault> + Send + Sync;
type NodeTransform = dyn Fn(&DiagramNode, &RuleContext) -> Result<NodePatch, RuleFault> + Send + Sync;
type LayoutPredicate = dyn Fn(&[DiagramNode], &RuleContext) -> Result<bool, RuleFault> + Send + Sync;
type LayoutTransform =
    dyn Fn(&[DiagramNode], &RuleContext) -> Result<LayoutPlan, RuleFault> + Send + Sync;
type AnchorPredicate =
    dyn Fn(&DiagramNode, &DiagramNode, &RuleContext) -> Result<bool, RuleFault> + Send + Sync;
type AnchorTransform =
    dyn Fn(&DiagramNode, &DiagramNode, &RuleContext) -> Result<AnchorPatch, RuleFault> + Send + Sync;

/// Rule over a single node (position, connection, styling).
#[derive(Clone)]
pub struct NodeRule {
    info: RuleInfo,
    condition: Arc<NodePredicate>,
    action: Arc<NodeTransform>,
}

impl NodeRule {
    pub fn new<C, A>(
        name: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
        condition: C,
        action: A,
    ) -> Self
    where
        C: Fn(&DiagramNode, &RuleContext) -> bool + Send + Sync + 'static,
        A: Fn(&DiagramNode, &RuleContext) -> NodePatch + Send + Sync + 'static,
    {
        Self::fallible(
            name,
            description,
            priority,
            move |node, ctx| Ok(condition(node, ctx)),
            move |node, ctx| Ok(action(node, ctx)),
        )
    }

    /// Like [`NodeRule::new`], for closures that can fail.
    pub fn fallible<C, A>(
        name: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
        condition: C,
        action: A,
    ) -> Self
    where
        C: Fn(&DiagramNode, &RuleContext) -> Result<bool, RuleFault> + Send + Sync + 'static,
        A: Fn(&DiagramNode, &RuleContext) -> Result<NodePatch, RuleFault> + Send + Sync + 'static,
    {
        Self {
            info: RuleInfo {
                name: name.into(),
                description: description.into(),
                priority,
            },
            condition: Arc::new(condition),
            action: Arc::new(action),
        }
    }

    pub fn info(&self) -> &RuleInfo {
        &self.info
    }

    pub(crate) fn matches(&self, node: &DiagramNode, ctx: &RuleContext) -> Result<bool, RuleFault> {
        (self.condition)(node, ctx)
    }

    pub(crate) fn patch(&self, node: &DiagramNode, ctx: &RuleContext) -> Result<NodePatch, RuleFault> {
        (self.action)(node, ctx)
    }
}

/// Rule over the whole device-node collection.
#[derive(Clone)]
pub struct LayoutRule {
    info: RuleInfo,
    condition: Arc<LayoutPredicate>,
    action: Arc<LayoutTransform>,
}

impl LayoutRule {
    pub fn new<C, A>(
        name: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
        condition: C,
        action: A,
    ) -> Self
    where
        C: Fn(&[DiagramNode], &RuleContext) -> bool + Send + Sync + 'static,
        A: Fn(&[DiagramNode], &RuleContext) -> LayoutPlan + Send + Sync + 'static,
    {
        Self::fallible(
            name,
            description,
            priority,
            move |nodes, ctx| Ok(condition(nodes, ctx)),
            move |nodes, ctx| Ok(action(nodes, ctx)),
        )
    }

    pub fn fallible<C, A>(
        name: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
        condition: C,
        action: A,
    ) -> Self
    where
        C: Fn(&[DiagramNode], &RuleContext) -> Result<bool, RuleFault> + Send + Sync + 'static,
        A: Fn(&[DiagramNode], &RuleContext) -> Result<LayoutPlan, RuleFault> + Send + Sync + 'static,
    {
        Self {
            info: RuleInfo {
                name: name.into(),
                description: description.into(),
                priority,
            },
            condition: Arc::new(condition),
            action: Arc::new(action),
        }
    }

    pub fn info(&self) -> &RuleInfo {
        &self.info
    }

    pub(crate) fn matches(&self, nodes: &[DiagramNode], ctx: &RuleContext) -> Result<bool, RuleFault> {
        (self.condition)(nodes, ctx)
    }

    pub(crate) fn plan(&self, nodes: &[DiagramNode], ctx: &RuleContext) -> Result<LayoutPlan, RuleFault> {
        (self.action)(nodes, ctx)
    }
}

/// Rule over a (source, target) pair, choosing where a link attaches.
#[derive(Clone)]
pub struct AnchorRule {
    info: RuleInfo,
    condition: Arc<AnchorPredicate>,
    action: Arc<AnchorTransform>,
}

impl AnchorRule {
    pub fn new<C, A>(
        name: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
        condition: C,
        action: A,
    ) -> Self
    where
        C: Fn(&DiagramNode, &DiagramNode, &RuleContext) -> bool + Send + Sync + 'static,
        A: Fn(&DiagramNode, &DiagramNode, &RuleContext) -> AnchorPatch + Send + Sync + 'static,
    {
        Self::fallible(
            name,
            description,
            priority,
            move |source, target, ctx| Ok(condition(source, target, ctx)),
            move |source, target, ctx| Ok(action(source, target, ctx)),
        )
    }

    pub fn fallible<C, A>(
        name: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
        condition: C,
        action: A,
    ) -> Self
    where
        C: Fn(&DiagramNode, &DiagramNode, &RuleContext) -> Result<bool, RuleFault>
            + Send
            + Sync
            + 'static,
        A: Fn(&DiagramNode, &DiagramNode, &RuleContext) -> Result<AnchorPatch, RuleFault>
            + Send
            + Sync
            + 'static,
    {
        Self {
            info: RuleInfo {
                name: name.into(),
                description: description.into(),
                priority,
            },
            condition: Arc::new(condition),
            action: Arc::new(action),
        }
    }

    pub fn info(&self) -> &RuleInfo {
        &self.info
    }

    pub(crate) fn matches(
        &self,
        source: &DiagramNode,
        target: &DiagramNode,
        ctx: &RuleContext,
    ) -> Result<bool, RuleFault> {
        (self.condition)(source, target, ctx)
    }

    pub(crate) fn patch(
        &self,
        source: &DiagramNode,
        target: &DiagramNode,
        ctx: &RuleContext,
    ) -> Result<AnchorPatch, RuleFault> {
        (self.action)(source, target, ctx)
    }
}

macro_rules! impl_rule_common {
    ($($rule:ty),*) => {
        $(
            impl Prioritized for $rule {
                fn info(&self) -> &RuleInfo {
                    &self.info
                }
            }

            impl fmt::Debug for $rule {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_struct(stringify!($rule))
                        .field("name", &self.info.name)
                        .field("priority", &self.info.priority)
                        .finish()
                }
            }
        )*
    };
}

impl_rule_common!(NodeRule, LayoutRule, AnchorRule);

/// Any rule, ready to be registered under a category.
#[derive(Debug, Clone)]
pub enum AnyRule {
    Node(NodeRule),
    Layout(LayoutRule),
    Anchor(AnchorRule),
}

impl AnyRule {
    pub fn info(&self) -> &RuleInfo {
        match self {
            AnyRule::Node(rule) => &rule.info,
            AnyRule::Layout(rule) => &rule.info,
            AnyRule::Anchor(rule) => &rule.info,
        }
    }

    pub(crate) fn subject(&self) -> &'static str {
        match self {
            AnyRule::Node(_) => "single-node",
            AnyRule::Layout(_) => "node-collection",
            AnyRule::Anchor(_) => "node-pair",
        }
    }
}

impl From<NodeRule> for AnyRule {
    fn from(rule: NodeRule) -> Self {
        AnyRule::Node(rule)
    }
}

impl From<LayoutRule> for AnyRule {
    fn from(rule: LayoutRule) -> Self {
        AnyRule::Layout(rule)
    }
}

impl From<AnchorRule> for AnyRule {
    fn from(rule: AnchorRule) -> Self {
        AnyRule::Anchor(rule)
    }
}
