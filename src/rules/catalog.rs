use super::builtin::BUILTIN;
use super::*;
use crate::config::Config;
use crate::error::RuleValidationError;

/// Caller-registered rules, one priority-sorted table per category.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    position: Vec<NodeRule>,
    connection: Vec<NodeRule>,
    styling: Vec<NodeRule>,
    layout: Vec<LayoutRule>,
    anchor: Vec<AnchorRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleListing {
    pub builtin: Vec<RuleInfo>,
    pub custom: Vec<RuleInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleStats {
    pub builtin: BTreeMap<RuleCategory, usize>,
    pub custom: BTreeMap<RuleCategory, usize>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleExport {
    pub custom_rules: BTreeMap<RuleCategory, Vec<RuleInfo>>,
    pub context: RuleContext,
    pub layout_policy: LayoutPolicy,
    pub exported_at: String,
}

impl RuleCatalog {
    pub fn register(
        &mut self,
        category: RuleCategory,
        rule: impl Into<AnyRule>,
    ) -> Result<(), RuleValidationError> {
        let rule = rule.into();
        let name = rule.info().name.trim();
        if name.is_empty() {
            return Err(RuleValidationError::MissingName);
        }
        if self.contains(category, name) || BUILTIN.contains(category, name) {
            return Err(RuleValidationError::DuplicateName {
                category,
                name: name.to_string(),
            });
        }
        let mismatch = || RuleValidationError::CategoryMismatch {
            name: rule.info().name.clone(),
            expected: category,
            found: rule.subject(),
        };
        match (category, &rule) {
            (RuleCategory::Layout, AnyRule::Layout(layout)) => {
                self.layout.push(layout.clone());
                sort_desc(&mut self.layout);
            }
            (RuleCategory::Anchor, AnyRule::Anchor(anchor)) => {
                self.anchor.push(anchor.clone());
                sort_desc(&mut self.anchor);
            }
            (category, AnyRule::Node(node)) if category.takes_node_rules() => {
                let table = self.node_table_mut(category);
                table.push(node.clone());
                sort_desc(table);
            }
            _ => return Err(mismatch()),
        }
        log::debug!("registered {} rule `{}`", category, rule.info().name);
        Ok(())
    }

    /// Removes the first custom rule with this exact name.
    pub fn unregister(&mut self, category: RuleCategory, name: &str) -> bool {
        fn remove<R: Prioritized>(rules: &mut Vec<R>, name: &str) -> bool {
            match rules.iter().position(|r| r.info().name == name) {
                Some(index) => {
                    rules.remove(index);
                    true
                }
                None => false,
            }
        }
        match category {
            RuleCategory::Layout => remove(&mut self.layout, name),
            RuleCategory::Anchor => remove(&mut self.anchor, name),
            other => remove(self.node_table_mut(other), name),
        }
    }

    pub fn contains(&self, category: RuleCategory, name: &str) -> bool {
        self.infos(category).iter().any(|info| info.name == name)
    }

    pub fn infos(&self, category: RuleCategory) -> Vec<RuleInfo> {
        match category {
            RuleCategory::Layout => self.layout.iter().map(|r| r.info().clone()).collect(),
            RuleCategory::Anchor => self.anchor.iter().map(|r| r.info().clone()).collect(),
            other => self.node_table(other).iter().map(|r| r.info().clone()).collect(),
        }
    }

    pub fn len(&self, category: RuleCategory) -> usize {
        match category {
            RuleCategory::Layout => self.layout.len(),
            RuleCategory::Anchor => self.anchor.len(),
            other => self.node_table(other).len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        RuleCategory::ALL.iter().all(|category| self.len(*category) == 0)
    }

    fn node_table(&self, category: RuleCategory) -> &[NodeRule] {
        match category {
            RuleCategory::Position => &self.position,
            RuleCategory::Connection => &self.connection,
            RuleCategory::Styling => &self.styling,
            RuleCategory::Layout | RuleCategory::Anchor => &[],
        }
    }

    // Only reached for node categories.
    fn node_table_mut(&mut self, category: RuleCategory) -> &mut Vec<NodeRule> {
        match category {
            RuleCategory::Position => &mut self.position,
            RuleCategory::Connection => &mut self.connection,
            _ => &mut self.styling,
        }
    }
}

fn sort_desc<R: Prioritized>(rules: &mut [R]) {
    rules.sort_by(|a, b| b.info().priority.cmp(&a.info().priority));
}

/// Built-in rules plus a per-instance custom catalog, context, and layout policy.
///
/// Evaluation borrows the engine immutably, so the catalog cannot change
/// while a diagram is being generated.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    catalog: RuleCatalog,
    context: RuleContext,
    layout_policy: LayoutPolicy,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with the configured geometry, layout policy, and presets applied.
    pub fn with_config(config: &Config) -> Self {
        let mut engine = Self {
            catalog: RuleCatalog::default(),
            context: RuleContext {
                grid: config.grid.clone(),
                levels: config.levels.clone(),
                total_devices: 0,
                panel_offsets: config.panel_offsets.clone(),
            },
            layout_policy: config.layout_policy,
        };
        for preset in &config.presets {
            engine.apply_preset(*preset);
        }
        engine
    }

    pub fn register(
        &mut self,
        category: RuleCategory,
        rule: impl Into<AnyRule>,
    ) -> Result<(), RuleValidationError> {
        self.catalog.register(category, rule)
    }

    pub fn unregister(&mut self, category: RuleCategory, name: &str) -> bool {
        self.catalog.unregister(category, name)
    }

    pub fn list(&self, category: RuleCategory) -> RuleListing {
        RuleListing {
            builtin: BUILTIN.infos(category),
            custom: self.catalog.infos(category),
        }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn context(&self) -> &RuleContext {
        &self.context
    }

    pub fn set_context(&mut self, patch: ContextPatch) {
        self.context.merge(patch);
    }

    pub fn layout_policy(&self) -> LayoutPolicy {
        self.layout_policy
    }

    pub fn set_layout_policy(&mut self, policy: LayoutPolicy) {
        self.layout_policy = policy;
    }

    /// Registers every rule of the pack not already present. Returns how many were added.
    pub fn apply_preset(&mut self, preset: RulePreset) -> usize {
        let mut added = 0;
        for (category, rule) in preset.rules() {
            if self.catalog.contains(category, &rule.info().name) {
                continue;
            }
            match self.catalog.register(category, rule) {
                Ok(()) => added += 1,
                Err(err) => log::warn!("preset {}: {}", preset.as_str(), err),
            }
        }
        added
    }

    pub fn apply_node_rules(
        &self,
        category: RuleCategory,
        node: &DiagramNode,
        ctx: &RuleContext,
    ) -> Evaluation<DiagramNode> {
        let rules = evaluator::ordered(BUILTIN.node(category), self.catalog.node_table(category));
        evaluator::apply_node_rules(category, &rules, node, ctx)
    }

    pub fn apply_layout_rules(&self, nodes: &[DiagramNode], ctx: &RuleContext) -> Evaluation<LayoutPlan> {
        let rules = evaluator::ordered(&BUILTIN.layout, &self.catalog.layout);
        evaluator::apply_layout_rules(&rules, nodes, ctx, self.layout_policy)
    }

    pub fn resolve_anchors(
        &self,
        source: &DiagramNode,
        target: &DiagramNode,
        ctx: &RuleContext,
    ) -> Evaluation<Anchors> {
        let rules = evaluator::ordered(&BUILTIN.anchor, &self.catalog.anchor);
        anchor::resolve(&rules, source, target, ctx)
    }

    pub fn stats(&self) -> RuleStats {
        let mut builtin = BTreeMap::new();
        let mut custom = BTreeMap::new();
        for category in RuleCategory::ALL {
            builtin.insert(category, BUILTIN.infos(category).len());
            custom.insert(category, self.catalog.len(category));
        }
        let total = builtin.values().sum::<usize>() + custom.values().sum::<usize>();
        RuleStats {
            builtin,
            custom,
            total,
        }
    }

    pub fn export_configuration(&self) -> RuleExport {
        RuleExport {
            custom_rules: RuleCategory::ALL
                .iter()
                .map(|category| (*category, self.catalog.infos(*category)))
                .collect(),
            context: self.context.clone(),
            layout_policy: self.layout_policy,
            exported_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str, priority: i32) -> NodeRule {
        NodeRule::new(name, "test", priority, |_, _| false, |_, _| NodePatch::default())
    }

    #[test]
    fn rejects_invalid_registrations() {
        let mut engine = RuleEngine::new();
        assert_eq!(
            engine.register(RuleCategory::Styling, noop("  ", 10)),
            Err(RuleValidationError::MissingName)
        );
        assert!(matches!(
            engine.register(RuleCategory::Position, noop("wireless-on-top", 10)),
            Err(RuleValidationError::DuplicateName { .. })
        ));
        assert!(matches!(
            engine.register(RuleCategory::Layout, noop("node-rule", 10)),
            Err(RuleValidationError::CategoryMismatch { .. })
        ));
        engine.register(RuleCategory::Styling, noop("mine", 10)).unwrap();
        assert!(matches!(
            engine.register(RuleCategory::Styling, noop("mine", 20)),
            Err(RuleValidationError::DuplicateName { .. })
        ));
        // same name is fine in another category
        engine.register(RuleCategory::Connection, noop("mine", 10)).unwrap();
    }

    #[test]
    fn custom_rules_stay_priority_sorted() {
        let mut engine = RuleEngine::new();
        for (name, priority) in [("a", 10), ("b", 50), ("c", 10), ("d", 30)] {
            engine.register(RuleCategory::Styling, noop(name, priority)).unwrap();
        }
        let listing = engine.list(RuleCategory::Styling);
        let names: Vec<&str> = listing.custom.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["b", "d", "a", "c"]);
        assert_eq!(listing.builtin.len(), 3);
    }

    #[test]
    fn unregister_only_touches_custom_rules() {
        let mut engine = RuleEngine::new();
        engine.register(RuleCategory::Position, noop("mine", 10)).unwrap();
        assert!(!engine.unregister(RuleCategory::Position, "meters-bottom-level"));
        assert!(!engine.unregister(RuleCategory::Styling, "mine"));
        assert!(engine.unregister(RuleCategory::Position, "mine"));
        assert!(engine.catalog().is_empty());
    }

    #[test]
    fn stats_and_export() {
        let mut engine = RuleEngine::new();
        let added = engine.apply_preset(RulePreset::CriticalFocus);
        assert_eq!(added, 3);
        assert_eq!(engine.apply_preset(RulePreset::CriticalFocus), 0);
        let stats = engine.stats();
        assert_eq!(stats.builtin[&RuleCategory::Position], 3);
        assert_eq!(stats.custom[&RuleCategory::Layout], 1);
        assert_eq!(stats.total, 13 + 3);

        let export = engine.export_configuration();
        assert_eq!(export.custom_rules[&RuleCategory::Connection][0].name, "wireless-backup-for-critical");
        let json = serde_json::to_value(&export).unwrap();
        assert!(json["customRules"]["anchor"].as_array().unwrap().is_empty());
        assert_eq!(json["layoutPolicy"], "lastMatch");
    }
}
