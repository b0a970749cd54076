use super::*;
use crate::error::RulePhase;

/// Built-ins then custom rules, stably sorted by descending priority.
pub(super) fn ordered<'a, R: Prioritized>(builtin: &'a [R], custom: &'a [R]) -> Vec<&'a R> {
    let mut rules: Vec<&R> = builtin.iter().chain(custom.iter()).collect();
    rules.sort_by(|a, b| b.info().priority.cmp(&a.info().priority));
    rules
}

pub(super) fn report(
    category: RuleCategory,
    info: &RuleInfo,
    phase: RulePhase,
    fault: RuleFault,
) -> RuleExecutionError {
    let error = RuleExecutionError {
        category,
        rule: info.name.clone(),
        phase,
        message: fault.0,
    };
    log::warn!("{}", error);
    error
}

/// Cumulative merge: each matching rule sees the node as patched so far.
pub(super) fn apply_node_rules(
    category: RuleCategory,
    rules: &[&NodeRule],
    node: &DiagramNode,
    ctx: &RuleContext,
) -> Evaluation<DiagramNode> {
    let mut working = node.clone();
    let mut applied = Vec::new();
    for rule in rules {
        let info = rule.info();
        match rule.matches(&working, ctx) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(fault) => {
                let error = report(category, info, RulePhase::Condition, fault);
                return Evaluation {
                    value: working,
                    applied,
                    error: Some(error),
                };
            }
        }
        match rule.patch(&working, ctx) {
            Ok(patch) => {
                patch.apply_to(&mut working.attrs);
                log::debug!("{} rule `{}` applied to {}", category, info.name, working.id());
                applied.push(info.name.clone());
            }
            Err(fault) => {
                let error = report(category, info, RulePhase::Action, fault);
                return Evaluation {
                    value: working,
                    applied,
                    error: Some(error),
                };
            }
        }
    }
    Evaluation {
        value: working,
        applied,
        error: None,
    }
}

/// Conditions always see the original node collection; only the plan evolves.
pub(super) fn apply_layout_rules(
    rules: &[&LayoutRule],
    nodes: &[DiagramNode],
    ctx: &RuleContext,
    policy: LayoutPolicy,
) -> Evaluation<LayoutPlan> {
    let mut plan = LayoutPlan::default();
    let mut applied = Vec::new();
    for rule in rules {
        let info = rule.info();
        match rule.matches(nodes, ctx) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(fault) => {
                let error = report(RuleCategory::Layout, info, RulePhase::Condition, fault);
                return Evaluation {
                    value: plan,
                    applied,
                    error: Some(error),
                };
            }
        }
        let next = match rule.plan(nodes, ctx) {
            Ok(next) => next,
            Err(fault) => {
                let error = report(RuleCategory::Layout, info, RulePhase::Action, fault);
                return Evaluation {
                    value: plan,
                    applied,
                    error: Some(error),
                };
            }
        };
        log::debug!("layout rule `{}` matched", info.name);
        applied.push(info.name.clone());
        match policy {
            LayoutPolicy::LastMatch => plan = next,
            LayoutPolicy::FirstMatch => {
                plan = next;
                break;
            }
            LayoutPolicy::Combine => plan.absorb(next),
        }
    }
    Evaluation {
        value: plan,
        applied,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DeviceRecord, DeviceType};

    fn device(ty: DeviceType, n: usize) -> DiagramNode {
        DiagramNode::from_record(
            &DeviceRecord::new(ty.as_str(), "D"),
            ty,
            format!("{}-{}", ty.as_str(), n),
            format!("meter-{}", n),
            Position::new(0.0, 16.0),
        )
    }

    fn size_rule(name: &str, priority: i32, size: &'static str) -> NodeRule {
        NodeRule::new(name, "", priority, |_, _| true, move |_, _| NodePatch {
            size: Some(size.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn ties_keep_builtin_first() {
        let builtin = [size_rule("a", 50, "s"), size_rule("b", 90, "s")];
        let custom = [size_rule("c", 90, "s"), size_rule("d", 10, "s")];
        let names: Vec<&str> = ordered(&builtin, &custom)
            .iter()
            .map(|r| r.info().name.as_str())
            .collect();
        assert_eq!(names, ["b", "c", "a", "d"]);
    }

    #[test]
    fn lower_priority_match_overwrites() {
        let high = size_rule("high", 90, "large");
        let low = size_rule("low", 10, "small");
        let node = device(DeviceType::GeneralMeter, 1);
        let result = apply_node_rules(
            RuleCategory::Styling,
            &[&high, &low],
            &node,
            &RuleContext::default(),
        );
        assert_eq!(result.value.attrs.style.size.as_deref(), Some("small"));
        assert_eq!(result.applied, ["high", "low"]);
        assert_eq!(result.value.identity, node.identity);
    }

    #[test]
    fn conditions_see_earlier_patches() {
        let to_ethernet = NodeRule::new("eth", "", 90, |_, _| true, |_, _| NodePatch {
            connection_type: Some(ConnectionType::Ethernet),
            ..Default::default()
        });
        let backup = NodeRule::new(
            "backup",
            "",
            80,
            |node, _| node.attrs.connection_type == ConnectionType::Ethernet,
            |_, _| NodePatch {
                backup_connection: Some(ConnectionType::Wireless),
                ..Default::default()
            },
        );
        let node = device(DeviceType::SmartMeter, 1);
        let result = apply_node_rules(
            RuleCategory::Connection,
            &[&to_ethernet, &backup],
            &node,
            &RuleContext::default(),
        );
        assert_eq!(result.value.attrs.backup_connection, Some(ConnectionType::Wireless));
    }

    #[test]
    fn failure_keeps_last_good_value() {
        let first = size_rule("first", 90, "large");
        let broken = NodeRule::fallible(
            "broken",
            "",
            50,
            |_, _| Ok(true),
            |_, _| Err(RuleFault::new("boom")),
        );
        let never = size_rule("never", 10, "small");
        let node = device(DeviceType::MemoryMeter, 1);
        let result = apply_node_rules(
            RuleCategory::Styling,
            &[&first, &broken, &never],
            &node,
            &RuleContext::default(),
        );
        assert_eq!(result.value.attrs.style.size.as_deref(), Some("large"));
        let error = result.error.unwrap();
        assert_eq!(error.rule, "broken");
        assert_eq!(error.phase, RulePhase::Action);
    }

    #[test]
    fn layout_policies() {
        let nodes = vec![device(DeviceType::GeneralMeter, 1), device(DeviceType::AuthMeter, 2)];
        let named = |name: &'static str, priority: i32| {
            LayoutRule::new(name, "", priority, |_, _| true, move |nodes, _| LayoutPlan {
                groups: vec![NodeCluster::new(name, nodes)],
                ..Default::default()
            })
        };
        let high = named("high", 80);
        let low = named("low", 60);
        let rules = [&high, &low];
        let ctx = RuleContext::default();

        let last = apply_layout_rules(&rules, &nodes, &ctx, LayoutPolicy::LastMatch);
        assert_eq!(last.value.groups[0].name, "low");
        let first = apply_layout_rules(&rules, &nodes, &ctx, LayoutPolicy::FirstMatch);
        assert_eq!(first.value.groups[0].name, "high");
        assert_eq!(first.applied, ["high"]);
        let both = apply_layout_rules(&rules, &nodes, &ctx, LayoutPolicy::Combine);
        assert_eq!(both.value.groups.len(), 2);
    }
}
