use super::*;
use crate::error::RulePhase;

/// Smaller `y` is higher on screen. Same row links run left to right.
pub(super) fn by_height(source: Position, target: Position) -> AnchorPatch {
    if source.y < target.y {
        AnchorPatch::new(Anchor::Bottom, Anchor::Top)
    } else if source.y > target.y {
        AnchorPatch::new(Anchor::Top, Anchor::Bottom)
    } else {
        AnchorPatch::new(Anchor::Right, Anchor::Left)
    }
}

/// First matching rule wins. Any failure falls back to center/center.
pub(super) fn resolve(
    rules: &[&AnchorRule],
    source: &DiagramNode,
    target: &DiagramNode,
    ctx: &RuleContext,
) -> Evaluation<Anchors> {
    let mut anchors = Anchors::default();
    for rule in rules {
        let info = rule.info();
        match rule.matches(source, target, ctx) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(fault) => {
                return Evaluation {
                    value: Anchors::default(),
                    applied: Vec::new(),
                    error: Some(evaluator::report(RuleCategory::Anchor, info, RulePhase::Condition, fault)),
                };
            }
        }
        match rule.patch(source, target, ctx) {
            Ok(patch) => {
                if let Some(anchor) = patch.source_anchor {
                    anchors.source = anchor;
                }
                if let Some(anchor) = patch.target_anchor {
                    anchors.target = anchor;
                }
                log::trace!(
                    "{} -> {}: {} picked {}/{}",
                    source.id(),
                    target.id(),
                    info.name,
                    anchors.source,
                    anchors.target
                );
                return Evaluation {
                    value: anchors,
                    applied: vec![info.name.clone()],
                    error: None,
                };
            }
            Err(fault) => {
                return Evaluation {
                    value: Anchors::default(),
                    applied: Vec::new(),
                    error: Some(evaluator::report(RuleCategory::Anchor, info, RulePhase::Action, fault)),
                };
            }
        }
    }
    Evaluation {
        value: anchors,
        applied: Vec::new(),
        error: None,
    }
}
