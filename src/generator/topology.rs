use super::*;
use crate::ir::NodeKind;

impl Pass<'_> {
    /// Cloud and gateway, placed by the position rules and styled from the palette.
    pub(super) fn build_topology(&mut self) {
        let grid = &self.ctx.grid;
        let seeds = [
            (
                NodeKind::Cloud,
                "cloud-1",
                Position::new(grid.start_x + 4.0, grid.start_y),
                "cloud",
            ),
            (
                NodeKind::OnPremise,
                "onpremise-1",
                Position::new(grid.start_x + 4.0, grid.start_y + grid.level_spacing),
                "server",
            ),
        ];

        let mut styles = Vec::with_capacity(seeds.len() * 2);
        for (kind, id, position, shape) in seeds {
            let mut applied = Vec::new();
            let node = self.run_rules(
                RuleCategory::Position,
                DiagramNode::infrastructure(kind, id, position),
                &mut applied,
            );
            let placed = node.position();
            self.commands.push(Command::Add {
                node_type: kind.as_str().to_string(),
                x: placed.x,
                y: placed.y,
            });
            styles.push(Command::style(id, "color", self.palette.color_for(kind)));
            styles.push(Command::style(id, "shape", shape));
            self.index.insert(kind.as_str(), node);
        }
        self.commands.extend(styles);
    }
}
