use super::*;
use crate::ir::{CLOUD_KEY, ONPREMISE_KEY};

impl Pass<'_> {
    pub(super) fn assemble(&mut self) {
        self.commands.push(Command::Layout {
            mode: "hierarchical".to_string(),
        });

        for device_type in self.device_types.clone() {
            let members: Vec<String> = self
                .index
                .devices()
                .filter(|node| node.device_type() == Some(device_type))
                .map(|node| node.id().to_string())
                .collect();
            if members.len() < 2 {
                continue;
            }
            let name = format!("{}-group", device_type);
            self.commands.push(Command::Group {
                name: name.clone(),
                nodes: members,
            });
            self.commands.push(Command::StyleGroup {
                name,
                prop: "border-color".to_string(),
                value: self.palette.device_color(device_type).to_string(),
            });
        }

        let infrastructure: Vec<String> = [CLOUD_KEY, ONPREMISE_KEY]
            .iter()
            .filter_map(|key| self.index.resolve(key))
            .map(|node| node.id().to_string())
            .collect();
        if infrastructure.len() == 2 {
            self.commands.push(Command::Group {
                name: "infrastructure".to_string(),
                nodes: infrastructure,
            });
            self.commands.push(Command::StyleGroup {
                name: "infrastructure".to_string(),
                prop: "border-color".to_string(),
                value: self.palette.infrastructure_border.clone(),
            });
        }

        self.commands.push(Command::Fit);
    }
}

#[cfg(test)]
mod tests {
    use crate::generator::DiagramGenerator;
    use crate::ir::DeviceRecord;

    #[test]
    fn groups_only_repeated_types() {
        let records = [
            DeviceRecord::new("memory-meter", "M1"),
            DeviceRecord::new("auth-meter", "A"),
            DeviceRecord::new("memory-meter", "M2"),
        ];
        let lines = DiagramGenerator::default().generate(&records).command_lines();
        let tail: Vec<&str> = lines
            .iter()
            .skip_while(|l| *l != "layout,hierarchical")
            .map(String::as_str)
            .collect();
        assert_eq!(
            tail,
            [
                "layout,hierarchical",
                "group,memory-meter-group,memory-meter-1,memory-meter-3",
                "style-group,memory-meter-group,border-color,#FF9800",
                "group,infrastructure,cloud-1,onpremise-1",
                "style-group,infrastructure,border-color,#333333",
                "fit",
            ]
        );
    }
}
