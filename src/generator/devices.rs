use super::*;

impl Pass<'_> {
    pub(super) fn process_devices(&mut self, records: &[DeviceRecord]) {
        for (index, record) in records.iter().enumerate() {
            let Some(device_type) = record.parsed_type() else {
                let skipped = UnsupportedDeviceType {
                    index,
                    id: record.external_id(),
                    device_type: record.device_type.clone(),
                };
                log::warn!("skipping record: {} (supported: {})", skipped, DeviceType::supported_list());
                self.skipped.push(skipped);
                continue;
            };

            self.device_counter += 1;
            let id = format!("{}-{}", device_type, self.device_counter);
            let key = self.device_key(record, index);
            let grid = &self.ctx.grid;
            let position = Position::new(
                grid.start_x + index as f64 * grid.cell_width,
                grid.start_y + 2.0 * grid.level_spacing,
            );

            let mut applied = Vec::new();
            let node = DiagramNode::from_record(record, device_type, id, key.clone(), position);
            let node = self.run_rules(RuleCategory::Position, node, &mut applied);
            let node = self.run_rules(RuleCategory::Connection, node, &mut applied);
            let node = self.run_rules(RuleCategory::Styling, node, &mut applied);

            self.emit_device(&node);
            if !self.device_types.contains(&device_type) {
                self.device_types.push(device_type);
            }
            self.summary_slots
                .insert(node.id().to_string(), self.summaries.len());
            self.summaries.push(DeviceSummary {
                key: key.clone(),
                node_id: node.id().to_string(),
                device_type,
                label: node.display_label(),
                position: node.position(),
                connection_type: node.attrs.connection_type,
                applied_rules: applied,
                connections: Vec::new(),
            });

            let node_id = node.id().to_string();
            self.index.insert(&key, node);
            if let Some(link_key) = device_type.link_key() {
                self.index.alias(link_key, &node_id);
            }
        }
    }

    /// `meter-<externalId>`, or `meter-<index>` for records without an id.
    fn device_key(&self, record: &DeviceRecord, index: usize) -> String {
        let base = match record.external_id() {
            Some(id) => format!("meter-{}", id),
            None => format!("meter-{}", index),
        };
        if !self.index.has_key(&base) {
            return base;
        }
        let mut fallback = format!("{}-{}", base, index);
        let mut attempt = 1;
        while self.index.has_key(&fallback) {
            attempt += 1;
            fallback = format!("{}-{}-{}", base, index, attempt);
        }
        log::warn!("duplicate device key `{}` at index {}, using `{}`", base, index, fallback);
        fallback
    }

    fn emit_device(&mut self, node: &DiagramNode) {
        let id = node.id();
        let attrs = &node.attrs;
        let style = &attrs.style;
        let position = node.position();
        let mut out = vec![
            Command::Add {
                node_type: node.type_name().to_string(),
                x: position.x,
                y: position.y,
            },
            Command::set_property(id, "label", node.display_label()),
        ];

        let color = match &style.color {
            Some(color) => color.clone(),
            None => self.palette.color_for(node.kind()).to_string(),
        };
        out.push(Command::style(id, "color", color));
        if let Some(size) = &style.size {
            out.push(Command::style(id, "size", size.as_str()));
        }
        if let Some(width) = style.border_width {
            out.push(Command::style(id, "borderWidth", width.to_string()));
        }
        if let Some(border) = &style.border_color {
            out.push(Command::style(id, "borderColor", border.as_str()));
        }
        out.push(Command::style(
            id,
            "shape",
            style.shape.as_deref().unwrap_or("rectangle"),
        ));
        if let Some(border_style) = &style.border_style {
            out.push(Command::style(id, "borderStyle", border_style.as_str()));
        }
        if let Some(animation) = &style.animation {
            out.push(Command::Animate {
                node: id.to_string(),
                animation: animation.clone(),
            });
        }

        out.push(Command::set_property(id, "connectionType", attrs.connection_type.as_str()));
        let optional = [
            ("panel", attrs.panel.clone()),
            ("description", attrs.description.clone()),
            ("status", attrs.status.clone()),
            ("connection", attrs.connection.clone()),
            ("capacity", attrs.capacity.map(|c| c.to_string())),
            ("priority", Some(attrs.priority.clone())),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                out.push(Command::set_property(id, key, value));
            }
        }

        if attrs.critical {
            out.push(Command::set_property(id, "critical", "true"));
        }
        if let Some(area) = &attrs.special_area {
            out.push(Command::set_property(id, "specialArea", area.as_str()));
        }
        if attrs.requires_backup {
            out.push(Command::set_property(id, "requiresBackup", "true"));
        }

        self.commands.extend(out);
    }
}

#[cfg(test)]
mod tests {
    use crate::generator::DiagramGenerator;
    use crate::ir::{DeviceRecord, NumberOrString};

    fn lines_for(records: &[DeviceRecord]) -> Vec<String> {
        DiagramGenerator::default().generate(records).command_lines()
    }

    #[test]
    fn device_block_order() {
        let mut record = DeviceRecord::new("general-meter", "Feeder");
        record.panel = Some("Panel B".to_string());
        record.capacity = Some(NumberOrString::Number(1200.0));
        let lines = lines_for(&[record]);
        let start = lines
            .iter()
            .position(|l| l.starts_with("add,general-meter"))
            .unwrap();
        assert_eq!(
            &lines[start..start + 8],
            [
                "add,general-meter,0,16",
                "set-property,general-meter-1,label,Feeder",
                "style,general-meter-1,color,#2196F3",
                "style,general-meter-1,size,small",
                "style,general-meter-1,borderWidth,1",
                "style,general-meter-1,shape,rectangle",
                "set-property,general-meter-1,connectionType,rs485",
                "set-property,general-meter-1,panel,Panel B",
            ]
        );
    }

    #[test]
    fn counter_skips_unsupported_but_positions_keep_gaps() {
        let records = [
            DeviceRecord::new("toaster", "T"),
            DeviceRecord::new("auth-meter", "A"),
            DeviceRecord::new("load", "L"),
        ];
        let diagram = DiagramGenerator::default().generate(&records);
        let lines = diagram.command_lines();
        assert!(lines.contains(&"add,auth-meter,6,16".to_string()));
        assert!(lines.contains(&"add,load,12,16".to_string()));
        assert!(lines.contains(&"set-property,auth-meter-1,label,A".to_string()));
        assert!(lines.contains(&"set-property,load-2,label,L".to_string()));
        assert_eq!(diagram.metadata.skipped_devices.len(), 1);
        assert_eq!(diagram.metadata.node_count, 4);
    }

    #[test]
    fn duplicate_ids_get_index_suffix() {
        let mut a = DeviceRecord::new("auth-meter", "A");
        a.id = Some(NumberOrString::String("x".to_string()));
        let mut b = DeviceRecord::new("auth-meter", "B");
        b.id = Some(NumberOrString::String("x".to_string()));
        let diagram = DiagramGenerator::default().generate(&[a, b]);
        assert_eq!(diagram.node_id_index.get("meter-x").map(String::as_str), Some("auth-meter-1"));
        assert_eq!(diagram.node_id_index.get("meter-x-1").map(String::as_str), Some("auth-meter-2"));
    }

    #[test]
    fn suffixed_keys_never_shadow_existing_ones() {
        let records: Vec<DeviceRecord> = ["x", "x-2", "x"]
            .iter()
            .map(|id| {
                let mut record = DeviceRecord::new("auth-meter", id);
                record.id = Some(NumberOrString::String(id.to_string()));
                record
            })
            .collect();
        let diagram = DiagramGenerator::default().generate(&records);
        let index = &diagram.node_id_index;
        assert_eq!(index.get("meter-x").map(String::as_str), Some("auth-meter-1"));
        assert_eq!(index.get("meter-x-2").map(String::as_str), Some("auth-meter-2"));
        assert_eq!(index.get("meter-x-2-2").map(String::as_str), Some("auth-meter-3"));
        let keys: Vec<&str> = diagram
            .metadata
            .per_device_summary
            .iter()
            .map(|summary| summary.key.as_str())
            .collect();
        assert_eq!(keys, ["meter-x", "meter-x-2", "meter-x-2-2"]);
    }
}
