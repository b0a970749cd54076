use std::path::Path;

use energy_diagram::diagram_dump::{load_commands, save_diagram};
use energy_diagram::input::{DeviceInput, parse_devices, sample_devices};
use energy_diagram::ir::{DeviceRecord, NodeKind, NumberOrString, Position};
use energy_diagram::rules::{RuleContext, presets};
use energy_diagram::{DiagramGenerator, RuleCategory, RuleEngine, RulePreset, validate_devices};

fn fixture(name: &str) -> DeviceInput {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let text = std::fs::read_to_string(&path).expect("fixture read failed");
    parse_devices(&text).expect("fixture parse failed")
}

fn connects_from<'a>(lines: &'a [String], id: &str) -> Vec<&'a str> {
    let prefix = format!("connect,{id},");
    lines
        .iter()
        .filter(|line| line.starts_with(&prefix))
        .map(String::as_str)
        .collect()
}

#[test]
fn fixtures_parse_with_project_data() {
    let plant = fixture("plant.json");
    assert_eq!(plant.devices.len(), 7);
    assert_eq!(plant.project.project_id.as_deref(), Some("plant-7"));
    assert_eq!(plant.project.project_name.as_deref(), Some("North Plant"));

    let relaxed = fixture("relaxed.json5");
    assert_eq!(relaxed.devices.len(), 2);
    assert_eq!(relaxed.devices[1].original_label(), Some("Pump"));
    assert!(relaxed.devices[0].is_critical());
}

#[test]
fn plant_fixture_skips_unknown_types() {
    let plant = fixture("plant.json");
    let diagram = DiagramGenerator::default().generate_for(&plant.devices, &plant.project);

    assert_eq!(diagram.metadata.skipped_devices.len(), 1);
    assert_eq!(diagram.metadata.per_device_summary.len(), 6);
    assert_eq!(diagram.metadata.node_count, 8);
    assert_eq!(diagram.metadata.project_id.as_deref(), Some("plant-7"));
    assert_eq!(diagram.metadata.command_count, diagram.commands.len());
    assert!(diagram.metadata.rule_errors.is_empty());

    let lines = diagram.command_lines();
    assert!(!lines.iter().any(|line| line.contains("flux-capacitor")));
    assert_eq!(lines.last().map(String::as_str), Some("fit"));
}

#[test]
fn onpremise_uplink_is_wireless_top_to_bottom() {
    let lines = DiagramGenerator::default().generate(&sample_devices()).command_lines();
    assert!(lines.contains(&"connect,onpremise-1,cloud-1,wireless,top,bottom".to_string()));
}

#[test]
fn critical_heavy_smart_meter_gets_wired_link_and_backup() {
    let mut engine = RuleEngine::new();
    engine.apply_preset(RulePreset::Industrial);
    engine
        .register(RuleCategory::Connection, presets::no_smart_meter_cloud_direct())
        .unwrap();

    let relaxed = fixture("relaxed.json5");
    let lines = DiagramGenerator::new(engine)
        .generate(&relaxed.devices[..1])
        .command_lines();
    let links = connects_from(&lines, "smart-meter-1");

    assert!(links.contains(&"connect,smart-meter-1,onpremise-1,ethernet,top,bottom"));
    assert!(links.contains(&"connect,smart-meter-1,onpremise-1,wireless,backup,top,bottom"));
    assert!(!links.iter().any(|line| line.contains(",cloud-1,")));
}

#[test]
fn capacity_over_threshold_never_links_wirelessly() {
    let mut record = DeviceRecord::new("memory-meter", "Big");
    record.capacity = Some(NumberOrString::String("2501".to_string()));
    let lines = DiagramGenerator::default().generate(&[record]).command_lines();
    let links = connects_from(&lines, "memory-meter-1");

    assert!(!links.is_empty());
    assert!(links
        .iter()
        .filter(|line| !line.contains(",backup,"))
        .all(|line| line.contains(",ethernet,")));
}

#[test]
fn generation_is_deterministic() {
    let plant = fixture("plant.json");
    let mut engine = RuleEngine::new();
    engine.apply_preset(RulePreset::Custom);
    let generator = DiagramGenerator::new(engine);

    let first = generator.generate_for(&plant.devices, &plant.project);
    let second = generator.generate_for(&plant.devices, &plant.project);

    assert_eq!(first.commands, second.commands);
    assert_eq!(first.node_position_index, second.node_position_index);
    assert_eq!(first.node_id_index, second.node_id_index);
    assert_eq!(first.metadata.per_device_summary, second.metadata.per_device_summary);
}

#[test]
fn rules_never_rewrite_labels() {
    let plant = fixture("plant.json");
    let mut engine = RuleEngine::new();
    for preset in RulePreset::ALL {
        engine.apply_preset(preset);
    }
    let lines = DiagramGenerator::new(engine)
        .generate_for(&plant.devices, &plant.project)
        .command_lines();

    for (id, label) in [
        ("smart-meter-1", "Main Smart Meter"),
        ("general-meter-2", "Feeder Meter"),
        ("memory-meter-3", "Logger"),
        ("auth-meter-4", "Gate Auth"),
        ("transformer-5", "Main Transformer"),
        ("load-6", "HVAC Load"),
    ] {
        let expected = format!("set-property,{id},label,{label}");
        assert!(lines.contains(&expected), "missing {expected}");
    }
}

#[test]
fn anchors_mirror_when_endpoints_swap() {
    let engine = RuleEngine::new();
    let ctx = RuleContext::default();
    let upper = energy_diagram::ir::DiagramNode::infrastructure(NodeKind::Cloud, "cloud-1", Position::new(4.0, 0.0));
    let lower = energy_diagram::ir::DiagramNode::infrastructure(
        NodeKind::OnPremise,
        "onpremise-1",
        Position::new(4.0, 8.0),
    );

    let down = engine.resolve_anchors(&upper, &lower, &ctx).value;
    let up = engine.resolve_anchors(&lower, &upper, &ctx).value;

    assert_eq!(down.source, up.target);
    assert_eq!(down.target, up.source);
    assert_ne!(down.source, down.target);
}

#[test]
fn validation_reports_unsupported_records() {
    let plant = fixture("plant.json");
    let report = validate_devices(&plant.devices);

    assert!(!report.valid);
    assert_eq!(report.summary.total_items, 7);
    assert_eq!(report.summary.valid_items, 6);
    assert_eq!(report.summary.invalid_items, 1);
}

#[test]
fn saved_diagrams_replay_their_commands() {
    let dir = tempfile::tempdir().unwrap();
    let diagram = DiagramGenerator::default().generate(&sample_devices());

    let path = save_diagram(&diagram, "demo", dir.path()).unwrap();
    let name = path.file_name().and_then(|n| n.to_str()).unwrap();
    assert!(name.starts_with("energy-diagram-demo-"));
    assert!(name.ends_with(".json"));
    assert!(!name.contains(':'));

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(saved["executionInstructions"]["executionOrder"].is_string());
    assert_eq!(saved["metadata"]["nodeCount"], 5);

    assert_eq!(load_commands(&path).unwrap(), diagram.commands);
}
