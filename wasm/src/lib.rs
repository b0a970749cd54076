use energy_diagram::input::parse_devices;
use energy_diagram::rules::LayoutPolicy;
use energy_diagram::{DiagramGenerator, RulePreset, validate_devices};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateOptions {
    presets: Option<Vec<String>>,
    project_id: Option<String>,
    project_name: Option<String>,
    layout_policy: Option<String>,
}

fn build_generator(options: &GenerateOptions) -> Result<DiagramGenerator, String> {
    let mut generator = DiagramGenerator::default();
    for name in options.presets.iter().flatten() {
        let preset = RulePreset::from_token(name).ok_or_else(|| format!("unknown preset `{name}`"))?;
        generator.engine_mut().apply_preset(preset);
    }
    if let Some(policy) = &options.layout_policy {
        let policy =
            LayoutPolicy::from_token(policy).ok_or_else(|| format!("unknown layout policy `{policy}`"))?;
        generator.engine_mut().set_layout_policy(policy);
    }
    Ok(generator)
}

fn generate(devices_json: &str, options: GenerateOptions) -> Result<String, String> {
    let generator = build_generator(&options)?;
    let mut input = parse_devices(devices_json).map_err(|error| error.to_string())?;
    if options.project_id.is_some() {
        input.project.project_id = options.project_id;
    }
    if options.project_name.is_some() {
        input.project.project_name = options.project_name;
    }
    let diagram = generator.generate_for(&input.devices, &input.project);
    serde_json::to_string(&diagram).map_err(|error| error.to_string())
}

#[wasm_bindgen]
pub fn generate_energy_diagram(devices_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<GenerateOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        GenerateOptions::default()
    };
    generate(devices_json, options).map_err(|error| JsValue::from_str(&error))
}

#[wasm_bindgen]
pub fn validate_energy_devices(devices_json: &str) -> Result<String, JsValue> {
    let input = parse_devices(devices_json).map_err(|error| JsValue::from_str(&error.to_string()))?;
    serde_json::to_string(&validate_devices(&input.devices)).map_err(|error| JsValue::from_str(&error.to_string()))
}

#[cfg(test)]
mod tests {
    use crate::{GenerateOptions, generate};

    #[test]
    fn generates_with_presets_and_project() {
        let devices = r#"[{"deviceType": "smart-meter", "label": "Main", "capacity": 4000}]"#;
        let options = GenerateOptions {
            presets: Some(vec!["industrial".to_string()]),
            project_id: Some("site-9".to_string()),
            ..Default::default()
        };

        let json = generate(devices, options).expect("diagram should generate");

        assert!(json.contains("add,smart-meter"));
        assert!(json.contains("site-9"));
    }

    #[test]
    fn rejects_unknown_presets() {
        let options = GenerateOptions {
            presets: Some(vec!["residential".to_string()]),
            ..Default::default()
        };
        assert!(generate("[]", options).is_err());
    }
}
