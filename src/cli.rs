use crate::config::load_config;
use crate::diagram_dump::save_diagram;
use crate::generator::{Diagram, DiagramGenerator};
use crate::input::{parse_devices, sample_devices, DeviceInput};
use crate::rules::{RuleCategory, RulePreset};
use crate::validate::validate_devices;
use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "edgen",
    version,
    about = "Energy monitoring topology diagrams as renderer commands"
)]
pub struct Args {
    /// Device records (JSON array or {energyMonitoringData, projectData}), or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Config JSON file (grid, levels, panelOffsets, layoutPolicy, palette, presets)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Rule preset to register: custom, industrial, commercial, criticalFocus
    #[arg(short = 'p', long = "preset")]
    pub presets: Vec<String>,

    /// Project id, overriding the one in the input
    #[arg(long = "projectId")]
    pub project_id: Option<String>,

    /// Also save the diagram as energy-diagram-<projectId>-<timestamp>.json here
    #[arg(long = "saveDir")]
    pub save_dir: Option<PathBuf>,

    /// Print the validation report instead of generating
    #[arg(long = "validate")]
    pub validate: bool,

    /// Print the registered rules and exit
    #[arg(long = "listRules")]
    pub list_rules: bool,

    /// Use the built-in sample devices instead of reading input
    #[arg(long = "sample")]
    pub sample: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Commands,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let mut generator = DiagramGenerator::with_config(&config);
    for name in &args.presets {
        let preset = RulePreset::from_token(name).ok_or_else(|| anyhow!("unknown preset `{}`", name))?;
        let added = generator.engine_mut().apply_preset(preset);
        log::info!("preset {} registered {} rules", preset.as_str(), added);
    }

    if args.list_rules {
        let listing: serde_json::Map<String, serde_json::Value> = RuleCategory::ALL
            .iter()
            .map(|category| {
                let rules = generator.engine().list(*category);
                Ok((category.as_str().to_string(), serde_json::to_value(rules)?))
            })
            .collect::<Result<_>>()?;
        let text = serde_json::to_string_pretty(&listing)?;
        return write_output(&text, args.output.as_deref());
    }

    let mut input = if args.sample {
        DeviceInput {
            devices: sample_devices(),
            ..Default::default()
        }
    } else {
        parse_devices(&read_input(args.input.as_deref())?)?
    };
    if let Some(project_id) = &args.project_id {
        input.project.project_id = Some(project_id.clone());
    }

    if args.validate {
        let report = validate_devices(&input.devices);
        let text = serde_json::to_string_pretty(&report)?;
        return write_output(&text, args.output.as_deref());
    }

    let diagram = generator.generate_for(&input.devices, &input.project);
    if let Some(dir) = &args.save_dir {
        let project_id = input.project.project_id.as_deref().unwrap_or("default");
        let path = save_diagram(&diagram, project_id, dir)?;
        eprintln!("saved {}", path.display());
    }

    let text = render(&diagram, args.output_format)?;
    write_output(&text, args.output.as_deref())
}

fn render(diagram: &Diagram, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(diagram)?,
        OutputFormat::Commands => {
            let mut text = diagram.command_lines().join("\n");
            text.push('\n');
            text
        }
    })
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_flags() {
        let args = Args::try_parse_from([
            "edgen",
            "-i",
            "devices.json",
            "-e",
            "commands",
            "-p",
            "industrial",
            "--preset",
            "commercial",
            "--projectId",
            "p-7",
            "--saveDir",
            "out",
        ])
        .unwrap();
        assert_eq!(args.output_format, OutputFormat::Commands);
        assert_eq!(args.presets, ["industrial", "commercial"]);
        assert_eq!(args.project_id.as_deref(), Some("p-7"));
        assert!(!args.validate);
    }

    #[test]
    fn commands_format_is_line_per_command() {
        let diagram = DiagramGenerator::default().generate(&sample_devices());
        let text = render(&diagram, OutputFormat::Commands).unwrap();
        assert!(text.starts_with("add,cloud,4,0\nadd,onpremise,4,8\n"));
        assert!(text.ends_with("fit\n"));
        assert_eq!(text.lines().count(), diagram.commands.len());
    }
}
