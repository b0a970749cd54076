use crate::command::Command;
use crate::generator::{Diagram, DiagramMetadata};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInstructions {
    pub description: String,
    pub command_format: String,
    pub execution_order: String,
}

impl Default for ExecutionInstructions {
    fn default() -> Self {
        Self {
            description: "Execute commands in sequence on the frontend diagram engine".to_string(),
            command_format: "Each command is one comma-separated line of the diagram command language"
                .to_string(),
            execution_order: "Commands must be executed in the order provided".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiagramDump<'a> {
    commands: Vec<String>,
    metadata: &'a DiagramMetadata,
    execution_instructions: ExecutionInstructions,
}

/// Only the parts needed to replay a saved diagram.
#[derive(Debug, Deserialize)]
struct SavedCommands {
    commands: Vec<String>,
}

/// `energy-diagram-<projectId>-<timestamp>.json`, with `:` and `.` made file-name safe.
pub fn dump_file_name(project_id: &str, timestamp: &str) -> String {
    let stamp = timestamp.replace([':', '.'], "-");
    format!("energy-diagram-{}-{}.json", project_id, stamp)
}

/// Writes `{commands, metadata, executionInstructions}` as pretty JSON into `dir`,
/// creating it when missing. Returns the written path.
pub fn save_diagram(diagram: &Diagram, project_id: &str, dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(dump_file_name(project_id, &chrono::Utc::now().to_rfc3339()));

    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let writer = BufWriter::new(file);
    let dump = DiagramDump {
        commands: diagram.command_lines(),
        metadata: &diagram.metadata,
        execution_instructions: ExecutionInstructions::default(),
    };
    serde_json::to_writer_pretty(writer, &dump)?;
    log::info!("saved diagram to {}", path.display());
    Ok(path)
}

/// Reads the command list back from a file written by [`save_diagram`].
pub fn load_commands(path: &Path) -> anyhow::Result<Vec<Command>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let saved: SavedCommands = serde_json::from_reader(BufReader::new(file))?;
    saved
        .commands
        .iter()
        .enumerate()
        .map(|(line, text)| {
            text.parse::<Command>()
                .with_context(|| format!("command {} in {}", line + 1, path.display()))
        })
        .collect()
}
