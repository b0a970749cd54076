#[cfg(feature = "cli")]
pub mod cli;
pub mod command;
pub mod config;
pub mod diagram_dump;
pub mod error;
pub mod generator;
pub mod input;
pub mod ir;
pub mod rules;
pub mod theme;
pub mod validate;

#[cfg(feature = "cli")]
pub use cli::run;
pub use command::Command;
pub use config::{load_config, Config};
pub use generator::{Diagram, DiagramGenerator, ProjectInfo};
pub use ir::DeviceRecord;
pub use rules::{RuleCategory, RuleEngine, RulePreset};
pub use validate::validate_devices;
