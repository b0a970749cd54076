use crate::ir::NumberOrString;
use crate::rules::{LayoutPolicy, RulePreset};
use crate::theme::Palette;
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Grid geometry in relative units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridConfig {
    pub cell_width: f64,
    pub cell_height: f64,
    pub start_x: f64,
    pub start_y: f64,
    pub level_spacing: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_width: 6.0,
            cell_height: 4.0,
            start_x: 0.0,
            start_y: 0.0,
            level_spacing: 8.0,
        }
    }
}

/// Vertical bands: cloud on top, gateway in the middle, devices at the bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Levels {
    pub top: f64,
    pub middle: f64,
    pub bottom: f64,
}

impl Levels {
    pub fn from_grid(grid: &GridConfig) -> Self {
        Self {
            top: grid.start_y,
            middle: grid.start_y + grid.level_spacing,
            bottom: grid.start_y + 2.0 * grid.level_spacing,
        }
    }
}

impl Default for Levels {
    fn default() -> Self {
        Self::from_grid(&GridConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub grid: GridConfig,
    pub levels: Levels,
    pub panel_offsets: BTreeMap<String, f64>,
    pub layout_policy: LayoutPolicy,
    pub palette: Palette,
    pub presets: Vec<RulePreset>,
}

impl Default for Config {
    fn default() -> Self {
        let grid = GridConfig::default();
        Self {
            levels: Levels::from_grid(&grid),
            grid,
            panel_offsets: BTreeMap::new(),
            layout_policy: LayoutPolicy::default(),
            palette: Palette::standard(),
            presets: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridConfigFile {
    cell_width: Option<NumberOrString>,
    cell_height: Option<NumberOrString>,
    start_x: Option<NumberOrString>,
    start_y: Option<NumberOrString>,
    level_spacing: Option<NumberOrString>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LevelsFile {
    top: Option<NumberOrString>,
    middle: Option<NumberOrString>,
    bottom: Option<NumberOrString>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaletteFile {
    cloud: Option<String>,
    onpremise: Option<String>,
    smart_meter: Option<String>,
    general_meter: Option<String>,
    memory_meter: Option<String>,
    auth_meter: Option<String>,
    transformer: Option<String>,
    load: Option<String>,
    infrastructure_border: Option<String>,
    fallback: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    grid: Option<GridConfigFile>,
    levels: Option<LevelsFile>,
    panel_offsets: Option<BTreeMap<String, NumberOrString>>,
    layout_policy: Option<String>,
    palette: Option<PaletteFile>,
    presets: Option<Vec<String>>,
}

fn number(field: &str, value: Option<NumberOrString>) -> anyhow::Result<Option<f64>> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .as_f64()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| anyhow!("config: `{}` is not a number: {}", field, raw.as_string())),
    }
}

fn set_number(target: &mut f64, field: &str, value: Option<NumberOrString>) -> anyhow::Result<()> {
    if let Some(v) = number(field, value)? {
        *target = v;
    }
    Ok(())
}

fn parse_config_file(contents: &str) -> anyhow::Result<ConfigFile> {
    match serde_json::from_str::<ConfigFile>(contents) {
        Ok(parsed) => Ok(parsed),
        Err(strict) => json5::from_str::<ConfigFile>(contents)
            .map_err(|_| anyhow!(strict))
            .context("config is neither JSON nor JSON5"),
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let parsed = parse_config_file(&contents)?;

    if let Some(grid) = parsed.grid {
        set_number(&mut config.grid.cell_width, "grid.cellWidth", grid.cell_width)?;
        set_number(&mut config.grid.cell_height, "grid.cellHeight", grid.cell_height)?;
        set_number(&mut config.grid.start_x, "grid.startX", grid.start_x)?;
        set_number(&mut config.grid.start_y, "grid.startY", grid.start_y)?;
        set_number(&mut config.grid.level_spacing, "grid.levelSpacing", grid.level_spacing)?;
    }

    // Levels follow the final grid unless pinned explicitly.
    config.levels = Levels::from_grid(&config.grid);
    if let Some(levels) = parsed.levels {
        set_number(&mut config.levels.top, "levels.top", levels.top)?;
        set_number(&mut config.levels.middle, "levels.middle", levels.middle)?;
        set_number(&mut config.levels.bottom, "levels.bottom", levels.bottom)?;
    }

    if let Some(offsets) = parsed.panel_offsets {
        for (panel, raw) in offsets {
            let field = format!("panelOffsets.{}", panel);
            if let Some(dx) = number(&field, Some(raw))? {
                config.panel_offsets.insert(panel, dx);
            }
        }
    }

    if let Some(policy) = parsed.layout_policy.as_deref() {
        config.layout_policy = LayoutPolicy::from_token(policy)
            .ok_or_else(|| anyhow!("config: unknown layoutPolicy `{}`", policy))?;
    }

    if let Some(palette) = parsed.palette {
        let target = &mut config.palette;
        let overrides = [
            (&mut target.cloud, palette.cloud),
            (&mut target.onpremise, palette.onpremise),
            (&mut target.smart_meter, palette.smart_meter),
            (&mut target.general_meter, palette.general_meter),
            (&mut target.memory_meter, palette.memory_meter),
            (&mut target.auth_meter, palette.auth_meter),
            (&mut target.transformer, palette.transformer),
            (&mut target.load, palette.load),
            (&mut target.infrastructure_border, palette.infrastructure_border),
            (&mut target.fallback, palette.fallback),
        ];
        for (slot, value) in overrides {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }

    if let Some(presets) = parsed.presets {
        for name in presets {
            let preset = RulePreset::from_token(&name)
                .ok_or_else(|| anyhow!("config: unknown preset `{}`", name))?;
            if !config.presets.contains(&preset) {
                config.presets.push(preset);
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_path_gives_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.grid.cell_width, 6.0);
        assert_eq!(config.levels, Levels { top: 0.0, middle: 8.0, bottom: 16.0 });
        assert_eq!(config.layout_policy, LayoutPolicy::LastMatch);
    }

    #[test]
    fn levels_follow_grid_overrides() {
        let file = write_config(
            r##"{"grid": {"startY": 2, "levelSpacing": "10"}, "levels": {"bottom": 30},
                "panelOffsets": {"Panel A": 3}, "layoutPolicy": "combine",
                "palette": {"smartMeter": "#000000"}, "presets": ["industrial", "industrial"]}"##,
        );
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.levels, Levels { top: 2.0, middle: 12.0, bottom: 30.0 });
        assert_eq!(config.panel_offsets.get("Panel A"), Some(&3.0));
        assert_eq!(config.layout_policy, LayoutPolicy::Combine);
        assert_eq!(config.palette.smart_meter, "#000000");
        assert_eq!(config.palette.load, "#E91E63");
        assert_eq!(config.presets, vec![RulePreset::Industrial]);
    }

    #[test]
    fn accepts_json5() {
        let file = write_config("{ grid: { cellWidth: 10, }, // wide cells\n }");
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.grid.cell_width, 10.0);
    }

    #[test]
    fn rejects_unknown_values() {
        let file = write_config(r#"{"layoutPolicy": "random"}"#);
        assert!(load_config(Some(file.path())).is_err());
        let file = write_config(r#"{"grid": {"cellWidth": "wide"}}"#);
        assert!(load_config(Some(file.path())).is_err());
    }
}
