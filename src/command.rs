use crate::error::CommandParseError;
use crate::ir::{Anchor, ConnectionType};
use std::fmt;
use std::str::FromStr;

/// Marks a secondary link drawn next to a primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTag {
    Backup,
    Preferred,
}

impl LinkTag {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkTag::Backup => "backup",
            LinkTag::Preferred => "preferred",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "backup" => Some(LinkTag::Backup),
            "preferred" => Some(LinkTag::Preferred),
            _ => None,
        }
    }
}

/// One instruction for the diagram renderer.
///
/// The textual form (via `Display`) is the comma-separated line the renderer
/// replays. Fields are not escaped; only the trailing value of `set-property`
/// and the `style*` verbs may contain commas.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add {
        node_type: String,
        x: f64,
        y: f64,
    },
    SetProperty {
        node: String,
        key: String,
        value: String,
    },
    Style {
        node: String,
        prop: String,
        value: String,
    },
    Animate {
        node: String,
        animation: String,
    },
    Connect {
        source: String,
        target: String,
        connection: ConnectionType,
        tag: Option<LinkTag>,
        source_anchor: Anchor,
        target_anchor: Anchor,
    },
    Group {
        name: String,
        nodes: Vec<String>,
    },
    StyleGroup {
        name: String,
        prop: String,
        value: String,
    },
    CreateZone {
        name: String,
        nodes: Vec<String>,
    },
    StyleZone {
        name: String,
        prop: String,
        value: String,
    },
    CreateSection {
        name: String,
        nodes: Vec<String>,
    },
    StyleSection {
        name: String,
        prop: String,
        value: String,
    },
    LayoutGroup {
        name: String,
        mode: String,
    },
    Layout {
        mode: String,
    },
    Fit,
}

impl Command {
    pub fn set_property(node: &str, key: &str, value: impl Into<String>) -> Self {
        Command::SetProperty {
            node: node.to_string(),
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn style(node: &str, prop: &str, value: impl Into<String>) -> Self {
        Command::Style {
            node: node.to_string(),
            prop: prop.to_string(),
            value: value.into(),
        }
    }
}

fn fmt_coord(value: f64) -> String {
    if value == 0.0 {
        // avoids "-0"
        return "0".to_string();
    }
    format!("{}", value)
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Add { node_type, x, y } => {
                write!(f, "add,{},{},{}", node_type, fmt_coord(*x), fmt_coord(*y))
            }
            Command::SetProperty { node, key, value } => {
                write!(f, "set-property,{},{},{}", node, key, value)
            }
            Command::Style { node, prop, value } => write!(f, "style,{},{},{}", node, prop, value),
            Command::Animate { node, animation } => write!(f, "animate,{},{}", node, animation),
            Command::Connect {
                source,
                target,
                connection,
                tag,
                source_anchor,
                target_anchor,
            } => match tag {
                Some(tag) => write!(
                    f,
                    "connect,{},{},{},{},{},{}",
                    source,
                    target,
                    connection,
                    tag.as_str(),
                    source_anchor,
                    target_anchor
                ),
                None => write!(
                    f,
                    "connect,{},{},{},{},{}",
                    source, target, connection, source_anchor, target_anchor
                ),
            },
            Command::Group { name, nodes } => write!(f, "group,{},{}", name, nodes.join(",")),
            Command::StyleGroup { name, prop, value } => {
                write!(f, "style-group,{},{},{}", name, prop, value)
            }
            Command::CreateZone { name, nodes } => {
                write!(f, "create-zone,{},{}", name, nodes.join(","))
            }
            Command::StyleZone { name, prop, value } => {
                write!(f, "style-zone,{},{},{}", name, prop, value)
            }
            Command::CreateSection { name, nodes } => {
                write!(f, "create-section,{},{}", name, nodes.join(","))
            }
            Command::StyleSection { name, prop, value } => {
                write!(f, "style-section,{},{},{}", name, prop, value)
            }
            Command::LayoutGroup { name, mode } => write!(f, "layout-group,{},{}", name, mode),
            Command::Layout { mode } => write!(f, "layout,{}", mode),
            Command::Fit => f.write_str("fit"),
        }
    }
}

impl FromStr for Command {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandParseError::Empty);
        }
        let fields: Vec<&str> = line.split(',').collect();
        let verb = fields[0];
        let args = &fields[1..];
        let arity = |expected: &'static str| CommandParseError::Arity {
            verb: verb.to_string(),
            expected,
            found: args.len(),
        };
        let triple = |args: &[&str]| (args[0].to_string(), args[1].to_string(), args[2..].join(","));

        match verb {
            "add" => {
                if args.len() != 3 {
                    return Err(arity("3"));
                }
                Ok(Command::Add {
                    node_type: args[0].to_string(),
                    x: parse_coord(args[1])?,
                    y: parse_coord(args[2])?,
                })
            }
            "set-property" | "style" | "style-group" | "style-zone" | "style-section" => {
                if args.len() < 3 {
                    return Err(arity("3"));
                }
                // values are free text and may themselves hold commas
                let (a, b, c) = triple(args);
                Ok(match verb {
                    "set-property" => Command::SetProperty {
                        node: a,
                        key: b,
                        value: c,
                    },
                    "style" => Command::Style {
                        node: a,
                        prop: b,
                        value: c,
                    },
                    "style-group" => Command::StyleGroup {
                        name: a,
                        prop: b,
                        value: c,
                    },
                    "style-zone" => Command::StyleZone {
                        name: a,
                        prop: b,
                        value: c,
                    },
                    _ => Command::StyleSection {
                        name: a,
                        prop: b,
                        value: c,
                    },
                })
            }
            "animate" => {
                if args.len() != 2 {
                    return Err(arity("2"));
                }
                Ok(Command::Animate {
                    node: args[0].to_string(),
                    animation: args[1].to_string(),
                })
            }
            "connect" => {
                let (tag, anchors) = match args.len() {
                    5 => (None, &args[3..5]),
                    6 => {
                        let tag = LinkTag::from_token(args[3]).ok_or_else(|| {
                            CommandParseError::InvalidField {
                                field: "link tag",
                                value: args[3].to_string(),
                            }
                        })?;
                        (Some(tag), &args[4..6])
                    }
                    _ => return Err(arity("5 or 6")),
                };
                Ok(Command::Connect {
                    source: args[0].to_string(),
                    target: args[1].to_string(),
                    connection: ConnectionType::from_token(args[2]).ok_or_else(|| {
                        CommandParseError::InvalidField {
                            field: "connection type",
                            value: args[2].to_string(),
                        }
                    })?,
                    tag,
                    source_anchor: parse_anchor(anchors[0])?,
                    target_anchor: parse_anchor(anchors[1])?,
                })
            }
            "group" | "create-zone" | "create-section" => {
                if args.len() < 2 {
                    return Err(arity("at least 2"));
                }
                let name = args[0].to_string();
                let nodes = args[1..].iter().map(|s| s.to_string()).collect();
                Ok(match verb {
                    "group" => Command::Group { name, nodes },
                    "create-zone" => Command::CreateZone { name, nodes },
                    _ => Command::CreateSection { name, nodes },
                })
            }
            "layout-group" => {
                if args.len() != 2 {
                    return Err(arity("2"));
                }
                Ok(Command::LayoutGroup {
                    name: args[0].to_string(),
                    mode: args[1].to_string(),
                })
            }
            "layout" => {
                if args.len() != 1 {
                    return Err(arity("1"));
                }
                Ok(Command::Layout {
                    mode: args[0].to_string(),
                })
            }
            "fit" => {
                if !args.is_empty() {
                    return Err(arity("0"));
                }
                Ok(Command::Fit)
            }
            other => Err(CommandParseError::UnknownVerb(other.to_string())),
        }
    }
}

fn parse_coord(value: &str) -> Result<f64, CommandParseError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| CommandParseError::InvalidField {
            field: "coordinate",
            value: value.to_string(),
        })
}

fn parse_anchor(value: &str) -> Result<Anchor, CommandParseError> {
    Anchor::from_token(value).ok_or_else(|| CommandParseError::InvalidField {
        field: "anchor",
        value: value.to_string(),
    })
}
