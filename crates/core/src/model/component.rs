use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelensError};
use crate::ids::ComponentId;

/// Coarse architectural tier. `Other` is the filter layer: its components
/// never show up in a trace timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Layer {
    Controller,
    Service,
    Repository,
    Component,
    Infrastructure,
    Other,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Controller => "CONTROLLER",
            Self::Service => "SERVICE",
            Self::Repository => "REPOSITORY",
            Self::Component => "COMPONENT",
            Self::Infrastructure => "INFRASTRUCTURE",
            Self::Other => "OTHER",
        }
    }

    pub fn is_filtered(self) -> bool {
        matches!(self, Self::Other)
    }
}

impl FromStr for Layer {
    type Err = TracelensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONTROLLER" => Ok(Self::Controller),
            "SERVICE" => Ok(Self::Service),
            "REPOSITORY" => Ok(Self::Repository),
            "COMPONENT" => Ok(Self::Component),
            "INFRASTRUCTURE" | "INFRA" => Ok(Self::Infrastructure),
            "OTHER" => Ok(Self::Other),
            _ => Err(TracelensError::Parse(format!("unknown layer: {s}"))),
        }
    }
}

impl TryFrom<String> for Layer {
    type Error = TracelensError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Component {
    pub id: ComponentId,
    pub project_id: String,
    /// Simple class name, the part of a logger after its last `.`.
    pub name: String,
    pub package_name: String,
    pub layer: Layer,
}

impl Component {
    pub fn to_ref(&self) -> ComponentRef {
        ComponentRef {
            component_id: self.id,
            name: self.name.clone(),
            layer: self.layer,
        }
    }
}

/// Registration payload; the registry assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewComponent {
    pub project_id: String,
    pub name: String,
    pub package_name: String,
    pub layer: Layer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    pub component_id: ComponentId,
    pub name: String,
    pub layer: Layer,
}

/// Stored "calls" relation. Storage does not enforce uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyEdge {
    pub project_id: String,
    pub from: ComponentId,
    pub to: ComponentId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub from: ComponentId,
    pub to: ComponentId,
}

/// A relation reported by a dependency collector, keyed by component name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedRelation {
    pub from_name: String,
    pub to_name: String,
}
