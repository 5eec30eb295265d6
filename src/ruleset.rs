//! Ruleset (preferences) describing allowed structure and metadata types.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesetError {
    #[error("ruleset {path} could not be read: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ruleset is malformed: {0}")]
    Malformed(String),
    #[error("invalid ruleset name '{0}'")]
    InvalidName(String),
}

/// How a metadata field is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    Input,
    Select1,
    Select,
    Textarea,
    Readonly,
}

impl DisplayKind {
    fn from_attribute(value: Option<&str>) -> Self {
        match value.map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("select1") => DisplayKind::Select1,
            Some("select") => DisplayKind::Select,
            Some("textarea") => DisplayKind::Textarea,
            Some("readonly") => DisplayKind::Readonly,
            _ => DisplayKind::Input,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataType {
    pub name: String,
    pub label: String,
    pub is_person: bool,
    pub display: DisplayKind,
    pub options: Vec<SelectOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowedMetadata {
    pub name: String,
    /// Cardinality: `1m` exactly one, `1o` at most one, `+` one or more, `*` any.
    pub num: String,
    pub default_display: bool,
}

impl AllowedMetadata {
    pub fn is_repeatable(&self) -> bool {
        matches!(self.num.as_str(), "*" | "+")
    }

    pub fn is_required(&self) -> bool {
        matches!(self.num.as_str(), "1m" | "+")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocStructType {
    pub name: String,
    pub label: String,
    pub top_struct: bool,
    pub anchor: bool,
    pub allowed_children: Vec<String>,
    pub metadata: Vec<AllowedMetadata>,
}

#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    metadata_types: HashMap<String, MetadataType>,
    docstruct_types: Vec<DocStructType>,
}

impl Ruleset {
    pub fn parse(text: &str) -> Result<Self, RulesetError> {
        let xml = roxmltree::Document::parse(text).map_err(|e| RulesetError::Malformed(e.to_string()))?;
        let root = xml.root_element();
        if !root.has_tag_name("Preferences") {
            return Err(RulesetError::Malformed(format!(
                "expected <Preferences>, found <{}>",
                root.tag_name().name()
            )));
        }

        let mut ruleset = Ruleset::default();
        for node in root.children().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "MetadataType" => {
                    let name = child_text(node, "Name")
                        .ok_or_else(|| RulesetError::Malformed("MetadataType without <Name>".into()))?;
                    let options = node
                        .children()
                        .filter(|n| n.has_tag_name("option"))
                        .map(|n| {
                            let label = n.text().unwrap_or("").trim().to_string();
                            let value = n.attribute("value").map(str::to_string).unwrap_or_else(|| label.clone());
                            SelectOption { value, label }
                        })
                        .collect();
                    let metadata_type = MetadataType {
                        label: child_text(node, "label").unwrap_or_else(|| name.clone()),
                        is_person: node.attribute("type") == Some("person"),
                        display: DisplayKind::from_attribute(node.attribute("display")),
                        options,
                        name: name.clone(),
                    };
                    ruleset.metadata_types.insert(name, metadata_type);
                }
                "DocStrctType" => {
                    let name = child_text(node, "Name")
                        .ok_or_else(|| RulesetError::Malformed("DocStrctType without <Name>".into()))?;
                    let allowed_children = node
                        .children()
                        .filter(|n| n.has_tag_name("allowedchildtype"))
                        .filter_map(|n| n.text().map(|t| t.trim().to_string()))
                        .collect();
                    let metadata = node
                        .children()
                        .filter(|n| n.has_tag_name("metadata"))
                        .filter_map(|n| {
                            n.text().map(|t| AllowedMetadata {
                                name: t.trim().to_string(),
                                num: n.attribute("num").unwrap_or("*").to_string(),
                                default_display: flag(n.attribute("DefaultDisplay")),
                            })
                        })
                        .collect();
                    ruleset.docstruct_types.push(DocStructType {
                        label: child_text(node, "label").unwrap_or_else(|| name.clone()),
                        top_struct: flag(node.attribute("topStruct")),
                        anchor: flag(node.attribute("anchor")),
                        allowed_children,
                        metadata,
                        name,
                    });
                }
                _ => {}
            }
        }
        Ok(ruleset)
    }

    pub fn load(path: &Path) -> Result<Self, RulesetError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| RulesetError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&text)
    }

    pub fn docstruct_type(&self, name: &str) -> Option<&DocStructType> {
        self.docstruct_types.iter().find(|t| t.name == name)
    }

    pub fn docstruct_types(&self) -> &[DocStructType] {
        &self.docstruct_types
    }

    pub fn metadata_type(&self, name: &str) -> Option<&MetadataType> {
        self.metadata_types.get(name)
    }

    pub fn is_child_allowed(&self, parent: &str, child: &str) -> bool {
        self.docstruct_type(parent)
            .map(|t| t.allowed_children.iter().any(|c| c == child))
            .unwrap_or(false)
    }

    /// Types that may be added below `parent`, in ruleset order.
    pub fn addable_types(&self, parent: &str) -> Vec<&DocStructType> {
        let Some(parent) = self.docstruct_type(parent) else {
            return Vec::new();
        };
        parent.allowed_children.iter().filter_map(|name| self.docstruct_type(name)).collect()
    }

    pub fn allowed_metadata(&self, docstruct: &str) -> &[AllowedMetadata] {
        self.docstruct_type(docstruct).map(|t| t.metadata.as_slice()).unwrap_or(&[])
    }

    pub fn is_metadata_allowed(&self, docstruct: &str, metadata: &str) -> bool {
        self.allowed_metadata(docstruct).iter().any(|m| m.name == metadata)
    }

    /// Metadata types shown on a fresh element of `docstruct`.
    pub fn default_display(&self, docstruct: &str) -> Vec<&AllowedMetadata> {
        self.allowed_metadata(docstruct).iter().filter(|m| m.default_display).collect()
    }

    pub fn is_anchor(&self, docstruct: &str) -> bool {
        self.docstruct_type(docstruct).map(|t| t.anchor).unwrap_or(false)
    }
}

fn child_text(node: roxmltree::Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn flag(value: Option<&str>) -> bool {
    value.map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Parsed rulesets keyed by file name.
pub struct RulesetCache {
    dir: PathBuf,
    entries: Mutex<LruCache<String, Arc<Ruleset>>>,
}

impl RulesetCache {
    pub fn new(dir: impl Into<PathBuf>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { dir: dir.into(), entries: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn get(&self, name: &str) -> Result<Arc<Ruleset>, RulesetError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(RulesetError::InvalidName(name.to_string()));
        }
        if let Some(hit) = self.entries.lock().get(name) {
            return Ok(hit.clone());
        }
        let ruleset = Arc::new(Ruleset::load(&self.dir.join(name))?);
        tracing::debug!("Loaded ruleset {}", name);
        self.entries.lock().put(name.to_string(), ruleset.clone());
        Ok(ruleset)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
