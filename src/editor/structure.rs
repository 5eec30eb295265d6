//! Logical tree mutations, tree view and metadata editing.

use serde::{Deserialize, Serialize};

use super::{seed_defaults, validation, AddMode, EditorError, EditorPanel, EditorResult, View};
use crate::document::{AuthorityRef, DigitalDocument, Metadata, NodeId, Person, LOGICAL_PAGE_NUMBER, LOGICAL_PHYSICAL, TITLE};
use crate::ruleset::{DisplayKind, MetadataType, SelectOption};

use super::pages::PageSelector;
use super::Editor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddPosition {
    Before,
    After,
    FirstChild,
    LastChild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum MoveTarget {
    Up,
    Down,
    To { parent: NodeId },
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub type_name: String,
    pub label: String,
    pub title: Option<String>,
    pub first_page: Option<String>,
    pub last_page: Option<String>,
    pub current: bool,
}

/// One editable field of the current element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum FieldWidget {
    Edit { index: usize, type_name: String, label: String, value: String, readonly: bool },
    DropDown { index: usize, type_name: String, label: String, value: String, options: Vec<SelectOption> },
    ListBox { index: usize, type_name: String, label: String, selected: Vec<String>, options: Vec<SelectOption> },
    Bevel { index: usize, type_name: String, label: String, value: String },
    PersonGroup { index: usize, role: String, label: String, first_name: String, last_name: String, authority: Option<AuthorityRef> },
}

impl FieldWidget {
    fn for_metadata(index: usize, metadata: &Metadata, kind: Option<&MetadataType>) -> Self {
        let type_name = metadata.type_name.clone();
        let label = kind.map(|k| k.label.clone()).unwrap_or_else(|| type_name.clone());
        let value = metadata.value.clone();
        let options = kind.map(|k| k.options.clone()).unwrap_or_default();
        match kind.map(|k| k.display).unwrap_or(DisplayKind::Input) {
            DisplayKind::Input => FieldWidget::Edit { index, type_name, label, value, readonly: false },
            DisplayKind::Readonly => FieldWidget::Edit { index, type_name, label, value, readonly: true },
            DisplayKind::Select1 => FieldWidget::DropDown { index, type_name, label, value, options },
            DisplayKind::Select => {
                let selected = value.split(';').map(str::trim).filter(|v| !v.is_empty()).map(str::to_string).collect();
                FieldWidget::ListBox { index, type_name, label, selected, options }
            }
            DisplayKind::Textarea => FieldWidget::Bevel { index, type_name, label, value },
        }
    }

    fn for_person(index: usize, person: &Person, kind: Option<&MetadataType>) -> Self {
        FieldWidget::PersonGroup {
            index,
            role: person.role.clone(),
            label: kind.map(|k| k.label.clone()).unwrap_or_else(|| person.role.clone()),
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            authority: person.authority.clone(),
        }
    }

    /// Normalizes `value` for this widget or explains why it does not fit.
    pub fn accept(&self, value: &str) -> Result<String, String> {
        let known = |options: &[SelectOption], v: &str| options.is_empty() || options.iter().any(|o| o.value == v);
        match self {
            FieldWidget::Edit { readonly: true, type_name, .. } => Err(format!("{} is read-only", type_name)),
            FieldWidget::Edit { .. } | FieldWidget::Bevel { .. } => Ok(value.to_string()),
            FieldWidget::DropDown { options, .. } => {
                if value.is_empty() || known(options, value) {
                    Ok(value.to_string())
                } else {
                    Err(format!("'{}' is not a valid option", value))
                }
            }
            FieldWidget::ListBox { options, .. } => {
                let values: Vec<&str> = value.split(';').map(str::trim).filter(|v| !v.is_empty()).collect();
                match values.iter().find(|v| !known(options, v)) {
                    Some(bad) => Err(format!("'{}' is not a valid option", bad)),
                    None => Ok(values.join(";")),
                }
            }
            FieldWidget::PersonGroup { .. } => Err("person fields are edited through the person form".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPerson {
    pub role: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub authority: Option<AuthorityRef>,
}

impl Editor {
    /// The logical tree in pre-order with the page range of every element.
    pub fn tree(&self) -> EditorResult<Vec<TreeEntry>> {
        let doc = self.doc()?;
        let Some(root) = doc.logical_root() else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = doc.get(id)?;
            let pages = sorted_page_targets(doc, id);
            let label_of = |page: &NodeId| doc.first_value(*page, LOGICAL_PAGE_NUMBER).map(str::to_string);
            entries.push(TreeEntry {
                id,
                parent: node.parent,
                depth,
                type_name: node.type_name.clone(),
                label: self
                    .ruleset
                    .docstruct_type(&node.type_name)
                    .map(|t| t.label.clone())
                    .unwrap_or_else(|| node.type_name.clone()),
                title: node.first_value(TITLE).filter(|t| !t.is_empty()).map(str::to_string),
                first_page: pages.first().and_then(label_of),
                last_page: pages.last().and_then(label_of),
                current: self.current == Some(id),
            });
            stack.extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
        }
        Ok(entries)
    }

    /// Selects the element shown on the metadata panel.
    pub fn select(&mut self, id: NodeId) -> EditorResult<View> {
        let doc = self.doc()?;
        let is_logical = doc.logical_root().map(|root| root == id || doc.is_ancestor(root, id)).unwrap_or(false);
        if !is_logical {
            return Err(EditorError::NotFound(format!("structure element {}", id)));
        }
        self.current = Some(id);
        self.add_mode = AddMode::None;
        Ok(View::StructureTree)
    }

    /// Adds a new element of `type_name` relative to the current one, optionally
    /// assigning a page range to it.
    pub fn add_node(
        &mut self,
        type_name: &str,
        position: AddPosition,
        first_page: Option<&PageSelector>,
        last_page: Option<&PageSelector>,
    ) -> EditorResult<NodeId> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;

        let (parent, index) = match position {
            AddPosition::FirstChild => (current, Some(0)),
            AddPosition::LastChild => (current, None),
            AddPosition::Before | AddPosition::After => {
                let parent = doc
                    .parent(current)
                    .ok_or_else(|| EditorError::NotAllowed("the root element cannot have siblings".to_string()))?;
                let at = doc.children(parent).iter().position(|&c| c == current).unwrap_or(0);
                (parent, Some(if position == AddPosition::After { at + 1 } else { at }))
            }
        };
        let parent_type = doc.get(parent)?.type_name.clone();
        if !self.ruleset.is_child_allowed(&parent_type, type_name) {
            return Err(EditorError::NotAllowed(format!("{} is not allowed below {}", type_name, parent_type)));
        }
        let range = match (first_page, last_page) {
            (Some(first), Some(last)) => Some(super::pages::resolve_range(doc, first, last)?),
            (None, None) => None,
            _ => return Err(validation("pages", "first and last page must be given together")),
        };

        let node = doc.create(type_name);
        doc.attach(parent, node, index)?;
        seed_defaults(doc, &self.ruleset, node)?;
        if let Some(range) = range {
            doc.references_mut().replace_targets(node, LOGICAL_PHYSICAL, &range);
        }
        tracing::debug!("Added {} {} below {}", type_name, node, parent);
        self.current = Some(node);
        self.add_mode = AddMode::None;
        self.finish_mutation()?;
        Ok(node)
    }

    /// Moves the current element among its siblings or below a new parent.
    pub fn move_node(&mut self, target: MoveTarget) -> EditorResult<View> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let Some(parent) = doc.parent(current) else {
            return Err(EditorError::NotAllowed("the root element cannot be moved".to_string()));
        };
        let position = doc.children(parent).iter().position(|&c| c == current).unwrap_or(0);

        match target {
            MoveTarget::Up => {
                if position == 0 {
                    return Ok(View::Stay);
                }
                doc.detach(current)?;
                doc.attach(parent, current, Some(position - 1))?;
            }
            MoveTarget::Down => {
                if position + 1 >= doc.children(parent).len() {
                    return Ok(View::Stay);
                }
                doc.detach(current)?;
                doc.attach(parent, current, Some(position + 1))?;
            }
            MoveTarget::To { parent: new_parent } => {
                let new_parent_type = doc.get(new_parent)?.type_name.clone();
                let node_type = doc.get(current)?.type_name.clone();
                if !self.ruleset.is_child_allowed(&new_parent_type, &node_type) {
                    return Err(EditorError::NotAllowed(format!(
                        "{} is not allowed below {}",
                        node_type, new_parent_type
                    )));
                }
                let is_logical = doc
                    .logical_root()
                    .map(|root| root == new_parent || doc.is_ancestor(root, new_parent))
                    .unwrap_or(false);
                if !is_logical || new_parent == current || doc.is_ancestor(current, new_parent) {
                    return Err(EditorError::NotAllowed(format!("cannot move {} below {}", current, new_parent)));
                }
                doc.reparent(current, new_parent, None)?;
            }
        }
        self.finish_mutation()?;
        Ok(View::StructureTree)
    }

    /// Changes the type of the current element.
    pub fn change_type(&mut self, new_type: &str) -> EditorResult<View> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let Some(target) = self.ruleset.docstruct_type(new_type) else {
            return Err(EditorError::NotAllowed(format!("unknown structure type {}", new_type)));
        };
        match doc.parent(current) {
            Some(parent) => {
                let parent_type = &doc.get(parent)?.type_name;
                if !self.ruleset.is_child_allowed(parent_type, new_type) {
                    return Err(EditorError::NotAllowed(format!("{} is not allowed below {}", new_type, parent_type)));
                }
            }
            None if !target.top_struct => {
                return Err(EditorError::NotAllowed(format!("{} cannot be a top-level element", new_type)));
            }
            None => {}
        }
        for &child in doc.children(current) {
            let child_type = &doc.get(child)?.type_name;
            if !target.allowed_children.iter().any(|c| c == child_type) {
                return Err(EditorError::NotAllowed(format!("{} is not allowed below {}", child_type, new_type)));
            }
        }

        doc.get_mut(current)?.type_name = new_type.to_string();
        seed_defaults(doc, &self.ruleset, current)?;
        self.finish_mutation()?;
        Ok(View::StructureTree)
    }

    /// Deletes the current element with its subtree; its parent becomes current.
    pub fn delete_node(&mut self) -> EditorResult<View> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let Some(parent) = doc.parent(current) else {
            return Err(EditorError::NotAllowed("the root element cannot be deleted".to_string()));
        };
        let removed = doc.remove_subtree(current)?;
        tracing::debug!("Deleted {} ({} elements)", current, removed.len());
        self.current = Some(parent);
        self.finish_mutation()?;
        Ok(View::StructureTree)
    }

    /// Widgets for the metadata and persons of the current element.
    pub fn fields(&self) -> EditorResult<Vec<FieldWidget>> {
        let doc = self.doc()?;
        let node = doc.get(self.current_node()?)?;
        let mut widgets: Vec<FieldWidget> = node
            .metadata
            .iter()
            .enumerate()
            .map(|(i, m)| FieldWidget::for_metadata(i, m, self.ruleset.metadata_type(&m.type_name)))
            .collect();
        widgets.extend(
            node.persons
                .iter()
                .enumerate()
                .map(|(i, p)| FieldWidget::for_person(i, p, self.ruleset.metadata_type(&p.role))),
        );
        Ok(widgets)
    }

    pub fn begin_add(&mut self, mode: AddMode) -> EditorResult<View> {
        self.require_loaded()?;
        self.add_mode = mode;
        Ok(View::Stay)
    }

    pub fn add_metadata(&mut self, type_name: &str, value: &str) -> EditorResult<View> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let node = doc.get_mut(current)?;
        let Some(allowed) = self.ruleset.allowed_metadata(&node.type_name).iter().find(|m| m.name == type_name) else {
            return Err(EditorError::NotAllowed(format!("{} is not allowed on {}", type_name, node.type_name)));
        };
        let kind = self.ruleset.metadata_type(type_name);
        if kind.map(|k| k.is_person).unwrap_or(false) {
            return Err(validation("type", format!("{} is a person role", type_name)));
        }
        let existing = node.metadata.iter().position(|m| m.type_name == type_name);
        let value = FieldWidget::for_metadata(0, &Metadata { type_name: type_name.to_string(), value: String::new() }, kind)
            .accept(value)
            .map_err(|message| validation("value", message))?;
        match existing {
            // An empty placeholder is filled instead of adding a second entry.
            Some(i) if node.metadata[i].value.is_empty() => node.metadata[i].value = value,
            Some(_) if !allowed.is_repeatable() => {
                return Err(validation("type", format!("{} may occur only once", type_name)));
            }
            _ => node.metadata.push(Metadata { type_name: type_name.to_string(), value }),
        }
        self.add_mode = AddMode::None;
        self.finish_mutation()?;
        Ok(View::Stay)
    }

    pub fn update_metadata(&mut self, index: usize, value: &str) -> EditorResult<View> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let node = doc.get_mut(current)?;
        let metadata = node
            .metadata
            .get(index)
            .ok_or_else(|| EditorError::NotFound(format!("metadata #{}", index)))?;
        let widget = FieldWidget::for_metadata(index, metadata, self.ruleset.metadata_type(&metadata.type_name));
        let value = widget.accept(value).map_err(|message| validation("value", message))?;
        node.metadata[index].value = value;
        self.finish_mutation()?;
        Ok(View::Stay)
    }

    pub fn delete_metadata(&mut self, index: usize) -> EditorResult<View> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let node = doc.get_mut(current)?;
        if index >= node.metadata.len() {
            return Err(EditorError::NotFound(format!("metadata #{}", index)));
        }
        node.metadata.remove(index);
        self.finish_mutation()?;
        Ok(View::Stay)
    }

    pub fn add_person(&mut self, person: NewPerson) -> EditorResult<View> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let node = doc.get_mut(current)?;
        let is_person = self.ruleset.metadata_type(&person.role).map(|k| k.is_person).unwrap_or(false);
        if !is_person || !self.ruleset.is_metadata_allowed(&node.type_name, &person.role) {
            return Err(EditorError::NotAllowed(format!("{} is not allowed on {}", person.role, node.type_name)));
        }
        let entry = Person {
            role: person.role,
            first_name: person.first_name.trim().to_string(),
            last_name: person.last_name.trim().to_string(),
            authority: person.authority,
        };
        match node.persons.iter_mut().find(|p| p.role == entry.role && p.is_empty()) {
            Some(placeholder) => *placeholder = entry,
            None => node.persons.push(entry),
        }
        self.add_mode = AddMode::None;
        self.finish_mutation()?;
        Ok(View::Stay)
    }

    pub fn delete_person(&mut self, index: usize) -> EditorResult<View> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let node = doc.get_mut(current)?;
        if index >= node.persons.len() {
            return Err(EditorError::NotFound(format!("person #{}", index)));
        }
        node.persons.remove(index);
        self.finish_mutation()?;
        Ok(View::Stay)
    }

    /// `Abbrechen`: leaves any pending add form without touching the document.
    pub fn cancel(&mut self) -> EditorResult<View> {
        self.require_loaded()?;
        self.add_mode = AddMode::None;
        Ok(self.panel.view())
    }

    /// `loadRightFrame`: switches between the metadata and the pagination panel.
    pub fn set_panel(&mut self, panel: EditorPanel) -> EditorResult<View> {
        self.require_loaded()?;
        self.panel = panel;
        self.add_mode = AddMode::None;
        Ok(panel.view())
    }
}

/// `logical_physical` targets of `id` ordered by their physical position.
pub(crate) fn sorted_page_targets(doc: &DigitalDocument, id: NodeId) -> Vec<NodeId> {
    let order = doc.pages();
    let mut targets = doc.references().targets(id, LOGICAL_PHYSICAL);
    targets.sort_by_key(|t| order.iter().position(|p| p == t).unwrap_or(usize::MAX));
    targets
}
