//! Page lists, page ranges, pagination and page file operations.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::structure::sorted_page_targets;
use super::{validation, Editor, EditorError, EditorResult, View};
use crate::document::{DigitalDocument, NodeId, LOGICAL_PAGE_NUMBER, LOGICAL_PHYSICAL};
use crate::images::{file_stem, ImagesHelper, ReconcileReport};
use crate::paginator::{PaginationMode, PaginationScope, PaginationType, Paginator};

const BACKUP_SUFFIX: &str = "_bak";

/// Addresses a page either by id or by its displayed label `"<phys>: <logical>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageSelector {
    Id(NodeId),
    Label(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PageEntry {
    pub id: NodeId,
    pub physical: usize,
    pub logical: String,
    pub label: String,
    pub image: Option<String>,
    pub assigned: bool,
    pub representative: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginateRequest {
    pub pages: Vec<NodeId>,
    #[serde(rename = "type")]
    pub kind: PaginationType,
    pub mode: PaginationMode,
    pub scope: PaginationScope,
    #[serde(default)]
    pub start_value: String,
    #[serde(default)]
    pub fictitious: bool,
    #[serde(default)]
    pub separator: Option<String>,
}

fn display_label(doc: &DigitalDocument, page: NodeId, physical: usize) -> String {
    format!("{}: {}", physical, doc.first_value(page, LOGICAL_PAGE_NUMBER).unwrap_or(""))
}

pub(crate) fn resolve_page(doc: &DigitalDocument, selector: &PageSelector) -> EditorResult<(NodeId, usize)> {
    let pages = doc.pages();
    let found = match selector {
        PageSelector::Id(id) => pages.iter().position(|p| p == id),
        PageSelector::Label(label) => pages
            .iter()
            .enumerate()
            .position(|(i, &p)| display_label(doc, p, i + 1) == *label),
    };
    found
        .map(|position| (pages[position], position))
        .ok_or_else(|| EditorError::NotFound(format!("page {:?}", selector)))
}

/// Pages from `first` to `last` inclusive, in physical order.
pub(crate) fn resolve_range(
    doc: &DigitalDocument,
    first: &PageSelector,
    last: &PageSelector,
) -> EditorResult<Vec<NodeId>> {
    let (_, from) = resolve_page(doc, first)?;
    let (_, to) = resolve_page(doc, last)?;
    if from > to {
        return Err(validation("pages", "the last page lies before the first page"));
    }
    Ok(doc.pages()[from..=to].to_vec())
}

fn positions(doc: &DigitalDocument, ids: &[NodeId]) -> EditorResult<Vec<usize>> {
    let pages = doc.pages();
    ids.iter()
        .map(|id| {
            pages
                .iter()
                .position(|p| p == id)
                .ok_or_else(|| EditorError::NotFound(format!("page {}", id)))
        })
        .collect()
}

/// Files in `folder` whose stem is `stem`.
fn files_with_stem(folder: &Path, stem: &str) -> Vec<std::path::PathBuf> {
    let Ok(entries) = fs::read_dir(folder) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| p.file_name().map(|n| file_stem(&n.to_string_lossy()) == stem).unwrap_or(false))
        .collect()
}

impl Editor {
    /// The physical sequence as displayed on the pagination panel.
    pub fn pages(&self) -> EditorResult<Vec<PageEntry>> {
        let doc = self.doc()?;
        let assigned: HashSet<NodeId> = self
            .current
            .map(|c| doc.references().targets(c, LOGICAL_PHYSICAL).into_iter().collect())
            .unwrap_or_default();
        Ok(doc
            .pages()
            .into_iter()
            .enumerate()
            .map(|(i, id)| PageEntry {
                id,
                physical: i + 1,
                logical: doc.first_value(id, LOGICAL_PAGE_NUMBER).unwrap_or("").to_string(),
                label: display_label(doc, id, i + 1),
                image: doc.node(id).and_then(|n| n.image_name()).map(str::to_string),
                assigned: assigned.contains(&id),
                representative: self.representative == Some(i + 1),
            })
            .collect())
    }

    /// Replaces the page references of `node` (or the current element) with the
    /// inclusive range `first..=last`.
    pub fn assign_page_range(
        &mut self,
        node: Option<NodeId>,
        first: &PageSelector,
        last: &PageSelector,
    ) -> EditorResult<Vec<NodeId>> {
        self.require_loaded()?;
        let node = match node {
            Some(node) => node,
            None => self.current_node()?,
        };
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        doc.get(node)?;
        let range = resolve_range(doc, first, last)?;
        doc.references_mut().replace_targets(node, LOGICAL_PHYSICAL, &range);
        self.finish_mutation()?;
        Ok(range)
    }

    /// Sets the page references of the current element to the union of its
    /// direct children's references.
    pub fn assign_pages_from_children(&mut self) -> EditorResult<Vec<NodeId>> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let mut seen = HashSet::new();
        let mut union: Vec<NodeId> = Vec::new();
        for &child in doc.children(current) {
            for target in doc.references().targets(child, LOGICAL_PHYSICAL) {
                if seen.insert(target) {
                    union.push(target);
                }
            }
        }
        let order = doc.pages();
        union.sort_by_key(|t| order.iter().position(|p| p == t).unwrap_or(usize::MAX));
        doc.references_mut().replace_targets(current, LOGICAL_PHYSICAL, &union);
        self.finish_mutation()?;
        Ok(union)
    }

    /// Adds pages to the current element's references.
    pub fn add_pages(&mut self, ids: &[NodeId]) -> EditorResult<View> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        positions(doc, ids)?;
        for &page in ids {
            doc.references_mut().add(current, page, LOGICAL_PHYSICAL);
        }
        let sorted = sorted_page_targets(doc, current);
        doc.references_mut().replace_targets(current, LOGICAL_PHYSICAL, &sorted);
        self.finish_mutation()?;
        Ok(View::Stay)
    }

    pub fn remove_pages(&mut self, ids: &[NodeId]) -> EditorResult<View> {
        self.require_loaded()?;
        let current = self.current_node()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        for &page in ids {
            doc.references_mut().remove(current, page, LOGICAL_PHYSICAL);
        }
        self.finish_mutation()?;
        Ok(View::Stay)
    }

    /// Runs the paginator over the selected pages and stores the labels.
    pub fn paginate(&mut self, request: &PaginateRequest) -> EditorResult<View> {
        self.require_loaded()?;
        let separator = request
            .separator
            .clone()
            .unwrap_or_else(|| self.env.settings.pagination_separator.clone());
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let pages = doc.pages();
        let selected = positions(doc, &request.pages)?;

        let mut labels: Vec<String> = pages
            .iter()
            .map(|&p| doc.first_value(p, LOGICAL_PAGE_NUMBER).unwrap_or("").to_string())
            .collect();
        Paginator::new(request.kind, request.start_value.clone())
            .mode(request.mode)
            .scope(request.scope)
            .selected(selected)
            .fictitious(request.fictitious)
            .separator(separator)
            .run(&mut labels)?;

        for (page, label) in pages.iter().zip(labels.iter()) {
            doc.set_value(*page, LOGICAL_PAGE_NUMBER, label)?;
        }
        self.finish_mutation()?;
        Ok(View::Pagination)
    }

    /// Swaps the images of the selected pages with their neighbours in `direction`.
    /// Stops at the sequence boundary. Returns the pages now holding the moved images.
    pub fn move_pages(&mut self, ids: &[NodeId], direction: PageDirection) -> EditorResult<Vec<NodeId>> {
        self.require_loaded()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let pages = doc.pages();
        let mut selected = positions(doc, ids)?;
        selected.sort_unstable();
        if direction == PageDirection::Down {
            selected.reverse();
        }

        let mut moved = Vec::new();
        for position in selected {
            let neighbour = match direction {
                PageDirection::Up if position > 0 => position - 1,
                PageDirection::Down if position + 1 < pages.len() => position + 1,
                _ => break,
            };
            doc.swap_content_files(pages[position], pages[neighbour])?;
            moved.push(pages[neighbour]);
        }
        moved.sort_by_key(|id| pages.iter().position(|p| p == id));

        if let Some(first) = moved.first().and_then(|id| pages.iter().position(|p| p == id)) {
            self.refresh_preview_at(first);
        }
        self.finish_mutation()?;
        Ok(moved)
    }

    /// Deletes the selected pages with their image and OCR files.
    pub fn delete_pages(&mut self, ids: &[NodeId]) -> EditorResult<View> {
        self.require_loaded()?;
        let folders: Vec<_> = self
            .layout
            .image_folders()
            .into_iter()
            .chain(self.layout.ocr_folders())
            .collect();
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let pages = doc.pages();
        let mut selected = positions(doc, ids)?;
        selected.sort_unstable();
        selected.dedup();

        let mut failures = Vec::new();
        for &position in selected.iter().rev() {
            let page = pages[position];
            if let Some(image) = doc.get(page)?.image_name().map(str::to_string) {
                let stem = file_stem(&image).to_string();
                for folder in &folders {
                    for file in files_with_stem(folder, &stem) {
                        match fs::remove_file(&file) {
                            Ok(()) => tracing::info!("Deleted {}", file.display()),
                            Err(e) => failures.push(format!("{} could not be deleted: {}", file.display(), e)),
                        }
                    }
                }
            }
            doc.remove_subtree(page)?;
        }
        doc.renumber_pages();
        let remaining = doc.pages().len();

        for failure in failures {
            self.warn(failure);
        }
        self.env.metrics.add_pages_deleted(selected.len() as u64);
        // The representative is a 1-based position and follows its page.
        self.representative = self.representative.and_then(|page| {
            let position = page - 1;
            if selected.binary_search(&position).is_ok() {
                return None;
            }
            let shifted = page - selected.iter().filter(|&&p| p < position).count();
            (shifted <= remaining).then_some(shifted)
        });
        if selected.contains(&self.preview.index) {
            self.refresh_preview_at(0);
        } else {
            let shift = selected.iter().filter(|&&p| p < self.preview.index).count();
            self.preview.index -= shift;
        }
        self.finish_mutation()?;
        Ok(View::Pagination)
    }

    /// Renames all image and OCR files to dense eight-digit names following the
    /// physical order. Every file is first moved aside to `<name>_bak`.
    pub fn reorder_pagination(&mut self) -> EditorResult<View> {
        self.require_loaded()?;
        let folders: Vec<_> = self
            .layout
            .image_folders()
            .into_iter()
            .chain(self.layout.ocr_folders())
            .collect();
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;

        let mut renames: BTreeMap<String, String> = BTreeMap::new();
        for (index, page) in doc.pages().into_iter().enumerate() {
            if let Some(image) = doc.get(page)?.image_name() {
                renames.insert(file_stem(image).to_string(), format!("{:08}", index + 1));
            }
        }

        // Files no page is bound to must not be overwritten by the new names.
        for folder in &folders {
            for old_stem in renames.keys() {
                for file in files_with_stem(folder, old_stem) {
                    let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                    let target = folder.join(format!("{}{}", renames[old_stem], &name[old_stem.len()..]));
                    let target_stem = target
                        .file_name()
                        .map(|n| file_stem(&n.to_string_lossy()).to_string())
                        .unwrap_or_default();
                    if target.exists() && !renames.contains_key(&target_stem) {
                        return Err(EditorError::Validation {
                            field: "pages".to_string(),
                            message: format!("{} already exists and belongs to no page", target.display()),
                        });
                    }
                }
            }
        }

        let mut failures = Vec::new();
        for folder in &folders {
            for old_stem in renames.keys() {
                for file in files_with_stem(folder, old_stem) {
                    let mut backup = file.clone().into_os_string();
                    backup.push(BACKUP_SUFFIX);
                    if let Err(e) = fs::rename(&file, &backup) {
                        failures.push(format!("{} could not be renamed: {}", file.display(), e));
                    }
                }
            }
        }
        for folder in &folders {
            let Ok(entries) = fs::read_dir(folder) else {
                continue;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let name = entry.file_name().to_string_lossy().into_owned();
                let Some(original) = name.strip_suffix(BACKUP_SUFFIX) else {
                    continue;
                };
                let stem = file_stem(original);
                let Some(new_stem) = renames.get(stem) else {
                    continue;
                };
                let target = folder.join(format!("{}{}", new_stem, &original[stem.len()..]));
                if let Err(e) = fs::rename(entry.path(), &target) {
                    failures.push(format!("{} could not be renamed: {}", entry.path().display(), e));
                }
            }
        }

        for page in doc.pages() {
            let node = doc.get_mut(page)?;
            if let Some(file) = node.content_file.as_mut() {
                let stem = file_stem(&file.location).to_string();
                if let Some(new_stem) = renames.get(&stem) {
                    file.location = format!("{}{}", new_stem, &file.location[stem.len()..]);
                }
            }
        }
        tracing::info!("Renumbered {} image(s) of process {}", renames.len(), self.layout.id());

        for failure in failures {
            self.warn(failure);
        }
        self.finish_mutation()?;
        Ok(View::Pagination)
    }

    /// Re-runs the reconciliation against the master image folder.
    pub fn reconcile(&mut self) -> EditorResult<ReconcileReport> {
        self.require_loaded()?;
        let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
        let report = ImagesHelper::new(&self.env.settings.images, &self.ruleset).create_pagination(doc, &self.layout, None)?;
        self.env.metrics.add_pages_created(report.created.len() as u64);
        self.env.metrics.add_pages_deleted(report.removed.len() as u64);
        for problem in report.validation.iter().flat_map(|v| v.problems.clone()) {
            self.warn(problem);
        }
        if !report.is_noop() {
            self.info(format!(
                "{} page(s) created, {} removed, {} relinked",
                report.created.len(),
                report.removed.len(),
                report.relinked.len()
            ));
        }
        self.finish_mutation()?;
        Ok(report)
    }

    pub fn set_representative(&mut self, page: &PageSelector) -> EditorResult<View> {
        self.require_loaded()?;
        let doc = self.document.as_ref().ok_or(EditorError::NotLoaded)?;
        let (_, position) = resolve_page(doc, page)?;
        self.representative = Some(position + 1);
        self.finish_mutation()?;
        Ok(View::Stay)
    }
}
