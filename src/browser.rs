//! Folder browsing state for the notes view.
//!
//! Mutations are applied locally first and then posted to the backend; the
//! local view never waits for the round trip.

use std::cmp::Ordering;

use crate::models::{Breadcrumb, NoteItem, NoteKind, NoteView, ROOT_NOTE_ID};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    Name,
    /// Newest first.
    Created,
}

/// Identifies one `notes/view` request. Only the latest one may be shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoteBrowser {
    current: Option<NoteView>,
    history: Vec<String>,
    load_generation: u64,
}

impl NoteBrowser {
    /// Starts a navigation; earlier tickets become stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_generation += 1;
        LoadTicket(self.load_generation)
    }

    /// Opens `view` if `ticket` is still the latest navigation. Responses
    /// that arrive after a newer navigation started are dropped.
    pub fn finish_load(&mut self, ticket: LoadTicket, view: NoteView, remember: bool) -> bool {
        if ticket.0 != self.load_generation {
            return false;
        }
        self.open(view, remember);
        true
    }

    pub fn current(&self) -> Option<&NoteView> {
        self.current.as_ref()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|view| view.info.id.as_str())
    }

    /// Shows `view`. The previously shown note is remembered for `back`
    /// unless the navigation itself came from `back`.
    pub fn open(&mut self, view: NoteView, remember: bool) {
        if remember {
            if let Some(previous) = self.current_id() {
                if previous != view.info.id {
                    self.history.push(previous.to_string());
                }
            }
        }
        self.current = Some(view);
    }

    /// Id of the note to load for a back navigation.
    pub fn back(&mut self) -> Option<String> {
        self.history.pop()
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    /// Folder that new items and reorders apply to: the open folder itself,
    /// or the parent of the open file.
    pub fn parent_folder(&self) -> String {
        let Some(view) = &self.current else {
            return ROOT_NOTE_ID.to_string();
        };
        if !view.is_file() {
            return view.info.id.clone();
        }
        parent_from_breadcrumbs(view)
    }

    pub fn items(&self) -> &[NoteItem] {
        self.current.as_ref().map(|v| v.items.as_slice()).unwrap_or(&[])
    }

    pub fn order(&self) -> Vec<String> {
        self.items().iter().map(|item| item.id.clone()).collect()
    }

    /// Replaces the listing with a fresh copy of `parent`'s children, as long
    /// as `parent` is still the folder on screen.
    pub fn refresh_listing(&mut self, parent: &str, items: Vec<NoteItem>) -> bool {
        if self.parent_folder() != parent {
            return false;
        }
        match self.current.as_mut() {
            Some(view) => {
                view.items = items;
                true
            }
            None => false,
        }
    }

    pub fn rename_local(&mut self, id: &str, name: &str) -> bool {
        let Some(view) = self.current.as_mut() else {
            return false;
        };
        let mut touched = false;
        if let Some(item) = view.items.iter_mut().find(|item| item.id == id) {
            item.name = name.to_string();
            touched = true;
        }
        if view.info.id == id {
            view.info.name = name.to_string();
            touched = true;
        }
        if let Some(crumb) = view.breadcrumbs.iter_mut().find(|c| c.id == id) {
            crumb.name = name.to_string();
        }
        touched
    }

    /// Drops `id` from the listing. Returns the folder to navigate to when
    /// the removed item is the open note.
    pub fn remove_local(&mut self, id: &str) -> Option<String> {
        let view = self.current.as_mut()?;
        if view.info.id == id {
            let parent = parent_from_breadcrumbs(view);
            self.history.retain(|entry| entry != id);
            return Some(parent);
        }
        view.items.retain(|item| item.id != id);
        self.history.retain(|entry| entry != id);
        None
    }

    /// Drops `id` from the listing after it was moved to another folder.
    pub fn move_out(&mut self, id: &str) -> bool {
        let Some(view) = self.current.as_mut() else {
            return false;
        };
        let before = view.items.len();
        view.items.retain(|item| item.id != id);
        view.items.len() != before
    }

    /// Drag-and-drop reorder. Returns false when nothing moved.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        let Some(view) = self.current.as_mut() else {
            return false;
        };
        if from == to || from >= view.items.len() || to >= view.items.len() {
            return false;
        }
        let item = view.items.remove(from);
        view.items.insert(to, item);
        true
    }

    pub fn sort(&mut self, key: SortKey) {
        let Some(view) = self.current.as_mut() else {
            return;
        };
        match key {
            SortKey::Name => view
                .items
                .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
            SortKey::Created => view.items.sort_by(|a, b| {
                b.created_at
                    .partial_cmp(&a.created_at)
                    .unwrap_or(Ordering::Equal)
            }),
        }
    }
}

/// Folder picker shown while moving one item.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveDialog {
    pub item_id: String,
    pub item_name: String,
    pub folder: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Subfolders of `folder` the item may be moved into.
    pub folders: Vec<NoteItem>,
    pub selected: Option<String>,
}

impl MoveDialog {
    pub fn new(item_id: &str, item_name: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            item_name: item_name.to_string(),
            folder: ROOT_NOTE_ID.to_string(),
            breadcrumbs: Vec::new(),
            folders: Vec::new(),
            selected: None,
        }
    }

    /// Shows the subfolders of `view`, never offering the moved item itself.
    /// The browsed folder becomes the selected target.
    pub fn show_folder(&mut self, view: &NoteView) {
        self.folder = view.info.id.clone();
        self.folders = view
            .items
            .iter()
            .filter(|item| item.kind == NoteKind::Folder && item.id != self.item_id)
            .cloned()
            .collect();
        self.breadcrumbs = if view.info.id == ROOT_NOTE_ID {
            Vec::new()
        } else {
            view.breadcrumbs.clone()
        };
        self.selected = Some(view.info.id.clone());
    }

    pub fn select(&mut self, folder_id: &str) {
        if folder_id != self.item_id {
            self.selected = Some(folder_id.to_string());
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.selected.as_deref().filter(|id| *id != self.item_id)
    }
}

fn parent_from_breadcrumbs(view: &NoteView) -> String {
    let crumbs = &view.breadcrumbs;
    if crumbs.len() >= 2 {
        crumbs[crumbs.len() - 2].id.clone()
    } else {
        ROOT_NOTE_ID.to_string()
    }
}
