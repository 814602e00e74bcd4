//! Observable per-feature collection state.
//!
//! Single writer: the owning facade. UI reads snapshots, never mutates.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::identity::EntityId;

/// Loading state of the collection as a whole.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// Items a facade can coordinate.
///
/// `counts_pending` feeds the derived badge count (unread notifications,
/// unsubmitted reviews).
pub trait CollectionItem: Clone + Serialize + DeserializeOwned {
    fn entity_id(&self) -> EntityId;

    fn counts_pending(&self) -> bool {
        false
    }
}

/// Ordered collection plus derived counters, as exposed to the UI.
///
/// Display order is insertion order; the server cursor dictates where page
/// loads insert. `pending_count` is recomputed on every write rather than
/// adjusted incrementally, so it can never drift.
#[derive(Clone, Debug)]
pub struct ObservableCollectionState<T> {
    items: Vec<T>,
    pending_count: usize,
    load_state: LoadState,
}

impl<T: CollectionItem> Default for ObservableCollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pending_count: 0,
            load_state: LoadState::Idle,
        }
    }
}

impl<T: CollectionItem> ObservableCollectionState<T> {
    pub fn from_items(items: Vec<T>) -> Self {
        let mut state = Self {
            items,
            pending_count: 0,
            load_state: LoadState::Loaded,
        };
        state.recount();
        state
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn pending_count(&self) -> usize {
        self.pending_count
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn set_load_state(&mut self, load_state: LoadState) {
        self.load_state = load_state;
    }

    pub fn position_of(&self, id: &EntityId) -> Option<usize> {
        self.items.iter().position(|item| &item.entity_id() == id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.items.iter().find(|item| &item.entity_id() == id)
    }

    /// Insert at the front (newest-first presentation order).
    pub fn insert_front(&mut self, item: T) {
        self.items.insert(0, item);
        self.recount();
    }

    pub fn insert_at(&mut self, index: usize, item: T) {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
        self.recount();
    }

    /// Replace the item with the same entity id. Returns false when absent.
    pub fn replace(&mut self, item: T) -> bool {
        match self.position_of(&item.entity_id()) {
            Some(index) => {
                self.items[index] = item;
                self.recount();
                true
            }
            None => false,
        }
    }

    /// Remove by id, returning the removed item and its position.
    pub fn remove(&mut self, id: &EntityId) -> Option<(usize, T)> {
        let index = self.position_of(id)?;
        let item = self.items.remove(index);
        self.recount();
        Some((index, item))
    }

    /// Replace the window starting at `offset` with `page`, truncating any
    /// tail the server no longer reports when `end_of_collection` is set.
    pub fn splice_page(&mut self, offset: usize, page: Vec<T>, end_of_collection: bool) {
        let offset = offset.min(self.items.len());
        let page_len = page.len();
        let end = (offset + page_len).min(self.items.len());
        self.items.splice(offset..end, page);
        if end_of_collection {
            // nothing beyond this page exists server-side
            self.items.truncate(offset + page_len);
        }
        self.recount();
    }

    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
        self.recount();
    }

    fn recount(&mut self) {
        self.pending_count = self.items.iter().filter(|i| i.counts_pending()).count();
    }
}
