use std::collections::HashSet;
use std::hash::Hash;

use serde::Serialize;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

/// Manual until the first explicit "load more", then auto for the rest of the
/// open/close lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadMode {
    #[default]
    Manual,
    Auto,
}

/// Loaded items plus the server offset they cover.
///
/// `loaded_count` tracks how far into the server's list paging has read. It
/// follows confirmed removals, so the next request starts at the page holding
/// that offset and any overlap with what is already loaded is skipped by key.
#[derive(Debug, Clone)]
pub struct PageState<T> {
    items: Vec<T>,
    loaded_count: usize,
    total_count: Option<usize>,
    loading: Option<u32>,
    page_size: u32,
}

impl<T> PageState<T> {
    pub fn new(page_size: u32) -> Result<Self, CoreError> {
        if page_size == 0 {
            return Err(CoreError::InvalidPageSize(page_size));
        }
        Ok(Self {
            items: Vec::new(),
            loaded_count: 0,
            total_count: None,
            loading: None,
            page_size,
        })
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded_count
    }

    /// Zero until the first page arrives.
    pub fn total_count(&self) -> usize {
        self.total_count.unwrap_or(0)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn has_more(&self) -> bool {
        match self.total_count {
            None => true,
            Some(total) => self.loaded_count < total,
        }
    }

    /// Marks the state loading and returns the page to fetch, or `None` when
    /// nothing is left or a load is already running.
    pub fn begin_load(&mut self) -> Option<PageRequest> {
        if self.loading.is_some() || !self.has_more() {
            return None;
        }
        let page = u32::try_from(self.loaded_count / self.page_size as usize).unwrap_or(u32::MAX);
        self.loading = Some(page);
        Some(PageRequest {
            page,
            size: self.page_size,
        })
    }

    /// Appends the page, skipping items whose key is already loaded. Returns
    /// how many were appended.
    pub fn finish_load<K, F>(&mut self, page: Page<T>, key: F) -> usize
    where
        K: Eq + Hash,
        F: Fn(&T) -> K,
    {
        let requested = self.loading.take().unwrap_or(page.page);
        let received = page.items.len();
        let known: HashSet<K> = self.items.iter().map(&key).collect();
        let before = self.items.len();
        self.items
            .extend(page.items.into_iter().filter(|item| !known.contains(&key(item))));
        let offset = requested as usize * self.page_size as usize + received;
        self.loaded_count = self.loaded_count.max(offset);
        // An empty page means the server has nothing more regardless of total.
        self.total_count = if received == 0 {
            Some(self.loaded_count)
        } else {
            Some(page.total.max(self.loaded_count))
        };
        self.items.len() - before
    }

    pub fn fail_load(&mut self) {
        self.loading = None;
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.loaded_count = 0;
        self.total_count = None;
        self.loading = None;
    }

    /// Takes one loaded item off the list while its removal is pending. The
    /// server offset is untouched until `confirm_removed`.
    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        Some(self.items.remove(index))
    }

    /// Puts back an item whose removal was refused.
    pub fn insert_at(&mut self, index: usize, item: T) {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
    }

    /// The server dropped one already loaded item, so everything after it
    /// moved up one place.
    pub fn confirm_removed(&mut self) {
        self.loaded_count = self.loaded_count.saturating_sub(1);
        self.total_count = self.total_count.map(|total| total.saturating_sub(1));
    }
}
