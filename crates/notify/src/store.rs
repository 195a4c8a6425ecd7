use std::collections::HashSet;

use diary_models::{Notification, NotificationId};

/// Notifications ordered newest first, unique by identity.
#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    items: Vec<Notification>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole collection. Later duplicates in `items` are dropped.
    pub fn replace_all(&mut self, items: Vec<Notification>) {
        let mut seen = HashSet::with_capacity(items.len());
        self.items = items.into_iter().filter(|n| seen.insert(n.id)).collect();
        self.sort();
    }

    /// Inserts `notification` unless one with the same identity is held.
    /// Returns whether it was inserted.
    pub fn merge(&mut self, notification: Notification) -> bool {
        if self.contains(notification.id) {
            return false;
        }
        self.items.push(notification);
        self.sort();
        true
    }

    /// Sets the read flag on the matching entry. Returns false if absent.
    pub fn mark_read(&mut self, id: NotificationId) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.is_read = true;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: NotificationId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }

    // Stable, so equal timestamps keep arrival order.
    fn sort(&mut self) {
        self.items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}
