//! Marker-based pagination.

/// One page of a describe call.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque marker for the next page; `None` on the last page.
    pub marker: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            marker: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.marker.is_some()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::last(Vec::new())
    }
}
