//! Small tunables for the store, kept separate from hard-coded constants
//! so embedders can override them without touching engine code.

/// Default page size for `Api::descendants` when the caller doesn't pass one.
pub const DEFAULT_PAGE_LIMIT: usize = 256;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Block type that bounds a `descendants` walk (spec §4.5): the walk
    /// still returns a block of this type but does not descend past it.
    pub descendant_boundary_type: String,
    pub default_page_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            descendant_boundary_type: "page".to_string(),
            default_page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}
