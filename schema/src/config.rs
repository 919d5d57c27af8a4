//! Options that control parsing.

use crate::extension::ExtensionLookup;
use std::{fmt, sync::Arc};
use strata_wire::DEFAULT_RECURSION_LIMIT;

/// Configuration for parsing messages.
#[derive(Clone)]
pub struct ParseOptions {
    /// Maximum number of nested groups and sub-messages.
    pub recursion_limit: usize,

    /// Drop unrecognized fields instead of preserving them.
    pub discard_unknown: bool,

    /// Defer parsing of sub-messages whose fields are declared lazy.
    pub lazy: bool,

    /// Maximum size of the input, in bytes.
    pub size_limit: usize,

    /// Extensions to recognize. Extension fields are treated as unknown when `None`.
    pub extensions: Option<Arc<dyn ExtensionLookup>>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            discard_unknown: false,
            lazy: true,
            size_limit: i32::MAX as usize,
            extensions: None,
        }
    }
}

impl ParseOptions {
    /// Returns options recognizing the extensions in `lookup`.
    pub fn with_extensions(mut self, lookup: Arc<dyn ExtensionLookup>) -> Self {
        self.extensions = Some(lookup);
        self
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("recursion_limit", &self.recursion_limit)
            .field("discard_unknown", &self.discard_unknown)
            .field("lazy", &self.lazy)
            .field("size_limit", &self.size_limit)
            .field("extensions", &self.extensions.is_some())
            .finish()
    }
}
