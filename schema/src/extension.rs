//! Extension fields.
//!
//! An extension is a field declared outside of the message type it extends, using a number from
//! one of that type's extension ranges. While parsing, numbers that are not in the field table are
//! looked up through an [ExtensionLookup]; fields without a match are kept as unknown fields.

use crate::{
    error::RegistrationError,
    schema::{FieldInfo, Syntax},
};
use std::{collections::HashMap, sync::Arc};

/// A field declared outside of the message type it extends.
#[derive(Debug)]
pub struct Extension {
    extendee: &'static str,
    full_name: &'static str,
    field: FieldInfo,
}

impl Extension {
    /// Declares an extension of the message type called `extendee`.
    ///
    /// `field` describes the extension like a regular field (its name is the short name).
    /// Extensions always have explicit presence.
    pub fn new(
        extendee: &'static str,
        full_name: &'static str,
        mut field: FieldInfo,
    ) -> Result<Self, RegistrationError> {
        field.resolve(extendee, Syntax::Proto2)?;
        Ok(Self {
            extendee,
            full_name,
            field,
        })
    }

    /// Returns the fully qualified name of the extended message type.
    pub fn extendee(&self) -> &'static str {
        self.extendee
    }

    /// Returns the fully qualified name of the extension.
    pub fn full_name(&self) -> &'static str {
        self.full_name
    }

    pub fn field(&self) -> &FieldInfo {
        &self.field
    }

    pub fn number(&self) -> u32 {
        self.field.number()
    }
}

/// Finds extensions of a message type.
pub trait ExtensionLookup: Send + Sync {
    /// Returns the extension of `extendee` numbered `number`.
    fn find_by_number(&self, extendee: &str, number: u32) -> Option<Arc<Extension>>;

    /// Returns the extension of `extendee` called `full_name`.
    fn find_by_name(&self, extendee: &str, full_name: &str) -> Option<Arc<Extension>>;
}

/// An in-memory [ExtensionLookup].
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    by_number: HashMap<&'static str, HashMap<u32, Arc<Extension>>>,
    by_name: HashMap<&'static str, HashMap<&'static str, Arc<Extension>>>,
    len: usize,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an extension, replacing any previous extension of the same type with the same number.
    pub fn add(&mut self, extension: Extension) -> Arc<Extension> {
        let extension = Arc::new(extension);
        let previous = self
            .by_number
            .entry(extension.extendee)
            .or_default()
            .insert(extension.number(), extension.clone());
        if let Some(previous) = previous {
            if let Some(names) = self.by_name.get_mut(previous.extendee) {
                names.remove(previous.full_name);
            }
        } else {
            self.len += 1;
        }
        self.by_name
            .entry(extension.extendee)
            .or_default()
            .insert(extension.full_name, extension.clone());
        extension
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl ExtensionLookup for ExtensionRegistry {
    fn find_by_number(&self, extendee: &str, number: u32) -> Option<Arc<Extension>> {
        self.by_number.get(extendee)?.get(&number).cloned()
    }

    fn find_by_name(&self, extendee: &str, full_name: &str) -> Option<Arc<Extension>> {
        self.by_name.get(extendee)?.get(full_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    #[test]
    fn test_lookup() {
        let mut registry = ExtensionRegistry::new();
        assert!(registry.is_empty());
        registry.add(Extension::new(
            "test.Base",
            "test.ext_count",
            FieldInfo::new("ext_count", 100, FieldType::Int32),
        )
        .unwrap());
        registry.add(Extension::new(
            "test.Other",
            "test.other_count",
            FieldInfo::new("other_count", 100, FieldType::Int64),
        )
        .unwrap());
        assert_eq!(registry.len(), 2);

        let found = registry.find_by_number("test.Base", 100).unwrap();
        assert_eq!(found.full_name(), "test.ext_count");
        let found = registry.find_by_name("test.Other", "test.other_count").unwrap();
        assert_eq!(found.field().field_type(), FieldType::Int64);
        assert!(registry.find_by_number("test.Base", 101).is_none());
        assert!(registry.find_by_name("test.Base", "test.other_count").is_none());
    }
}
