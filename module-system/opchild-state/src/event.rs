use serde::{Deserialize, Serialize};

/// A typed event with ordered string attributes.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    borsh::BorshSerialize,
    borsh::BorshDeserialize,
)]
pub struct Event {
    ty: String,
    attributes: Vec<(String, String)>,
}

impl Event {
    /// Creates an event of type `ty` without attributes.
    pub fn new(ty: &str) -> Self {
        Self {
            ty: ty.to_owned(),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.push((key.to_owned(), value.to_string()));
        self
    }

    /// Returns the event type.
    pub fn ty(&self) -> &str {
        &self.ty
    }

    /// Returns the attributes in insertion order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Returns the first value recorded under `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
