//! Wire-level contract with the document store.

pub mod document;

#[cfg(test)]
pub(crate) mod testing;
