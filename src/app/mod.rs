//! Binary-only helpers.

pub(crate) mod terminal;
