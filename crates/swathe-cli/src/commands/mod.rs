//! Command handlers grouped by concern.

pub(crate) mod act;
pub(crate) mod list;
