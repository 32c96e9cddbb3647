//! Name Index
//!
//! Catalog of measurement tables and their columns, used to resolve variable
//! names to table locations without a round trip per search.
//!
//! ```text
//! ensure_built():  open session → list tables → keep "…measured…" tables
//!                  → list columns of each → close session
//! ```

mod name_index;

pub use name_index::{IndexStats, NameIndex};
