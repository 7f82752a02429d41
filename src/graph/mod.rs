//! Graph module holding the accumulated wiki link graph
//!
//! The [`GraphStore`] is the only owner of [`PageRecord`]s. Other components
//! refer to pages by title and go through the store to read or mutate them.

mod store;

pub use store::{GraphStore, PageRecord};
