//! Serialization of objects and incremental updates.

mod incremental;
mod object_serializer;

pub use incremental::{IncrementalUpdate, RenderedUpdate};
pub use object_serializer::{hex_upper, ObjectSerializer};
