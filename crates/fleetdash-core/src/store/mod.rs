// ── Local caches ──
//
// Storage primitives the reconcilers write into and the views expose.

pub mod collection;
pub mod rolling;

pub use collection::{Keyed, KeyedCollection, KeyedSnapshot};
pub use rolling::{RollingBuffer, RollingCache};
