//! Plain data shared by the weft runtime, wire format and tooling.

mod location;
mod overrides;
mod tree;

pub use location::{Locator, SourceLocation};
pub use overrides::{OverrideEntry, OverrideTableFile};
pub use tree::TreeChangeKind;
