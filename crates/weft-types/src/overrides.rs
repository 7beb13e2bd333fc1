use facet::Facet;

use crate::SourceLocation;

/// One fixed attribution: every object whose runtime type name equals
/// `type_name` is attributed to `location` without walking the stack.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct OverrideEntry {
    /// Full type name as reported by `std::any::type_name`.
    pub type_name: String,
    pub location: SourceLocation,
}

/// On-disk shape of an override table.
#[derive(Facet, Clone, Debug, Default, PartialEq, Eq)]
pub struct OverrideTableFile {
    pub overrides: Vec<OverrideEntry>,
}
