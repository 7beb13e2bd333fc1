use facet::Facet;

/// Structural change observed in the element hierarchy.
#[derive(Facet, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum TreeChangeKind {
    Add,
    Remove,
}
