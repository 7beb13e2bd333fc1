//! Source attribution and live tree-change events for UI element graphs.
//!
//! Weft answers two questions an inspector asks about a running UI: *where
//! in the code was this element created?* and *what just changed in the
//! element tree?*
//!
//! # Using this crate
//!
//! ```toml
//! # Cargo.toml
//! weft = { ..., features = ["diagnostics"] }
//! ```
//!
//! ```rust,ignore
//! impl Button {
//!     pub fn new(label: &str) -> Arc<Self> {
//!         let button = Arc::new(Button { label: label.into() });
//!         weft::attribute_from_construction_context(&button);
//!         button
//!     }
//! }
//!
//! let location = weft::get_source_info(&button);
//! ```
//!
//! At runtime diagnostics stay off unless a debugger is attached or the
//! process was started with `WEFT_SOURCE_INFO=1`.
//!
//! # Cargo features
//!
//! | Feature | Effect |
//! |---------|--------|
//! | *(default, none)* | Every entry point is an inline no-op; lookups return `None`. |
//! | `diagnostics` | Enables attribution, the weak source store and event broadcast. |
//!
//! # Configuration
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `WEFT_SOURCE_INFO` | `1` turns diagnostics on without a debugger. Read once. |
//! | `WEFT_OVERRIDES` | Path to a JSON table of fixed locations per type name. |
//! | `WEFT_SUBSCRIBER_FAILURES` | `propagate` (default) or `isolate`. |

#[cfg(not(feature = "diagnostics"))]
mod disabled;
#[cfg(feature = "diagnostics")]
mod enabled;

#[cfg(not(feature = "diagnostics"))]
pub use disabled::*;
#[cfg(feature = "diagnostics")]
pub use enabled::*;

pub use weft_runtime::{
    AttributionOutcome, BroadcastError, DiagnosticSink, ElementRef, FailurePolicy, HandlerError,
    MutationRelay, OverrideTable, SubscriptionId, TreeChangeEvent, TreeChangeHandler,
    VisualTreeElement,
};
pub use weft_types::{Locator, SourceLocation, TreeChangeKind};
