//! Derives a creation site for freshly constructed objects by walking the
//! call stack outward from the constructor.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use weft_types::{Locator, OverrideEntry, OverrideTableFile, SourceLocation};

use crate::frames::{BacktraceWalker, StackFrame, StackWalker, strip_generics};
use crate::gate::EnablementGate;
use crate::store::SourceLocationStore;
use crate::suppress;

const DEFAULT_MAX_FRAMES: usize = 256;

/// How stack frames are classified during attribution.
///
/// Crate patterns match a crate name exactly, or by prefix when they end in
/// `*` (`my_ui*` matches `my_ui` and `my_ui_widgets`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributionConfig {
    /// Crates whose frames mean "the framework built this"; attribution aborts.
    pub framework_crates: Vec<String>,
    /// Crates whose frames are skipped without aborting (generic helpers).
    pub platform_crates: Vec<String>,
    /// Associated function names treated as constructors, in addition to any
    /// name starting with `new_` or `with_`.
    pub constructor_names: Vec<String>,
    pub max_frames: usize,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            framework_crates: vec!["weft".into(), "weft_runtime".into()],
            platform_crates: vec![
                "std".into(),
                "core".into(),
                "alloc".into(),
                "backtrace".into(),
            ],
            constructor_names: vec!["new".into(), "default".into()],
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

impl AttributionConfig {
    pub fn with_framework_crate(mut self, pattern: impl Into<String>) -> Self {
        self.framework_crates.push(pattern.into());
        self
    }

    pub fn with_platform_crate(mut self, pattern: impl Into<String>) -> Self {
        self.platform_crates.push(pattern.into());
        self
    }

    pub fn with_constructor_name(mut self, name: impl Into<String>) -> Self {
        self.constructor_names.push(name.into());
        self
    }

    pub fn is_constructor_name(&self, method: &str) -> bool {
        self.constructor_names.iter().any(|name| name == method)
            || method.starts_with("new_")
            || method.starts_with("with_")
    }

    pub fn classify(&self, frame: &StackFrame) -> FrameClass {
        let krate = frame.krate();
        if self
            .framework_crates
            .iter()
            .any(|pattern| crate_matches(krate, pattern))
        {
            FrameClass::Framework
        } else if self
            .platform_crates
            .iter()
            .any(|pattern| crate_matches(krate, pattern))
        {
            FrameClass::Platform
        } else {
            FrameClass::User
        }
    }

    /// True when `frame` is a constructor whose self type is exactly `type_name`.
    pub fn is_constructor_of(&self, frame: &StackFrame, type_name: &str) -> bool {
        let Some((owner, method)) = frame.method() else {
            return false;
        };
        self.is_constructor_name(method) && strip_generics(owner) == strip_generics(type_name)
    }
}

fn crate_matches(krate: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => krate.starts_with(prefix),
        None => krate == pattern,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameClass {
    Framework,
    Platform,
    User,
}

/// Fixed locations keyed by full type name, consulted before any stack walk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverrideTable {
    by_type: HashMap<String, SourceLocation>,
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: ?Sized>(&mut self, location: SourceLocation) -> Option<SourceLocation> {
        self.insert_named(std::any::type_name::<T>(), location)
    }

    pub fn insert_named(
        &mut self,
        type_name: impl Into<String>,
        location: SourceLocation,
    ) -> Option<SourceLocation> {
        self.by_type.insert(type_name.into(), location)
    }

    pub fn remove_named(&mut self, type_name: &str) -> Option<SourceLocation> {
        self.by_type.remove(type_name)
    }

    pub fn get(&self, type_name: &str) -> Option<&SourceLocation> {
        self.by_type.get(type_name)
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl From<OverrideTableFile> for OverrideTable {
    fn from(file: OverrideTableFile) -> Self {
        Self {
            by_type: file
                .overrides
                .into_iter()
                .map(|entry| (entry.type_name, entry.location))
                .collect(),
        }
    }
}

impl From<&OverrideTable> for OverrideTableFile {
    fn from(table: &OverrideTable) -> Self {
        let mut overrides: Vec<OverrideEntry> = table
            .by_type
            .iter()
            .map(|(type_name, location)| OverrideEntry {
                type_name: type_name.clone(),
                location: location.clone(),
            })
            .collect();
        overrides.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        Self { overrides }
    }
}

/// What an attribution attempt did. None of these are errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributionOutcome {
    Disabled,
    Suppressed,
    /// The type has a fixed location in the override table.
    Overridden(SourceLocation),
    Attributed(SourceLocation),
    /// No constructor of the target type was on the stack.
    NoConstructorFrame,
    /// The constructor was called from framework code.
    FrameworkInternal { function: String },
    /// Only platform frames followed the constructor.
    Exhausted,
}

impl AttributionOutcome {
    /// The location that was registered, if any.
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Overridden(location) | Self::Attributed(location) => Some(location),
            _ => None,
        }
    }
}

pub struct CallStackAttributor {
    gate: EnablementGate,
    config: AttributionConfig,
    overrides: RwLock<Arc<OverrideTable>>,
    walker: Box<dyn StackWalker>,
}

impl CallStackAttributor {
    pub fn new(gate: EnablementGate, config: AttributionConfig) -> Self {
        Self::with_walker(gate, config, BacktraceWalker)
    }

    pub fn with_walker(
        gate: EnablementGate,
        config: AttributionConfig,
        walker: impl StackWalker + 'static,
    ) -> Self {
        Self {
            gate,
            config,
            overrides: RwLock::new(Arc::new(OverrideTable::default())),
            walker: Box::new(walker),
        }
    }

    pub fn config(&self) -> &AttributionConfig {
        &self.config
    }

    pub fn overrides(&self) -> Arc<OverrideTable> {
        Arc::clone(&self.overrides.read())
    }

    pub fn set_overrides(&self, table: OverrideTable) {
        *self.overrides.write() = Arc::new(table);
    }

    /// Attributes `target` to the code that constructed it and records the
    /// result in `store`.
    ///
    /// Call this right after the object is built, from inside its
    /// constructor: the constructor frame anchors the walk.
    #[inline(never)]
    pub fn attribute<T>(&self, target: &Arc<T>, store: &SourceLocationStore) -> AttributionOutcome
    where
        T: Send + Sync + 'static,
    {
        if !self.gate.is_enabled() {
            return AttributionOutcome::Disabled;
        }
        if suppress::is_suppressed() {
            return AttributionOutcome::Suppressed;
        }

        let type_name = std::any::type_name::<T>();
        let fixed = self.overrides.read().get(type_name).cloned();
        if let Some(location) = fixed {
            debug!(type_name, %location, "attributed from override table");
            store.register(target, location.clone());
            return AttributionOutcome::Overridden(location);
        }

        let frames = self.walker.capture(self.config.max_frames);
        let outcome = self.locate(type_name, &frames);
        match &outcome {
            AttributionOutcome::Attributed(location) => {
                store.register(target, location.clone());
            }
            other => debug!(type_name, outcome = ?other, "attribution gave up"),
        }
        outcome
    }

    /// Runs the frame scan over an already captured stack (innermost first).
    pub fn locate(&self, type_name: &str, frames: &[StackFrame]) -> AttributionOutcome {
        let Some(first) = frames
            .iter()
            .position(|frame| self.config.is_constructor_of(frame, type_name))
        else {
            return AttributionOutcome::NoConstructorFrame;
        };

        for frame in &frames[first + 1..] {
            match self.config.classify(frame) {
                FrameClass::Framework => {
                    return AttributionOutcome::FrameworkInternal {
                        function: frame.function.clone(),
                    };
                }
                FrameClass::Platform => continue,
                FrameClass::User => {
                    return AttributionOutcome::Attributed(location_for(frame));
                }
            }
        }

        AttributionOutcome::Exhausted
    }
}

fn location_for(frame: &StackFrame) -> SourceLocation {
    let line = u32::try_from(frame.offset.saturating_add(1)).unwrap_or(u32::MAX);
    SourceLocation::new(
        Locator::code(&frame.function, frame.krate(), &frame.module_path),
        line,
        1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::SyntheticStack;

    struct Button;

    fn button_type() -> &'static str {
        std::any::type_name::<Button>()
    }

    fn ctor_frame() -> StackFrame {
        StackFrame::new(format!("{}::new", button_type()), "/bin/app", 12)
    }

    fn capture_frames() -> Vec<StackFrame> {
        vec![
            StackFrame::new("backtrace::backtrace::trace", "/bin/app", 0),
            StackFrame::new(
                "weft_runtime::attribute::CallStackAttributor::attribute",
                "/bin/app",
                40,
            ),
        ]
    }

    fn attributor(frames: Vec<StackFrame>, gate: EnablementGate) -> CallStackAttributor {
        let config = AttributionConfig::default().with_framework_crate("ui*");
        CallStackAttributor::with_walker(gate, config, SyntheticStack::new(frames))
    }

    fn stack(tail: Vec<StackFrame>) -> Vec<StackFrame> {
        let mut frames = capture_frames();
        frames.push(ctor_frame());
        frames.extend(tail);
        frames
    }

    #[test]
    fn attributes_to_first_user_frame() {
        let store = SourceLocationStore::new(EnablementGate::forced(true));
        let attributor = attributor(
            stack(vec![
                StackFrame::new("app::pages::MainPage::build", "/bin/app", 99),
                StackFrame::new("app::main", "/bin/app", 7),
            ]),
            EnablementGate::forced(true),
        );
        let target = Arc::new(Button);

        let outcome = attributor.attribute(&target, &store);

        let expected = SourceLocation::new(
            Locator::code("app::pages::MainPage::build", "app", "/bin/app"),
            100,
            1,
        );
        assert_eq!(outcome, AttributionOutcome::Attributed(expected.clone()));
        assert_eq!(store.get(&target), Some(expected));
    }

    #[test]
    fn platform_helper_is_skipped() {
        let store = SourceLocationStore::new(EnablementGate::forced(true));
        let attributor = attributor(
            stack(vec![
                StackFrame::new("alloc::sync::Arc<T>::new", "/bin/app", 3),
                StackFrame::new("core::ops::function::FnOnce::call_once", "/bin/app", 5),
                StackFrame::new("app::pages::MainPage::build", "/bin/app", 20),
            ]),
            EnablementGate::forced(true),
        );
        let target = Arc::new(Button);

        let outcome = attributor.attribute(&target, &store);

        let location = outcome.location().expect("user frame should be reached");
        assert_eq!(
            location.locator,
            Locator::code("app::pages::MainPage::build", "app", "/bin/app")
        );
        assert_eq!(location.line, 21);
    }

    #[test]
    fn framework_frame_aborts_attribution() {
        let store = SourceLocationStore::new(EnablementGate::forced(true));
        let attributor = attributor(
            stack(vec![
                StackFrame::new("ui_core::layout::Grid::add_default_children", "/bin/app", 8),
                StackFrame::new("ui_core::app::Application::run", "/bin/app", 8),
                StackFrame::new("app::main", "/bin/app", 8),
            ]),
            EnablementGate::forced(true),
        );
        let target = Arc::new(Button);

        let outcome = attributor.attribute(&target, &store);

        assert_eq!(
            outcome,
            AttributionOutcome::FrameworkInternal {
                function: "ui_core::layout::Grid::add_default_children".into()
            }
        );
        assert_eq!(store.get(&target), None);
    }

    #[test]
    fn missing_constructor_frame_registers_nothing() {
        let store = SourceLocationStore::new(EnablementGate::forced(true));
        let mut frames = capture_frames();
        frames.push(StackFrame::new("app::main", "/bin/app", 1));
        let attributor = attributor(frames, EnablementGate::forced(true));
        let target = Arc::new(Button);

        assert_eq!(
            attributor.attribute(&target, &store),
            AttributionOutcome::NoConstructorFrame
        );
        assert!(store.is_empty());
    }

    #[test]
    fn constructor_of_other_type_is_not_a_marker() {
        let attributor = attributor(Vec::new(), EnablementGate::forced(true));
        let frames = vec![
            StackFrame::new(format!("{}Group::new", button_type()), "/bin/app", 1),
            StackFrame::new("app::main", "/bin/app", 1),
        ];
        assert_eq!(
            attributor.locate(button_type(), &frames),
            AttributionOutcome::NoConstructorFrame
        );
    }

    #[test]
    fn only_platform_frames_exhaust_the_stack() {
        let store = SourceLocationStore::new(EnablementGate::forced(true));
        let attributor = attributor(
            stack(vec![StackFrame::new("std::rt::lang_start", "/bin/app", 1)]),
            EnablementGate::forced(true),
        );
        let target = Arc::new(Button);
        assert_eq!(
            attributor.attribute(&target, &store),
            AttributionOutcome::Exhausted
        );
        assert!(store.is_empty());
    }

    #[test]
    fn framework_constructor_chain_aborts() {
        let attributor = attributor(Vec::new(), EnablementGate::forced(true));
        let frames = vec![
            StackFrame::new("ui::Button::new", "/bin/app", 1),
            StackFrame::new("ui::Button::with_label", "/bin/app", 2),
            StackFrame::new("app::main", "/bin/app", 30),
        ];
        assert_eq!(
            attributor.locate("ui::Button", &frames),
            AttributionOutcome::FrameworkInternal {
                function: "ui::Button::with_label".into()
            }
        );
    }

    #[test]
    fn user_constructor_chain_attributes_to_chaining_constructor() {
        let attributor = attributor(Vec::new(), EnablementGate::forced(true));
        let frames = vec![
            StackFrame::new("app::Button::new", "/bin/app", 1),
            StackFrame::new("app::Button::with_label", "/bin/app", 6),
            StackFrame::new("app::main", "/bin/app", 30),
        ];
        assert_eq!(
            attributor.locate("app::Button", &frames),
            AttributionOutcome::Attributed(SourceLocation::new(
                Locator::code("app::Button::with_label", "app", "/bin/app"),
                7,
                1,
            ))
        );
    }

    #[test]
    fn override_table_short_circuits_the_walk() {
        let store = SourceLocationStore::new(EnablementGate::forced(true));
        let attributor = attributor(
            stack(vec![StackFrame::new("ui_core::internal", "/bin/app", 1)]),
            EnablementGate::forced(true),
        );
        let fixed = SourceLocation::new(Locator::file("main_page.rs"), 13, 3);
        let mut table = OverrideTable::new();
        table.insert::<Button>(fixed.clone());
        table.insert_named("app::Unused", fixed.clone());
        assert_eq!(table.remove_named("app::Unused"), Some(fixed.clone()));
        assert_eq!(table.remove_named("app::Unused"), None);
        attributor.set_overrides(table);
        let target = Arc::new(Button);

        assert_eq!(
            attributor.attribute(&target, &store),
            AttributionOutcome::Overridden(fixed.clone())
        );
        assert_eq!(store.get(&target), Some(fixed));
    }

    #[test]
    fn closed_gate_skips_everything() {
        let store = SourceLocationStore::new(EnablementGate::forced(true));
        let attributor = attributor(
            stack(vec![StackFrame::new("app::main", "/bin/app", 1)]),
            EnablementGate::forced(false),
        );
        let target = Arc::new(Button);
        assert_eq!(
            attributor.attribute(&target, &store),
            AttributionOutcome::Disabled
        );
        assert!(store.is_empty());
    }

    #[test]
    fn suppressed_thread_skips_attribution() {
        let store = SourceLocationStore::new(EnablementGate::forced(true));
        let attributor = attributor(
            stack(vec![StackFrame::new("app::main", "/bin/app", 1)]),
            EnablementGate::forced(true),
        );
        let target = Arc::new(Button);
        let _guard = suppress::enter_suppressed();
        assert_eq!(
            attributor.attribute(&target, &store),
            AttributionOutcome::Suppressed
        );
        assert!(store.is_empty());
    }

    #[test]
    fn attributor_keeps_its_config() {
        let attributor = attributor(Vec::new(), EnablementGate::forced(true));
        let config = attributor.config();
        assert!(config.framework_crates.iter().any(|c| c == "ui*"));
        assert_eq!(config.max_frames, DEFAULT_MAX_FRAMES);
        assert!(config.is_constructor_name("with_label"));
        assert!(!config.is_constructor_name("build"));
    }

    #[test]
    fn crate_patterns_match_exactly_or_by_prefix() {
        assert!(crate_matches("weft", "weft"));
        assert!(!crate_matches("weft_examples", "weft"));
        assert!(crate_matches("ui_widgets", "ui*"));
        assert!(!crate_matches("app", "ui*"));
    }

    #[test]
    fn override_table_converts_to_file_shape_sorted() {
        let mut table = OverrideTable::new();
        table.insert_named("b::B", SourceLocation::new(Locator::file("b.rs"), 2, 1));
        table.insert_named("a::A", SourceLocation::new(Locator::file("a.rs"), 1, 1));
        let file = OverrideTableFile::from(&table);
        let names: Vec<_> = file.overrides.iter().map(|e| e.type_name.as_str()).collect();
        assert_eq!(names, ["a::A", "b::B"]);
        assert_eq!(OverrideTable::from(file), table);
    }
}
