use facet::Facet;
use std::fmt;

/// Where a source location points.
///
/// `File` carries a file-style locator (usually `file://...`, but relative
/// locators from configuration are kept verbatim). `Code` is synthesized by
/// stack attribution when only symbol information is available.
#[derive(Facet, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum Locator {
    File(String),
    Code {
        /// Fully qualified function path, e.g. `app::pages::MainPage::build`.
        function: String,
        /// Crate that owns `function`.
        krate: String,
        /// Path of the loaded module (executable or shared object) holding the code.
        module_path: String,
    },
}

impl Locator {
    pub fn file(path: impl Into<String>) -> Self {
        Self::File(path.into())
    }

    pub fn code(
        function: impl Into<String>,
        krate: impl Into<String>,
        module_path: impl Into<String>,
    ) -> Self {
        Self::Code {
            function: function.into(),
            krate: krate.into(),
            module_path: module_path.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.write_str(path),
            Self::Code {
                function,
                krate,
                module_path,
            } => write!(f, "code:{function}, {krate}, {module_path}"),
        }
    }
}

/// Best-effort record of the code responsible for creating an object.
///
/// Line and column are 1-based.
#[derive(Facet, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub locator: Locator,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(locator: Locator, line: u32, column: u32) -> Self {
        Self {
            locator,
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.locator, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_locator_display_lists_function_crate_and_module() {
        let locator = Locator::code("app::pages::MainPage::build", "app", "/usr/bin/app");
        assert_eq!(
            locator.to_string(),
            "code:app::pages::MainPage::build, app, /usr/bin/app"
        );
    }

    #[test]
    fn source_location_display_appends_line_and_column() {
        let location = SourceLocation::new(Locator::file("file:///src/main.rs"), 12, 5);
        assert_eq!(location.to_string(), "file:///src/main.rs:12:5");
    }
}
