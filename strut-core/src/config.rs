// Runtime strictness configuration
//
// Both switches select between the permissive legacy behavior (warn and
// continue) and a strict failure. They default to permissive.

use tracing::debug;

/// Strictness switches for the container and the dispatcher.
///
/// `strict_constructor_selection` turns the first-declared constructor
/// fallback into an `AmbiguousConstructor` error. `strict_binding` turns an
/// unbindable handler parameter into an `UnbindableParameter` error instead
/// of passing an absent value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreConfig {
    pub strict_constructor_selection: bool,
    pub strict_binding: bool,
}

impl CoreConfig {
    /// Permissive defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Both strictness switches enabled
    pub fn strict() -> Self {
        Self {
            strict_constructor_selection: true,
            strict_binding: true,
        }
    }

    /// Fail instead of falling back to the first declared constructor
    pub fn with_strict_constructor_selection(mut self, enable: bool) -> Self {
        self.strict_constructor_selection = enable;
        self
    }

    /// Fail instead of binding absent values for unresolvable parameters
    pub fn with_strict_binding(mut self, enable: bool) -> Self {
        self.strict_binding = enable;
        self
    }

    /// Read `STRUT_STRICT_CONSTRUCTORS` and `STRUT_STRICT_BINDING`
    /// ("1" or "true" enables the switch).
    pub fn from_env() -> Self {
        fn flag(name: &str) -> bool {
            std::env::var(name)
                .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        }

        let config = Self {
            strict_constructor_selection: flag("STRUT_STRICT_CONSTRUCTORS"),
            strict_binding: flag("STRUT_STRICT_BINDING"),
        };
        debug!(?config, "core config loaded from environment");
        config
    }
}
