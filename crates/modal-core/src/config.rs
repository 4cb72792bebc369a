#![forbid(unsafe_code)]

//! Controller construction options.

use crate::params::ParamsPatch;

/// Options recognized by [`ModalController::with_config`](crate::ModalController::with_config).
#[derive(Debug, Clone, Default)]
pub struct ModalConfig {
    /// Lowest-precedence overrides applied on top of the built-in defaults.
    pub default_params: ParamsPatch,
}

impl ModalConfig {
    /// Configuration with no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set controller-level default params.
    #[must_use]
    pub fn default_params(mut self, params: ParamsPatch) -> Self {
        self.default_params = params;
        self
    }
}
