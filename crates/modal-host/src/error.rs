#![forbid(unsafe_code)]

//! Errors raised by the host layer.

/// Configuration errors surfaced while rendering modal windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    /// Window context was requested outside a rendered modal window.
    NoActiveWindow,
    /// The window in context has already been closed.
    WindowClosed,
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActiveWindow => {
                write!(f, "window context must be used within a rendered modal window")
            }
            Self::WindowClosed => write!(f, "modal window in context is already closed"),
        }
    }
}

impl std::error::Error for HostError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_descriptive() {
        assert!(HostError::NoActiveWindow.to_string().contains("within a rendered"));
        assert!(HostError::WindowClosed.to_string().contains("closed"));
    }

    #[test]
    fn is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(HostError::NoActiveWindow);
        assert!(err.source().is_none());
    }
}
