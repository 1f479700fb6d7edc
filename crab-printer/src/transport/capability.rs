use std::fmt;
use std::sync::Arc;

/// A platform backend that may or may not be present
///
/// Channels that depend on an optional driver (USB, Bluetooth) take one of
/// these at construction instead of probing globals.
pub enum Capability<T: ?Sized> {
    Available(Arc<T>),
    Missing { reason: String },
}

impl<T: ?Sized> Capability<T> {
    pub fn available(backend: Arc<T>) -> Self {
        Self::Available(backend)
    }

    pub fn missing(reason: impl Into<String>) -> Self {
        Self::Missing {
            reason: reason.into(),
        }
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        match self {
            Self::Available(backend) => Some(backend),
            Self::Missing { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Why the backend is absent, if it is
    pub fn missing_reason(&self) -> Option<&str> {
        match self {
            Self::Available(_) => None,
            Self::Missing { reason } => Some(reason),
        }
    }
}

impl<T: ?Sized> Clone for Capability<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Available(backend) => Self::Available(Arc::clone(backend)),
            Self::Missing { reason } => Self::Missing {
                reason: reason.clone(),
            },
        }
    }
}

impl<T: ?Sized> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available(_) => f.write_str("Available"),
            Self::Missing { reason } => f.debug_struct("Missing").field("reason", reason).finish(),
        }
    }
}
