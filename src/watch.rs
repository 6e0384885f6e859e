use std::{fmt, sync::Arc};

use crate::{KeyPath, Result};

/// Callback handed to [`Watchable::watch`]. Invoked once per change of the watched property.
pub type OnChange = Arc<dyn Fn() + Send + Sync>;

/// The property observation capability an [`ObservableBox`](crate::ObservableBox) relies on.
///
/// Implementors decide how changes are detected (setter wrapping, generated
/// accessors, anything else). The box only needs to resolve key paths once and
/// then register and cancel callbacks on whichever value it currently holds.
///
/// Types declared with [`watchable!`](crate::watchable) get an implementation for free.
///
/// # Examples
/// ```
/// use watchbox::{Error, KeyPath, OnChange, Property, Result, WatchHandle, Watchable};
///
/// #[derive(Clone)]
/// struct Temperature {
///     celsius: Property<f64>,
/// }
///
/// impl Watchable for Temperature {
///     type Path = ();
///
///     fn resolve(path: &KeyPath) -> Result<()> {
///         match path.as_str() {
///             "celsius" => Ok(()),
///             _ => Err(Error::UnknownKeyPath {
///                 path: path.to_string(),
///                 owner: "Temperature",
///             }),
///         }
///     }
///
///     fn watch(&self, _: &(), on_change: OnChange) -> WatchHandle {
///         self.celsius.watch(move |_| on_change())
///     }
/// }
///
/// assert!(Temperature::resolve(&"kelvin".parse().unwrap()).is_err());
/// ```
pub trait Watchable {
    /// A key path that has been checked against this type.
    type Path: Send + Sync + 'static;

    fn resolve(path: &KeyPath) -> Result<Self::Path>;

    /// Registers `on_change` against `path` on this particular instance.
    /// The registration lives until the returned handle is cancelled or dropped.
    fn watch(&self, path: &Self::Path, on_change: OnChange) -> WatchHandle;
}

/// One active registration made through [`Watchable::watch`].
///
/// Cancelling is idempotent, and dropping the handle cancels it.
#[must_use = "dropping a WatchHandle cancels the watch"]
pub struct WatchHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to tear down.
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}
