//! Observable value container that re-publishes the whole value when watched key paths change.
//!
//! An [`ObservableBox`] holds a value and publishes it through a [`ValueStream`]
//! in two situations: when the value is replaced with [`ObservableBox::set`], and
//! when one of the key paths the box watches changes *inside* the current value.
//! Subscribers always receive the whole value, never the property that changed.
//!
//! How a change inside the value is detected is up to the value type through the
//! [`Watchable`] trait. The [`watchable!`] macro declares types built from
//! [`Property`] cells that implement it.
//!
//! ```
//! use watchbox::{watchable, ObservableBox};
//! use std::sync::{Arc, Mutex};
//!
//! watchable! {
//!     pub struct Progress {
//!         total_unit_count: i64,
//!         completed_unit_count: i64,
//!     }
//! }
//!
//! let progress = Progress::new(5, 0);
//! let boxed = ObservableBox::with_path(progress.clone(), "completed_unit_count").unwrap();
//!
//! let fractions: Arc<Mutex<Vec<f64>>> = Default::default();
//! let _subscription = boxed.subscribe({
//!     let fractions = fractions.clone();
//!     move |p: &Progress| {
//!         let fraction = p.completed_unit_count() as f64 / p.total_unit_count() as f64;
//!         fractions.lock().unwrap().push(fraction);
//!     }
//! });
//!
//! progress.update_completed_unit_count(|n| n + 1);
//! progress.update_completed_unit_count(|n| n + 1);
//!
//! assert_eq!(vec![0.0, 0.2, 0.4], fractions.lock().unwrap().clone());
//! ```

mod error;
mod key_path;
mod macros;
mod observable_box;
mod property;
mod stream;
mod watch;

pub use error::{Error, Result};
pub use key_path::KeyPath;
pub use observable_box::ObservableBox;
pub use property::Property;
pub use stream::{Subscription, ValueStream};
pub use watch::{OnChange, WatchHandle, Watchable};

#[doc(hidden)]
pub use paste::paste as __paste;
