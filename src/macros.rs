/// Declares a struct whose fields can be watched by key path.
///
/// Every field becomes a [`Property`](crate::Property). The generated type is a
/// shared handle (cloning it does not copy the fields), and comes with:
///
/// - `new(..)` taking the initial field values in declaration order
/// - a getter per field, plus `set_<field>` and `update_<field>` which notify watchers
/// - `ptr_eq` to compare handle identity
/// - a `<Name>Path` enum with one variant per field
/// - a [`Watchable`](crate::Watchable) implementation resolving field names
///
/// Field types must be `Clone`.
///
/// # Examples
/// ```
/// use watchbox::{watchable, KeyPath, Watchable};
///
/// watchable! {
///     #[derive(Debug, Default)]
///     pub struct Progress {
///         total_unit_count: i64,
///         completed_unit_count: i64,
///     }
/// }
///
/// let progress = Progress::new(5, 0);
/// progress.update_completed_unit_count(|n| n + 1);
/// assert_eq!(1, progress.completed_unit_count());
///
/// let path = Progress::resolve(&KeyPath::parse("completed_unit_count").unwrap()).unwrap();
/// assert_eq!(ProgressPath::CompletedUnitCount, path);
/// assert_eq!("completed_unit_count", path.name());
/// ```
#[macro_export]
macro_rules! watchable {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),+ $(,)?
        }
    ) => { $crate::__paste! {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $crate::Property<$ty>, )+
        }

        impl $name {
            #[allow(clippy::too_many_arguments)]
            pub fn new($( $field: $ty ),+) -> Self {
                Self {
                    $( $field: $crate::Property::new($field), )+
                }
            }

            $(
                pub fn $field(&self) -> $ty {
                    self.$field.value()
                }

                pub fn [<set_ $field>](&self, value: $ty) {
                    self.$field.set(value);
                }

                pub fn [<update_ $field>](&self, f: impl FnOnce(&$ty) -> $ty) {
                    self.$field.update_unchecked(f);
                }
            )+

            /// Returns `true` when both handles refer to the same object.
            pub fn ptr_eq(&self, other: &Self) -> bool {
                true $( && self.$field.ptr_eq(&other.$field) )+
            }
        }

        impl ::std::clone::Clone for $name {
            fn clone(&self) -> Self {
                Self {
                    $( $field: self.$field.clone(), )+
                }
            }
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum [<$name Path>] {
            $( [<$field:camel>], )+
        }

        impl [<$name Path>] {
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::[<$field:camel>] => stringify!($field), )+
                }
            }
        }

        impl $crate::Watchable for $name {
            type Path = [<$name Path>];

            fn resolve(path: &$crate::KeyPath) -> $crate::Result<Self::Path> {
                $(
                    if path.as_str() == stringify!($field) {
                        return Ok([<$name Path>]::[<$field:camel>]);
                    }
                )+
                Err($crate::Error::UnknownKeyPath {
                    path: path.to_string(),
                    owner: stringify!($name),
                })
            }

            fn watch(&self, path: &Self::Path, on_change: $crate::OnChange) -> $crate::WatchHandle {
                match path {
                    $( [<$name Path>]::[<$field:camel>] => self.$field.watch(move |_| on_change()), )+
                }
            }
        }
    }};
}
