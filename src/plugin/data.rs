//! Plugin-owned opaque state.
//!
//! [`PluginData`] is the blob the core relays between plugin calls without
//! looking inside. Plugins store whatever type they like and get it back
//! with a typed downcast.

use std::any::Any;
use std::fmt;

trait OpaqueValue: Any + Send + Sync + fmt::Debug {
    fn clone_boxed(&self) -> Box<dyn OpaqueValue>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Clone + Send + Sync + fmt::Debug> OpaqueValue for T {
    fn clone_boxed(&self) -> Box<dyn OpaqueValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An optional, cloneable, type-erased value owned by a plugin.
///
/// Cloning deep-copies the stored value, so a cloned target or ensemble
/// never aliases the original's plugin state.
///
/// ```
/// use ensemble_fit::plugin::PluginData;
///
/// let mut data = PluginData::empty();
/// if let Some(values) = data.get_or_insert_with(Vec::<f64>::new) {
///     values.push(1.5);
/// }
/// assert_eq!(data.downcast_ref::<Vec<f64>>(), Some(&vec![1.5]));
/// assert!(data.downcast_ref::<String>().is_none());
/// ```
#[derive(Default)]
pub struct PluginData(Option<Box<dyn OpaqueValue>>);

impl PluginData {
    /// Wraps a value.
    pub fn new<T: Any + Clone + Send + Sync + fmt::Debug>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    /// Creates an empty slot.
    pub fn empty() -> Self {
        Self(None)
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Replaces the stored value.
    pub fn set<T: Any + Clone + Send + Sync + fmt::Debug>(&mut self, value: T) {
        self.0 = Some(Box::new(value));
    }

    /// Empties the slot.
    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// Borrows the stored value if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0
            .as_deref()
            .and_then(|value| value.as_any().downcast_ref::<T>())
    }

    /// Mutably borrows the stored value if it has type `T`.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0
            .as_deref_mut()
            .and_then(|value| value.as_any_mut().downcast_mut::<T>())
    }

    /// Returns the stored `T`, first storing `f()` if the slot is empty or
    /// holds a different type. A value of another type is dropped.
    pub fn get_or_insert_with<T, F>(&mut self, f: F) -> Option<&mut T>
    where
        T: Any + Clone + Send + Sync + fmt::Debug,
        F: FnOnce() -> T,
    {
        if self.downcast_ref::<T>().is_none() {
            self.set(f());
        }
        self.downcast_mut::<T>()
    }
}

impl Clone for PluginData {
    fn clone(&self) -> Self {
        Self(self.0.as_deref().map(|value| value.clone_boxed()))
    }
}

impl fmt::Debug for PluginData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_deref() {
            Some(value) => f.debug_tuple("PluginData").field(value).finish(),
            None => f.write_str("PluginData(<empty>)"),
        }
    }
}
