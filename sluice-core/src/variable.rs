//! The typed variable store.
//!
//! A [`Variable`] is a named slot holding at most one value of any type at
//! a time. Values are type-erased on `set` and recovered with an
//! exact-type check on `get`/`take`: there is no implicit widening, and a
//! mismatch reports both the stored and the requested type by name.

use crate::error::{Result, SluiceError};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::any::Any;
use std::fmt;

/// A guarded shared reference to a variable's current value.
pub type ValueRef<'a, T> = MappedMutexGuard<'a, T>;

struct Slot {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

/// A named slot holding at most one dynamically-typed value.
///
/// Variables are owned by their [`Graph`](crate::graph::Graph) and are
/// set/cleared once per execution round. The internal lock is uncontended
/// under the scheduler's activation discipline (an operator only runs once
/// all of its inputs are set, and each output has exactly one producer);
/// it exists so session hooks running on slot threads get the same safe
/// access as operators.
pub struct Variable {
    name: String,
    slot: Mutex<Option<Slot>>,
}

impl Variable {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(None),
        }
    }

    /// The variable's name, unique within its graph.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a value is currently held.
    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Store a value, dropping any previously held value.
    pub fn set<T: Any + Send>(&self, value: T) {
        *self.slot.lock() = Some(Slot {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        });
    }

    /// Drop the held value, if any. Idempotent.
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }

    /// Borrow the held value as `T`.
    ///
    /// Fails with [`SluiceError::VariableNotSet`] if nothing is held, or
    /// [`SluiceError::TypeMismatch`] if the held value was stored as a
    /// different type.
    pub fn get<T: Any>(&self) -> Result<ValueRef<'_, T>> {
        let guard = self.slot.lock();
        {
            let slot = guard.as_ref().ok_or_else(|| SluiceError::VariableNotSet {
                name: self.name.clone(),
            })?;
            if !slot.value.is::<T>() {
                return Err(SluiceError::TypeMismatch {
                    name: self.name.clone(),
                    actual: slot.type_name.to_string(),
                    requested: std::any::type_name::<T>().to_string(),
                });
            }
        }
        Ok(MutexGuard::map(guard, |slot| {
            slot.as_mut()
                .expect("presence checked above")
                .value
                .downcast_mut::<T>()
                .expect("type checked above")
        }))
    }

    /// Move the held value out as `T`, leaving the variable unset.
    ///
    /// On a type mismatch the value is left in place and an error is
    /// returned.
    pub fn take<T: Any>(&self) -> Result<T> {
        let mut guard = self.slot.lock();
        let slot = guard.take().ok_or_else(|| SluiceError::VariableNotSet {
            name: self.name.clone(),
        })?;
        match slot.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => {
                let actual = slot.type_name;
                *guard = Some(Slot {
                    value,
                    type_name: actual,
                });
                Err(SluiceError::TypeMismatch {
                    name: self.name.clone(),
                    actual: actual.to_string(),
                    requested: std::any::type_name::<T>().to_string(),
                })
            }
        }
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("is_set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let v = Variable::new("img");
        assert!(!v.is_set());
        v.set(String::from("payload"));
        assert!(v.is_set());
        assert_eq!(*v.get::<String>().unwrap(), "payload");
    }

    #[test]
    fn get_unset_fails() {
        let v = Variable::new("img");
        let err = v.get::<String>().unwrap_err();
        assert_eq!(err.code(), "E011");
        assert!(format!("{}", err).contains("img"));
    }

    #[test]
    fn type_mismatch_names_both_types() {
        let v = Variable::new("count");
        v.set(7u32);
        let err = v.get::<String>().unwrap_err();
        assert_eq!(err.code(), "E012");
        let msg = format!("{}", err);
        assert!(msg.contains("u32"));
        assert!(msg.contains("String"));
        // the stored value survives a failed cast
        assert_eq!(*v.get::<u32>().unwrap(), 7);
    }

    #[test]
    fn set_replaces_previous_value() {
        let v = Variable::new("x");
        v.set(String::from("old"));
        v.set(42i64);
        assert!(v.get::<String>().is_err());
        assert_eq!(*v.get::<i64>().unwrap(), 42);
    }

    #[test]
    fn clear_is_idempotent() {
        let v = Variable::new("x");
        v.set(1u8);
        v.clear();
        assert!(!v.is_set());
        v.clear();
        assert!(!v.is_set());
    }

    #[test]
    fn take_moves_value_out() {
        let v = Variable::new("x");
        v.set(String::from("gone"));
        let s: String = v.take().unwrap();
        assert_eq!(s, "gone");
        assert!(!v.is_set());
    }

    #[test]
    fn take_mismatch_keeps_value() {
        let v = Variable::new("x");
        v.set(3.5f64);
        assert_eq!(v.take::<String>().unwrap_err().code(), "E012");
        assert!(v.is_set());
        assert_eq!(v.take::<f64>().unwrap(), 3.5);
    }
}
