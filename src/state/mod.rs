//! Run-scoped key/value state handed to every unit.
//!
//! - [`BaseState`] is the default shared map behind a reader-writer lock.
//! - [`OverlayState`] shadows a lower state; writes stay local until
//!   [`OverlayState::sync`].
//! - [`GuardState`] filters reads and writes through a per-key permission
//!   function.

mod base;
mod guard;
mod overlay;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::AppResult;

pub use base::BaseState;
pub use guard::{Access, GuardState};
pub use overlay::OverlayState;

/// Key/value store shared by the units of a run.
pub trait State: Send + Sync {
    /// Current value for `key`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`.
    fn set(&self, key: &str, value: Value);

    /// Read-modify-write `key` atomically with respect to this state's lock.
    ///
    /// `f` receives the current value (`None` if absent) and returns the new one.
    fn update(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Value);
}

/// Shared handle to a state.
pub type SharedState = Arc<dyn State>;

/// Typed helpers over any [`State`].
pub trait StateExt: State {
    /// Deserialize the value under `key`; `None` if missing or of another shape.
    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Store `value` under `key`; an existing non-null value is kept unless
    /// `overwrite` is set.
    fn save<T: Serialize>(&self, key: &str, value: &T, overwrite: bool) -> AppResult<()> {
        let new = serde_json::to_value(value)?;
        self.update(key, &mut |old| match old {
            Some(old) if !old.is_null() && !overwrite => old,
            _ => new.clone(),
        });
        Ok(())
    }

    /// Update the value under `key` as a `T`.
    ///
    /// A missing key passes `T::default()`. If the stored value does not
    /// deserialize as `T` it is left untouched and an error is returned.
    fn update_as<T, F>(&self, key: &str, f: F) -> AppResult<()>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(T) -> T,
    {
        let mut f = Some(f);
        let mut failure = None;
        self.update(key, &mut |old| {
            let current = match old.clone() {
                None | Some(Value::Null) => Ok(T::default()),
                Some(value) => serde_json::from_value::<T>(value),
            };
            let outcome = current
                .map_err(anyhow::Error::from)
                .and_then(|current| {
                    let apply = f.take().ok_or_else(|| anyhow::anyhow!("update applied twice"))?;
                    Ok(serde_json::to_value(apply(current))?)
                });
            match outcome {
                Ok(value) => value,
                Err(err) => {
                    failure = Some(err);
                    old.unwrap_or(Value::Null)
                }
            }
        });
        failure.map_or(Ok(()), Err)
    }
}

impl<S: State + ?Sized> StateExt for S {}
