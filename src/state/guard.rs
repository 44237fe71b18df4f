//! Permission-filtered view over another state.

use serde_json::Value;

use super::{SharedState, State};

/// Per-key permission returned by a guard function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    read: bool,
    write: bool,
}

impl Access {
    /// Neither read nor write.
    pub const NONE: Self = Self {
        read: false,
        write: false,
    };
    /// Read only.
    pub const READ: Self = Self {
        read: true,
        write: false,
    };
    /// Write only.
    pub const WRITE: Self = Self {
        read: false,
        write: true,
    };
    /// Read and write.
    pub const ALL: Self = Self {
        read: true,
        write: true,
    };

    /// Whether reads are allowed.
    #[must_use]
    pub const fn allows_read(self) -> bool {
        self.read
    }

    /// Whether writes are allowed.
    #[must_use]
    pub const fn allows_write(self) -> bool {
        self.write
    }
}

impl std::ops::BitOr for Access {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            read: self.read || rhs.read,
            write: self.write || rhs.write,
        }
    }
}

type GuardFn = Box<dyn Fn(&str) -> Access + Send + Sync>;

/// Wraps a target state; denied reads miss and denied writes are dropped.
///
/// Updates need both permissions. Typical use is revoking write access once a
/// deadline passes or a race has a winner.
pub struct GuardState {
    target: SharedState,
    guard: GuardFn,
}

impl GuardState {
    /// Guard `target` with `guard`.
    pub fn new<F>(target: SharedState, guard: F) -> Self
    where
        F: Fn(&str) -> Access + Send + Sync + 'static,
    {
        Self {
            target,
            guard: Box::new(guard),
        }
    }

    /// Guard that allows everything.
    #[must_use]
    pub fn permissive(target: SharedState) -> Self {
        Self::new(target, |_| Access::ALL)
    }
}

impl State for GuardState {
    fn get(&self, key: &str) -> Option<Value> {
        if (self.guard)(key).allows_read() {
            self.target.get(key)
        } else {
            None
        }
    }

    fn set(&self, key: &str, value: Value) {
        if (self.guard)(key).allows_write() {
            self.target.set(key, value);
        }
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Value) {
        let access = (self.guard)(key);
        if access.allows_read() && access.allows_write() {
            self.target.update(key, f);
        }
    }
}

impl std::fmt::Debug for GuardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardState").finish_non_exhaustive()
    }
}
