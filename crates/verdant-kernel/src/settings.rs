//! Runtime-adjustable settings shared between the simulation and its hosts.
//!
//! A UI control (or a test) holds a clone of [`SharedSettings`] and writes
//! new values; the simulation copies the whole value once at the start of
//! each tick, so fields that belong together (the min and max of one range)
//! are never read half-updated. Interested parties subscribe to changes
//! instead of re-reading the value on a timer.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use verdant_common::{ConfigError, SubscriptionId};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Check run against every candidate value before it is stored.
pub type Validator<T> = fn(&T) -> Result<(), ConfigError>;

#[derive(Default)]
struct Subscribers<T> {
    next_id: u32,
    callbacks: Vec<(SubscriptionId, Callback<T>)>,
}

/// Shared, observable settings value.
pub struct SharedSettings<T> {
    value: Arc<RwLock<T>>,
    subscribers: Arc<Mutex<Subscribers<T>>>,
    validator: Option<Validator<T>>,
}

impl<T> Clone for SharedSettings<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            subscribers: Arc::clone(&self.subscribers),
            validator: self.validator,
        }
    }
}

impl<T: Copy + PartialEq> SharedSettings<T> {
    /// Wraps an initial value.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(value)),
            subscribers: Arc::new(Mutex::new(Subscribers {
                next_id: 0,
                callbacks: Vec::new(),
            })),
            validator: None,
        }
    }

    /// Rejects any later write that fails `validator`.
    ///
    /// Clones made after this call share the check; the initial value is
    /// not re-checked.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator<T>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Copies the current value.
    #[must_use]
    pub fn snapshot(&self) -> T {
        *self.value.read()
    }

    /// Stores a new value and notifies subscribers if it differs.
    ///
    /// Returns `Ok(true)` if the value changed. A value the validator
    /// rejects is not stored and the current value stays in place.
    pub fn try_set(&self, value: T) -> Result<bool, ConfigError> {
        if let Some(validate) = self.validator {
            validate(&value)?;
        }
        {
            let mut current = self.value.write();
            if *current == value {
                return Ok(false);
            }
            *current = value;
        }
        self.notify(&value);
        Ok(true)
    }

    /// Modifies a copy of the value and stores it through [`Self::try_set`].
    pub fn try_update(&self, f: impl FnOnce(&mut T)) -> Result<bool, ConfigError> {
        let mut next = self.snapshot();
        f(&mut next);
        self.try_set(next)
    }

    /// Like [`Self::try_set`], but logs a rejected value instead of
    /// returning it.
    ///
    /// Returns true if the value changed.
    pub fn set(&self, value: T) -> bool {
        self.try_set(value).unwrap_or_else(|e| {
            warn!("Rejected settings change: {e}");
            false
        })
    }

    /// Modifies the value in place and notifies subscribers if it changed.
    ///
    /// Rejected changes are logged and leave the value untouched.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.snapshot();
        f(&mut next);
        self.set(next)
    }

    /// Registers a callback invoked with the new value after every change.
    ///
    /// Callbacks run on the thread that called [`SharedSettings::set`], after
    /// the value lock is released.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let mut subscribers = self.subscribers.lock();
        let id = SubscriptionId::new(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.callbacks.push((id, Arc::new(callback)));
        debug!("Settings subscriber {} registered", id.raw());
        id
    }

    /// Removes a callback. Returns false if the ID was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.callbacks.len();
        subscribers.callbacks.retain(|(sub, _)| *sub != id);
        subscribers.callbacks.len() != before
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().callbacks.len()
    }

    fn notify(&self, value: &T) {
        // Clone the list so callbacks may subscribe or set without deadlocking
        let callbacks: Vec<Callback<T>> = self
            .subscribers
            .lock()
            .callbacks
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }
}

impl<T: Copy + PartialEq + Default> Default for SharedSettings<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SharedSettings<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSettings")
            .field("value", &*self.value.read())
            .field("subscribers", &self.subscribers.lock().callbacks.len())
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

/// Testing and tuning overrides, injected into an effect instead of being
/// read from ambient global state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugOverrides {
    /// Pins morph and rise progress to this value in `[0, 1]`.
    pub forced_progress: Option<f32>,
    /// Stops new emission while leaving live particles alone.
    pub suppress_emission: bool,
}

impl DebugOverrides {
    /// Checks that a forced progress, if any, lies in `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.forced_progress {
            Some(p) if !p.is_finite() => Err(ConfigError::NonFinite {
                field: "forced_progress",
            }),
            Some(p) if !(0.0..=1.0).contains(&p) => Err(ConfigError::OutOfRange {
                field: "forced_progress",
                value: p,
                min: 0.0,
                max: 1.0,
            }),
            _ => Ok(()),
        }
    }

    /// Forced progress clamped to `[0, 1]`, with non-finite values read as 0.
    #[must_use]
    pub fn forced_progress_clamped(&self) -> Option<f32> {
        self.forced_progress
            .map(|p| if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 })
    }
}

/// Accessor polled once per tick for the current overrides.
pub type OverrideAccessor = Arc<dyn Fn() -> DebugOverrides + Send + Sync>;

impl SharedSettings<DebugOverrides> {
    /// An accessor reading this handle.
    #[must_use]
    pub fn accessor(&self) -> OverrideAccessor {
        let handle = self.clone();
        Arc::new(move || handle.snapshot())
    }
}
