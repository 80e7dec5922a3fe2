use std::sync::{Arc, PoisonError, RwLock};

use crate::protocol::DeviceStateUpdate;

/// Last-known device state. All telemetry fields start unknown and stay
/// unknown until the first valid message reports them; an unset field must
/// never be read as zero or any other real value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    pub current_humidity: Option<u8>,
    pub current_temperature: Option<f64>,
    pub fan_speed: Option<u8>,
    pub is_active: Option<bool>,
    pub target_humidity: Option<u8>,
    pub connected: bool,
}

/// Cheaply clonable handle to the shared device state. One writer (the
/// telemetry loop) and many readers (accessor calls); no await happens while
/// the lock is held.
#[derive(Clone, Default)]
pub struct StateCache {
    inner: Arc<RwLock<DeviceState>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite only the fields present in the update, last-write-wins per
    /// field. Fields the update does not carry keep their cached value.
    pub fn apply_update(&self, update: &DeviceStateUpdate) {
        let mut state = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(v) = update.current_humidity {
            state.current_humidity = Some(v);
        }
        if let Some(v) = update.current_temperature {
            state.current_temperature = Some(v);
        }
        if let Some(v) = update.fan_speed {
            state.fan_speed = Some(v);
        }
        if let Some(v) = update.is_active {
            state.is_active = Some(v);
        }
        if let Some(v) = update.target_humidity {
            state.target_humidity = Some(v);
        }
    }

    /// Consistent read of all fields at a single point in time.
    pub fn snapshot(&self) -> DeviceState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_fully_unknown_and_disconnected() {
        let cache = StateCache::new();
        let state = cache.snapshot();
        assert_eq!(state, DeviceState::default());
        assert!(!cache.is_connected());
    }

    #[test]
    fn partial_update_preserves_other_fields() {
        let cache = StateCache::new();
        cache.apply_update(&DeviceStateUpdate {
            current_humidity: Some(55),
            fan_speed: Some(2),
            ..Default::default()
        });
        cache.apply_update(&DeviceStateUpdate {
            target_humidity: Some(60),
            ..Default::default()
        });

        let state = cache.snapshot();
        assert_eq!(state.current_humidity, Some(55));
        assert_eq!(state.fan_speed, Some(2));
        assert_eq!(state.target_humidity, Some(60));
        assert_eq!(state.is_active, None);
    }

    #[test]
    fn duplicate_updates_follow_last_write_wins() {
        let cache = StateCache::new();
        cache.apply_update(&DeviceStateUpdate {
            is_active: Some(true),
            ..Default::default()
        });
        cache.apply_update(&DeviceStateUpdate {
            is_active: Some(false),
            ..Default::default()
        });
        assert_eq!(cache.snapshot().is_active, Some(false));
    }

    #[test]
    fn connectivity_flag_round_trips() {
        let cache = StateCache::new();
        cache.set_connected(true);
        assert!(cache.is_connected());
        assert!(cache.snapshot().connected);
        cache.set_connected(false);
        assert!(!cache.is_connected());
    }
}
