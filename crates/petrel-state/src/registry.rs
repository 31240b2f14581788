use std::collections::HashMap;
use std::sync::Mutex;

/// Telemetry fields the flight units share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    /// Current system time, unix seconds.
    Time,
    /// System time of the first clock tick after power-up, unix seconds.
    /// Holds [`BOOT_TIME_UNSET`] until the clock unit latches it.
    BootTime,
    /// Battery bus voltage reported by the EPS, volts.
    BatteryBusVolts,
}

/// Sentinel stored in [`StateField::BootTime`] before the first clock tick.
pub const BOOT_TIME_UNSET: f64 = -1.0;

/// Shared numeric telemetry registry.
///
/// Read units (clock, EPS sampler) write; anyone reads. Fields that were
/// never written read back as `None`.
pub struct StateRegistry {
    fields: Mutex<HashMap<StateField, f64>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        let mut fields = HashMap::new();
        fields.insert(StateField::BootTime, BOOT_TIME_UNSET);
        Self { fields: Mutex::new(fields) }
    }

    pub fn update(&self, field: StateField, value: f64) {
        self.fields.lock().unwrap().insert(field, value);
    }

    pub fn get(&self, field: StateField) -> Option<f64> {
        self.fields.lock().unwrap().get(&field).copied()
    }
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_fields_read_back_as_none() {
        let registry = StateRegistry::new();
        assert_eq!(registry.get(StateField::Time), None);
        assert_eq!(registry.get(StateField::BatteryBusVolts), None);
    }

    #[test]
    fn boot_time_starts_at_the_sentinel() {
        let registry = StateRegistry::new();
        assert_eq!(registry.get(StateField::BootTime), Some(BOOT_TIME_UNSET));
    }

    #[test]
    fn update_overwrites() {
        let registry = StateRegistry::new();
        registry.update(StateField::BatteryBusVolts, 4.12);
        registry.update(StateField::BatteryBusVolts, 3.97);
        assert_eq!(registry.get(StateField::BatteryBusVolts), Some(3.97));
    }
}
