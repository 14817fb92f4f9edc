use crate::keba_report::{Report2, Report3};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Values derived from the reports, as shown to the bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub plugged_or_charging: bool,
    pub output_percent: u8,
    /// Hardware current ceiling in mA, zero until the first report 2 arrives
    pub max_current_hw: u32,
}

/// Everything the metrics endpoint needs in one consistent copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub device: DeviceState,
    pub last_report2: Option<Report2>,
    pub last_report3: Option<Report3>,
}

/// Shared handle to the latest device state and reports.
///
/// The deriver task is the only writer; the accessory get-handlers and the metrics
/// endpoint only read. Cloning the store clones the handle, not the data.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<Snapshot>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_state(&self) -> DeviceState {
        self.lock().device
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    /// Applies a mutation under the lock so readers never see half an update.
    pub(crate) fn update<R>(&self, mutate: impl FnOnce(&mut Snapshot) -> R) -> R {
        let mut guard = self.lock();
        mutate(&mut guard)
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        // A panicking writer cannot leave plain values in a torn state
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keba_report::{PlugStatus, WallboxState};

    #[test]
    fn test_new_store_is_empty() {
        let store = StateStore::new();
        let snapshot = store.snapshot();

        assert_eq!(snapshot.device, DeviceState::default());
        assert_eq!(snapshot.device.output_percent, 0);
        assert!(!snapshot.device.plugged_or_charging);
        assert!(snapshot.last_report2.is_none());
        assert!(snapshot.last_report3.is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let writer = StateStore::new();
        let reader = writer.clone();

        writer.update(|snapshot| {
            snapshot.device.output_percent = 42;
            snapshot.last_report2 = Some(Report2 {
                state: WallboxState::Plugged,
                plug: PlugStatus(7),
                max_current_hw: 16000,
                max_current_user: Some(16000),
            });
        });

        assert_eq!(reader.device_state().output_percent, 42);
        assert_eq!(
            reader.snapshot().last_report2.map(|report| report.state),
            Some(WallboxState::Plugged)
        );
    }
}
