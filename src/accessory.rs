use crate::state_store::StateStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Characteristics of the Fan service the wallbox is presented as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Fan `On`: a vehicle is charging or plugged in and locked
    PoweredOn,
    /// Fan `RotationSpeed`: output current as percent of the hardware ceiling
    OutputPercent,
}

impl Characteristic {
    pub fn name(self) -> &'static str {
        match self {
            Self::PoweredOn => "poweredOn",
            Self::OutputPercent => "outputPercent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicValue {
    Bool(bool),
    Percent(u8),
}

/// Push side of the bridge: receives every characteristic change as it happens.
///
/// Updates are fire-and-forget and assumed to succeed.
pub trait CharacteristicSink: Send + Sync + 'static {
    fn set_characteristic(&self, characteristic: Characteristic, value: CharacteristicValue);
}

impl<S: CharacteristicSink + ?Sized> CharacteristicSink for Arc<S> {
    fn set_characteristic(&self, characteristic: Characteristic, value: CharacteristicValue) {
        (**self).set_characteristic(characteristic, value)
    }
}

/// Static information shown by the bridge for the accessory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInfo {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub firmware_revision: String,
    pub serial_number: String,
}

impl AccessoryInfo {
    pub fn keba_p30(name: &str) -> Self {
        Self {
            name: name.to_string(),
            manufacturer: "homekit.xoblite.net".to_string(),
            model: "KEBA P30 Wallbox".to_string(),
            firmware_revision: "18.10.23".to_string(),
            serial_number: "HAP-NodeJS".to_string(),
        }
    }
}

/// Live characteristic model of the wallbox accessory.
///
/// Pushed values are kept per characteristic so the host can observe what was last
/// published; get-handlers answer from the device state itself.
#[derive(Debug, Clone)]
pub struct FanAccessory {
    info: AccessoryInfo,
    store: StateStore,
    published: Arc<Mutex<HashMap<Characteristic, CharacteristicValue>>>,
}

impl FanAccessory {
    pub fn new(info: AccessoryInfo, store: StateStore) -> Self {
        Self {
            info,
            store,
            published: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn info(&self) -> &AccessoryInfo {
        &self.info
    }

    /// Get-handler used when the host polls a characteristic.
    pub fn get(&self, characteristic: Characteristic) -> CharacteristicValue {
        let device = self.store.device_state();
        match characteristic {
            Characteristic::PoweredOn => CharacteristicValue::Bool(device.plugged_or_charging),
            Characteristic::OutputPercent => CharacteristicValue::Percent(device.output_percent),
        }
    }

    /// Set-handler for writes coming from the host. The wallbox is only observed,
    /// so the request is acknowledged and otherwise ignored.
    pub fn on_set(&self, characteristic: Characteristic, value: CharacteristicValue) {
        debug!(
            "{}: ignoring host write {} = {:?}",
            self.info.name,
            characteristic.name(),
            value
        );
    }

    pub fn identify(&self) {
        info!("{}: identify requested, hello world", self.info.name);
    }

    /// Last value pushed for a characteristic, if any
    pub fn published(&self, characteristic: Characteristic) -> Option<CharacteristicValue> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&characteristic)
            .copied()
    }
}

impl CharacteristicSink for FanAccessory {
    fn set_characteristic(&self, characteristic: Characteristic, value: CharacteristicValue) {
        debug!(
            "{}: push {} = {:?}",
            self.info.name,
            characteristic.name(),
            value
        );
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(characteristic, value);
    }
}
