use crate::accessory::{Characteristic, CharacteristicSink, CharacteristicValue};
use crate::keba_report::{Report2, Report3, ReportRecord, WallboxState};
use crate::state_store::StateStore;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Applies decoded reports to the device state and pushes the resulting
/// characteristic changes to the bridge.
pub struct MetricsDeriver<S> {
    store: StateStore,
    sink: S,
    verbose: bool,
}

impl<S: CharacteristicSink> MetricsDeriver<S> {
    pub fn new(store: StateStore, sink: S) -> Self {
        Self {
            store,
            sink,
            verbose: true,
        }
    }

    /// Enables or disables the per-report info logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Spawns the single consumer of decoded reports. Records are applied one at a
    /// time in arrival order.
    pub fn spawn_receiver(self, mut records: Receiver<ReportRecord>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Starting report deriver task");

            while let Some(record) = records.recv().await {
                self.apply(&record);
            }

            info!("Report deriver task exiting");
        })
    }

    pub fn apply(&self, record: &ReportRecord) {
        match record {
            ReportRecord::Status(report) => self.apply_status(report),
            ReportRecord::Power(report) => self.apply_power(report),
        }
    }

    fn apply_status(&self, report: &Report2) {
        if self.verbose {
            info!(
                "Report 2: state {} ({}), plug {} (wallbox {}/{}, vehicle {}), max current HW {} A, user {} A",
                report.state.label(),
                report.state.code(),
                report.plug.code(),
                plugged_label(report.plug.plugged_at_wallbox()),
                if report.plug.locked_at_wallbox() { "locked" } else { "unlocked" },
                plugged_label(report.plug.plugged_at_vehicle()),
                f64::from(report.max_current_hw) / 1000.0,
                or_unknown(report.max_current_user.map(|current| f64::from(current) / 1000.0))
            );
        }

        let pushes = self.store.update(|snapshot| {
            let device = &mut snapshot.device;

            // A new ceiling rescales the last known currents
            let mut recomputed = None;
            if device.max_current_hw != report.max_current_hw {
                device.max_current_hw = report.max_current_hw;
                if let Some(last) = &snapshot.last_report3 {
                    recomputed = output_percent(last.max_phase_current(), device.max_current_hw);
                }
            }
            if let Some(percent) = recomputed {
                device.output_percent = percent;
            }
            snapshot.last_report2 = Some(report.clone());

            let active = is_plugged_or_charging(report);
            device.plugged_or_charging = active;

            let mut pushes = vec![(Characteristic::PoweredOn, CharacteristicValue::Bool(active))];
            if recomputed.is_some() || (active && device.output_percent > 0) {
                pushes.push((
                    Characteristic::OutputPercent,
                    CharacteristicValue::Percent(device.output_percent),
                ));
            }
            pushes
        });

        self.publish(pushes);
    }

    fn apply_power(&self, report: &Report3) {
        let (pushes, percent) = self.store.update(|snapshot| {
            snapshot.last_report3 = Some(report.clone());
            let device = &mut snapshot.device;

            let Some(percent) = output_percent(report.max_phase_current(), device.max_current_hw)
            else {
                debug!(
                    "No hardware current ceiling known yet, keeping output at {}%",
                    device.output_percent
                );
                return (Vec::new(), device.output_percent);
            };

            device.output_percent = percent;
            let mut pushes = vec![(
                Characteristic::OutputPercent,
                CharacteristicValue::Percent(percent),
            )];
            // Current flowing means a vehicle is charging, even before report 2 says so
            if percent > 0 {
                device.plugged_or_charging = true;
                pushes.push((Characteristic::PoweredOn, CharacteristicValue::Bool(true)));
            }
            (pushes, percent)
        });

        if self.verbose {
            info!(
                "Report 3: voltage {} / {} / {} V, current {} / {} / {} A, power {} kW ({}% of maximum), energy {} kWh",
                or_unknown(report.u1),
                or_unknown(report.u2),
                or_unknown(report.u3),
                f64::from(report.i1) / 1000.0,
                f64::from(report.i2) / 1000.0,
                f64::from(report.i3) / 1000.0,
                or_unknown(report.power_kw().map(|kw| format!("{kw:.2}"))),
                percent,
                or_unknown(report.energy_kwh().map(|kwh| format!("{kwh:.2}")))
            );
        }

        self.publish(pushes);
    }

    fn publish(&self, pushes: Vec<(Characteristic, CharacteristicValue)>) {
        for (characteristic, value) in pushes {
            self.sink.set_characteristic(characteristic, value);
        }
    }
}

fn plugged_label(plugged: bool) -> &'static str {
    if plugged {
        "plugged"
    } else {
        "unplugged"
    }
}

/// Fields the wallbox left out of a report are logged as `n/a`
fn or_unknown<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |value| value.to_string())
}

/// Charging, or plugged with the cable locked at both ends.
pub fn is_plugged_or_charging(report: &Report2) -> bool {
    match report.state {
        WallboxState::Charging => true,
        WallboxState::Plugged => report.plug.locked_both_ends(),
        _ => false,
    }
}

/// Highest phase current as a percentage of the hardware ceiling, capped at 100.
///
/// Returns `None` while the ceiling is unknown (zero).
pub fn output_percent(max_phase_current: u32, max_current_hw: u32) -> Option<u8> {
    if max_current_hw == 0 {
        return None;
    }
    let percent = (f64::from(max_phase_current) / f64::from(max_current_hw) * 100.0).round();
    Some(percent.min(100.0) as u8)
}
