use crate::error::DecodeError;
use serde_derive::Deserialize;
use serde_json::Value;

/// Plug code reported when the cable is locked at both the wallbox and the vehicle.
pub const PLUG_LOCKED_BOTH_ENDS: u8 = 7;

/// Charging state as reported in the `State` field of report 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "u8")]
pub enum WallboxState {
    Starting,
    Unplugged,
    Plugged,
    Charging,
    Error,
    Interrupted,
    /// Code outside the documented range, kept so it can still be exported.
    Unknown(u8),
}

impl From<u8> for WallboxState {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Starting,
            1 => Self::Unplugged,
            2 => Self::Plugged,
            3 => Self::Charging,
            4 => Self::Error,
            5 => Self::Interrupted,
            other => Self::Unknown(other),
        }
    }
}

impl WallboxState {
    /// Raw code as sent by the wallbox
    pub fn code(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Unplugged => 1,
            Self::Plugged => 2,
            Self::Charging => 3,
            Self::Error => 4,
            Self::Interrupted => 5,
            Self::Unknown(code) => code,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Starting => "Starting",
            Self::Unplugged => "Unplugged (not ready)",
            Self::Plugged => "Plugged (not charging)",
            Self::Charging => "Charging",
            Self::Error => "Error",
            Self::Interrupted => "Interrupted",
            Self::Unknown(_) => "Unknown",
        }
    }
}

/// Cable bitmask from the `Plug` field of report 2.
///
/// Bit 0: cable plugged at the wallbox, bit 1: locked at the wallbox,
/// bit 2: plugged at the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PlugStatus(pub u8);

impl PlugStatus {
    pub fn code(self) -> u8 {
        self.0
    }

    pub fn plugged_at_wallbox(self) -> bool {
        self.0 & 0b001 != 0
    }

    pub fn locked_at_wallbox(self) -> bool {
        self.0 & 0b010 != 0
    }

    pub fn plugged_at_vehicle(self) -> bool {
        self.0 & 0b100 != 0
    }

    pub fn locked_both_ends(self) -> bool {
        self.0 == PLUG_LOCKED_BOTH_ENDS
    }
}

/// Status telemetry (`report 2`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Report2 {
    #[serde(rename = "State")]
    pub state: WallboxState,
    #[serde(rename = "Plug")]
    pub plug: PlugStatus,
    /// Hardware current ceiling in mA
    #[serde(rename = "Curr HW")]
    pub max_current_hw: u32,
    /// User configured current limit in mA
    #[serde(rename = "Curr user", default)]
    pub max_current_user: Option<u32>,
}

/// Power telemetry (`report 3`)
///
/// Only the phase currents are required since they drive the output percentage; the
/// remaining fields are exported when the wallbox sends them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Report3 {
    #[serde(rename = "U1", default)]
    pub u1: Option<u32>,
    #[serde(rename = "U2", default)]
    pub u2: Option<u32>,
    #[serde(rename = "U3", default)]
    pub u3: Option<u32>,
    /// Phase currents in mA
    #[serde(rename = "I1")]
    pub i1: u32,
    #[serde(rename = "I2")]
    pub i2: u32,
    #[serde(rename = "I3")]
    pub i3: u32,
    /// Active power in mW
    #[serde(rename = "P", default)]
    pub power: Option<u64>,
    /// Energy of the present session in 0.1 Wh
    #[serde(rename = "E pres", default)]
    pub energy_present: Option<u64>,
}

impl Report3 {
    pub fn max_phase_current(&self) -> u32 {
        self.i1.max(self.i2).max(self.i3)
    }

    pub fn power_kw(&self) -> Option<f64> {
        self.power.map(|power| power as f64 / 1_000_000.0)
    }

    pub fn energy_kwh(&self) -> Option<f64> {
        self.energy_present.map(|energy| energy as f64 / 10_000.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportRecord {
    Status(Report2),
    Power(Report3),
}

/// The two report requests the poller alternates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportRequest {
    Status,
    Power,
}

impl ReportRequest {
    pub fn command(self) -> &'static str {
        match self {
            Self::Status => "report 2",
            Self::Power => "report 3",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Status => Self::Power,
            Self::Power => Self::Status,
        }
    }
}

/// Decodes a datagram received on the report port into a typed record.
///
/// Only payloads whose first byte is `{` are considered. The `ID` field selects the
/// schema and may arrive either as a number or as a numeric string.
pub fn decode_datagram(datagram: &[u8]) -> Result<ReportRecord, DecodeError> {
    if datagram.first() != Some(&b'{') {
        return Err(DecodeError::NotStructured);
    }
    // Some firmware pads the payload with NULs
    let end = datagram
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    let value: Value = serde_json::from_slice(&datagram[..end])?;

    let id = report_id(&value).ok_or(DecodeError::MissingId)?;
    match id {
        2 => serde_json::from_value(value)
            .map(ReportRecord::Status)
            .map_err(|source| DecodeError::Schema { id, source }),
        3 => serde_json::from_value(value)
            .map(ReportRecord::Power)
            .map_err(|source| DecodeError::Schema { id, source }),
        other => Err(DecodeError::UnsupportedReport(other)),
    }
}

fn report_id(value: &Value) -> Option<u64> {
    match value.get("ID")? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
