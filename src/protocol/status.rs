//! Decoding of the status replies into domain values.

use tracing::{debug, warn};

use super::Error;
use super::bitfield;
use super::fields::{AC_STATUS, GROUP_NAME_BODY_OFFSET, GROUP_NAME_RECORD_BYTES, GROUP_STATUS};

/// Operating modes the AC control command accepts.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    strum::VariantNames,
    strum::VariantArray,
    strum::FromRepr,
    strum::IntoStaticStr,
    strum::EnumString,
    num_derive::ToPrimitive,
)]
#[repr(u8)]
pub enum AcMode {
    Auto = 0,
    Heat = 1,
    Dry = 2,
    Fan = 3,
    Cool = 4,
    AutoHeat = 8,
    AutoCool = 9,
}

impl AcMode {
    pub fn from_name(name: &str) -> Result<Self, Error> {
        name.parse().map_err(|_| Error::UnknownMode(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for AcMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The mode an AC reports being in.
///
/// Only some of the codes the console reports are recognised, the rest are carried as their
/// numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportedMode {
    Known(AcMode),
    Other(u64),
}

impl ReportedMode {
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            1 => Self::Known(AcMode::Heat),
            3 => Self::Known(AcMode::Fan),
            4 => Self::Known(AcMode::Cool),
            other => Self::Other(other),
        }
    }

    pub fn known(&self) -> Option<AcMode> {
        match *self {
            Self::Known(mode) => Some(mode),
            Self::Other(_) => None,
        }
    }
}

impl std::fmt::Display for ReportedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(mode) => f.write_str(mode.name()),
            Self::Other(code) => write!(f, "{code}"),
        }
    }
}

impl serde::Serialize for ReportedMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, strum::IntoStaticStr,
)]
pub enum PowerState {
    #[default]
    Off,
    On,
    Turbo,
}

impl PowerState {
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            0 => Self::Off,
            1 => Self::On,
            _ => Self::Turbo,
        }
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, strum::IntoStaticStr,
)]
pub enum ControlMethod {
    #[default]
    Percentage,
    Temperature,
}

impl ControlMethod {
    pub fn from_raw(raw: u64) -> Self {
        if raw == 0 { Self::Percentage } else { Self::Temperature }
    }
}

/// Temperatures are reported in tenths of a degree, offset by 500.
pub fn temperature_from_raw(raw: u64) -> f64 {
    (raw as f64 - 500.0) / 10.0
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct AcStatus {
    /// Raw power state code.
    pub power_state: u8,
    pub number: u8,
    pub mode: ReportedMode,
    pub fan_speed: u8,
    pub spill: bool,
    pub timer: bool,
    pub target_setpoint: u8,
    pub temperature: f64,
}

impl Default for AcStatus {
    fn default() -> Self {
        Self {
            power_state: 0,
            number: 0,
            mode: ReportedMode::Other(0),
            fan_speed: 0,
            spill: false,
            timer: false,
            target_setpoint: 0,
            temperature: temperature_from_raw(0),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct GroupStatus {
    pub number: u8,
    pub name: String,
    pub power_state: PowerState,
    pub control_method: ControlMethod,
    pub open_percentage: u8,
    pub battery_low: bool,
    pub turbo_support: bool,
    pub target_setpoint: u8,
    pub sensor: bool,
    pub temperature: f64,
    pub spill: bool,
    /// How far a spill group is open beyond what the other groups need, see
    /// [`fix_open_percentages`].
    pub spill_percentage: i32,
}

/// Decode the group status reply, one group per record, at most `limit` groups.
pub fn decode_group_status(body: &[u8], limit: usize) -> Result<Vec<GroupStatus>, Error> {
    let mut groups = Vec::new();
    for chunk in body.chunks(GROUP_STATUS.record_bytes()).take(limit) {
        let mut group = GroupStatus::default();
        for field in GROUP_STATUS.fields() {
            let raw = bitfield::decode(chunk, field.spec)?;
            match field.name {
                "PowerState" => group.power_state = PowerState::from_raw(raw),
                "GroupNumber" => group.number = raw as u8,
                "ControlMethod" => group.control_method = ControlMethod::from_raw(raw),
                "OpenPercentage" => group.open_percentage = raw as u8,
                "BatteryLow" => group.battery_low = raw != 0,
                "TurboSupport" => group.turbo_support = raw != 0,
                "TargetSetpoint" => group.target_setpoint = raw as u8,
                "Sensor" => group.sensor = raw != 0,
                "Temperature" => group.temperature = temperature_from_raw(raw),
                "Spill" => group.spill = raw != 0,
                _ => {}
            }
        }
        debug!(message = "decoded group", number = group.number, ?group.power_state);
        groups.push(group);
    }
    Ok(groups)
}

/// Fill in the names of `groups` from the group name reply.
///
/// `groups` must come from [`decode_group_status`]: names are assigned by the group index the
/// reply carries, and names for groups that aren't in `groups` are dropped.
pub fn decode_group_names(
    body: &[u8],
    groups: &mut [GroupStatus],
    limit: usize,
) -> Result<(), Error> {
    let records = body.get(GROUP_NAME_BODY_OFFSET..).unwrap_or_default();
    for chunk in records.chunks(GROUP_NAME_RECORD_BYTES).take(limit) {
        let [index, name @ ..] = chunk else { continue };
        let start = name.iter().position(|&b| b != 0).unwrap_or(name.len());
        let end = name.iter().rposition(|&b| b != 0).map_or(start, |p| p + 1);
        let name = String::from_utf8_lossy(&name[start..end]).into_owned();
        match groups.get_mut(usize::from(*index)) {
            Some(group) => group.name = name,
            None => warn!(message = "name for an unknown group", index = *index, name = %name),
        }
    }
    Ok(())
}

/// Decode the first record of the AC status reply.
pub fn decode_ac_status(body: &[u8]) -> Result<AcStatus, Error> {
    let chunk = &body[..body.len().min(AC_STATUS.record_bytes())];
    let mut status = AcStatus::default();
    for field in AC_STATUS.fields() {
        let raw = bitfield::decode(chunk, field.spec)?;
        match field.name {
            "PowerState" => status.power_state = raw as u8,
            "AcNumber" => status.number = raw as u8,
            "AcMode" => status.mode = ReportedMode::from_raw(raw),
            "AcFanSpeed" => status.fan_speed = raw as u8,
            "Spill" => status.spill = raw != 0,
            "AcTimer" => status.timer = raw != 0,
            "AcTargetSetpoint" => status.target_setpoint = raw as u8,
            "Temperature" => status.temperature = temperature_from_raw(raw),
            _ => {}
        }
    }
    debug!(message = "decoded AC status", mode = %status.mode, status.temperature);
    Ok(status)
}

/// Correct the open percentages the console reports.
///
/// Groups that are off keep reporting the last percentage they were open at, so those are reset
/// to zero unless they are spilling. Spill groups get their `spill_percentage` computed from the
/// share of airflow the other groups leave over.
pub fn fix_open_percentages(groups: &mut [GroupStatus]) {
    let mut total_open = 0i32;
    let mut spill_groups = 0i32;
    for group in groups.iter_mut() {
        if !group.spill && group.power_state == PowerState::Off {
            group.open_percentage = 0;
        }
        if group.spill {
            spill_groups += 1;
        } else {
            total_open += i32::from(group.open_percentage);
        }
    }
    debug!(message = "open percentages", total_open, spill_groups);
    if spill_groups == 0 {
        return;
    }
    for group in groups.iter_mut().filter(|g| g.spill) {
        group.spill_percentage =
            100 - total_open / spill_groups - i32::from(group.open_percentage);
    }
}
