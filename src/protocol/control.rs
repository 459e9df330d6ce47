//! Building the control commands sent to the console.

use num_traits::ToPrimitive as _;
use tracing::{debug, trace};

use super::Error;
use super::bitfield::{self, BitWriter};
use super::fields::{AC_CONTROL, FieldMap, GROUP_CONTROL};
use super::message::{AC_CONTROL_TYPE, GROUP_CONTROL_TYPE, frame};
use super::status::AcMode;

/// Fan speed value that leaves the current fan speed unchanged.
pub const FAN_SPEED_UNCHANGED: u64 = 15;
/// Setpoint value that leaves the current AC setpoint unchanged.
pub const SETPOINT_UNCHANGED: u64 = 63;
/// Group power value that leaves the group's power state unchanged.
pub const GROUP_POWER_UNCHANGED: u64 = 3;
/// Leaves the group's temperature control capability unchanged.
pub const TEMPERATURE_CONTROL_UNCHANGED: u64 = 3;
/// Group setting value selecting a setpoint rather than an open percentage.
pub const GROUP_SETTING_TEMPERATURE: u64 = 5;

/// Write `values` into a record laid out by `map`.
///
/// Fields missing from `values` are written as zero. Fails without producing anything if a value
/// does not fit its field.
pub fn encode_record(map: &FieldMap, values: &[(&str, u64)]) -> Result<Vec<u8>, Error> {
    let mut writer = BitWriter::new();
    for field in map.fields() {
        let value = values.iter().rev().find(|(name, _)| *name == field.name).map_or(0, |v| v.1);
        trace!(message = "encoding field", field = field.name, value);
        bitfield::encode(&mut writer, field.spec, value).inspect_err(|_| {
            debug!(message = "value does not fit", table = map.label(), field = field.name, value);
        })?;
    }
    writer.pad_to(map.record_bytes() * 8);
    Ok(writer.into_bytes())
}

/// Build the command switching the AC to `mode`, leaving fan speed and setpoint as they are.
pub fn encode_ac_control(mode: AcMode) -> Result<Vec<u8>, Error> {
    let code = mode.to_u64().ok_or_else(|| Error::UnknownMode(mode.to_string()))?;
    let payload = encode_record(
        &AC_CONTROL,
        &[
            ("AcNumber", 0),
            ("AcMode", code),
            ("AcFanSpeed", FAN_SPEED_UNCHANGED),
            ("TargetSetpoint", SETPOINT_UNCHANGED),
        ],
    )?;
    frame(AC_CONTROL_TYPE, &payload)
}

/// Like [`encode_ac_control`], with the mode given by name.
pub fn encode_ac_control_by_name(mode: &str) -> Result<Vec<u8>, Error> {
    encode_ac_control(AcMode::from_name(mode)?)
}

/// Build the command setting the target temperature of group `group_number`.
///
/// The console takes the setpoint as a single byte in whole degrees.
pub fn encode_group_temperature(group_number: u8, setpoint: u64) -> Result<Vec<u8>, Error> {
    let payload = encode_record(
        &GROUP_CONTROL,
        &[
            ("GroupNumber", u64::from(group_number)),
            ("GroupSettingValue", GROUP_SETTING_TEMPERATURE),
            ("HaveTemperatureControl", TEMPERATURE_CONTROL_UNCHANGED),
            ("Power", GROUP_POWER_UNCHANGED),
            ("TargetSetting", setpoint),
        ],
    )?;
    frame(GROUP_CONTROL_TYPE, &payload)
}
