//! Where each field of the status and control records lives.
//!
//! Adding a protocol field means adding a line to one of the tables below. Descriptors are
//! validated during compilation: a malformed descriptor, a field reaching past the end of its
//! record, or an encoding table listing fields out of order fails the build.

use super::bitfield::FieldSpec;

#[derive(Clone, Copy, Debug, serde::Serialize)]
pub struct NamedField {
    pub name: &'static str,
    pub spec: FieldSpec,
}

impl NamedField {
    pub const fn new(name: &'static str, spec: FieldSpec) -> Self {
        Self { name, spec }
    }
}

/// An ordered table of fields making up one fixed-size record.
#[derive(Clone, Copy, Debug)]
pub struct FieldMap {
    label: &'static str,
    record_bytes: usize,
    fields: &'static [NamedField],
}

impl FieldMap {
    pub const fn decoding(
        label: &'static str,
        record_bytes: usize,
        fields: &'static [NamedField],
    ) -> Self {
        let mut index = 0;
        while index < fields.len() {
            if fields[index].spec.end_bit() > record_bytes * 8 {
                panic!("field reaches past the end of its record");
            }
            index += 1;
        }
        Self { label, record_bytes, fields }
    }

    /// Like [`Self::decoding`], but also requires the fields to be listed in the order they are
    /// written and to fill the record exactly.
    pub const fn encoding(
        label: &'static str,
        record_bytes: usize,
        fields: &'static [NamedField],
    ) -> Self {
        let mut index = 0;
        let mut previous_end = 0;
        while index < fields.len() {
            let spec = fields[index].spec;
            if spec.start_bit() < previous_end {
                panic!("encoding table lists overlapping fields or fields out of order");
            }
            previous_end = spec.end_bit();
            index += 1;
        }
        if previous_end != record_bytes * 8 {
            panic!("encoding table does not fill its record");
        }
        Self { label, record_bytes, fields }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn record_bytes(&self) -> usize {
        self.record_bytes
    }

    pub fn fields(&self) -> &'static [NamedField] {
        self.fields
    }

    pub fn get(&self, name: &str) -> Option<FieldSpec> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.spec)
    }
}

macro_rules! field_maps {
    ($(
        $(#[$meta:meta])*
        $vis:vis static $ident:ident = $constructor:ident($label:literal, $bytes:literal) {
            $($name:literal => $byte:literal : $low:literal - $high:literal,)*
        }
    )*) => {
        $(
            $(#[$meta])*
            $vis static $ident: FieldMap = {
                const FIELDS: &[NamedField] =
                    &[$(NamedField::new($name, FieldSpec::new($byte, $low, $high))),*];
                FieldMap::$constructor($label, $bytes, FIELDS)
            };
        )*
        pub static ALL: &[&FieldMap] = &[$(&$ident),*];
    };
}

field_maps! {
    /// Payload of the AC control command (message type 0x2c).
    pub static AC_CONTROL = encoding("AC control", 4) {
        "Power" => 1:7-8,
        "AcNumber" => 1:1-6,
        "AcMode" => 2:5-8,
        "AcFanSpeed" => 2:1-4,
        "SetpointControlType" => 3:7-8,
        "TargetSetpoint" => 3:1-6,
        "ZeroedByte" => 4:1-8,
    }

    /// Payload of the group control command (message type 0x2a).
    pub static GROUP_CONTROL = encoding("group control", 4) {
        "GroupNumber" => 1:1-8,
        "GroupSettingValue" => 2:6-8,
        "HaveTemperatureControl" => 2:4-5,
        "Power" => 2:1-3,
        "TargetSetting" => 3:1-8,
        "ZeroedByte" => 4:1-8,
    }

    /// One record of the AC status reply. Only the first record is of interest.
    pub static AC_STATUS = decoding("AC status", 8) {
        "PowerState" => 1:7-8,
        "AcNumber" => 1:1-6,
        "AcMode" => 2:5-8,
        "AcFanSpeed" => 2:1-4,
        "Spill" => 3:8-8,
        "AcTimer" => 3:7-7,
        "AcTargetSetpoint" => 3:1-6,
        "Temperature" => 5:6-16,
    }

    /// One record per group of the group status reply.
    pub static GROUP_STATUS = decoding("group status", 6) {
        "PowerState" => 1:7-8,
        "GroupNumber" => 1:1-6,
        "ControlMethod" => 2:8-8,
        "OpenPercentage" => 2:1-7,
        "BatteryLow" => 3:8-8,
        "TurboSupport" => 3:7-7,
        "TargetSetpoint" => 3:1-6,
        "Sensor" => 4:8-8,
        "Temperature" => 5:6-16,
        "Spill" => 6:5-5,
    }
}

/// Each record of the group name reply: the group number followed by a NUL padded name.
pub const GROUP_NAME_RECORD_BYTES: usize = 9;

/// The group name reply body starts with this many bytes before the first record.
pub const GROUP_NAME_BODY_OFFSET: usize = 2;
