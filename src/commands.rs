use crate::output::Record;
use crate::protocol::{AcStatus, GroupStatus};
use crate::statistics::GroupActivity;

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}

impl Record for AcStatus {
    fn headers() -> Vec<&'static str> {
        vec!["AC", "Power", "Mode", "Fan speed", "Setpoint", "Temperature", "Spill", "Timer"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.number.to_string(),
            self.power_state.to_string(),
            self.mode.to_string(),
            self.fan_speed.to_string(),
            self.target_setpoint.to_string(),
            format!("{:.1}", self.temperature),
            self.spill.to_string(),
            self.timer.to_string(),
        ]
    }
}

impl Record for GroupStatus {
    fn headers() -> Vec<&'static str> {
        vec![
            "Group",
            "Name",
            "Power",
            "Control",
            "Open %",
            "Setpoint",
            "Temperature",
            "Sensor",
            "Battery low",
            "Spill",
            "Spill %",
        ]
    }

    fn row(&self) -> Vec<String> {
        let power: &'static str = self.power_state.into();
        let control: &'static str = self.control_method.into();
        vec![
            self.number.to_string(),
            self.name.clone(),
            power.to_string(),
            control.to_string(),
            self.open_percentage.to_string(),
            self.target_setpoint.to_string(),
            format!("{:.1}", self.temperature),
            self.sensor.to_string(),
            self.battery_low.to_string(),
            self.spill.to_string(),
            self.spill_percentage.to_string(),
        ]
    }
}

impl Record for GroupActivity {
    fn headers() -> Vec<&'static str> {
        vec!["Group", "Minutes on today"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone(), format!("{:.0}", self.minutes)]
    }
}

pub mod fields {
    use crate::output::{self, Record};
    use crate::protocol::fields::ALL;

    /// List the fields of the status and control records.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        output: output::Args,
        /// Only show fields whose name or table contains this text.
        filter: Option<String>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not output the field tables")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    pub struct FieldRow {
        pub table: &'static str,
        pub name: &'static str,
        pub byte: u8,
        pub bit_low: u8,
        pub bit_high: u8,
        pub width: u8,
    }

    impl FieldRow {
        fn is_match(&self, pattern: &str) -> bool {
            let pattern = pattern.to_lowercase();
            self.name.to_lowercase().contains(&pattern) || self.table.to_lowercase().contains(&pattern)
        }
    }

    impl Record for FieldRow {
        fn headers() -> Vec<&'static str> {
            vec!["Table", "Field", "Byte", "Bits", "Width"]
        }

        fn row(&self) -> Vec<String> {
            vec![
                self.table.to_string(),
                self.name.to_string(),
                self.byte.to_string(),
                format!("{}-{}", self.bit_low, self.bit_high),
                self.width.to_string(),
            ]
        }
    }

    pub fn all_fields() -> impl Iterator<Item = FieldRow> {
        ALL.iter().flat_map(|map| {
            map.fields().iter().map(|field| FieldRow {
                table: map.label(),
                name: field.name,
                byte: field.spec.byte_index(),
                bit_low: field.spec.bit_low(),
                bit_high: field.spec.bit_high(),
                width: field.spec.width(),
            })
        })
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let rows = all_fields()
            .filter(|row| args.filter.as_deref().is_none_or(|pattern| row.is_match(pattern)))
            .collect::<Vec<_>>();
        args.output.to_output().and_then(|o| o.write_all(&rows)).map_err(Error::Output)
    }
}

pub mod status {
    use crate::connection::{self, Connection};
    use crate::output;

    /// Show the status of the AC.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not query the AC status")]
        Query(#[source] connection::Error),
        #[error("could not output the AC status")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let connection = Connection::new(args.connection);
        let status = super::runtime()
            .map_err(Error::Runtime)?
            .block_on(connection.ac_status())
            .map_err(Error::Query)?;
        args.output.to_output().and_then(|o| o.write_all(&[status])).map_err(Error::Output)
    }
}

pub mod groups {
    use crate::connection::{self, Connection};
    use crate::output;
    use crate::protocol::DEFAULT_GROUP_LIMIT;
    use crate::protocol::status::fix_open_percentages;

    /// Show the status and names of the groups (zones).
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
        /// Decode at most this many groups from each reply.
        #[arg(long, default_value_t = DEFAULT_GROUP_LIMIT)]
        max_groups: usize,
        /// Show the open percentages exactly as the console reports them.
        #[arg(long)]
        raw: bool,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not query the group status")]
        Query(#[source] connection::Error),
        #[error("could not output the group status")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let connection = Connection::new(args.connection);
        let mut groups = super::runtime()
            .map_err(Error::Runtime)?
            .block_on(connection.groups(args.max_groups))
            .map_err(Error::Query)?;
        if !args.raw {
            fix_open_percentages(&mut groups);
        }
        args.output.to_output().and_then(|o| o.write_all(&groups)).map_err(Error::Output)
    }
}

pub mod set_mode {
    use crate::connection::{self, Connection};
    use crate::output;
    use crate::protocol::AcMode;

    /// Switch the AC to another mode, leaving its fan speed and setpoint alone.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
        /// One of Auto, Heat, Dry, Fan, Cool, AutoHeat or AutoCool.
        #[arg(value_parser = AcMode::from_name)]
        mode: AcMode,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not switch the AC to {1}")]
        Control(#[source] connection::Error, AcMode),
        #[error("could not output the AC status")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let connection = Connection::new(args.connection);
        let status = super::runtime()
            .map_err(Error::Runtime)?
            .block_on(connection.set_mode(args.mode))
            .map_err(|e| Error::Control(e, args.mode))?;
        args.output.to_output().and_then(|o| o.write_all(&[status])).map_err(Error::Output)
    }
}

pub mod set_group_temperature {
    use crate::connection::{self, Connection};
    use crate::output;
    use crate::protocol::DEFAULT_GROUP_LIMIT;

    /// Set the target temperature of a group (zone).
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
        #[arg(long, default_value_t = DEFAULT_GROUP_LIMIT)]
        max_groups: usize,
        /// Group number, as shown by the `groups` command.
        group: u8,
        /// Target temperature in whole degrees Celsius.
        setpoint: u64,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not set the temperature of group {1}")]
        Control(#[source] connection::Error, u8),
        #[error("could not output the group status")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let connection = Connection::new(args.connection);
        let groups = super::runtime()
            .map_err(Error::Runtime)?
            .block_on(connection.set_group_temperature(args.group, args.setpoint, args.max_groups))
            .map_err(|e| Error::Control(e, args.group))?;
        args.output.to_output().and_then(|o| o.write_all(&groups)).map_err(Error::Output)
    }
}

pub mod patch {
    use tracing::info;

    use crate::connection::{self, Connection};
    use crate::mode_switch::{self, Decision, Plan};
    use crate::output::{self, Record};
    use crate::protocol::DEFAULT_GROUP_LIMIT;
    use crate::state::{self, StateStore};

    /// Switch the AC between Cool or Heat and Fan depending on how far the zones are from their
    /// setpoints.
    ///
    /// Meant to be run periodically. The last Cool or Heat mode is remembered in the state
    /// directory so that the AC can be switched back to it from Fan.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        state: state::Args,
        #[clap(flatten)]
        output: output::Args,
        #[arg(long, default_value_t = DEFAULT_GROUP_LIMIT)]
        max_groups: usize,
        /// Only report what would be done.
        #[arg(long, short = 'n')]
        dry_run: bool,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not query the console")]
        Query(#[source] connection::Error),
        #[error("could not access the remembered AC mode")]
        State(#[source] state::Error),
        #[error("could not switch the AC mode")]
        Control(#[source] connection::Error),
        #[error("could not output the outcome")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    pub struct Outcome {
        pub mode: String,
        pub remembered: Option<String>,
        pub focus_group: Option<String>,
        pub differential: Option<f64>,
        pub action: String,
    }

    impl Record for Outcome {
        fn headers() -> Vec<&'static str> {
            vec!["Mode", "Remembered", "Focus group", "Differential", "Action"]
        }

        fn row(&self) -> Vec<String> {
            vec![
                self.mode.clone(),
                self.remembered.clone().unwrap_or_default(),
                self.focus_group.clone().unwrap_or_default(),
                self.differential.map(|d| format!("{d:+.1}")).unwrap_or_default(),
                self.action.clone(),
            ]
        }
    }

    fn action(decision: Decision) -> String {
        match decision {
            Decision::Switch(mode) => format!("switch to {mode}"),
            Decision::Keep => "keep".to_string(),
            Decision::Unsupported => "none, mode not managed".to_string(),
            Decision::UnknownConditioning => "none, previous mode unknown".to_string(),
        }
    }

    async fn patch(args: &Args, connection: &Connection) -> Result<Outcome, Error> {
        let store = StateStore::new(&args.state.state_dir);
        let ac = connection.ac_status().await.map_err(Error::Query)?;
        let groups = connection.groups(args.max_groups).await.map_err(Error::Query)?;
        let remembered = store.last_mode().await.map_err(Error::State)?;
        let Plan { remember, focus, decision } = mode_switch::decide(ac.mode, remembered, &groups);
        if args.dry_run {
            info!(message = "dry run, leaving the AC alone", ?decision);
        } else {
            if let Some(mode) = remember {
                store.remember_mode(mode).await.map_err(Error::State)?;
            }
            if let Decision::Switch(mode) = decision {
                connection.set_mode(mode).await.map_err(Error::Control)?;
            }
        }
        Ok(Outcome {
            mode: ac.mode.to_string(),
            remembered: remember.or(remembered).map(|m| m.to_string()),
            focus_group: focus.as_ref().map(|f| f.name.clone()),
            differential: focus.map(|f| f.differential),
            action: action(decision),
        })
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let connection = Connection::new(args.connection.clone());
        let outcome = super::runtime().map_err(Error::Runtime)?.block_on(patch(&args, &connection))?;
        args.output.to_output().and_then(|o| o.write_all(&[outcome])).map_err(Error::Output)
    }
}

pub mod statistics {
    use jiff::Timestamp;
    use jiff::tz::TimeZone;

    use crate::connection::{self, Connection};
    use crate::output;
    use crate::protocol::DEFAULT_GROUP_LIMIT;
    use crate::protocol::status::fix_open_percentages;
    use crate::state;
    use crate::statistics;

    /// Log whether each group is being conditioned and report today's totals.
    ///
    /// Meant to be run every `--report-period`. The logs start over at the end of each day.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        state: state::Args,
        #[clap(flatten)]
        output: output::Args,
        #[arg(long, default_value_t = DEFAULT_GROUP_LIMIT)]
        max_groups: usize,
        /// IANA time zone that determines when a day ends. Defaults to the system time zone.
        #[arg(long)]
        timezone: Option<String>,
        /// How often this command is run.
        #[arg(long, default_value = "60s")]
        report_period: humantime::Duration,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("`{1}` is not a known time zone")]
        TimeZone(#[source] jiff::Error, String),
        #[error("could not query the console")]
        Query(#[source] connection::Error),
        #[error("could not update the activity logs")]
        Statistics(#[source] statistics::Error),
        #[error("could not output the statistics")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let tz = match &args.timezone {
            Some(name) => TimeZone::get(name).map_err(|e| Error::TimeZone(e, name.clone()))?,
            None => TimeZone::system(),
        };
        let connection = Connection::new(args.connection);
        let dir = args.state.state_dir;
        let max_groups = args.max_groups;
        let report_period = *args.report_period;
        let activity = super::runtime().map_err(Error::Runtime)?.block_on(async {
            let ac = connection.ac_status().await.map_err(Error::Query)?;
            let mut groups = connection.groups(max_groups).await.map_err(Error::Query)?;
            fix_open_percentages(&mut groups);
            let now = Timestamp::now().to_zoned(tz);
            statistics::record(&dir, &ac, &groups, &now, report_period)
                .await
                .map_err(Error::Statistics)
        })?;
        args.output.to_output().and_then(|o| o.write_all(&activity)).map_err(Error::Output)
    }
}

pub mod frame {
    use std::io::Write as _;

    use crate::protocol;

    /// Print a framed message, ready to be sent to the console, in hex.
    #[derive(clap::Parser)]
    pub struct Args {
        /// Message type, e.g. `2c` for AC control.
        #[arg(value_parser = parse_message_type)]
        message_type: u8,
        /// Payload bytes in hex, e.g. `004f3f00`.
        #[arg(default_value = "")]
        payload: String,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("`{0}` is not a sequence of hex bytes")]
        InvalidHex(String),
        #[error("could not frame the message")]
        Protocol(#[source] protocol::Error),
        #[error("could not write data to the terminal")]
        WriteStdout(#[source] std::io::Error),
    }

    fn parse_message_type(text: &str) -> Result<u8, std::num::ParseIntError> {
        u8::from_str_radix(text.trim_start_matches("0x"), 16)
    }

    pub fn parse_hex(text: &str) -> Result<Vec<u8>, Error> {
        let text = text.trim();
        if text.len() % 2 != 0 {
            return Err(Error::InvalidHex(text.to_string()));
        }
        (0..text.len())
            .step_by(2)
            .map(|i| {
                text.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| Error::InvalidHex(text.to_string()))
            })
            .collect()
    }

    pub fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let payload = parse_hex(&args.payload)?;
        let frame = protocol::frame(args.message_type, &payload).map_err(Error::Protocol)?;
        writeln!(std::io::stdout().lock(), "{}", to_hex(&frame)).map_err(Error::WriteStdout)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn hex() {
            assert_eq!(parse_hex("004f3F00").unwrap(), [0x00, 0x4f, 0x3f, 0x00]);
            assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
            assert!(matches!(parse_hex("abc"), Err(Error::InvalidHex(_))));
            assert!(matches!(parse_hex("zz"), Err(Error::InvalidHex(_))));
            assert_eq!(to_hex(&[0x55, 0x0a]), "550a");
            assert_eq!(parse_message_type("0x2c"), Ok(0x2c));
        }

        #[test]
        fn query_frame() {
            let frame = protocol::frame(0x2b, &[]).unwrap();
            assert_eq!(to_hex(&frame), "555580b0012b0000f52f");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_listing_covers_every_table() {
        let rows = fields::all_fields().collect::<Vec<_>>();
        for table in ["AC control", "group control", "AC status", "group status"] {
            assert!(rows.iter().any(|r| r.table == table), "{table}");
        }
        let temperature = rows
            .iter()
            .find(|r| r.table == "AC status" && r.name == "Temperature")
            .unwrap();
        assert_eq!(temperature.row(), ["AC status", "Temperature", "5", "6-16", "11"]);
    }

    #[test]
    fn group_rows_line_up_with_headers() {
        let group = GroupStatus { name: "Living".to_string(), temperature: 21.25, ..Default::default() };
        let row = group.row();
        assert_eq!(row.len(), GroupStatus::headers().len());
        assert_eq!(row[1], "Living");
        assert_eq!(row[2], "Off");
        assert_eq!(AcStatus::default().row().len(), AcStatus::headers().len());
    }
}
