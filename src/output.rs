use std::path::PathBuf;

use csv_core::WriteResult;

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Format {
    Table,
    Jsonl,
    Csv,
}

#[derive(clap::Parser, Clone, Debug)]
#[group(id = "output::Args")]
pub struct Args {
    /// Write to this file instead of the terminal.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    #[arg(long, short='f', value_enum, default_value_t = Format::Table)]
    format: Format,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not create the output file {1:?}")]
    OpenOutputFile(#[source] std::io::Error, PathBuf),
    #[error("could not write records to {1:?}")]
    WriteFile(#[source] std::io::Error, PathBuf),
    #[error("could not write records to the terminal")]
    WriteStdout(#[source] std::io::Error),
    #[error("could not serialize a record to JSON")]
    SerializeJson(#[source] serde_json::Error),
    #[error("CSV writer could not fit field `{0}` into its buffer")]
    SerializeCsv(String),
}

/// A list of records, each shown as a table row or CSV line, or serialized as a JSON line.
pub trait Record: serde::Serialize {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl Args {
    pub fn to_output(self) -> Result<Output, Error> {
        let io = match &self.output {
            None => Box::new(std::io::stdout().lock()) as Box<dyn std::io::Write>,
            Some(path) => Box::new(
                std::fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| Error::OpenOutputFile(e, path.clone()))?,
            ),
        };
        let sink = match self.format {
            Format::Table => {
                let mut comfy = comfy_table::Table::new();
                comfy.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
                Sink::Table { comfy }
            }
            Format::Jsonl => Sink::Jsonl,
            Format::Csv => Sink::Csv { wrote_header: false },
        };
        Ok(Output { path: self.output, io, sink })
    }
}

pub struct Output {
    path: Option<PathBuf>,
    io: Box<dyn std::io::Write>,
    sink: Sink,
}

enum Sink {
    Table { comfy: comfy_table::Table },
    Jsonl,
    Csv { wrote_header: bool },
}

impl Output {
    /// Write all of `records` and flush.
    pub fn write_all<R: Record>(mut self, records: &[R]) -> Result<(), Error> {
        for record in records {
            self.record(record)?;
        }
        self.commit()
    }

    pub fn record<R: Record>(&mut self, record: &R) -> Result<(), Error> {
        match &mut self.sink {
            Sink::Table { comfy } => {
                if comfy.header().is_none() {
                    comfy.set_header(R::headers());
                }
                comfy.add_row(record.row());
            }
            Sink::Jsonl => {
                serde_json::to_writer(&mut self.io, record).map_err(Error::SerializeJson)?;
                writeln!(self.io).map_err(|e| self.write_error(e))?;
            }
            Sink::Csv { wrote_header } => {
                if !*wrote_header {
                    *wrote_header = true;
                    self.write_csv_row(&R::headers())?;
                }
                self.write_csv_row(&record.row())?;
            }
        }
        Ok(())
    }

    fn write_csv_row<V: std::ops::Deref<Target = str>>(&mut self, values: &[V]) -> Result<(), Error> {
        // Worst case every byte is a quote that has to be doubled, plus the surrounding quotes.
        let max_len = 2 + 2 * values.iter().map(|v| v.len()).max().unwrap_or(0);
        let mut buffer = vec![0; max_len];
        let mut writer = csv_core::Writer::new();
        for (index, value) in values.iter().enumerate() {
            let (WriteResult::InputEmpty, _, written) = writer.field(value.as_bytes(), &mut buffer)
            else {
                return Err(Error::SerializeCsv((**value).to_owned()));
            };
            self.io.write_all(&buffer[..written]).map_err(|e| self.write_error(e))?;
            if index + 1 < values.len() {
                let (WriteResult::InputEmpty, written) = writer.delimiter(&mut buffer) else {
                    return Err(Error::SerializeCsv((**value).to_owned()));
                };
                self.io.write_all(&buffer[..written]).map_err(|e| self.write_error(e))?;
            }
        }
        let (WriteResult::InputEmpty, written) = writer.terminator(&mut buffer) else {
            return Err(Error::SerializeCsv(String::new()));
        };
        self.io.write_all(&buffer[..written]).map_err(|e| self.write_error(e))
    }

    fn write_error(&self, e: std::io::Error) -> Error {
        match &self.path {
            None => Error::WriteStdout(e),
            Some(p) => Error::WriteFile(e, p.clone()),
        }
    }

    pub fn commit(mut self) -> Result<(), Error> {
        if let Sink::Table { comfy } = &self.sink {
            if comfy.header().is_some() {
                writeln!(self.io, "{comfy}").map_err(|e| self.write_error(e))?;
            }
        }
        self.io.flush().map_err(|e| self.write_error(e))
    }
}
