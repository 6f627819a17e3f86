//! Shared output plumbing for the command line: every command renders its
//! results as a human table, JSON lines, or CSV, optionally into a file.

use std::path::PathBuf;

use csv_core::WriteResult;

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Format {
    Table,
    Jsonl,
    Csv,
}

#[derive(clap::Parser)]
#[group(id = "output::Args")]
pub struct Args {
    /// Write the output to this file instead of the terminal.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    #[arg(long, short = 'f', value_enum, default_value_t = Format::Table)]
    format: Format,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open the output file at {1:?}")]
    OpenFile(#[source] std::io::Error, PathBuf),
    #[error("could not write to the output file at {1:?}")]
    WriteFile(#[source] std::io::Error, PathBuf),
    #[error("could not write to the terminal")]
    WriteStdout(#[source] std::io::Error),
    #[error("could not serialize a record to JSON")]
    SerializeJson(#[source] serde_json::Error),
}

impl Args {
    pub fn into_sink(self) -> Result<Sink, Error> {
        let io = match &self.output {
            None => Box::new(std::io::stdout().lock()) as Box<dyn std::io::Write>,
            Some(path) => Box::new(
                std::fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| Error::OpenFile(e, path.clone()))?,
            ) as Box<_>,
        };
        let renderer = match &self.format {
            Format::Table => {
                let mut table = comfy_table::Table::new();
                table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
                Renderer::Table(table)
            }
            Format::Jsonl => Renderer::Jsonl,
            Format::Csv => Renderer::Csv,
        };
        Ok(Sink { output: self.output, io, renderer })
    }
}

pub struct Sink {
    output: Option<PathBuf>,
    io: Box<dyn std::io::Write>,
    renderer: Renderer,
}

enum Renderer {
    Table(comfy_table::Table),
    Jsonl,
    Csv,
}

impl Sink {
    /// Column names for the formats that have a notion of them. Must come
    /// before any row.
    pub fn headers(&mut self, names: &[&'static str]) -> Result<(), Error> {
        match &mut self.renderer {
            Renderer::Table(table) => {
                table.set_header(names.to_vec());
            }
            Renderer::Jsonl => {}
            Renderer::Csv => self.csv_row(names)?,
        }
        Ok(())
    }

    /// One result row. `cells` feeds the table and CSV formats,
    /// `record` the JSON lines format; both closures are only called when
    /// their format is active.
    pub fn row<R: serde::Serialize>(
        &mut self,
        cells: impl FnOnce() -> Vec<String>,
        record: impl FnOnce() -> R,
    ) -> Result<(), Error> {
        match &mut self.renderer {
            Renderer::Table(table) => {
                table.add_row(cells());
            }
            Renderer::Jsonl => {
                serde_json::to_writer(&mut self.io, &record()).map_err(Error::SerializeJson)?;
                writeln!(self.io).map_err(|e| self.io_error(e))?;
            }
            Renderer::Csv => {
                let cells = cells();
                self.csv_row(&cells)?;
            }
        }
        Ok(())
    }

    fn csv_row<V: std::ops::Deref<Target = str>>(&mut self, cells: &[V]) -> Result<(), Error> {
        // Worst case every byte gets escaped, plus the enclosing quotes.
        let longest = cells.iter().map(|v| v.len()).max().unwrap_or(0);
        let mut buffer = vec![0; 2 + 2 * longest];
        let mut writer = csv_core::Writer::new();
        for (position, cell) in cells.iter().enumerate() {
            if position != 0 {
                let (WriteResult::InputEmpty, written) = writer.delimiter(&mut buffer) else {
                    unreachable!("csv delimiter cannot overflow the buffer");
                };
                self.io.write_all(&buffer[..written]).map_err(|e| self.io_error(e))?;
            }
            let (WriteResult::InputEmpty, read, written) = writer.field(cell.as_bytes(), &mut buffer)
            else {
                unreachable!("csv buffer sized for the worst case");
            };
            debug_assert_eq!(read, cell.len());
            self.io.write_all(&buffer[..written]).map_err(|e| self.io_error(e))?;
        }
        let (WriteResult::InputEmpty, written) = writer.terminator(&mut buffer) else {
            unreachable!("csv terminator cannot overflow the buffer");
        };
        self.io.write_all(&buffer[..written]).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, e: std::io::Error) -> Error {
        match &self.output {
            None => Error::WriteStdout(e),
            Some(path) => Error::WriteFile(e, path.clone()),
        }
    }

    /// Render anything held back (the human table is only laid out once all
    /// rows are known) and flush.
    pub fn finish(mut self) -> Result<(), Error> {
        if let Renderer::Table(table) = &self.renderer {
            let rendered = table.to_string();
            writeln!(self.io, "{rendered}").map_err(|e| self.io_error(e))?;
        }
        self.io.flush().map_err(|e| self.io_error(e))
    }
}
