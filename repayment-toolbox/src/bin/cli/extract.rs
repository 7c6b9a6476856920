use super::Error;
use genesis_lib::{GenesisReader, Section};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct Extract {
    /// Path to the genesis export
    #[structopt(parse(from_os_str))]
    genesis: PathBuf,

    /// One of staked_amounts, account_balances, total_supply, validators_info
    section: String,

    /// Output file, stdout if not provided
    #[structopt(long, parse(from_os_str))]
    output: Option<PathBuf>,
}

impl Extract {
    pub fn exec(self) -> Result<(), Error> {
        let Extract {
            genesis,
            section,
            output,
        } = self;

        // checked before the output file is created
        let section = match section.parse::<Section>() {
            Ok(section) => section,
            Err(e) => {
                tracing::error!("{}", e);
                return Ok(());
            }
        };

        let reader = GenesisReader::open(&genesis)?;
        let mut writer: Box<dyn Write> = match &output {
            Some(path) => Box::new(BufWriter::new(File::create(path)?)),
            None => Box::new(BufWriter::new(io::stdout().lock())),
        };

        let mut write_error = None;
        let extraction = reader.stream_section(section, |_, record: Value| {
            let written = serde_json::to_writer(&mut writer, &record)
                .map_err(io::Error::from)
                .and_then(|()| writer.write_all(b"\n"));
            match written {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => {
                    write_error = Some(e);
                    ControlFlow::Break(())
                }
            }
        })?;
        if let Some(e) = write_error {
            return Err(e.into());
        }
        writer.flush()?;

        tracing::info!(records = extraction.records, %section, "section extracted");
        Ok(())
    }
}
