use super::{settings::Settings, Error};
use repayment_toolbox::repayment;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct Repay {
    #[structopt(flatten)]
    settings: Settings,

    /// Recompute the staked values from the genesis export even if they are cached
    #[structopt(long)]
    refresh_cache: bool,
}

impl Repay {
    pub fn exec(self) -> Result<(), Error> {
        let Repay {
            settings,
            refresh_cache,
        } = self;
        let config = settings.into_config()?;
        let summary = repayment::run(&config, refresh_cache)?;

        println!(
            "repaying {} to {} delegators ({} {}), transaction written to {}",
            summary.total_owed_display.round_dp(6).normalize(),
            summary.delegators,
            summary.total_transferred,
            config.denom,
            config.output_path.display()
        );
        Ok(())
    }
}
