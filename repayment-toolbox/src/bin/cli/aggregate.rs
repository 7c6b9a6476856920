use super::{settings::Settings, Error};
use repayment_toolbox::repayment::StakeCache;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct Aggregate {
    #[structopt(flatten)]
    settings: Settings,

    /// Recompute the staked values from the genesis export even if they are cached
    #[structopt(long)]
    refresh_cache: bool,
}

impl Aggregate {
    pub fn exec(self) -> Result<(), Error> {
        let Aggregate {
            settings,
            refresh_cache,
        } = self;
        let config = settings.into_config()?;
        let cache = StakeCache::new(&config.cache_path);

        let (_, report) = if refresh_cache {
            cache.refresh(
                &config.genesis_path,
                &config.validator_address,
                config.duplicate_policy,
            )?
        } else {
            cache.load_or_aggregate(
                &config.genesis_path,
                &config.validator_address,
                config.duplicate_policy,
            )?
        };

        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
