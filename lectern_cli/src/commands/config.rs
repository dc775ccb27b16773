use anyhow::Result;
use lectern_lib::GuardConfig;

use crate::output::{print_config, OutputFormat};

pub fn run(config: &GuardConfig, format: &OutputFormat) -> Result<()> {
    print_config(config, format);
    Ok(())
}
