use std::path::Path;

use eyre::Result;

use commute_sources::Sites;

/// Fetch all the different directions sites available.
///
pub fn list_sites(cfn: Option<&Path>) -> Result<String> {
    let sites = Sites::load(cfn)?;
    Ok(sites.list())
}
