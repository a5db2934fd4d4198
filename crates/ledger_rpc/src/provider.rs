use anyhow::{anyhow, bail, Context, Result};
use ethers_core::types::Address;
use ethers_providers::{Http, Provider};
use url::Url;

/// HTTP provider shared by the ledger client and the wallet.
pub fn http_provider(endpoint: &str) -> Result<Provider<Http>> {
    let url = Url::parse(endpoint).with_context(|| format!("invalid rpc url: {endpoint}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("rpc url must start with http:// or https://");
    }
    Ok(Provider::new(Http::new(url)))
}

/// Accepts a 20-byte `0x` address in any letter case.
pub fn parse_address(raw: &str) -> Result<Address> {
    let raw = raw.trim();
    if !raw.starts_with("0x") && !raw.starts_with("0X") {
        bail!("address must start with 0x: {raw}");
    }
    raw[2..]
        .parse()
        .map_err(|err| anyhow!("address must be 20 hex-encoded bytes: {raw} ({err})"))
}

pub(crate) fn format_address(address: &Address) -> String {
    format!("{address:#x}")
}
