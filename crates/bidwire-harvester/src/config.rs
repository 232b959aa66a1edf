use std::cmp;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvesterConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Seconds before a listing page download is abandoned
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: Option<u64>,

    /// The maximum number of listing pages of one site processed at once
    #[serde(default = "default_concurrent_pages")]
    pub concurrent_pages: usize,

    /// The maximum number of sites harvested at once
    #[serde(default = "default_concurrent_sites")]
    pub concurrent_sites: usize,

    #[serde(default = "default_handle_sigint")]
    pub handle_sigint: bool,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            concurrent_pages: default_concurrent_pages(),
            concurrent_sites: default_concurrent_sites(),
            handle_sigint: default_handle_sigint(),
        }
    }
}

fn default_user_agent() -> String {
    String::from("bidwire")
}

fn default_request_timeout_secs() -> Option<u64> {
    Some(30)
}

fn default_concurrent_pages() -> usize {
    1
}

fn default_concurrent_sites() -> usize {
    cmp::max(1, num_cpus::get().saturating_sub(2))
}

fn default_handle_sigint() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_process_pages_sequentially() {
        let conf = HarvesterConfig::default();

        assert_eq!(1, conf.concurrent_pages);
        assert!(conf.concurrent_sites >= 1);
        assert!(conf.handle_sigint);
    }
}
