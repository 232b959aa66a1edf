use std::fs::File;
use std::path::Path;

use anyhow::Context;
use bidwire_harvester::HarvesterConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidwireConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub harvester: HarvesterConfig,
}

impl Default for BidwireConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            harvester: HarvesterConfig::default(),
        }
    }
}

fn default_database_url() -> String {
    String::from("sqlite://bidwire.db")
}

impl BidwireConfig {
    /// Reads a yaml configuration file, or the defaults when there is none.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Couldn't open config {}", path.display()))?;
                serde_yaml::from_reader(file)
                    .with_context(|| format!("Invalid config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "databaseUrl: sqlite:///var/lib/bidwire/bids.db\nharvester:\n  userAgent: bidwire-test\n  concurrentPages: 2"
        )
        .unwrap();

        let conf = BidwireConfig::load(Some(file.path())).unwrap();

        assert_eq!("sqlite:///var/lib/bidwire/bids.db", conf.database_url);
        assert_eq!("bidwire-test", conf.harvester.user_agent);
        assert_eq!(2, conf.harvester.concurrent_pages);
        assert_eq!(Some(30), conf.harvester.request_timeout_secs);
    }

    #[test]
    fn load_without_file() {
        let conf = BidwireConfig::load(None).unwrap();

        assert_eq!("sqlite://bidwire.db", conf.database_url);
        assert!(conf.harvester.handle_sigint);
    }
}
