//! Startup fixtures loaded through the admin API.

use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;
use serialbox::{
    Admin,
    model::{NewPool, NewResponseRule, NewSequentialRegion},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub pools: Vec<NewPool>,
    pub regions: Vec<NewSequentialRegion>,
    pub response_rules: Vec<NewResponseRule>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedSummary {
    pub pools: usize,
    pub regions: usize,
    pub response_rules: usize,
}

impl Seed {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read SEED_FILE `{}`", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid seed fixture in `{}`", path.display()))
    }

    /// Creates pools first, then regions (in file order, so automatic
    /// `order` values follow it), then response rules. Stops at the first
    /// rejected entry.
    pub fn apply(self, admin: &Admin) -> anyhow::Result<SeedSummary> {
        let summary = SeedSummary {
            pools: self.pools.len(),
            regions: self.regions.len(),
            response_rules: self.response_rules.len(),
        };
        for pool in self.pools {
            let name = pool.machine_name.clone();
            admin
                .create_pool(pool)
                .with_context(|| format!("seeding pool `{name}`"))?;
        }
        for region in self.regions {
            let name = region.machine_name.clone();
            admin
                .create_region(region)
                .with_context(|| format!("seeding region `{name}`"))?;
        }
        for rule in self.response_rules {
            let label = format!("{}/{}", rule.pool, rule.content_type);
            admin
                .create_response_rule(rule)
                .with_context(|| format!("seeding response rule `{label}`"))?;
        }
        Ok(summary)
    }
}
