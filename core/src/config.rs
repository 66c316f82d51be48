// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! Configuration recognized by the core.
//!
//! Loading (files, environment, CLI) is a host concern; the core only
//! defines the keys, their defaults and the conversion into component
//! configs.

use arara_execution::SimulatorConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{path::PathBuf, time::Duration};

fn default_speed() -> u64 {
    100
}

fn default_descriptor() -> SmolStr {
    SmolStr::new("simulator")
}

/// Account identity passed through to brokers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccountConfig {
    #[serde(rename = "Descriptor", default = "default_descriptor")]
    pub descriptor: SmolStr,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            descriptor: default_descriptor(),
        }
    }
}

/// Top-level terminal configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SystemConfig {
    /// Simulator tick interval in milliseconds.
    #[serde(rename = "Speed", default = "default_speed")]
    pub speed: u64,

    /// Directory of per-instrument tick files.
    #[serde(rename = "Source", default)]
    pub source: PathBuf,

    /// Starting account balance.
    #[serde(rename = "InitialBalance", default)]
    pub initial_balance: Decimal,

    #[serde(rename = "Account", default)]
    pub account: AccountConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            source: PathBuf::new(),
            initial_balance: Decimal::ZERO,
            account: AccountConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Simulator session parameters derived from this configuration.
    pub fn simulator(&self) -> SimulatorConfig {
        SimulatorConfig {
            speed: Duration::from_millis(self.speed),
            source: self.source.clone(),
            initial_balance: self.initial_balance,
            descriptor: self.account.descriptor.clone(),
        }
    }
}
