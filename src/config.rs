/*
* hnotify notification client
* Copyright (C) 2022 Caleb Connolly <caleb@connolly.tech>
*
* This program is free software; you can redistribute it and/or modify
* it under the terms of the GNU General Public License as published by
* the Free Software Foundation; either version 2 of the License, or
* (at your option) any later version.
*
* This program is distributed in the hope that it will be useful,
* but WITHOUT ANY WARRANTY; without even the implied warranty of
* MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
* GNU General Public License for more details.
*
* You should have received a copy of the GNU General Public License along
* with this program; if not, write to the Free Software Foundation, Inc.,
* 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.
*/

use crate::notification::{Timeout, DEFAULT_APP_NAME};
use crate::transport::NOTIFICATIONS_SERVICE;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use strum_macros::Display;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/hnotify/config.yaml";

#[derive(Debug, PartialEq, Deserialize, Copy, Clone, Default, Display)]
#[serde(rename_all(deserialize = "kebab-case"))]
#[strum(serialize_all = "lowercase")]
pub enum BusType {
    #[default]
    Session,
    System,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all(deserialize = "kebab-case"))]
#[serde(default)]
pub struct Config {
    pub app_name: String,
    pub bus: BusType,
    /// Well-known name of the notification daemon.
    pub destination: String,
    pub expire_timeout: Timeout,
    call_timeout_ms: u64,
    tick_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.into(),
            bus: BusType::Session,
            destination: NOTIFICATIONS_SERVICE.into(),
            expire_timeout: Timeout::Default,
            call_timeout_ms: 5000,
            tick_ms: 200,
        }
    }
}

impl Config {
    /// Load the config from `path`, or from the default location. A
    /// missing default file is fine, a missing explicit one is not.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        if !explicit && !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let config = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        Self::parse(&config)
    }

    pub fn parse(config: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(config)?)
    }

    /// Timeout for blocking queries against the daemon.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// How often the loop wakes up when nothing happens.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
