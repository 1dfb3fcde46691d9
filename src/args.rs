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

use crate::action::{ActionBinding, ActionTarget};
use crate::config::Config;
use crate::notification::{HintValue, Notification, Timeout};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Show a notification and wait for the daemon to close it.
#[derive(Parser, Debug)]
#[command(name = "hnotify-send", version)]
pub struct Args {
    pub summary: String,

    pub body: Option<String>,

    #[arg(short, long)]
    pub icon: Option<String>,

    #[arg(short, long, default_value = "im.received")]
    pub category: String,

    /// Sound file to play when the notification is shown.
    #[arg(short, long)]
    pub sound: Option<PathBuf>,

    /// key=type:value, type is int32, double or string.
    #[arg(long = "hint", value_name = "HINT")]
    pub hints: Vec<String>,

    /// key:label:service:path:interface:method[:type=value...]
    #[arg(short, long = "action", value_name = "ACTION")]
    pub actions: Vec<String>,

    /// Milliseconds, -1 leaves it to the daemon, 0 never expires.
    #[arg(short, long, allow_hyphen_values = true)]
    pub expire_timeout: Option<i32>,

    /// Withdraw the notification after this many milliseconds.
    #[arg(long, value_name = "MS")]
    pub withdraw_after: Option<u64>,

    /// Exit as soon as the daemon has accepted the notification.
    #[arg(long)]
    pub no_wait: bool,

    /// Print the daemon's server information and capabilities first.
    #[arg(long)]
    pub info: bool,

    #[arg(long = "config")]
    pub config_path: Option<PathBuf>,
}

impl Args {
    pub fn notification(&self, config: &Config) -> Result<Notification> {
        let timeout = self
            .expire_timeout
            .map(Timeout::from)
            .unwrap_or(config.expire_timeout);

        let mut notification = Notification::builder()
            .app_name(&config.app_name)
            .summary(&self.summary)
            .body(self.body.as_deref().unwrap_or_default())
            .icon(self.icon.as_deref().unwrap_or_default())
            .category(&self.category)
            .expire_timeout(timeout)
            .build()?;

        if let Some(sound) = &self.sound {
            notification.set_sound(sound)?;
        }

        for hint in &self.hints {
            let (key, value) = parse_hint(hint)?;
            notification.add_hint(&key, value);
        }

        for action in &self.actions {
            notification.add_action(parse_action(action)?)?;
        }

        Ok(notification)
    }
}

pub fn parse_hint(hint: &str) -> Result<(String, HintValue)> {
    match hint.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), HintValue::parse(value)?)),
        _ => bail!("Hint '{}' is not in key=type:value form", hint),
    }
}

pub fn parse_action(action: &str) -> Result<ActionBinding> {
    let fields: Vec<&str> = action.split(':').collect();
    if fields.len() < 6 {
        bail!(
            "Action '{}' is not in key:label:service:path:interface:method form",
            action
        );
    }

    let target = ActionTarget::new(fields[2], fields[3], fields[4], fields[5]);
    let mut tags = Vec::new();
    let mut values = Vec::new();
    for arg in &fields[6..] {
        match arg.split_once('=') {
            Some((tag, value)) => {
                tags.push(tag);
                values.push(value);
            }
            None => bail!("Action argument '{}' is not in type=value form", arg),
        }
    }

    let binding = ActionBinding::from_tagged(fields[0], fields[1], target, &tags, &values)?;
    binding.validate()?;
    Ok(binding)
}
