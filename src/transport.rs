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

//! The client side of the org.freedesktop.Notifications interface.

use crate::action::ActionBinding;
use crate::events::EventSource;
use crate::notification::{HintValue, Notification};
use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::os::unix::io::RawFd;

mod dbus_bus;
#[cfg(test)]
pub mod mock;

pub use dbus_bus::DbusBus;

pub const NOTIFICATIONS_SERVICE: &str = "org.freedesktop.Notifications";
pub const NOTIFICATIONS_PATH: &str = "/org/freedesktop/Notifications";
pub const NOTIFICATIONS_INTERFACE: &str = "org.freedesktop.Notifications";

pub const CATEGORY_HINT: &str = "category";
pub const SOUND_HINT: &str = "sound-file";

/// A message bus connection to a notification daemon. Calls are
/// enqueued and return the serial their reply will carry, replies and
/// signals come back as [`crate::events::BusEvent`]s.
pub trait Bus: EventSource {
    fn notify(&mut self, request: &NotifyRequest) -> Result<u32>;

    fn close_notification(&mut self, id: u32) -> Result<u32>;

    /// Blocking.
    fn server_information(&self) -> Result<ServerInformation>;

    /// Blocking.
    fn capabilities(&self) -> Result<Vec<String>>;

    /// File descriptor to poll for incoming messages, if any.
    fn watch_fd(&self) -> Option<RawFd>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerInformation {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub spec_version: String,
}

impl fmt::Display for ServerInformation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} ({}), protocol {}",
            self.name, self.version, self.vendor, self.spec_version
        )
    }
}

/// Arguments of a single Notify call, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyRequest {
    pub app_name: String,
    pub replaces_id: u32,
    pub icon: String,
    pub summary: String,
    pub body: String,
    /// Flattened `key, label` pairs.
    pub actions: Vec<String>,
    pub hints: HashMap<String, HintValue>,
    /// Remote invocations, sent as `dbus-callback-<key>` hints.
    pub callbacks: Vec<ActionBinding>,
    pub expire_timeout: i32,
}

impl From<&Notification> for NotifyRequest {
    fn from(n: &Notification) -> Self {
        let mut hints = n.hints().clone();
        hints.insert(CATEGORY_HINT.into(), HintValue::String(n.category().into()));
        if let Some(sound) = n.sound() {
            hints.insert(
                SOUND_HINT.into(),
                HintValue::String(sound.to_string_lossy().into_owned()),
            );
        }

        let actions = n
            .actions()
            .iter()
            .flat_map(|a| [a.action_key.clone(), a.label.clone()])
            .collect();

        Self {
            app_name: n.app_name().into(),
            replaces_id: 0,
            icon: n.icon().into(),
            summary: n.summary().into(),
            body: n.body().into(),
            actions,
            hints,
            callbacks: n.actions().to_vec(),
            expire_timeout: n.expire_timeout().into(),
        }
    }
}
