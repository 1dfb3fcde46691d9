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

use anyhow::Result;
use strum_macros::Display;

/// Everything the bus hands back to us. Produced by the D-Bus filter
/// callbacks and consumed by the tracker on the event loop thread.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum BusEvent {
    /// Reply to a method call we sent, matched by serial. `Ok(None)` for
    /// calls with no return value.
    Reply {
        serial: u32,
        result: Result<Option<u32>, String>,
    },
    NotificationClosed { id: u32, reason: u32 },
    ActionInvoked { id: u32, action_key: String },
}

/// All event sources must implement this trait.
/// Event sources are responsible for handling any pending events
/// and propagating them to the event channel.
/// They must not block, an error causes the loop to exit.
pub trait EventSource {
    fn process_pending(&mut self) -> Result<()>;
}
