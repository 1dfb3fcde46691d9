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

use thiserror::Error;

/// Every failure the client reports. None of them are retried
/// automatically, recovery is up to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Malformed input while building a notification or binding.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The bus could not be reached, fatal to the session.
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),
    /// The daemon rejected the notification or nobody implements the interface.
    #[error("Dispatch failed: {0}")]
    DispatchFailed(String),
    /// Withdraw was requested for a notification that isn't pending.
    #[error("Notification not pending: {0}")]
    NotPending(String),
}

impl NotifyError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        NotifyError::InvalidArgument(msg.into())
    }
}
