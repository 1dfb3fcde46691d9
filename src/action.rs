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

//! Remote actions attached to a notification. When the user picks an
//! action the daemon invokes `method` on `service` with the stored
//! arguments.

use crate::error::NotifyError;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// The argument types a remote action may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ArgType {
    Int32,
    Double,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionArg {
    Int32(i32),
    Double(f64),
    String(String),
}

impl ActionArg {
    /// Parse a textual value as the given type.
    pub fn parse(arg_type: ArgType, value: &str) -> Result<Self, NotifyError> {
        match arg_type {
            ArgType::Int32 => value
                .parse::<i32>()
                .map(ActionArg::Int32)
                .map_err(|e| NotifyError::invalid(format!("bad int32 '{}': {}", value, e))),
            ArgType::Double => value
                .parse::<f64>()
                .map(ActionArg::Double)
                .map_err(|e| NotifyError::invalid(format!("bad double '{}': {}", value, e))),
            ArgType::String => Ok(ActionArg::String(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionTarget {
    pub service: String,
    pub object_path: String,
    pub interface: String,
    pub method: String,
}

impl ActionTarget {
    pub fn new(service: &str, object_path: &str, interface: &str, method: &str) -> Self {
        Self {
            service: service.into(),
            object_path: object_path.into(),
            interface: interface.into(),
            method: method.into(),
        }
    }

    pub fn validate(&self) -> Result<(), NotifyError> {
        let fields = [
            ("service", &self.service),
            ("object path", &self.object_path),
            ("interface", &self.interface),
            ("method", &self.method),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                return Err(NotifyError::invalid(format!("action target {} is empty", name)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionBinding {
    pub action_key: String,
    pub label: String,
    pub target: ActionTarget,
    pub arguments: Vec<ActionArg>,
}

impl ActionBinding {
    pub fn new(action_key: &str, label: &str, target: ActionTarget, arguments: Vec<ActionArg>) -> Self {
        Self {
            action_key: action_key.into(),
            label: label.into(),
            target,
            arguments,
        }
    }

    /// Build a binding from a type-tag sequence and the matching textual
    /// values. The two must have the same length.
    pub fn from_tagged(
        action_key: &str,
        label: &str,
        target: ActionTarget,
        tags: &[&str],
        values: &[&str],
    ) -> Result<Self, NotifyError> {
        if tags.len() != values.len() {
            return Err(NotifyError::invalid(format!(
                "action '{}' has {} type tags but {} values",
                action_key,
                tags.len(),
                values.len()
            )));
        }

        let arguments = tags
            .iter()
            .zip(values)
            .map(|(tag, value)| {
                let arg_type = ArgType::from_str(tag)
                    .map_err(|_| NotifyError::invalid(format!("unknown argument type '{}'", tag)))?;
                ActionArg::parse(arg_type, value)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(action_key, label, target, arguments))
    }

    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.action_key.is_empty() {
            return Err(NotifyError::invalid("action key is empty"));
        }
        self.target.validate()
    }

    /// Name of the hint carrying the callback on the wire.
    pub fn hint_key(&self) -> String {
        format!("dbus-callback-{}", self.action_key)
    }
}
