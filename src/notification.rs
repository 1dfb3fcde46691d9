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

use crate::action::ActionBinding;
use crate::error::NotifyError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_APP_NAME: &str = "hnotify";

/// Typed out-of-band annotation, e.g. a LED pattern or dialog type.
#[derive(Debug, Clone, PartialEq)]
pub enum HintValue {
    Int32(i32),
    Double(f64),
    String(String),
}

impl HintValue {
    /// Parse `type:value`, e.g. `int32:1` or `string:PatternCommunicationIM`.
    /// A bare value without a type is taken as a string.
    pub fn parse(text: &str) -> Result<Self, NotifyError> {
        let (ty, value) = match text.split_once(':') {
            Some((ty @ ("int32" | "double" | "string"), value)) => (ty, value),
            _ => ("string", text),
        };
        match ty {
            "int32" => value
                .parse()
                .map(HintValue::Int32)
                .map_err(|e| NotifyError::invalid(format!("bad int32 hint '{}': {}", value, e))),
            "double" => value
                .parse()
                .map(HintValue::Double)
                .map_err(|e| NotifyError::invalid(format!("bad double hint '{}': {}", value, e))),
            _ => Ok(HintValue::String(value.to_string())),
        }
    }
}

impl From<i32> for HintValue {
    fn from(v: i32) -> Self {
        HintValue::Int32(v)
    }
}

impl From<f64> for HintValue {
    fn from(v: f64) -> Self {
        HintValue::Double(v)
    }
}

impl From<&str> for HintValue {
    fn from(v: &str) -> Self {
        HintValue::String(v.to_string())
    }
}

impl From<String> for HintValue {
    fn from(v: String) -> Self {
        HintValue::String(v)
    }
}

/// How long the daemon should keep the notification on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "i32")]
pub enum Timeout {
    /// Let the daemon decide.
    #[default]
    Default,
    Never,
    /// Milliseconds.
    After(u32),
}

impl From<i32> for Timeout {
    fn from(ms: i32) -> Self {
        match ms {
            0 => Timeout::Never,
            ms if ms < 0 => Timeout::Default,
            ms => Timeout::After(ms as u32),
        }
    }
}

impl From<Timeout> for i32 {
    fn from(t: Timeout) -> Self {
        match t {
            Timeout::Default => -1,
            Timeout::Never => 0,
            Timeout::After(ms) => ms.min(i32::MAX as u32) as i32,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Notification {
    app_name: String,
    summary: String,
    body: String,
    icon: String,
    category: String,
    hints: HashMap<String, HintValue>,
    sound: Option<PathBuf>,
    actions: Vec<ActionBinding>,
    expire_timeout: Timeout,
    server_id: Option<u32>,
}

// A copy is a new notification, it never inherits the daemon's id.
impl Clone for Notification {
    fn clone(&self) -> Self {
        Self {
            app_name: self.app_name.clone(),
            summary: self.summary.clone(),
            body: self.body.clone(),
            icon: self.icon.clone(),
            category: self.category.clone(),
            hints: self.hints.clone(),
            sound: self.sound.clone(),
            actions: self.actions.clone(),
            expire_timeout: self.expire_timeout,
            server_id: None,
        }
    }
}

impl Notification {
    pub fn builder() -> NotificationBuilder {
        NotificationBuilder::default()
    }

    pub fn build(summary: &str, body: &str, icon: &str, category: &str) -> Result<Self, NotifyError> {
        Self::builder()
            .summary(summary)
            .body(body)
            .icon(icon)
            .category(category)
            .build()
    }

    /// Replaces any previous value for `key`.
    pub fn add_hint(&mut self, key: &str, value: impl Into<HintValue>) {
        self.hints.insert(key.to_string(), value.into());
    }

    pub fn set_sound(&mut self, path: impl AsRef<Path>) -> Result<(), NotifyError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(NotifyError::invalid("sound path is empty"));
        }
        self.sound = Some(path.to_path_buf());
        Ok(())
    }

    pub fn add_action(&mut self, binding: ActionBinding) -> Result<(), NotifyError> {
        binding.validate()?;
        if self.actions.iter().any(|a| a.action_key == binding.action_key) {
            return Err(NotifyError::invalid(format!(
                "duplicate action key '{}'",
                binding.action_key
            )));
        }
        self.actions.push(binding);
        Ok(())
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn hints(&self) -> &HashMap<String, HintValue> {
        &self.hints
    }

    pub fn sound(&self) -> Option<&Path> {
        self.sound.as_deref()
    }

    pub fn actions(&self) -> &[ActionBinding] {
        &self.actions
    }

    pub fn expire_timeout(&self) -> Timeout {
        self.expire_timeout
    }

    pub fn server_id(&self) -> Option<u32> {
        self.server_id
    }

    /// Only the tracker calls this, once, with the id from a successful
    /// Notify reply.
    pub(crate) fn assign_server_id(&mut self, id: u32) -> bool {
        if self.server_id.is_some() || id == 0 {
            return false;
        }
        self.server_id = Some(id);
        true
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.server_id {
            Some(id) => write!(f, "[{}] {} ({})", id, self.summary, self.category),
            None => write!(f, "[-] {} ({})", self.summary, self.category),
        }
    }
}

#[derive(Debug, Default)]
pub struct NotificationBuilder {
    app_name: Option<String>,
    summary: Option<String>,
    body: Option<String>,
    icon: Option<String>,
    category: Option<String>,
    expire_timeout: Timeout,
}

impl NotificationBuilder {
    pub fn app_name(mut self, app_name: &str) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn expire_timeout(mut self, timeout: Timeout) -> Self {
        self.expire_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Notification, NotifyError> {
        let summary = self
            .summary
            .ok_or_else(|| NotifyError::invalid("notification summary is required"))?;
        let category = self
            .category
            .ok_or_else(|| NotifyError::invalid("notification category is required"))?;

        Ok(Notification {
            app_name: self.app_name.unwrap_or_else(|| DEFAULT_APP_NAME.into()),
            summary,
            body: self.body.unwrap_or_default(),
            icon: self.icon.unwrap_or_default(),
            category,
            hints: HashMap::new(),
            sound: None,
            actions: Vec::new(),
            expire_timeout: self.expire_timeout,
            server_id: None,
        })
    }
}
