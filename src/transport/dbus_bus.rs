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

use super::{Bus, NotifyRequest, ServerInformation, NOTIFICATIONS_INTERFACE, NOTIFICATIONS_PATH};
use crate::action::{ActionArg, ActionBinding};
use crate::config::{BusType, Config};
use crate::events::{BusEvent, EventSource};
use crate::notification::HintValue;
use anyhow::{anyhow, bail, Result};
use dbus::arg::{IterAppend, PropMap, RefArg, Variant};
use dbus::blocking::Connection;
use dbus::channel::MatchingReceiver;
use dbus::message::{MatchRule, MessageType};
use dbus::Message;
use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::sync::mpsc::Sender;
use std::time::Duration;

pub struct DbusBus {
    connection: Connection,
    destination: String,
    call_timeout: Duration,
}

impl DbusBus {
    pub fn connect(config: &Config, tx: Sender<BusEvent>) -> Result<Self> {
        debug!("Connecting to {} bus", config.bus);
        let connection = match config.bus {
            BusType::Session => Connection::new_session(),
            BusType::System => Connection::new_system(),
        };
        let connection = match connection {
            Ok(c) => c,
            Err(e) => {
                bail!("Failed to connect to DBUS {} bus, is DBUS_SESSION_BUS_ADDRESS set?: {}", config.bus, e);
            }
        };

        let closed_tx = tx.clone();
        connection.add_match(
            MatchRule::new_signal(NOTIFICATIONS_INTERFACE, "NotificationClosed"),
            move |(id, reason): (u32, u32), _: &Connection, _: &Message| {
                Self::forward(&closed_tx, BusEvent::NotificationClosed { id, reason })
            },
        )?;

        let action_tx = tx.clone();
        connection.add_match(
            MatchRule::new_signal(NOTIFICATIONS_INTERFACE, "ActionInvoked"),
            move |(id, action_key): (u32, String), _: &Connection, _: &Message| {
                Self::forward(&action_tx, BusEvent::ActionInvoked { id, action_key })
            },
        )?;

        // Replies to our own calls never go through the bus daemon's
        // match rules, only through the local filters.
        for msg_type in [MessageType::MethodReturn, MessageType::Error] {
            let mut rule = MatchRule::new();
            rule.msg_type = Some(msg_type);
            let reply_tx = tx.clone();
            connection.start_receive(
                rule,
                Box::new(move |msg: Message, _: &Connection| match reply_event(msg) {
                    Some(event) => Self::forward(&reply_tx, event),
                    None => true,
                }),
            );
        }

        info!("DBUS: registered with {} bus as {}", config.bus, connection.unique_name());

        Ok(Self {
            connection,
            destination: config.destination.clone(),
            call_timeout: config.call_timeout(),
        })
    }

    fn forward(tx: &Sender<BusEvent>, event: BusEvent) -> bool {
        trace!("Received DBUS event: {:?}", event);
        match tx.send(event) {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to send DBUS event to event loop: {}", e);
                false
            }
        }
    }

    fn send(&self, msg: Message) -> Result<u32> {
        self.connection
            .channel()
            .send(msg)
            .map_err(|_| anyhow!("Failed to queue message, connection closed?"))
    }
}

fn method_call(destination: &str, member: &str) -> Result<Message> {
    Message::new_method_call(destination, NOTIFICATIONS_PATH, NOTIFICATIONS_INTERFACE, member)
        .map_err(|e| anyhow!("Failed to build {} call: {}", member, e))
}

/// `Notify(susssasa{sv}i)`, actions become `dbus-callback-<key>` hints.
fn notify_message(destination: &str, request: &NotifyRequest) -> Result<Message> {
    let mut hints: PropMap = request
        .hints
        .iter()
        .map(|(k, v)| (k.clone(), hint_variant(v)))
        .collect();
    for binding in &request.callbacks {
        hints.insert(binding.hint_key(), callback_variant(binding));
    }

    let mut msg = method_call(destination, "Notify")?;
    let mut args = IterAppend::new(&mut msg);
    args.append(request.app_name.as_str());
    args.append(request.replaces_id);
    args.append(request.icon.as_str());
    args.append(request.summary.as_str());
    args.append(request.body.as_str());
    args.append(request.actions.clone());
    args.append(hints);
    args.append(request.expire_timeout);
    Ok(msg)
}

/// Map a method return or error to the reply of the call it answers.
fn reply_event(mut msg: Message) -> Option<BusEvent> {
    let serial = msg.get_reply_serial()?;
    let result = match msg.msg_type() {
        MessageType::MethodReturn => Ok(msg.get1::<u32>()),
        MessageType::Error => match msg.as_result() {
            Ok(_) => Err("unknown error".to_string()),
            Err(e) => Err(format!(
                "{}: {}",
                e.name().unwrap_or("org.freedesktop.DBus.Error.Failed"),
                e.message().unwrap_or("")
            )),
        },
        _ => return None,
    };
    Some(BusEvent::Reply { serial, result })
}

fn hint_variant(value: &HintValue) -> Variant<Box<dyn RefArg>> {
    match value {
        HintValue::Int32(v) => Variant(Box::new(*v) as Box<dyn RefArg>),
        HintValue::Double(v) => Variant(Box::new(*v) as Box<dyn RefArg>),
        HintValue::String(v) => Variant(Box::new(v.clone()) as Box<dyn RefArg>),
    }
}

/// `(service, path, interface, method, args...)`
fn callback_variant(binding: &ActionBinding) -> Variant<Box<dyn RefArg>> {
    let mut fields: VecDeque<Box<dyn RefArg>> = VecDeque::new();
    fields.push_back(Box::new(binding.target.service.clone()));
    fields.push_back(Box::new(binding.target.object_path.clone()));
    fields.push_back(Box::new(binding.target.interface.clone()));
    fields.push_back(Box::new(binding.target.method.clone()));
    for arg in &binding.arguments {
        match arg {
            ActionArg::Int32(v) => fields.push_back(Box::new(*v)),
            ActionArg::Double(v) => fields.push_back(Box::new(*v)),
            ActionArg::String(v) => fields.push_back(Box::new(v.clone())),
        }
    }
    Variant(Box::new(fields) as Box<dyn RefArg>)
}

impl Bus for DbusBus {
    fn notify(&mut self, request: &NotifyRequest) -> Result<u32> {
        let msg = notify_message(&self.destination, request)?;
        let serial = self.send(msg)?;
        trace!("Queued Notify '{}' (serial {})", request.summary, serial);
        Ok(serial)
    }

    fn close_notification(&mut self, id: u32) -> Result<u32> {
        let msg = method_call(&self.destination, "CloseNotification")?.append1(id);
        let serial = self.send(msg)?;
        trace!("Queued CloseNotification {} (serial {})", id, serial);
        Ok(serial)
    }

    fn server_information(&self) -> Result<ServerInformation> {
        let proxy = self.connection.with_proxy(
            self.destination.as_str(),
            NOTIFICATIONS_PATH,
            self.call_timeout,
        );
        let (name, vendor, version, spec_version): (String, String, String, String) =
            proxy.method_call(NOTIFICATIONS_INTERFACE, "GetServerInformation", ())?;

        Ok(ServerInformation {
            name,
            vendor,
            version,
            spec_version,
        })
    }

    fn capabilities(&self) -> Result<Vec<String>> {
        let proxy = self.connection.with_proxy(
            self.destination.as_str(),
            NOTIFICATIONS_PATH,
            self.call_timeout,
        );
        let (caps,): (Vec<String>,) =
            proxy.method_call(NOTIFICATIONS_INTERFACE, "GetCapabilities", ())?;
        Ok(caps)
    }

    fn watch_fd(&self) -> Option<RawFd> {
        Some(self.connection.channel().watch().fd)
    }
}

impl EventSource for DbusBus {
    fn process_pending(&mut self) -> Result<()> {
        loop {
            match self.connection.process(Duration::from_millis(0)) {
                Ok(true) => continue,
                Ok(false) => return Ok(()),
                Err(e) => return Err(anyhow!("Failed to process DBUS messages: {}", e)),
            }
        }
    }
}
