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

//! In-memory stand-in for a notification daemon. The bus side is owned
//! by the session, the test drives the daemon side.

use super::{Bus, NotifyRequest, ServerInformation};
use crate::events::{BusEvent, EventSource};
use anyhow::{bail, Result};
use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::sync::mpsc::Sender;

enum Call {
    Notify(u32),
    Close(u32, u32),
}

struct MockState {
    next_serial: u32,
    next_id: u32,
    queued: Vec<Call>,
    notified: Vec<NotifyRequest>,
    closed: Vec<u32>,
    reject: Option<String>,
    disconnected: bool,
}

pub struct MockBus {
    state: Rc<RefCell<MockState>>,
}

#[derive(Clone)]
pub struct MockDaemon {
    state: Rc<RefCell<MockState>>,
    tx: Sender<BusEvent>,
}

impl MockBus {
    pub fn new(tx: Sender<BusEvent>) -> (MockBus, MockDaemon) {
        let state = Rc::new(RefCell::new(MockState {
            next_serial: 1,
            next_id: 1,
            queued: Vec::new(),
            notified: Vec::new(),
            closed: Vec::new(),
            reject: None,
            disconnected: false,
        }));
        (
            MockBus {
                state: state.clone(),
            },
            MockDaemon { state, tx },
        )
    }

    fn next_serial(state: &mut MockState) -> Result<u32> {
        if state.disconnected {
            bail!("Failed to queue message, connection closed?");
        }
        let serial = state.next_serial;
        state.next_serial += 1;
        Ok(serial)
    }
}

impl Bus for MockBus {
    fn notify(&mut self, request: &NotifyRequest) -> Result<u32> {
        let mut state = self.state.borrow_mut();
        let serial = Self::next_serial(&mut state)?;
        state.notified.push(request.clone());
        state.queued.push(Call::Notify(serial));
        Ok(serial)
    }

    fn close_notification(&mut self, id: u32) -> Result<u32> {
        let mut state = self.state.borrow_mut();
        let serial = Self::next_serial(&mut state)?;
        state.closed.push(id);
        state.queued.push(Call::Close(serial, id));
        Ok(serial)
    }

    fn server_information(&self) -> Result<ServerInformation> {
        Ok(ServerInformation {
            name: "mock-daemon".into(),
            vendor: "hnotify".into(),
            version: "1.0".into(),
            spec_version: "1.2".into(),
        })
    }

    fn capabilities(&self) -> Result<Vec<String>> {
        Ok(vec!["body".into(), "actions".into(), "sound".into()])
    }

    fn watch_fd(&self) -> Option<RawFd> {
        None
    }
}

impl EventSource for MockBus {
    fn process_pending(&mut self) -> Result<()> {
        Ok(())
    }
}

impl MockDaemon {
    /// Reply to every queued call. Notify calls get fresh ids, or the
    /// rejection set with [`MockDaemon::reject_with`]. Close calls are
    /// answered and followed by a `NotificationClosed` signal.
    pub fn answer_all(&self) {
        let mut state = self.state.borrow_mut();
        let queued = std::mem::take(&mut state.queued);
        for call in queued {
            match call {
                Call::Notify(serial) => {
                    let result = match state.reject.clone() {
                        Some(reason) => Err(reason),
                        None => {
                            let id = state.next_id;
                            state.next_id += 1;
                            Ok(Some(id))
                        }
                    };
                    self.send(BusEvent::Reply { serial, result });
                }
                Call::Close(serial, id) => {
                    self.send(BusEvent::Reply {
                        serial,
                        result: Ok(None),
                    });
                    self.send(BusEvent::NotificationClosed { id, reason: 3 });
                }
            }
        }
    }

    /// Answer the oldest queued Notify call with an arbitrary id.
    pub fn answer_with_id(&self, id: u32) {
        let mut state = self.state.borrow_mut();
        let pos = state
            .queued
            .iter()
            .position(|c| matches!(c, Call::Notify(_)));
        if let Some(pos) = pos {
            if let Call::Notify(serial) = state.queued.remove(pos) {
                self.send(BusEvent::Reply {
                    serial,
                    result: Ok(Some(id)),
                });
            }
        }
    }

    pub fn reject_with(&self, reason: &str) {
        self.state.borrow_mut().reject = Some(reason.into());
    }

    pub fn disconnect(&self) {
        self.state.borrow_mut().disconnected = true;
    }

    pub fn close(&self, id: u32, reason: u32) {
        self.send(BusEvent::NotificationClosed { id, reason });
    }

    pub fn invoke(&self, id: u32, action_key: &str) {
        self.send(BusEvent::ActionInvoked {
            id,
            action_key: action_key.into(),
        });
    }

    pub fn notified(&self) -> Vec<NotifyRequest> {
        self.state.borrow().notified.clone()
    }

    pub fn close_calls(&self) -> Vec<u32> {
        self.state.borrow().closed.clone()
    }

    fn send(&self, event: BusEvent) {
        let _ = self.tx.send(event);
    }
}
