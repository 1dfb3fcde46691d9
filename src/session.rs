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

use crate::config::Config;
use crate::error::NotifyError;
use crate::events::BusEvent;
use crate::notification::Notification;
use crate::tracker::{CloseReason, Handle, Tracker};
use crate::transport::{Bus, DbusBus, ServerInformation};
use anyhow::{anyhow, Result};
use calloop::generic::Generic;
use calloop::{EventLoop, Interest, LoopHandle, LoopSignal, Mode, PostAction, RegistrationToken};
use std::io;
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

const DEFAULT_TICK: Duration = Duration::from_millis(200);

/// The part of a session loop callbacks get to see.
pub struct SessionState<B: Bus> {
    bus: B,
    events: Receiver<BusEvent>,
    tracker: Tracker,
    signal: LoopSignal,
}

impl<B: Bus> SessionState<B> {
    /// Hand `notification` to the daemon. The outcome arrives through
    /// `on_closed`, the returned handle only reports progress.
    pub fn dispatch<F>(&mut self, notification: Notification, on_closed: F) -> Handle
    where
        F: FnOnce(Result<CloseReason, NotifyError>) + 'static,
    {
        self.tracker.dispatch(&mut self.bus, notification, Box::new(on_closed))
    }

    pub fn withdraw(&mut self, handle: &Handle) -> Result<(), NotifyError> {
        self.tracker.withdraw(&mut self.bus, handle)
    }

    pub fn pending(&self) -> usize {
        self.tracker.pending()
    }

    /// Stop [`Session::run`] once the current iteration is done.
    pub fn quit(&self) {
        self.signal.stop();
    }

    fn process_pending(&mut self) -> Result<()> {
        self.bus.process_pending()?;
        while let Ok(event) = self.events.try_recv() {
            trace!("Received event: {}", event);
            self.tracker.handle_event(event);
        }
        Ok(())
    }
}

/// One connection to the notification daemon and its registration with
/// an event loop. Dropping the session tears it down.
pub struct Session<B: Bus + 'static = DbusBus> {
    event_loop: EventLoop<'static, SessionState<B>>,
    state: SessionState<B>,
    registration: Option<RegistrationToken>,
    tick: Duration,
    closed: bool,
}

impl Session<DbusBus> {
    pub fn open(config: &Config) -> Result<Self, NotifyError> {
        let (tx, rx) = channel();
        let bus = DbusBus::connect(config, tx)
            .map_err(|e| NotifyError::TransportUnavailable(format!("{:#}", e)))?;

        let mut session = Self::from_parts(bus, rx)?;
        session.tick = config.tick();
        Ok(session)
    }
}

impl<B: Bus + 'static> Session<B> {
    /// Build a session around an already connected bus. `events` must
    /// receive everything the bus produces.
    pub fn from_parts(bus: B, events: Receiver<BusEvent>) -> Result<Self, NotifyError> {
        let event_loop: EventLoop<SessionState<B>> = EventLoop::try_new()
            .map_err(|e| NotifyError::TransportUnavailable(format!("Failed to create event loop: {}", e)))?;

        let registration = match bus.watch_fd() {
            Some(fd) => {
                let token = event_loop
                    .handle()
                    .insert_source(
                        Generic::new(fd, Interest::READ, Mode::Level),
                        |_, _, state: &mut SessionState<B>| match state.process_pending() {
                            Ok(()) => Ok(PostAction::Continue),
                            Err(e) => Err(io::Error::new(io::ErrorKind::Other, format!("{:#}", e))),
                        },
                    )
                    .map_err(|e| {
                        NotifyError::TransportUnavailable(format!(
                            "Failed to register bus with event loop: {}",
                            e.error
                        ))
                    })?;
                Some(token)
            }
            None => None,
        };

        let signal = event_loop.get_signal();
        Ok(Self {
            event_loop,
            state: SessionState {
                bus,
                events,
                tracker: Tracker::new(),
                signal,
            },
            registration,
            tick: DEFAULT_TICK,
            closed: false,
        })
    }

    pub fn dispatch<F>(&mut self, notification: Notification, on_closed: F) -> Handle
    where
        F: FnOnce(Result<CloseReason, NotifyError>) + 'static,
    {
        self.state.dispatch(notification, on_closed)
    }

    pub fn withdraw(&mut self, handle: &Handle) -> Result<(), NotifyError> {
        self.state.withdraw(handle)
    }

    /// Called when the user picks one of a pending notification's actions.
    pub fn on_action<F>(&mut self, handler: F)
    where
        F: FnMut(&Handle, &str) + 'static,
    {
        self.state.tracker.set_action_handler(Box::new(handler));
    }

    pub fn pending(&self) -> usize {
        self.state.pending()
    }

    /// True once every dispatched notification has been resolved.
    pub fn is_idle(&self) -> bool {
        self.state.tracker.is_idle()
    }

    pub fn server_information(&self) -> Result<ServerInformation> {
        self.state.bus.server_information()
    }

    pub fn capabilities(&self) -> Result<Vec<String>> {
        self.state.bus.capabilities()
    }

    /// For registering more sources, e.g. a timer to withdraw a
    /// notification that stays up too long.
    pub fn loop_handle(&self) -> LoopHandle<'static, SessionState<B>> {
        self.event_loop.handle()
    }

    pub fn loop_signal(&self) -> LoopSignal {
        self.event_loop.get_signal()
    }

    /// Run a single loop iteration, waiting at most `timeout` for
    /// something to happen, then handle whatever the bus delivered.
    pub fn dispatch_pending(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.event_loop
            .dispatch(timeout, &mut self.state)
            .map_err(|e| anyhow!("Event loop dispatch failed: {}", e))?;
        self.state.process_pending()
    }

    /// Run until [`SessionState::quit`] or a [`LoopSignal`] stops the loop.
    pub fn run(&mut self) -> Result<()> {
        let signal = self.event_loop.get_signal();
        let mut failure = None;

        self.event_loop
            .run(self.tick, &mut self.state, |state| {
                if let Err(e) = state.process_pending() {
                    failure = Some(e);
                    signal.stop();
                }
            })
            .map_err(|e| anyhow!("Event loop failed: {}", e))?;

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Unregister from the loop, resolve everything still outstanding
    /// and drop the connection.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(token) = self.registration.take() {
            self.event_loop.handle().remove(token);
        }
        self.state.tracker.teardown();
        debug!("Session closed");
    }
}

impl<B: Bus + 'static> Drop for Session<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
