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

//! Tracks dispatched notifications until the daemon closes them.
//!
//! Everything here runs on the event loop thread, entries are plain
//! `Rc<RefCell<..>>` and the tables need no locking.

use crate::error::NotifyError;
use crate::events::BusEvent;
use crate::notification::Notification;
use crate::transport::{Bus, NotifyRequest};
use std::cell::{Ref, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CloseReason {
    Expired,
    Dismissed,
    ClosedByCall,
    Undefined,
    /// The session went away before the daemon closed it.
    SessionTeardown,
}

impl From<u32> for CloseReason {
    fn from(reason: u32) -> Self {
        match reason {
            1 => CloseReason::Expired,
            2 => CloseReason::Dismissed,
            3 => CloseReason::ClosedByCall,
            _ => CloseReason::Undefined,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Built,
    Dispatching,
    Pending,
    Closed(CloseReason),
    Failed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            State::Built => write!(f, "built"),
            State::Dispatching => write!(f, "dispatching"),
            State::Pending => write!(f, "pending"),
            State::Closed(reason) => write!(f, "closed ({})", reason),
            State::Failed => write!(f, "failed"),
        }
    }
}

/// Invoked exactly once per dispatched notification, unless the daemon
/// never answers.
pub type OnClosed = Box<dyn FnOnce(Result<CloseReason, NotifyError>)>;
pub type OnAction = Box<dyn FnMut(&Handle, &str)>;

struct Tracked {
    notification: Notification,
    state: State,
}

/// Shared reference to a dispatched notification.
#[derive(Clone)]
pub struct Handle(Rc<RefCell<Tracked>>);

impl Handle {
    fn new(notification: Notification) -> Self {
        Handle(Rc::new(RefCell::new(Tracked {
            notification,
            state: State::Built,
        })))
    }

    pub fn state(&self) -> State {
        self.0.borrow().state
    }

    pub fn server_id(&self) -> Option<u32> {
        self.0.borrow().notification.server_id()
    }

    pub fn notification(&self) -> Ref<'_, Notification> {
        Ref::map(self.0.borrow(), |t| &t.notification)
    }

    fn set_state(&self, state: State) {
        let mut tracked = self.0.borrow_mut();
        trace!("{}: {} -> {}", tracked.notification, tracked.state, state);
        tracked.state = state;
    }

    fn same(&self, other: &Handle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

struct Entry {
    handle: Handle,
    on_closed: OnClosed,
}

impl Entry {
    fn resolve(self, reason: CloseReason) {
        self.handle.set_state(State::Closed(reason));
        debug!("Notification {} closed: {}", *self.handle.notification(), reason);
        (self.on_closed)(Ok(reason));
    }

    fn fail(self, reason: String) {
        self.handle.set_state(State::Failed);
        warn!("Failed to show notification {}: {}", *self.handle.notification(), reason);
        (self.on_closed)(Err(NotifyError::DispatchFailed(reason)));
    }
}

#[derive(Default)]
pub struct Tracker {
    /// Keyed by the serial of the outstanding Notify call.
    dispatching: HashMap<u32, Entry>,
    /// Keyed by the daemon's notification id.
    pending: HashMap<u32, Entry>,
    /// Every id the daemon has handed out this session.
    seen_ids: HashSet<u32>,
    on_action: Option<OnAction>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_action_handler(&mut self, handler: OnAction) {
        self.on_action = Some(handler);
    }

    /// Number of notifications waiting for a close.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Nothing pending and no Notify call outstanding.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.dispatching.is_empty()
    }

    /// Number of Notify calls waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.dispatching.len()
    }

    pub fn dispatch<B: Bus>(&mut self, bus: &mut B, notification: Notification, on_closed: OnClosed) -> Handle {
        let handle = Handle::new(notification);
        handle.set_state(State::Dispatching);

        let request = NotifyRequest::from(&*handle.notification());
        let entry = Entry {
            handle: handle.clone(),
            on_closed,
        };

        match bus.notify(&request) {
            Ok(serial) => {
                debug!("Dispatched {} (serial {})", *handle.notification(), serial);
                self.dispatching.insert(serial, entry);
            }
            Err(e) => entry.fail(e.to_string()),
        }

        handle
    }

    pub fn withdraw<B: Bus>(&mut self, bus: &mut B, handle: &Handle) -> Result<(), NotifyError> {
        let state = handle.state();
        let id = match (state, handle.server_id()) {
            (State::Pending, Some(id)) => id,
            _ => {
                return Err(NotifyError::NotPending(format!(
                    "{} is {}",
                    *handle.notification(),
                    state
                )))
            }
        };

        match self.pending.get(&id) {
            Some(entry) if entry.handle.same(handle) => {}
            _ => {
                return Err(NotifyError::NotPending(format!(
                    "{} is not tracked by this session",
                    *handle.notification()
                )))
            }
        }

        bus.close_notification(id)
            .map_err(|e| NotifyError::DispatchFailed(e.to_string()))?;

        if let Some(entry) = self.pending.remove(&id) {
            entry.resolve(CloseReason::ClosedByCall);
        }
        Ok(())
    }

    pub fn handle_event(&mut self, event: BusEvent) {
        match event {
            BusEvent::Reply { serial, result } => {
                let entry = match self.dispatching.remove(&serial) {
                    Some(entry) => entry,
                    None => {
                        trace!("Ignoring reply to untracked call (serial {})", serial);
                        return;
                    }
                };
                match result {
                    Ok(Some(id)) if id > 0 => self.accept(entry, id),
                    Ok(_) => entry.fail("daemon returned no notification id".into()),
                    Err(e) => entry.fail(e),
                }
            }
            BusEvent::NotificationClosed { id, reason } => match self.pending.remove(&id) {
                Some(entry) => entry.resolve(CloseReason::from(reason)),
                None => trace!("Ignoring close of untracked notification {}", id),
            },
            BusEvent::ActionInvoked { id, action_key } => match self.pending.get(&id) {
                Some(entry) => {
                    debug!("Action '{}' invoked on {}", action_key, *entry.handle.notification());
                    if let Some(handler) = self.on_action.as_mut() {
                        handler(&entry.handle, &action_key);
                    }
                }
                None => trace!("Ignoring action '{}' on untracked notification {}", action_key, id),
            },
        }
    }

    fn accept(&mut self, entry: Entry, id: u32) {
        if !self.seen_ids.insert(id) {
            entry.fail(format!("daemon reused notification id {}", id));
            return;
        }
        let assigned = entry.handle.0.borrow_mut().notification.assign_server_id(id);
        if !assigned {
            entry.fail(format!("notification already has an id, daemon sent {}", id));
            return;
        }
        entry.handle.set_state(State::Pending);
        debug!("Notification {} pending", *entry.handle.notification());
        self.pending.insert(id, entry);
    }

    /// Resolve pending notifications with `SessionTeardown`. Those the
    /// daemon never acknowledged fail instead.
    pub fn teardown(&mut self) {
        let outstanding = self.dispatching.len() + self.pending.len();
        if outstanding > 0 {
            debug!("Tearing down {} outstanding notifications", outstanding);
        }

        for (_, entry) in std::mem::take(&mut self.dispatching) {
            entry.fail("session closed before the daemon replied".into());
        }
        for (_, entry) in std::mem::take(&mut self.pending) {
            entry.resolve(CloseReason::SessionTeardown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockBus, MockDaemon};
    use std::sync::mpsc::{channel, Receiver};

    type Outcomes = Rc<RefCell<Vec<Result<CloseReason, NotifyError>>>>;

    fn setup() -> (Tracker, MockBus, MockDaemon, Receiver<BusEvent>) {
        let (tx, rx) = channel();
        let (bus, daemon) = MockBus::new(tx);
        (Tracker::new(), bus, daemon, rx)
    }

    fn recorder() -> (Outcomes, OnClosed) {
        let outcomes: Outcomes = Rc::new(RefCell::new(Vec::new()));
        let sink = outcomes.clone();
        (outcomes, Box::new(move |r| sink.borrow_mut().push(r)))
    }

    fn pump(tracker: &mut Tracker, rx: &Receiver<BusEvent>) {
        for event in rx.try_iter() {
            tracker.handle_event(event);
        }
    }

    fn chat() -> Notification {
        Notification::build("John Doe", "Hi!", "icon-chat", "chat").unwrap()
    }

    #[test]
    fn dispatch_then_close() {
        let (mut tracker, mut bus, daemon, rx) = setup();
        let (outcomes, on_closed) = recorder();

        let handle = tracker.dispatch(&mut bus, chat(), on_closed);
        assert_eq!(handle.state(), State::Dispatching);
        assert_eq!(tracker.in_flight(), 1);

        daemon.answer_all();
        pump(&mut tracker, &rx);
        assert_eq!(handle.state(), State::Pending);
        let id = handle.server_id().unwrap();
        assert!(id > 0);
        assert_eq!(tracker.pending(), 1);

        daemon.close(id, 2);
        pump(&mut tracker, &rx);
        assert_eq!(handle.state(), State::Closed(CloseReason::Dismissed));
        assert_eq!(*outcomes.borrow(), vec![Ok(CloseReason::Dismissed)]);
        assert!(tracker.is_idle());
    }

    #[test]
    fn rejected_notify_fails_without_id() {
        let (mut tracker, mut bus, daemon, rx) = setup();
        let (outcomes, on_closed) = recorder();
        daemon.reject_with("org.freedesktop.DBus.Error.ServiceUnknown: no daemon");

        let handle = tracker.dispatch(&mut bus, chat(), on_closed);
        daemon.answer_all();
        pump(&mut tracker, &rx);

        assert_eq!(handle.state(), State::Failed);
        assert_eq!(handle.server_id(), None);
        assert!(matches!(
            outcomes.borrow().as_slice(),
            [Err(NotifyError::DispatchFailed(_))]
        ));
        assert!(tracker.is_idle());
    }

    #[test]
    fn unsendable_notify_fails_immediately() {
        let (mut tracker, mut bus, daemon, _rx) = setup();
        let (outcomes, on_closed) = recorder();
        daemon.disconnect();

        let handle = tracker.dispatch(&mut bus, chat(), on_closed);
        assert_eq!(handle.state(), State::Failed);
        assert_eq!(outcomes.borrow().len(), 1);
        assert!(tracker.is_idle());
    }

    #[test]
    fn zero_or_reused_id_fails() {
        let (mut tracker, mut bus, daemon, rx) = setup();
        let (first_outcomes, first) = recorder();
        let (second_outcomes, second) = recorder();
        let (third_outcomes, third) = recorder();

        let a = tracker.dispatch(&mut bus, chat(), first);
        let b = tracker.dispatch(&mut bus, chat(), second);
        let c = tracker.dispatch(&mut bus, chat(), third);
        daemon.answer_with_id(0);
        daemon.answer_with_id(5);
        daemon.answer_with_id(5);
        pump(&mut tracker, &rx);

        assert_eq!(a.state(), State::Failed);
        assert_eq!(b.state(), State::Pending);
        assert_eq!(c.state(), State::Failed);
        assert_eq!(first_outcomes.borrow().len(), 1);
        assert!(second_outcomes.borrow().is_empty());
        assert_eq!(third_outcomes.borrow().len(), 1);
        assert_eq!(tracker.pending(), 1);
    }

    #[test]
    fn withdraw_then_late_close_is_noop() {
        let (mut tracker, mut bus, daemon, rx) = setup();
        let (outcomes, on_closed) = recorder();

        let handle = tracker.dispatch(&mut bus, chat(), on_closed);
        daemon.answer_all();
        pump(&mut tracker, &rx);
        let id = handle.server_id().unwrap();

        tracker.withdraw(&mut bus, &handle).unwrap();
        assert_eq!(handle.state(), State::Closed(CloseReason::ClosedByCall));
        assert_eq!(daemon.close_calls(), vec![id]);
        assert!(tracker.is_idle());

        // The daemon confirms with its own NotificationClosed.
        daemon.answer_all();
        daemon.close(id, 2);
        pump(&mut tracker, &rx);

        assert_eq!(*outcomes.borrow(), vec![Ok(CloseReason::ClosedByCall)]);
        assert_eq!(handle.state(), State::Closed(CloseReason::ClosedByCall));
    }

    #[test]
    fn withdraw_requires_pending() {
        let (mut tracker, mut bus, daemon, rx) = setup();
        let (_outcomes, on_closed) = recorder();

        let handle = tracker.dispatch(&mut bus, chat(), on_closed);
        assert!(matches!(
            tracker.withdraw(&mut bus, &handle),
            Err(NotifyError::NotPending(_))
        ));

        daemon.answer_all();
        pump(&mut tracker, &rx);
        daemon.close(handle.server_id().unwrap(), 1);
        pump(&mut tracker, &rx);

        assert!(matches!(
            tracker.withdraw(&mut bus, &handle),
            Err(NotifyError::NotPending(_))
        ));
        assert!(daemon.close_calls().is_empty());
    }

    #[test]
    fn teardown_resolves_pending_and_fails_in_flight() {
        let (mut tracker, mut bus, daemon, rx) = setup();
        let (outcomes, _) = recorder();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let sink = outcomes.clone();
            handles.push(tracker.dispatch(&mut bus, chat(), Box::new(move |r| sink.borrow_mut().push(r))));
        }
        daemon.answer_all();
        pump(&mut tracker, &rx);
        assert_eq!(tracker.pending(), 3);

        let (in_flight_outcomes, on_closed) = recorder();
        let in_flight = tracker.dispatch(&mut bus, chat(), on_closed);
        assert_eq!(tracker.pending(), 3);
        assert!(!tracker.is_idle());

        tracker.teardown();
        assert!(tracker.is_idle());
        assert_eq!(outcomes.borrow().len(), 3);
        assert!(outcomes
            .borrow()
            .iter()
            .all(|r| *r == Ok(CloseReason::SessionTeardown)));
        for handle in &handles {
            assert_eq!(handle.state(), State::Closed(CloseReason::SessionTeardown));
        }

        assert_eq!(in_flight.state(), State::Failed);
        assert!(matches!(
            in_flight_outcomes.borrow().as_slice(),
            [Err(NotifyError::DispatchFailed(_))]
        ));
    }

    #[test]
    fn closed_ids_are_not_accepted_again() {
        let (mut tracker, mut bus, daemon, rx) = setup();
        let (first_outcomes, first) = recorder();
        let (second_outcomes, second) = recorder();

        let a = tracker.dispatch(&mut bus, chat(), first);
        daemon.answer_with_id(9);
        pump(&mut tracker, &rx);
        daemon.close(9, 1);
        pump(&mut tracker, &rx);
        assert_eq!(*first_outcomes.borrow(), vec![Ok(CloseReason::Expired)]);

        let b = tracker.dispatch(&mut bus, chat(), second);
        daemon.answer_with_id(9);
        pump(&mut tracker, &rx);

        assert_eq!(a.server_id(), Some(9));
        assert_eq!(b.state(), State::Failed);
        assert_eq!(b.server_id(), None);
        assert!(matches!(
            second_outcomes.borrow().as_slice(),
            [Err(NotifyError::DispatchFailed(_))]
        ));
        assert!(tracker.is_idle());
    }

    #[test]
    fn actions_reach_the_handler() {
        let (mut tracker, mut bus, daemon, rx) = setup();
        let (_outcomes, on_closed) = recorder();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        tracker.set_action_handler(Box::new(move |handle, key| {
            sink.borrow_mut().push((handle.server_id(), key.to_string()));
        }));

        let handle = tracker.dispatch(&mut bus, chat(), on_closed);
        daemon.answer_all();
        pump(&mut tracker, &rx);
        let id = handle.server_id().unwrap();

        daemon.invoke(id, "default");
        daemon.invoke(id + 100, "default");
        pump(&mut tracker, &rx);

        assert_eq!(*seen.borrow(), vec![(Some(id), "default".to_string())]);
        assert_eq!(handle.state(), State::Pending);
    }

    #[test]
    fn unknown_reasons_are_undefined() {
        assert_eq!(CloseReason::from(1), CloseReason::Expired);
        assert_eq!(CloseReason::from(4), CloseReason::Undefined);
        assert_eq!(CloseReason::from(42), CloseReason::Undefined);
    }
}
