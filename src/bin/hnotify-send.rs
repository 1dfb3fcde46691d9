/*
* hnotify-send
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

use anyhow::{bail, Result};
use calloop::timer::{TimeoutAction, Timer};
use clap::Parser;
use hnotify::args::Args;
use hnotify::config::Config;
use hnotify::{CloseReason, NotifyError, Session, State};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

fn main() -> Result<()> {
    setup_logging();

    let args = Args::parse();
    let config = match Config::load(args.config_path.clone()) {
        Ok(c) => c,
        Err(e) => bail!("Failed to load config: {:#}", e),
    };

    let mut session = Session::open(&config)?;

    if args.info {
        match session.server_information() {
            Ok(info) => println!("Server: {}", info),
            Err(e) => warn!("Failed to query server information: {:#}", e),
        }
        match session.capabilities() {
            Ok(caps) => println!("Capabilities: {}", caps.join(", ")),
            Err(e) => warn!("Failed to query capabilities: {:#}", e),
        }
    }

    let notification = args.notification(&config)?;
    info!("Showing '{}' ({})", notification.summary(), notification.category());

    session.on_action(|handle, key| {
        println!("Action '{}' invoked on {}", key, *handle.notification());
    });

    let outcome: Rc<RefCell<Option<Result<CloseReason, NotifyError>>>> = Rc::new(RefCell::new(None));
    let sink = outcome.clone();
    let signal = session.loop_signal();
    let handle = session.dispatch(notification, move |result| {
        *sink.borrow_mut() = Some(result);
        signal.stop();
    });

    if let Some(ms) = args.withdraw_after {
        let handle = handle.clone();
        let inserted = session.loop_handle().insert_source(
            Timer::from_duration(Duration::from_millis(ms)),
            move |_, _, state| {
                match state.withdraw(&handle) {
                    Ok(()) => debug!("Withdrew notification after {}ms", ms),
                    Err(e) => warn!("{}", e),
                }
                TimeoutAction::Drop
            },
        );
        if let Err(e) = inserted {
            bail!("Failed to schedule withdraw: {}", e.error);
        }
    }

    if args.no_wait {
        while handle.state() == State::Dispatching {
            session.dispatch_pending(Some(config.tick()))?;
        }
        if let Some(id) = handle.server_id() {
            println!("{}", id);
        }
    } else if !session.is_idle() {
        session.run()?;
    }

    // With --no-wait the notification may still be pending, closing
    // resolves it locally and leaves it on screen.
    let result = outcome.borrow_mut().take();
    session.close();

    match result {
        Some(Ok(reason)) => {
            println!("Closed: {}", reason);
            Ok(())
        }
        Some(Err(e)) => Err(e.into()),
        None => Ok(()),
    }
}

fn setup_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        #[cfg(debug_assertions)]
        ::std::env::set_var("RUST_LOG", "trace");
        #[cfg(not(debug_assertions))]
        ::std::env::set_var("RUST_LOG", "info");
    }

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());

            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%F %T%.3f"),
                style.value(record.level()),
                record.args()
            )
        })
        .init();
}
