// Copyright (C) 2025  Rafael Carvalho <contact@rafaelrc.com>

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as published by
// the Free Software Foundation.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

// SPDX-License-Identifier: GPL-3.0-only

//! Daemon entry point: builds the session connection, the backend proxy and
//! the permission store, serves the idle-monitor portal and runs until
//! terminated.

use std::{error::Error, process::ExitCode, sync::Arc};

use futures::StreamExt;
use log::{error, info, warn};
use tokio::signal::unix::{signal, SignalKind};
use zbus::Connection;

use idle_monitor_portal::{
    backend::{
        dbus::{DbusIdleMonitorBackend, ImplIdleMonitorProxy},
        WatchFiredEvent,
    },
    permissions::{dbus::DbusPermissionStore, memory::MemoryPermissionStore, PermissionStore},
    portal::{self, HostAppId, IdleMonitor, PORTAL_BUS_NAME, PORTAL_PATH},
    relay,
    request::BusResponseSink,
    settings::Settings,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let settings = Settings::new()?;

    simplelog::TermLogger::init(
        settings.get_verbosity(),
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let connection = Connection::session().await?;

    // One backend client for the whole daemon, handed to the portal and the
    // relay by injection.
    let impl_proxy = ImplIdleMonitorProxy::builder(&connection)
        .destination(settings.get_backend().to_owned())?
        .build()
        .await?;
    let backend = Arc::new(DbusIdleMonitorBackend::new(impl_proxy.clone()));

    let store: Arc<dyn PermissionStore> = if settings.is_ephemeral_permissions() {
        warn!(target: "main", "Permission decisions are kept in memory and will not survive a restart");
        Arc::new(MemoryPermissionStore::new())
    } else {
        Arc::new(DbusPermissionStore::new(&connection).await?)
    };

    let sink = Arc::new(BusResponseSink::new(connection.clone()));
    let portal = IdleMonitor::new(store, backend, Arc::new(HostAppId), sink);
    let requests = portal.request_registry();

    connection.object_server().at(PORTAL_PATH, portal).await?;
    connection.request_name(PORTAL_BUS_NAME).await?;
    info!(target: "main", "Serving {PORTAL_BUS_NAME} at {PORTAL_PATH}");

    let watch_fired = impl_proxy.receive_watch_fired().await?;
    let events = watch_fired.filter_map(|signal| async move {
        match signal.args() {
            Ok(args) => Some(WatchFiredEvent {
                session_id: args.session_id,
                state: args.state,
            }),
            Err(error) => {
                warn!(target: "main", "Dropping malformed watch-fired event: {error}");
                None
            }
        }
    });

    tokio::spawn({
        let connection = connection.clone();
        async move {
            if let Err(error) = relay::run(Box::pin(events), connection).await {
                error!(target: "relay", "{error}");
            }
        }
    });

    tokio::spawn({
        let connection = connection.clone();
        async move {
            if let Err(error) = portal::track_callers(connection, requests).await {
                error!(target: "portal", "{error}");
            }
        }
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }

    info!(target: "main", "Terminating");

    Ok(())
}
