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

//! The `org.freedesktop.portal.IdleMonitor` front-end. `GetIdletime` is
//! acknowledged synchronously with a request handle; the permission check and
//! the backend call happen on a worker task that later emits the response on
//! the request object, unless the request went stale in the meantime. The
//! interface also carries the watch-registration operations of the capability
//! family, which answer `NotSupported` until a backend protocol for watch
//! ownership exists.

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, error, warn};
use tokio::sync::Mutex;
use zbus::{
    fdo, interface,
    message::Header,
    zvariant::{OwnedObjectPath, OwnedValue, Value},
    Connection, ObjectServer, SignalContext,
};

use crate::backend::IdleMonitorBackend;
use crate::permissions::{self, PermissionStore};
use crate::request::{Request, ResponseSink, RESPONSE_FAILED, RESPONSE_SUCCESS};

pub const PORTAL_BUS_NAME: &str = "org.freedesktop.portal.Desktop";
pub const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";

/// Interface version advertised to callers.
const INTERFACE_VERSION: u32 = 3;

/// Key under which the response carries the idle time, in milliseconds.
const IDLETIME_RESULT_KEY: &str = "idletime";

/// Live requests per owning bus peer, so they can be cancelled when the peer
/// goes away.
pub type RequestRegistry = Arc<Mutex<HashMap<String, Vec<Request>>>>;

/// Resolution of a bus peer to an application identity. Sandbox introspection
/// is somebody else's job; this daemon only consumes the result.
#[async_trait]
pub trait AppIdResolver: Send + Sync {
    async fn resolve(&self, sender: &str) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Resolver for deployments without sandbox introspection: every caller is
/// treated as the host and shares one permission entry, the way portals treat
/// unsandboxed applications.
pub struct HostAppId;

#[async_trait]
impl AppIdResolver for HostAppId {
    async fn resolve(&self, _sender: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(String::new())
    }
}

pub struct IdleMonitor {
    store: Arc<dyn PermissionStore>,
    backend: Arc<dyn IdleMonitorBackend>,
    resolver: Arc<dyn AppIdResolver>,
    sink: Arc<dyn ResponseSink>,
    requests: RequestRegistry,
}

impl IdleMonitor {
    pub fn new(
        store: Arc<dyn PermissionStore>,
        backend: Arc<dyn IdleMonitorBackend>,
        resolver: Arc<dyn AppIdResolver>,
        sink: Arc<dyn ResponseSink>,
    ) -> Self {
        Self {
            store,
            backend,
            resolver,
            sink,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn request_registry(&self) -> RequestRegistry {
        self.requests.clone()
    }

    /// Records `request` under its owning peer, pruning entries that already
    /// reached a terminal state.
    async fn register(&self, sender: String, request: Request) {
        let mut requests = self.requests.lock().await;
        let entries = requests.entry(sender).or_default();

        let mut kept = Vec::with_capacity(entries.len() + 1);
        for entry in entries.drain(..) {
            if entry.is_exported().await {
                kept.push(entry);
            }
        }
        kept.push(request);
        *entries = kept;
    }
}

#[interface(name = "org.freedesktop.portal.IdleMonitor")]
impl IdleMonitor {
    #[zbus(property, name = "version")]
    fn version(&self) -> u32 {
        INTERFACE_VERSION
    }

    /// Accepts an idle-time query. The reply carries only the request handle;
    /// the result arrives later as a `Response` signal on that handle, or
    /// never, when the request is denied or closed first.
    async fn get_idletime(
        &self,
        #[zbus(header)] header: Header<'_>,
        #[zbus(object_server)] server: &ObjectServer,
        _window: String,
        _flags: u32,
        options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<OwnedObjectPath> {
        let sender = header
            .sender()
            .ok_or_else(|| fdo::Error::Failed(String::from("Request has no sender")))?
            .to_string();

        let app_id = self.resolver.resolve(&sender).await.map_err(|error| {
            fdo::Error::Failed(format!("Failed to resolve application id of {sender}: {error}"))
        })?;

        let token = options
            .get("handle_token")
            .and_then(|value| value.downcast_ref::<&str>().ok());
        let request = Request::new(&sender, token, app_id)
            .map_err(|error| fdo::Error::Failed(format!("Invalid request handle: {error}")))?;

        if !server.at(request.handle().clone(), request.clone()).await? {
            return Err(fdo::Error::Failed(format!(
                "Request handle {} is already in use",
                request.handle()
            )));
        }
        self.register(sender, request.clone()).await;

        debug!(target: "portal", "Accepted GetIdletime from '{}' as {}", request.app_id(), request.handle());

        tokio::spawn(dispatch_get_idletime(
            self.store.clone(),
            self.backend.clone(),
            self.sink.clone(),
            request.clone(),
        ));

        Ok(request.handle().clone().into())
    }

    async fn add_idle_watch(
        &self,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<OwnedObjectPath> {
        Err(fdo::Error::NotSupported(String::from(
            "AddIdleWatch is not implemented",
        )))
    }

    async fn add_user_active_watch(
        &self,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<OwnedObjectPath> {
        Err(fdo::Error::NotSupported(String::from(
            "AddUserActiveWatch is not implemented",
        )))
    }

    async fn remove_watch(&self, _watch_id: u32) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported(String::from(
            "RemoveWatch is not implemented",
        )))
    }

    #[zbus(signal)]
    pub async fn watch_fired(ctxt: &SignalContext<'_>, watch_id: u32) -> zbus::Result<()>;
}

/// Worker half of a `GetIdletime` call: checks the permission gate, then
/// queries the backend and drives the terminal transition. Runs off the
/// acknowledgment path and may take an unbounded amount of time.
async fn dispatch_get_idletime(
    store: Arc<dyn PermissionStore>,
    backend: Arc<dyn IdleMonitorBackend>,
    sink: Arc<dyn ResponseSink>,
    request: Request,
) {
    let app_id = request.app_id().to_owned();

    if !permissions::is_idle_monitor_allowed(store.as_ref(), &app_id).await {
        // Denied requests terminate without a response; the request object
        // stays up until the caller closes it or leaves the bus.
        debug!(target: "portal", "Idle-monitor access denied for '{app_id}', dropping {}", request.handle());
        return;
    }

    debug!(target: "portal", "Calling idle-monitor backend for '{app_id}'");

    let (response, results) = match backend.get_idletime(request.handle(), &app_id).await {
        Ok(idletime) => {
            let mut results = HashMap::new();
            results.insert(String::from(IDLETIME_RESULT_KEY), Value::U64(idletime));
            (RESPONSE_SUCCESS, results)
        }
        Err(error) => {
            warn!(target: "portal", "Idle-monitor backend call failed for '{app_id}': {error}");
            (RESPONSE_FAILED, HashMap::new())
        }
    };

    if let Err(error) = request.complete(sink.as_ref(), response, results).await {
        error!(target: "portal", "Failed to emit response for {}: {error}", request.handle());
    }
}

/// Cancels and unexports every live request owned by a bus peer that left the
/// bus. Runs for the lifetime of the connection.
pub async fn track_callers(
    connection: Connection,
    requests: RequestRegistry,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let dbus = fdo::DBusProxy::new(&connection).await?;
    let mut name_owner_changed = dbus.receive_name_owner_changed().await?;

    while let Some(signal) = name_owner_changed.next().await {
        let args = signal.args()?;
        if args.new_owner().is_none() {
            let sender = args.name().to_string();
            let dropped = requests.lock().await.remove(&sender);
            for request in dropped.into_iter().flatten() {
                debug!(target: "portal", "Cancelling {} of vanished caller {sender}", request.handle());
                request.cancel().await;
                let _ = connection
                    .object_server()
                    .remove::<Request, _>(request.handle().clone())
                    .await;
            }
        }
    }

    Ok(())
}
