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
//
// SPDX-License-Identifier: GPL-3.0-only

//! D-Bus implementation of the backend boundary, proxying a configurable bus
//! name that implements `org.freedesktop.impl.portal.IdleMonitor`.

use std::collections::HashMap;
use std::error::Error;

use async_trait::async_trait;
use zbus::{
    proxy,
    zvariant::{ObjectPath, OwnedValue},
};

use super::IdleMonitorBackend;

/// The backend half of the idle-monitor portal protocol. The destination bus
/// name is supplied at construction; the object path is the shared portal
/// desktop path. zbus method calls carry no artificial timeout, which is
/// required here: an idle-time query may block on user activity.
#[proxy(
    default_path = "/org/freedesktop/portal/desktop",
    interface = "org.freedesktop.impl.portal.IdleMonitor"
)]
pub trait ImplIdleMonitor {
    /// Performs the privileged idle-time query on behalf of `app_id`,
    /// correlated to the portal request `handle`.
    fn get_idletime(&self, handle: &ObjectPath<'_>, app_id: &str) -> zbus::Result<u64>;

    /// Standing event stream: one subscription per backend connection, not
    /// per request.
    #[zbus(signal)]
    fn watch_fired(
        &self,
        session_id: String,
        state: HashMap<String, OwnedValue>,
    ) -> zbus::Result<()>;
}

pub struct DbusIdleMonitorBackend {
    proxy: ImplIdleMonitorProxy<'static>,
}

impl DbusIdleMonitorBackend {
    pub fn new(proxy: ImplIdleMonitorProxy<'static>) -> Self {
        Self { proxy }
    }
}

#[async_trait]
impl IdleMonitorBackend for DbusIdleMonitorBackend {
    async fn get_idletime(
        &self,
        handle: &ObjectPath<'_>,
        app_id: &str,
    ) -> Result<u64, Box<dyn Error + Send + Sync>> {
        Ok(self.proxy.get_idletime(handle, app_id).await?)
    }
}
