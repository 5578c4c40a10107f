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

//! Permission store backed by the `org.freedesktop.impl.portal.PermissionStore`
//! service. Decisions are encoded on the wire as the string arrays `["yes"]`
//! and `["no"]`; a missing entry reads as unset.

use std::error::Error;

use async_trait::async_trait;
use zbus::{proxy, Connection};

use super::{Permission, PermissionStore};

/// Error name reported by the permission store for entries that were never
/// written.
const NOT_FOUND_ERROR: &str = "org.freedesktop.portal.Error.NotFound";

#[proxy(
    default_service = "org.freedesktop.impl.portal.PermissionStore",
    default_path = "/org/freedesktop/impl/portal/PermissionStore",
    interface = "org.freedesktop.impl.portal.PermissionStore"
)]
trait PermissionStoreImpl {
    fn get_permission(&self, table: &str, id: &str, app: &str) -> zbus::Result<Vec<String>>;

    fn set_permission(
        &self,
        table: &str,
        create: bool,
        id: &str,
        app: &str,
        permissions: Vec<String>,
    ) -> zbus::Result<()>;
}

pub struct DbusPermissionStore {
    proxy: PermissionStoreImplProxy<'static>,
}

impl DbusPermissionStore {
    pub async fn new(connection: &Connection) -> zbus::Result<Self> {
        let proxy = PermissionStoreImplProxy::new(connection).await?;
        Ok(Self { proxy })
    }
}

#[async_trait]
impl PermissionStore for DbusPermissionStore {
    async fn get_permission(
        &self,
        table: &str,
        id: &str,
        app_id: &str,
    ) -> Result<Permission, Box<dyn Error + Send + Sync>> {
        match self.proxy.get_permission(table, id, app_id).await {
            Ok(permissions) => Ok(permission_from_strings(&permissions)),
            Err(zbus::Error::MethodError(ref name, _, _)) if name.as_str() == NOT_FOUND_ERROR => {
                Ok(Permission::Unset)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn set_permission(
        &self,
        table: &str,
        id: &str,
        app_id: &str,
        permission: Permission,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        // create = true: the table and entry are made lazily on first write.
        self.proxy
            .set_permission(table, true, id, app_id, permission_to_strings(permission))
            .await?;
        Ok(())
    }
}

fn permission_from_strings(permissions: &[String]) -> Permission {
    match permissions.first().map(String::as_str) {
        Some("yes") => Permission::Yes,
        Some("no") => Permission::No,
        _ => Permission::Unset,
    }
}

fn permission_to_strings(permission: Permission) -> Vec<String> {
    match permission {
        Permission::Yes => vec![String::from("yes")],
        Permission::No => vec![String::from("no")],
        Permission::Unset => Vec::new(),
    }
}
