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

//! Per-application permission gating for the idle-monitor capability.

use std::error::Error;

use async_trait::async_trait;
use log::{debug, warn};

pub mod dbus;
pub mod memory;

/// Permission-store table holding idle-monitor decisions.
pub const PERMISSION_TABLE: &str = "idle-monitor";

/// Capability id within [PERMISSION_TABLE].
pub const PERMISSION_ID: &str = "idle-monitor";

/// A stored per-application access decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Unset,
    Yes,
    No,
}

/// Storage boundary for permission decisions. The persistence mechanism and
/// format belong to the implementation behind this trait.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Look up the decision stored for `app_id` under `(table, id)`.
    async fn get_permission(
        &self,
        table: &str,
        id: &str,
        app_id: &str,
    ) -> Result<Permission, Box<dyn Error + Send + Sync>>;

    async fn set_permission(
        &self,
        table: &str,
        id: &str,
        app_id: &str,
        permission: Permission,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Decides whether `app_id` may query idle time. A missing decision is
/// granted and persisted as a side effect; there is no interactive prompt.
/// A store read failure degrades to the missing-decision path rather than
/// blocking the call.
pub async fn is_idle_monitor_allowed(store: &dyn PermissionStore, app_id: &str) -> bool {
    let permission = match store
        .get_permission(PERMISSION_TABLE, PERMISSION_ID, app_id)
        .await
    {
        Ok(permission) => permission,
        Err(error) => {
            warn!(target: "permissions", "Failed to look up idle-monitor permission for '{app_id}': {error}");
            Permission::Unset
        }
    };

    match permission {
        Permission::No => false,
        Permission::Yes => true,
        Permission::Unset => {
            debug!(target: "permissions", "No idle-monitor permissions stored for '{app_id}': allowing");
            if let Err(error) = store
                .set_permission(PERMISSION_TABLE, PERMISSION_ID, app_id, Permission::Yes)
                .await
            {
                warn!(target: "permissions", "Failed to store idle-monitor permission for '{app_id}': {error}");
            }
            true
        }
    }
}
