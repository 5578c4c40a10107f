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

//! In-memory permission store for running without a permission store service
//! on the bus. Decisions are lost when the daemon exits.

use std::collections::HashMap;
use std::error::Error;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Permission, PermissionStore};

#[derive(Default)]
pub struct MemoryPermissionStore {
    permissions: Mutex<HashMap<(String, String, String), Permission>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn get_permission(
        &self,
        table: &str,
        id: &str,
        app_id: &str,
    ) -> Result<Permission, Box<dyn Error + Send + Sync>> {
        let key = (table.to_owned(), id.to_owned(), app_id.to_owned());
        Ok(self
            .permissions
            .lock()
            .await
            .get(&key)
            .copied()
            .unwrap_or(Permission::Unset))
    }

    async fn set_permission(
        &self,
        table: &str,
        id: &str,
        app_id: &str,
        permission: Permission,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let key = (table.to_owned(), id.to_owned(), app_id.to_owned());
        self.permissions.lock().await.insert(key, permission);
        Ok(())
    }
}
