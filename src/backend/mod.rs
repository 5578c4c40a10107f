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

//! Boundary to the trusted, desktop-environment-specific idle-monitor
//! backend service.

use std::collections::HashMap;
use std::error::Error;

use async_trait::async_trait;
use zbus::zvariant::{ObjectPath, OwnedValue};

pub mod dbus;

/// A backend-pushed idle/active transition, delivered on the standing event
/// stream alongside the originating session identifier.
#[derive(Debug)]
pub struct WatchFiredEvent {
    pub session_id: String,
    pub state: HashMap<String, OwnedValue>,
}

#[async_trait]
pub trait IdleMonitorBackend: Send + Sync {
    /// Queries the time since the last user interaction, in milliseconds.
    /// The call may legitimately wait for an unbounded amount of time, so
    /// callers must not invoke it from the acknowledgment path.
    async fn get_idletime(
        &self,
        handle: &ObjectPath<'_>,
        app_id: &str,
    ) -> Result<u64, Box<dyn Error + Send + Sync>>;
}
