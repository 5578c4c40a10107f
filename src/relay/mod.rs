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

//! Relays backend watch events to bus listeners. One long-lived listener per
//! backend connection, independent of any request's lifetime.

use std::collections::HashMap;
use std::error::Error;

use futures::{Stream, StreamExt};
use log::{debug, warn};
use zbus::{zvariant::OwnedValue, Connection, SignalContext};

use crate::backend::WatchFiredEvent;
use crate::portal::{IdleMonitor, PORTAL_PATH};

/// Key under which the backend reports the firing watch in the event payload.
const WATCH_ID_KEY: &str = "session-state";

/// Rebroadcasts each backend event as a `WatchFired` signal on the portal
/// object. Watches cannot be registered through this portal yet, so there is
/// no owner table to filter against; events fan out to every listener on the
/// bus.
pub async fn run(
    mut events: impl Stream<Item = WatchFiredEvent> + Unpin,
    connection: Connection,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let ctxt = SignalContext::new(&connection, PORTAL_PATH)?;

    while let Some(event) = events.next().await {
        let watch_id = extract_watch_id(&event.state).unwrap_or(0);
        debug!(target: "relay", "Received watch-fired {}: watch-id: {watch_id}", event.session_id);
        IdleMonitor::watch_fired(&ctxt, watch_id).await?;
    }

    warn!(target: "relay", "Backend event stream closed");
    Ok(())
}

pub fn extract_watch_id(state: &HashMap<String, OwnedValue>) -> Option<u32> {
    state
        .get(WATCH_ID_KEY)
        .and_then(|value| value.downcast_ref::<u32>().ok())
}
