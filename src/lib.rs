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

//! D-Bus portal daemon mediating application access to desktop idle time.
//!
//! Callers invoke `GetIdletime` on `org.freedesktop.portal.IdleMonitor` and
//! are acknowledged immediately with a request handle; the query is gated on
//! a per-application permission decision, forwarded to a trusted
//! desktop-environment backend on a worker task, and answered later with a
//! `Response` signal on the handle. Backend idle/active watch events are
//! relayed back onto the bus as `WatchFired` signals.

pub mod backend;
pub mod permissions;
pub mod portal;
pub mod relay;
pub mod request;
pub mod settings;
