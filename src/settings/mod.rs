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

//! Module responsible with the daemon's configuration

use std::{error::Error, path::PathBuf};

use clap::Parser;
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use log::LevelFilter;
use serde::Deserialize;

mod cli;
use cli::Args;

/// Struct that stores the settings that affect the daemon behaviour
#[derive(Deserialize)]
pub struct Settings {
    #[serde(default = "default_verbosity")]
    verbosity: LevelFilter,

    #[serde(default = "default_backend")]
    backend: String,

    #[serde(default)]
    ephemeral_permissions: bool,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let cli = Args::parse();

        let config_path = match cli.config {
            Some(ref p) => PathBuf::from(p),
            None => xdg::BaseDirectories::with_prefix(env!("CARGO_PKG_NAME"))?
                .place_config_file("config.toml")?,
        };

        let settings = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Serialized::defaults(cli))
            .extract()?;

        Ok(settings)
    }

    /// Returns the current log verbosity
    pub fn get_verbosity(&self) -> LevelFilter {
        self.verbosity
    }

    /// Bus name of the idle-monitor backend implementation
    pub fn get_backend(&self) -> &str {
        &self.backend
    }

    /// Whether permission decisions are kept in memory instead of the
    /// permission store service
    pub fn is_ephemeral_permissions(&self) -> bool {
        self.ephemeral_permissions
    }
}

/// Default log verbosity, set to [LevelFilter::Warn]
fn default_verbosity() -> LevelFilter {
    LevelFilter::Warn
}

/// Default backend bus name, the GNOME portal backend
fn default_backend() -> String {
    String::from("org.freedesktop.impl.portal.desktop.gnome")
}
