// fcs-gateway is a federated corpus search gateway.
// Copyright (C) 2024 fcs-gateway contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

pub mod defaults;

use std::net::SocketAddr;
use std::time::Duration;

/// Endpoint identity reported in explain responses.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ServerInfo {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiConfig {
    /// Address the gateway listens on.
    pub host: SocketAddr,

    pub server_info: ServerInfo,

    /// Directory holding one toml file per corpus resource.
    pub resources_dir: String,

    /// Worker endpoints jobs are fanned out to.
    pub workers: Vec<SocketAddr>,

    /// Page size used when the request does not carry `maximumRecords`.
    #[serde(default = "defaults::Api::maximum_records")]
    pub maximum_records: usize,

    #[serde(default = "defaults::Api::worker_connect_timeout_ms")]
    pub worker_connect_timeout_ms: u64,

    #[serde(default = "defaults::Api::worker_request_timeout_ms")]
    pub worker_request_timeout_ms: u64,
}

impl ApiConfig {
    pub fn worker_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_connect_timeout_ms)
    }

    pub fn worker_request_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_request_timeout_ms)
    }
}
