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

//! Core of the federated corpus-search gateway: resource registry, range
//! planning, the worker job queue client, the searchRetrieve dispatcher
//! with round-robin merging, and the SRU protocol surface.

pub mod api;
pub mod config;
pub mod corpus;
pub mod entrypoint;
pub mod plan;
pub mod queue;
pub mod results;
pub mod search;
pub mod sru;

pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;

#[cfg(test)]
pub(crate) fn free_socket_addr() -> std::net::SocketAddr {
    use std::net::{Ipv4Addr, TcpListener};

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();

    listener.local_addr().unwrap()
}
