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

use std::sync::Arc;

use anyhow::bail;
use tokio::net::TcpListener;

use crate::api::{self, State};
use crate::config::ApiConfig;
use crate::corpus;
use crate::queue::TcpQueue;
use crate::Result;

pub async fn run(config: ApiConfig) -> Result<()> {
    let registry = corpus::load_resources(&config.resources_dir)?;
    if registry.is_empty() {
        bail!("no corpus resources found in '{}'", config.resources_dir);
    }
    if config.workers.is_empty() {
        bail!("no workers configured");
    }

    let queue = TcpQueue::new(
        config.workers.clone(),
        config.worker_connect_timeout(),
        config.worker_request_timeout(),
    );

    let addr = config.host;
    let state = Arc::new(State {
        config,
        registry,
        queue,
    });
    let app = api::router(state);

    tracing::info!("fcs gateway listening on {}", addr);
    axum::serve(TcpListener::bind(&addr).await?, app).await?;

    Ok(())
}
