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

//! The http api. All requests are handled using axum; the single SRU
//! endpoint dispatches on the `operation` parameter.

use std::sync::Arc;

use axum::extract;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;

use crate::config::ApiConfig;
use crate::corpus::ResourceRegistry;
use crate::queue::JobQueue;
use crate::search::FederatedSearch;
use crate::sru::response::{self, EchoedRequest};
use crate::sru::{DiagnosticCode, FcsError};

pub struct State<Q> {
    pub config: ApiConfig,
    pub registry: ResourceRegistry,
    pub queue: Q,
}

pub fn router<Q: JobQueue + 'static>(state: Arc<State<Q>>) -> Router {
    Router::new()
        .route("/", get(sru_endpoint::<Q>))
        .layer(CompressionLayer::new())
        .with_state(state)
}

async fn sru_endpoint<Q: JobQueue + 'static>(
    extract::State(state): extract::State<Arc<State<Q>>>,
    extract::Query(params): extract::Query<Vec<(String, String)>>,
) -> Response {
    let operation = params
        .iter()
        .find(|(key, _)| key == "operation")
        .map(|(_, value)| value.as_str())
        .unwrap_or("explain");

    match operation {
        "searchRetrieve" => search_retrieve(&state, &params).await,
        "explain" => explain(&state),
        other => {
            let error = FcsError::new(DiagnosticCode::UnsupportedOperation, other);
            let body = response::search_retrieve(&[], &EchoedRequest::default(), &[error]);
            xml_response(StatusCode::BAD_REQUEST, body)
        }
    }
}

async fn search_retrieve<Q: JobQueue>(state: &State<Q>, params: &[(String, String)]) -> Response {
    let search = FederatedSearch::new(
        &state.registry,
        &state.queue,
        state.config.maximum_records,
    );
    let outcome = search.search_retrieve(params).await;

    if let Some(diag) = outcome.diagnostics.first() {
        tracing::info!(
            status = %outcome.status,
            code = diag.code.number(),
            ident = %diag.ident,
            "searchRetrieve failed"
        );
    }

    let body = response::search_retrieve(&outcome.rows, &outcome.echoed, &outcome.diagnostics);
    xml_response(outcome.status, body)
}

fn explain<Q>(state: &State<Q>) -> Response {
    let body = response::explain(&state.config.server_info, &state.registry);
    xml_response(StatusCode::OK, body)
}

fn xml_response(status: StatusCode, body: crate::Result<String>) -> Response {
    match body {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("failed to render response: {err:?}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
