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

//! End-to-end: a real gateway on a real socket, backed by a stub worker
//! speaking the job protocol.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use fcs_core::api::{self, State};
use fcs_core::config::ApiConfig;
use fcs_core::corpus::{CorpusResource, Layer, PosAttr, ResourceRegistry, StructureMapping};
use fcs_core::queue::job::{ConcLine, ConcReply, ConcToken, Job};
use fcs_core::queue::{Server, TcpQueue};

fn resource(name: &str) -> CorpusResource {
    CorpusResource {
        name: name.to_string(),
        registry_path: format!("/corpora/{name}"),
        pos_attrs: vec![PosAttr {
            id: 1,
            name: "word".to_string(),
            layer: Layer::Text,
            is_layer_default: true,
        }],
        structure_mapping: StructureMapping::default(),
        uri: format!("http://hdl.example.org/{name}"),
    }
}

fn config(workers: Vec<SocketAddr>) -> ApiConfig {
    toml::from_str::<ApiConfig>(&format!(
        r#"
        host = "127.0.0.1:0"
        resources_dir = "unused"
        workers = {workers:?}
        maximum_records = 10

        [server_info]
        host = "fcs.example.org"
        port = 443
        database = "fcs"
        title = "Test endpoint"
        "#,
        workers = workers
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
    ))
    .unwrap()
}

/// Worker stub: replies to every job with two rows naming the corpus the
/// job was for.
async fn spawn_worker() -> SocketAddr {
    let server: Server<Job, ConcReply> = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let mut conn = match server.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            tokio::spawn(async move {
                if let Ok(job) = conn.request().await {
                    let corpus = job
                        .args
                        .corpus_path
                        .rsplit('/')
                        .next()
                        .unwrap_or_default()
                        .to_string();
                    let rows = (0..2)
                        .map(|i| ConcLine {
                            text: vec![ConcToken {
                                word: format!("{corpus}-{i}"),
                                strong: true,
                            }],
                        })
                        .collect();
                    conn.respond(&ConcReply::rows(rows)).await.ok();
                }
            });
        }
    });
    addr
}

async fn spawn_gateway(worker: SocketAddr) -> SocketAddr {
    let config = config(vec![worker]);
    let queue = TcpQueue::new(
        vec![worker],
        Duration::from_secs(5),
        Duration::from_secs(5),
    );
    let registry = ResourceRegistry::new(vec![resource("alpha"), resource("beta")]);
    let state = Arc::new(State {
        config,
        registry,
        queue,
    });
    let app = api::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn http_get(addr: SocketAddr, path_and_query: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {path_and_query} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let status = raw
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    let body = raw
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

#[tokio::test]
async fn search_retrieve_round_robins_across_corpora() {
    let worker = spawn_worker().await;
    let gateway = spawn_gateway(worker).await;

    let (status, body) = http_get(
        gateway,
        "/?operation=searchRetrieve&query=cat&maximumRecords=4",
    )
    .await;

    assert_eq!(status, 200);
    assert!(body.contains("<sru:numberOfRecords>4</sru:numberOfRecords>"));

    // merge order: alpha, beta, alpha, beta
    let hits: Vec<&str> = body
        .split("<hits:Hit>")
        .skip(1)
        .filter_map(|chunk| chunk.split("</hits:Hit>").next())
        .collect();
    assert_eq!(hits, vec!["alpha-0", "beta-0", "alpha-1", "beta-1"]);
}

#[tokio::test]
async fn explain_is_the_default_operation() {
    let worker = spawn_worker().await;
    let gateway = spawn_gateway(worker).await;

    let (status, body) = http_get(gateway, "/").await;

    assert_eq!(status, 200);
    assert!(body.contains("<sru:explainResponse"));
    assert!(body.contains(">alpha</zr:title>"));
}

#[tokio::test]
async fn unknown_parameter_is_diagnosed() {
    let worker = spawn_worker().await;
    let gateway = spawn_gateway(worker).await;

    let (status, body) = http_get(
        gateway,
        "/?operation=searchRetrieve&query=cat&bogus=1",
    )
    .await;

    assert_eq!(status, 400);
    assert!(body.contains("<diag:uri>info:srw/diagnostic/1/8</diag:uri>"));
    assert!(body.contains("<diag:details>bogus</diag:details>"));
}

#[tokio::test]
async fn unknown_operation_is_diagnosed() {
    let worker = spawn_worker().await;
    let gateway = spawn_gateway(worker).await;

    let (status, body) = http_get(gateway, "/?operation=scan").await;

    assert_eq!(status, 400);
    assert!(body.contains("<diag:uri>info:srw/diagnostic/1/4</diag:uri>"));
}
