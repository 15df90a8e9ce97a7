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

//! The searchRetrieve pipeline: parameter validation, per-corpus query
//! translation, fan-out over the job queue, ordered reply collection with
//! out-of-range quarantine, and the round-robin merge.

use axum::http::StatusCode;

use crate::corpus::{CorpusResource, ResourceRegistry};
use crate::plan;
use crate::queue::job::{ConcArgs, Job};
use crate::queue::JobQueue;
use crate::results::{RoundRobinLines, RscError};
use crate::sru::params::SearchRetrArg;
use crate::sru::response::{EchoedRequest, RowToken, SearchRow};
use crate::sru::{DiagnosticCode, FcsError};

/// What a searchRetrieve request produced: rows on success, diagnostics
/// otherwise (or both for partial failures), plus the HTTP status the SRU
/// layer maps it to.
#[derive(Debug)]
pub struct SearchOutcome {
    pub status: StatusCode,
    pub rows: Vec<SearchRow>,
    pub echoed: EchoedRequest,
    pub diagnostics: Vec<FcsError>,
}

impl SearchOutcome {
    fn failed(status: StatusCode, echoed: EchoedRequest, error: FcsError) -> Self {
        SearchOutcome {
            status,
            rows: Vec::new(),
            echoed,
            diagnostics: vec![error],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryDialect {
    Basic,
    Advanced,
}

struct ValidatedRequest {
    query: String,
    dialect: QueryDialect,
    /// 1-based, straight from the wire.
    start_record: usize,
    maximum_records: usize,
    corpora: Vec<String>,
}

pub struct FederatedSearch<'a, Q> {
    registry: &'a ResourceRegistry,
    queue: &'a Q,
    default_maximum_records: usize,
}

impl<'a, Q: JobQueue> FederatedSearch<'a, Q> {
    pub fn new(registry: &'a ResourceRegistry, queue: &'a Q, default_maximum_records: usize) -> Self {
        FederatedSearch {
            registry,
            queue,
            default_maximum_records,
        }
    }

    /// Runs a whole searchRetrieve request from raw query parameters to
    /// merged rows.
    pub async fn search_retrieve(&self, params: &[(String, String)]) -> SearchOutcome {
        let mut echoed = EchoedRequest {
            start_record: 1,
            ..Default::default()
        };

        let req = match self.validate(params, &mut echoed) {
            Ok(req) => req,
            Err((status, error)) => return SearchOutcome::failed(status, echoed, error),
        };

        let retrieve_attrs = match self.registry.common_pos_attr_names(&req.corpora) {
            Ok(attrs) => attrs,
            Err(err) => {
                return SearchOutcome::failed(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    echoed,
                    FcsError::new(DiagnosticCode::GeneralSystemError, err.to_string()),
                )
            }
        };

        let ranges = plan::partial_ranges(&req.corpora, req.start_record - 1, req.maximum_records);

        // publish every job before awaiting any reply, in corpus-list order
        let mut waits = Vec::with_capacity(ranges.len());
        for range in &ranges {
            let resource = match self.registry.get(&range.rsc) {
                Ok(resource) => resource,
                Err(err) => {
                    return SearchOutcome::failed(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        echoed,
                        FcsError::new(DiagnosticCode::GeneralSystemError, err.to_string()),
                    )
                }
            };

            let cql = match translate(resource, &req.query, req.dialect) {
                Ok(cql) => cql,
                Err(error) => {
                    return SearchOutcome::failed(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        echoed,
                        error,
                    )
                }
            };
            tracing::debug!(corpus = %range.rsc, %cql, "translated query");

            let job = Job::conc_example(ConcArgs {
                corpus_path: resource.registry_path.clone(),
                query: cql,
                attrs: retrieve_attrs.clone(),
                start_line: range.from,
                max_items: range.max_items,
            });
            match self.queue.publish(job).await {
                Ok(wait) => waits.push(wait),
                Err(err) => {
                    return SearchOutcome::failed(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        echoed,
                        FcsError::new(DiagnosticCode::GeneralSystemError, err.to_string()),
                    )
                }
            }
        }

        // collect in index order so classification and merge seeding are
        // deterministic regardless of completion order
        let mut from_resource = RoundRobinLines::new(req.maximum_records, &req.corpora);
        for (i, wait) in waits.into_iter().enumerate() {
            let reply = match wait.recv().await {
                Ok(reply) => reply,
                Err(err) => {
                    return SearchOutcome::failed(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        echoed,
                        FcsError::new(DiagnosticCode::GeneralSystemError, err.to_string()),
                    )
                }
            };

            if reply.is_out_of_range() {
                from_resource.set_error_at(i, RscError::OutOfRange);
            } else if let Some(err) = reply.err() {
                from_resource.set_error_at(i, RscError::Fatal(err.to_string()));
            } else {
                from_resource.set_lines(&req.corpora[i], reply.rows);
            }
        }

        if from_resource.all_out_of_range() {
            let ident = from_resource
                .first_error()
                .map(|e| e.message().to_string())
                .unwrap_or_default();
            return SearchOutcome::failed(
                StatusCode::UNPROCESSABLE_ENTITY,
                echoed,
                FcsError::new(DiagnosticCode::FirstRecordPosOutOfRange, ident),
            );
        }
        if from_resource.has_fatal_error() {
            let ident = from_resource
                .first_error()
                .map(|e| e.message().to_string())
                .unwrap_or_default();
            return SearchOutcome::failed(
                StatusCode::INTERNAL_SERVER_ERROR,
                echoed,
                FcsError::new(DiagnosticCode::QueryCannotProcess, ident),
            );
        }

        let mut rows = Vec::with_capacity(req.maximum_records);
        while let Some((rsc_name, line)) = from_resource.next_line() {
            let ref_uri = match self.registry.get(rsc_name) {
                Ok(resource) => resource.uri.clone(),
                Err(err) => {
                    return SearchOutcome::failed(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        echoed,
                        FcsError::new(DiagnosticCode::GeneralSystemError, err.to_string()),
                    )
                }
            };
            rows.push(SearchRow {
                position: rows.len() + 1,
                pid: rsc_name.to_string(),
                ref_uri,
                tokens: line
                    .text
                    .iter()
                    .map(|t| RowToken {
                        text: t.word.clone(),
                        hit: t.strong,
                    })
                    .collect(),
            });
        }

        SearchOutcome {
            status: StatusCode::OK,
            rows,
            echoed,
            diagnostics: Vec::new(),
        }
    }

    fn validate(
        &self,
        params: &[(String, String)],
        echoed: &mut EchoedRequest,
    ) -> Result<ValidatedRequest, (StatusCode, FcsError)> {
        for (key, _) in params {
            if SearchRetrArg::from_key(key).is_none() {
                return Err((
                    StatusCode::BAD_REQUEST,
                    FcsError::new(DiagnosticCode::UnsupportedParameter, key.clone()),
                ));
            }
        }

        let get = |arg: SearchRetrArg| {
            params
                .iter()
                .find(|(key, _)| key == arg.as_str())
                .map(|(_, value)| value.as_str())
        };

        let query = match get(SearchRetrArg::Query) {
            Some(query) if !query.is_empty() => query.to_string(),
            _ => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    FcsError::new(
                        DiagnosticCode::MandatoryParameterNotSupplied,
                        SearchRetrArg::Query.as_str(),
                    ),
                ))
            }
        };
        echoed.query = query.clone();

        let dialect = match get(SearchRetrArg::QueryType) {
            Some("fcs") => QueryDialect::Advanced,
            _ => QueryDialect::Basic,
        };

        let start_record = match get(SearchRetrArg::StartRecord) {
            None => 1,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err((
                        StatusCode::UNPROCESSABLE_ENTITY,
                        FcsError::new(
                            DiagnosticCode::UnsupportedParameterValue,
                            SearchRetrArg::StartRecord.as_str(),
                        ),
                    ))
                }
            },
        };
        echoed.start_record = start_record;

        let maximum_records = match get(SearchRetrArg::MaximumRecords) {
            None => self.default_maximum_records,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err((
                        StatusCode::UNPROCESSABLE_ENTITY,
                        FcsError::new(
                            DiagnosticCode::UnsupportedParameterValue,
                            SearchRetrArg::MaximumRecords.as_str(),
                        ),
                    ))
                }
            },
        };

        let corpora: Vec<String> = match get(SearchRetrArg::FcsContext) {
            None => self.registry.list_all(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        };
        if corpora.is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                FcsError::with_message(
                    DiagnosticCode::UnsupportedParameterValue,
                    SearchRetrArg::FcsContext.as_str(),
                    "Empty context",
                ),
            ));
        }
        for name in &corpora {
            if self.registry.get(name).is_err() {
                return Err((
                    StatusCode::BAD_REQUEST,
                    FcsError::with_message(
                        DiagnosticCode::UnsupportedParameterValue,
                        SearchRetrArg::FcsContext.as_str(),
                        format!("Unknown context {name}"),
                    ),
                ));
            }
        }

        Ok(ValidatedRequest {
            query,
            dialect,
            start_record,
            maximum_records,
            corpora,
        })
    }
}

/// Translates the FCS query for one corpus. Parse errors are query-syntax
/// failures; accumulated semantic errors make the query unprocessable.
fn translate(
    resource: &CorpusResource,
    query: &str,
    dialect: QueryDialect,
) -> Result<String, FcsError> {
    let parsed = match dialect {
        QueryDialect::Basic => {
            fcsql::parse_basic(query, &resource.pos_attrs, &resource.structure_mapping)
        }
        QueryDialect::Advanced => {
            fcsql::parse_advanced(query, &resource.pos_attrs, &resource.structure_mapping)
        }
    };
    let ast = parsed.map_err(|err| {
        FcsError::with_message(DiagnosticCode::QuerySyntaxError, query, err.to_string())
    })?;

    let generated = ast.generate();
    if let Some(first) = generated.errors.first() {
        return Err(FcsError::with_message(
            DiagnosticCode::QueryCannotProcess,
            first.ident(),
            first.to_string(),
        ));
    }
    Ok(generated.cql)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::corpus::tests::test_registry;
    use crate::queue::job::{ConcLine, ConcReply, ConcToken, ERR_ROWS_RANGE_OUT_OF_CONC};
    use crate::queue::{self, ReplyHandle};

    /// Scripted queue: replies keyed by corpus registry path, published
    /// jobs recorded for inspection.
    struct ScriptedQueue {
        replies: HashMap<String, ConcReply>,
        published: Mutex<Vec<Job>>,
    }

    impl ScriptedQueue {
        fn new(replies: &[(&str, ConcReply)]) -> Self {
            ScriptedQueue {
                replies: replies
                    .iter()
                    .map(|(name, reply)| {
                        (format!("/corpora/registry/{name}"), reply.clone())
                    })
                    .collect(),
                published: Mutex::new(Vec::new()),
            }
        }
    }

    impl JobQueue for ScriptedQueue {
        async fn publish(&self, job: Job) -> queue::Result<ReplyHandle> {
            let reply = self
                .replies
                .get(&job.args.corpus_path)
                .cloned()
                .unwrap_or_default();
            self.published.lock().unwrap().push(job);
            Ok(ReplyHandle::ready(Ok(reply)))
        }
    }

    fn rows(words: &[&str]) -> ConcReply {
        ConcReply::rows(
            words
                .iter()
                .map(|w| ConcLine {
                    text: vec![
                        ConcToken {
                            word: w.to_string(),
                            strong: true,
                        },
                        ConcToken {
                            word: "tail".to_string(),
                            strong: false,
                        },
                    ],
                })
                .collect(),
        )
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn words(outcome: &SearchOutcome) -> Vec<String> {
        outcome
            .rows
            .iter()
            .map(|r| r.tokens[0].text.clone())
            .collect()
    }

    #[tokio::test]
    async fn single_corpus_basic_query() {
        let registry = test_registry(&["c1"]);
        let queue = ScriptedQueue::new(&[("c1", rows(&["cat", "cat", "cat"]))]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search
            .search_retrieve(&params(&[
                ("query", "cat"),
                ("startRecord", "1"),
                ("maximumRecords", "3"),
            ]))
            .await;

        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(outcome.rows.len(), 3);
        for (i, row) in outcome.rows.iter().enumerate() {
            assert_eq!(row.position, i + 1);
            assert_eq!(row.pid, "c1");
            assert_eq!(row.ref_uri, "http://hdl.example.org/c1");
            assert!(row.tokens[0].hit);
            assert!(!row.tokens[1].hit);
        }

        let published = queue.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].func, "concExample");
        assert_eq!(published[0].args.query, r#"[word="cat"]"#);
        assert_eq!(published[0].args.start_line, 0);
        assert_eq!(published[0].args.max_items, 3);
        assert_eq!(published[0].args.attrs, vec!["word", "lemma"]);
    }

    #[tokio::test]
    async fn two_corpora_interleave() {
        let registry = test_registry(&["a", "b"]);
        let queue = ScriptedQueue::new(&[("a", rows(&["a1", "a2"])), ("b", rows(&["b1", "b2"]))]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search
            .search_retrieve(&params(&[("query", "x"), ("maximumRecords", "4")]))
            .await;

        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(words(&outcome), vec!["a1", "b1", "a2", "b2"]);
        assert_eq!(
            outcome.rows.iter().map(|r| r.pid.clone()).collect::<Vec<_>>(),
            vec!["a", "b", "a", "b"]
        );
    }

    #[tokio::test]
    async fn exhausted_corpus_mid_page() {
        let registry = test_registry(&["a", "b"]);
        let queue =
            ScriptedQueue::new(&[("a", rows(&["a1"])), ("b", rows(&["b1", "b2", "b3"]))]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search
            .search_retrieve(&params(&[("query", "x"), ("maximumRecords", "4")]))
            .await;

        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(words(&outcome), vec!["a1", "b1", "b2", "b3"]);
    }

    #[tokio::test]
    async fn all_corpora_out_of_range() {
        let registry = test_registry(&["a", "b"]);
        let oor = ConcReply::error(ERR_ROWS_RANGE_OUT_OF_CONC);
        let queue = ScriptedQueue::new(&[("a", oor.clone()), ("b", oor)]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search
            .search_retrieve(&params(&[("query", "x"), ("startRecord", "1000")]))
            .await;

        assert_eq!(outcome.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(outcome.rows.is_empty());
        assert_eq!(
            outcome.diagnostics[0].code,
            DiagnosticCode::FirstRecordPosOutOfRange
        );
    }

    #[tokio::test]
    async fn single_out_of_range_corpus_is_quarantined() {
        let registry = test_registry(&["a", "b"]);
        let queue = ScriptedQueue::new(&[
            ("a", ConcReply::error(ERR_ROWS_RANGE_OUT_OF_CONC)),
            ("b", rows(&["b1", "b2"])),
        ]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search
            .search_retrieve(&params(&[("query", "x"), ("maximumRecords", "4")]))
            .await;

        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(words(&outcome), vec!["b1", "b2"]);
    }

    #[tokio::test]
    async fn fatal_worker_error_sinks_request() {
        let registry = test_registry(&["a", "b"]);
        let queue = ScriptedQueue::new(&[
            ("a", rows(&["a1"])),
            ("b", ConcReply::error("corpus manager crashed")),
        ]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search.search_retrieve(&params(&[("query", "x")])).await;

        assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(outcome.diagnostics[0].code, DiagnosticCode::QueryCannotProcess);
        assert_eq!(outcome.diagnostics[0].ident, "corpus manager crashed");
    }

    #[tokio::test]
    async fn semantic_error_in_advanced_query() {
        let registry = test_registry(&["c1"]);
        let queue = ScriptedQueue::new(&[]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search
            .search_retrieve(&params(&[("query", r#"[foo = "x"]"#), ("queryType", "fcs")]))
            .await;

        assert_eq!(outcome.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(outcome.diagnostics[0].code, DiagnosticCode::QueryCannotProcess);
        assert!(outcome.diagnostics[0].ident.contains("foo"));
        assert!(queue.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn parse_error_is_query_syntax() {
        let registry = test_registry(&["c1"]);
        let queue = ScriptedQueue::new(&[]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search
            .search_retrieve(&params(&[("query", r#"[word = "#), ("queryType", "fcs")]))
            .await;

        assert_eq!(outcome.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(outcome.diagnostics[0].code, DiagnosticCode::QuerySyntaxError);
    }

    #[tokio::test]
    async fn unknown_parameter() {
        let registry = test_registry(&["c1"]);
        let queue = ScriptedQueue::new(&[]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search
            .search_retrieve(&params(&[("query", "cat"), ("bogus", "1")]))
            .await;

        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            outcome.diagnostics[0].code,
            DiagnosticCode::UnsupportedParameter
        );
        assert_eq!(outcome.diagnostics[0].ident, "bogus");
    }

    #[tokio::test]
    async fn missing_query_is_mandatory_parameter() {
        let registry = test_registry(&["c1"]);
        let queue = ScriptedQueue::new(&[]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search.search_retrieve(&params(&[])).await;

        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            outcome.diagnostics[0].code,
            DiagnosticCode::MandatoryParameterNotSupplied
        );
    }

    #[tokio::test]
    async fn bad_start_record_values() {
        let registry = test_registry(&["c1"]);
        let queue = ScriptedQueue::new(&[]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        for value in ["0", "-1", "abc"] {
            let outcome = search
                .search_retrieve(&params(&[("query", "cat"), ("startRecord", value)]))
                .await;
            assert_eq!(outcome.status, StatusCode::UNPROCESSABLE_ENTITY, "{value}");
            assert_eq!(
                outcome.diagnostics[0].code,
                DiagnosticCode::UnsupportedParameterValue
            );
            assert_eq!(outcome.diagnostics[0].ident, "startRecord");
        }
    }

    #[tokio::test]
    async fn unknown_context_corpus() {
        let registry = test_registry(&["c1"]);
        let queue = ScriptedQueue::new(&[]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search
            .search_retrieve(&params(&[("query", "cat"), ("x-fcs-context", "c1,ghost")]))
            .await;

        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert!(outcome.diagnostics[0].message.contains("ghost"));
    }

    #[tokio::test]
    async fn empty_context_is_rejected() {
        let registry = test_registry(&["c1"]);
        let queue = ScriptedQueue::new(&[]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search
            .search_retrieve(&params(&[("query", "cat"), ("x-fcs-context", " , ")]))
            .await;

        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert!(outcome.diagnostics[0].message.contains("Empty context"));
    }

    #[tokio::test]
    async fn context_narrows_corpora_and_start_record_offsets_jobs() {
        let registry = test_registry(&["a", "b", "c"]);
        let queue = ScriptedQueue::new(&[("b", rows(&["b1"]))]);
        let search = FederatedSearch::new(&registry, &queue, 50);

        let outcome = search
            .search_retrieve(&params(&[
                ("query", "cat"),
                ("x-fcs-context", "b"),
                ("startRecord", "11"),
                ("maximumRecords", "5"),
            ]))
            .await;

        assert_eq!(outcome.status, StatusCode::OK);
        let published = queue.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].args.corpus_path, "/corpora/registry/b");
        assert_eq!(published[0].args.start_line, 10);
        assert_eq!(published[0].args.max_items, 5);
    }
}
