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

//! Splits a result page across corpora.

/// One corpus's window of a federated page. `from` is 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRange {
    pub rsc: String,
    pub from: usize,
    pub max_items: usize,
}

/// Every corpus is asked for rows `[from, from + max_items)` of its own
/// result set. This over-fetches relative to the merged page, but lets the
/// round-robin merger serve any page even when some corpora are sparse, and
/// keeps the output independent of per-corpus result counts.
pub fn partial_ranges(corpora: &[String], from: usize, max_items: usize) -> Vec<PartialRange> {
    corpora
        .iter()
        .map(|name| PartialRange {
            rsc: name.clone(),
            from,
            max_items,
        })
        .collect()
}
