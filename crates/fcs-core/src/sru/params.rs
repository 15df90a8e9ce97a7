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

//! The searchRetrieve parameter vocabulary. Anything outside this set is an
//! unsupported parameter.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchRetrArg {
    Operation,
    Version,
    Query,
    QueryType,
    StartRecord,
    MaximumRecords,
    RecordSchema,
    RecordPacking,
    FcsContext,
    FcsDataViews,
}

impl SearchRetrArg {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "operation" => Some(SearchRetrArg::Operation),
            "version" => Some(SearchRetrArg::Version),
            "query" => Some(SearchRetrArg::Query),
            "queryType" => Some(SearchRetrArg::QueryType),
            "startRecord" => Some(SearchRetrArg::StartRecord),
            "maximumRecords" => Some(SearchRetrArg::MaximumRecords),
            "recordSchema" => Some(SearchRetrArg::RecordSchema),
            "recordPacking" => Some(SearchRetrArg::RecordPacking),
            "x-fcs-context" => Some(SearchRetrArg::FcsContext),
            "x-fcs-dataviews" => Some(SearchRetrArg::FcsDataViews),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchRetrArg::Operation => "operation",
            SearchRetrArg::Version => "version",
            SearchRetrArg::Query => "query",
            SearchRetrArg::QueryType => "queryType",
            SearchRetrArg::StartRecord => "startRecord",
            SearchRetrArg::MaximumRecords => "maximumRecords",
            SearchRetrArg::RecordSchema => "recordSchema",
            SearchRetrArg::RecordPacking => "recordPacking",
            SearchRetrArg::FcsContext => "x-fcs-context",
            SearchRetrArg::FcsDataViews => "x-fcs-dataviews",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_known_keys() {
        for arg in [
            SearchRetrArg::Operation,
            SearchRetrArg::Version,
            SearchRetrArg::Query,
            SearchRetrArg::QueryType,
            SearchRetrArg::StartRecord,
            SearchRetrArg::MaximumRecords,
            SearchRetrArg::RecordSchema,
            SearchRetrArg::RecordPacking,
            SearchRetrArg::FcsContext,
            SearchRetrArg::FcsDataViews,
        ] {
            assert_eq!(SearchRetrArg::from_key(arg.as_str()), Some(arg));
        }
    }

    #[test]
    fn unknown_keys() {
        assert_eq!(SearchRetrArg::from_key("bogus"), None);
        assert_eq!(SearchRetrArg::from_key("Query"), None);
    }
}
