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

//! Wire types of the worker job protocol. The JSON shapes here are the
//! interop contract with the workers; field names are fixed.

use serde::{Deserialize, Serialize};

pub const FUNC_CONC_EXAMPLE: &str = "concExample";

/// Sentinel a worker reports when the requested row window starts past the
/// end of the concordance. Matched textually; workers speak this exact
/// string.
pub const ERR_ROWS_RANGE_OUT_OF_CONC: &str = "rows range out of conc";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub func: String,
    pub args: ConcArgs,
}

impl Job {
    pub fn conc_example(args: ConcArgs) -> Self {
        Job {
            func: FUNC_CONC_EXAMPLE.to_string(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcArgs {
    pub corpus_path: String,
    pub query: String,
    pub attrs: Vec<String>,
    pub start_line: usize,
    pub max_items: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcReply {
    #[serde(default)]
    pub rows: Vec<ConcLine>,
    #[serde(default)]
    pub err: String,
}

impl ConcReply {
    pub fn rows(rows: Vec<ConcLine>) -> Self {
        ConcReply {
            rows,
            err: String::new(),
        }
    }

    pub fn error(err: impl Into<String>) -> Self {
        ConcReply {
            rows: Vec::new(),
            err: err.into(),
        }
    }

    pub fn err(&self) -> Option<&str> {
        if self.err.is_empty() {
            None
        } else {
            Some(&self.err)
        }
    }

    pub fn is_out_of_range(&self) -> bool {
        self.err == ERR_ROWS_RANGE_OUT_OF_CONC
    }
}

/// One concordance row: a token span around a hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcLine {
    pub text: Vec<ConcToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcToken {
    pub word: String,
    /// Whether this token is part of the hit (rendered highlighted).
    #[serde(default)]
    pub strong: bool,
}
