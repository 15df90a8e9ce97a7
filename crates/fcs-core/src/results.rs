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

//! Interleaves per-corpus result lines into one page.

use crate::queue::job::{ConcLine, ERR_ROWS_RANGE_OUT_OF_CONC};

/// Outcome of one corpus's job, as far as merging is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RscError {
    /// The requested window starts past this corpus's result set. Only
    /// fatal when every corpus reports it.
    OutOfRange,
    Fatal(String),
}

impl RscError {
    pub fn message(&self) -> &str {
        match self {
            RscError::OutOfRange => ERR_ROWS_RANGE_OUT_OF_CONC,
            RscError::Fatal(msg) => msg,
        }
    }
}

#[derive(Debug)]
struct RscLines {
    name: String,
    lines: Vec<ConcLine>,
    cursor: usize,
    error: Option<RscError>,
}

impl RscLines {
    fn exhausted(&self) -> bool {
        self.cursor >= self.lines.len()
    }
}

/// Stable round-robin over per-corpus row lists. Draws one row at a time in
/// corpus-list order, skipping exhausted or errored corpora, and never
/// emits more than the page size it was built with. The emission sequence
/// is a pure function of (corpus order, per-corpus row counts).
#[derive(Debug)]
pub struct RoundRobinLines {
    items: Vec<RscLines>,
    max_items: usize,
    emitted: usize,
    next_idx: usize,
}

impl RoundRobinLines {
    pub fn new(max_items: usize, corpora: &[String]) -> Self {
        RoundRobinLines {
            items: corpora
                .iter()
                .map(|name| RscLines {
                    name: name.clone(),
                    lines: Vec::new(),
                    cursor: 0,
                    error: None,
                })
                .collect(),
            max_items,
            emitted: 0,
            next_idx: 0,
        }
    }

    /// Stores the rows a corpus returned. Unknown names are ignored.
    pub fn set_lines(&mut self, name: &str, lines: Vec<ConcLine>) {
        if let Some(item) = self.items.iter_mut().find(|i| i.name == name) {
            item.lines = lines;
        }
    }

    pub fn set_error_at(&mut self, idx: usize, error: RscError) {
        if let Some(item) = self.items.get_mut(idx) {
            item.error = Some(error);
        }
    }

    /// Draws the next row: the first corpus at or after the global cursor
    /// with rows remaining. Returns `None` once the page is full or all
    /// sources are drained.
    pub fn next_line(&mut self) -> Option<(&str, &ConcLine)> {
        if self.items.is_empty() || self.emitted >= self.max_items {
            return None;
        }

        let n = self.items.len();
        for step in 0..n {
            let idx = (self.next_idx + step) % n;
            if self.items[idx].error.is_none() && !self.items[idx].exhausted() {
                self.next_idx = (idx + 1) % n;
                self.emitted += 1;
                let item = &mut self.items[idx];
                let cursor = item.cursor;
                item.cursor += 1;
                return Some((item.name.as_str(), &item.lines[cursor]));
            }
        }
        None
    }

    pub fn all_out_of_range(&self) -> bool {
        !self.items.is_empty()
            && self
                .items
                .iter()
                .all(|i| matches!(i.error, Some(RscError::OutOfRange)))
    }

    pub fn has_fatal_error(&self) -> bool {
        self.items
            .iter()
            .any(|i| matches!(i.error, Some(RscError::Fatal(_))))
    }

    /// The lowest-index error, for reporting.
    pub fn first_error(&self) -> Option<&RscError> {
        self.items.iter().find_map(|i| i.error.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::job::ConcToken;
    use proptest::prelude::*;

    fn row(text: &str) -> ConcLine {
        ConcLine {
            text: vec![ConcToken {
                word: text.to_string(),
                strong: true,
            }],
        }
    }

    fn rows(texts: &[&str]) -> Vec<ConcLine> {
        texts.iter().map(|t| row(t)).collect()
    }

    fn corpora(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn drain(sel: &mut RoundRobinLines) -> Vec<(String, String)> {
        let mut out = Vec::new();
        while let Some((name, line)) = sel.next_line() {
            out.push((name.to_string(), line.text[0].word.clone()));
        }
        out
    }

    #[test]
    fn interleaves_equal_sources() {
        let mut sel = RoundRobinLines::new(4, &corpora(&["a", "b"]));
        sel.set_lines("a", rows(&["a1", "a2"]));
        sel.set_lines("b", rows(&["b1", "b2"]));

        let words: Vec<_> = drain(&mut sel).into_iter().map(|(_, w)| w).collect();
        assert_eq!(words, vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn skips_exhausted_sources() {
        let mut sel = RoundRobinLines::new(4, &corpora(&["a", "b"]));
        sel.set_lines("a", rows(&["a1"]));
        sel.set_lines("b", rows(&["b1", "b2", "b3"]));

        let words: Vec<_> = drain(&mut sel).into_iter().map(|(_, w)| w).collect();
        assert_eq!(words, vec!["a1", "b1", "b2", "b3"]);
    }

    #[test]
    fn caps_at_page_size() {
        let mut sel = RoundRobinLines::new(3, &corpora(&["a", "b"]));
        sel.set_lines("a", rows(&["a1", "a2", "a3"]));
        sel.set_lines("b", rows(&["b1", "b2", "b3"]));

        let words: Vec<_> = drain(&mut sel).into_iter().map(|(_, w)| w).collect();
        assert_eq!(words, vec!["a1", "b1", "a2"]);
        assert!(sel.next_line().is_none());
    }

    #[test]
    fn errored_sources_are_skipped() {
        let mut sel = RoundRobinLines::new(4, &corpora(&["a", "b", "c"]));
        sel.set_lines("a", rows(&["a1"]));
        sel.set_error_at(1, RscError::OutOfRange);
        sel.set_lines("c", rows(&["c1"]));

        let got = drain(&mut sel);
        assert_eq!(
            got,
            vec![
                ("a".to_string(), "a1".to_string()),
                ("c".to_string(), "c1".to_string()),
            ]
        );
    }

    #[test]
    fn error_predicates() {
        let mut sel = RoundRobinLines::new(4, &corpora(&["a", "b"]));
        assert!(!sel.all_out_of_range());
        assert!(!sel.has_fatal_error());
        assert!(sel.first_error().is_none());

        sel.set_error_at(0, RscError::OutOfRange);
        assert!(!sel.all_out_of_range());

        sel.set_error_at(1, RscError::OutOfRange);
        assert!(sel.all_out_of_range());
        assert_eq!(sel.first_error(), Some(&RscError::OutOfRange));

        sel.set_error_at(1, RscError::Fatal("worker exploded".to_string()));
        assert!(!sel.all_out_of_range());
        assert!(sel.has_fatal_error());
        assert_eq!(sel.first_error().unwrap().message(), ERR_ROWS_RANGE_OUT_OF_CONC);
    }

    #[test]
    fn empty_selector_has_nothing() {
        let mut sel = RoundRobinLines::new(5, &[]);
        assert!(sel.next_line().is_none());
        assert!(!sel.all_out_of_range());
    }

    proptest! {
        /// Identically seeded selectors emit identical sequences, never
        /// more than the page size, and only names from the corpus list.
        #[test]
        fn emission_is_stable(counts in prop::collection::vec(0usize..5, 1..5), k in 0usize..12) {
            let names: Vec<String> = (0..counts.len()).map(|i| format!("c{i}")).collect();

            let seed = |names: &[String], counts: &[usize]| {
                let mut sel = RoundRobinLines::new(k, names);
                for (name, count) in names.iter().zip(counts) {
                    let lines = (0..*count).map(|j| row(&format!("{name}-{j}"))).collect();
                    sel.set_lines(name, lines);
                }
                sel
            };

            let mut first = seed(&names, &counts);
            let mut second = seed(&names, &counts);
            let a = drain(&mut first);
            let b = drain(&mut second);

            prop_assert_eq!(&a, &b);
            prop_assert!(a.len() <= k);
            prop_assert!(a.len() <= counts.iter().sum::<usize>());
            for (name, _) in &a {
                prop_assert!(names.contains(name));
            }
        }
    }
}
