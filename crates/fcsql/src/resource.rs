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

//! Resource metadata the parsers and generator bind to: positional
//! attributes and the structure mapping of a single corpus.

use serde::{Deserialize, Serialize};

/// Annotation layer of a positional attribute. Attributes within one layer
/// share token granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    #[default]
    Text,
    Lemma,
    Pos,
    Orth,
    Norm,
    Phonetic,
}

/// One per-token annotation stream (e.g. `word`, `lemma`, `pos`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosAttr {
    #[serde(default)]
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub layer: Layer,
    /// At most one attribute per layer carries this flag. Unqualified
    /// references resolve to the default attribute of the default layer.
    #[serde(default)]
    pub is_layer_default: bool,
}

/// Resolves an attribute reference by name.
pub fn resolve_attr<'a>(attrs: &'a [PosAttr], name: &str) -> Option<&'a PosAttr> {
    attrs.iter().find(|a| a.name == name)
}

/// The attribute unqualified references resolve to: the layer-default of the
/// default layer, falling back to the first attribute.
pub fn default_attr(attrs: &[PosAttr]) -> Option<&PosAttr> {
    attrs
        .iter()
        .find(|a| a.layer == Layer::default() && a.is_layer_default)
        .or_else(|| attrs.first())
}

/// Corpus-native element names for the abstract structures FCS-QL can
/// anchor on. Absent entries mean the corpus has no such structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StructureMapping {
    pub sentence: Option<String>,
    pub utterance: Option<String>,
    pub paragraph: Option<String>,
    pub turn: Option<String>,
    pub text: Option<String>,
    pub session: Option<String>,
}

impl StructureMapping {
    /// Translates an FCS structure anchor (`s`, `p`, ...) into the corpus
    /// tag name.
    pub fn resolve(&self, anchor: &str) -> Option<&str> {
        match anchor {
            "s" | "sentence" => self.sentence.as_deref(),
            "u" | "utterance" => self.utterance.as_deref(),
            "p" | "paragraph" => self.paragraph.as_deref(),
            "t" | "turn" => self.turn.as_deref(),
            "text" => self.text.as_deref(),
            "session" => self.session.as_deref(),
            _ => None,
        }
    }
}
