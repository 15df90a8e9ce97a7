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

//! Renders SRU 1.2 response documents: searchRetrieve with records in the
//! FCS hits data view, explain, and diagnostics.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::ServerInfo;
use crate::corpus::ResourceRegistry;
use crate::sru::diagnostics::FcsError;
use crate::Result;

const SRU_NS: &str = "http://www.loc.gov/zing/srw/";
const DIAG_NS: &str = "http://www.loc.gov/zing/srw/diagnostic/";
const FCS_NS: &str = "http://clarin.eu/fcs/resource";
const HITS_NS: &str = "http://clarin.eu/fcs/dataview/hits";
const EXPLAIN_NS: &str = "http://explain.z3950.org/dtd/2.0/";
const HITS_MIME: &str = "application/x-clarin-fcs-hits+xml";

pub const SRU_VERSION: &str = "1.2";

/// One merged result row, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRow {
    /// 1-based position within the returned page.
    pub position: usize,
    /// Persistent identifier of the contributing corpus.
    pub pid: String,
    pub ref_uri: String,
    pub tokens: Vec<RowToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowToken {
    pub text: String,
    pub hit: bool,
}

/// The request parameters echoed back in every searchRetrieve response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EchoedRequest {
    pub query: String,
    pub start_record: usize,
}

pub fn search_retrieve(
    rows: &[SearchRow],
    echoed: &EchoedRequest,
    diagnostics: &[FcsError],
) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut root = BytesStart::new("sru:searchRetrieveResponse");
    root.push_attribute(("xmlns:sru", SRU_NS));
    writer.write_event(Event::Start(root))?;

    text_element(&mut writer, "sru:version", SRU_VERSION)?;
    text_element(&mut writer, "sru:numberOfRecords", &rows.len().to_string())?;

    if !rows.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("sru:records")))?;
        for row in rows {
            write_record(&mut writer, row)?;
        }
        writer.write_event(Event::End(BytesEnd::new("sru:records")))?;
    }

    writer.write_event(Event::Start(BytesStart::new(
        "sru:echoedSearchRetrieveRequest",
    )))?;
    text_element(&mut writer, "sru:version", SRU_VERSION)?;
    text_element(&mut writer, "sru:query", &echoed.query)?;
    text_element(
        &mut writer,
        "sru:startRecord",
        &echoed.start_record.to_string(),
    )?;
    writer.write_event(Event::End(BytesEnd::new("sru:echoedSearchRetrieveRequest")))?;

    write_diagnostics(&mut writer, diagnostics)?;

    writer.write_event(Event::End(BytesEnd::new("sru:searchRetrieveResponse")))?;
    into_string(writer)
}

fn write_record(writer: &mut Writer<Cursor<Vec<u8>>>, row: &SearchRow) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("sru:record")))?;
    text_element(writer, "sru:recordSchema", FCS_NS)?;
    text_element(writer, "sru:recordPacking", "xml")?;

    writer.write_event(Event::Start(BytesStart::new("sru:recordData")))?;

    let mut resource = BytesStart::new("fcs:Resource");
    resource.push_attribute(("xmlns:fcs", FCS_NS));
    resource.push_attribute(("pid", row.pid.as_str()));
    writer.write_event(Event::Start(resource))?;

    let mut fragment = BytesStart::new("fcs:ResourceFragment");
    fragment.push_attribute(("ref", row.ref_uri.as_str()));
    writer.write_event(Event::Start(fragment))?;

    let mut view = BytesStart::new("fcs:DataView");
    view.push_attribute(("type", HITS_MIME));
    writer.write_event(Event::Start(view))?;

    let mut result = BytesStart::new("hits:Result");
    result.push_attribute(("xmlns:hits", HITS_NS));
    writer.write_event(Event::Start(result))?;
    for (i, token) in row.tokens.iter().enumerate() {
        if i > 0 {
            writer.write_event(Event::Text(BytesText::new(" ")))?;
        }
        if token.hit {
            writer.write_event(Event::Start(BytesStart::new("hits:Hit")))?;
            writer.write_event(Event::Text(BytesText::new(&token.text)))?;
            writer.write_event(Event::End(BytesEnd::new("hits:Hit")))?;
        } else {
            writer.write_event(Event::Text(BytesText::new(&token.text)))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("hits:Result")))?;

    writer.write_event(Event::End(BytesEnd::new("fcs:DataView")))?;
    writer.write_event(Event::End(BytesEnd::new("fcs:ResourceFragment")))?;
    writer.write_event(Event::End(BytesEnd::new("fcs:Resource")))?;

    writer.write_event(Event::End(BytesEnd::new("sru:recordData")))?;
    text_element(writer, "sru:recordPosition", &row.position.to_string())?;
    writer.write_event(Event::End(BytesEnd::new("sru:record")))?;
    Ok(())
}

fn write_diagnostics(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    diagnostics: &[FcsError],
) -> Result<()> {
    if diagnostics.is_empty() {
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new("sru:diagnostics")))?;
    for diag in diagnostics {
        let mut el = BytesStart::new("diag:diagnostic");
        el.push_attribute(("xmlns:diag", DIAG_NS));
        writer.write_event(Event::Start(el))?;
        text_element(writer, "diag:uri", &diag.code.as_urn())?;
        text_element(writer, "diag:details", &diag.ident)?;
        text_element(writer, "diag:message", &diag.message)?;
        writer.write_event(Event::End(BytesEnd::new("diag:diagnostic")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("sru:diagnostics")))?;
    Ok(())
}

pub fn explain(server: &ServerInfo, registry: &ResourceRegistry) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut root = BytesStart::new("sru:explainResponse");
    root.push_attribute(("xmlns:sru", SRU_NS));
    writer.write_event(Event::Start(root))?;
    text_element(&mut writer, "sru:version", SRU_VERSION)?;

    writer.write_event(Event::Start(BytesStart::new("sru:record")))?;
    text_element(&mut writer, "sru:recordSchema", EXPLAIN_NS)?;
    text_element(&mut writer, "sru:recordPacking", "xml")?;
    writer.write_event(Event::Start(BytesStart::new("sru:recordData")))?;

    let mut explain = BytesStart::new("zr:explain");
    explain.push_attribute(("xmlns:zr", EXPLAIN_NS));
    writer.write_event(Event::Start(explain))?;

    let mut server_info = BytesStart::new("zr:serverInfo");
    server_info.push_attribute(("protocol", "SRU"));
    server_info.push_attribute(("version", SRU_VERSION));
    server_info.push_attribute(("transport", "http"));
    writer.write_event(Event::Start(server_info))?;
    text_element(&mut writer, "zr:host", &server.host)?;
    text_element(&mut writer, "zr:port", &server.port.to_string())?;
    text_element(&mut writer, "zr:database", &server.database)?;
    writer.write_event(Event::End(BytesEnd::new("zr:serverInfo")))?;

    writer.write_event(Event::Start(BytesStart::new("zr:databaseInfo")))?;
    let mut title = BytesStart::new("zr:title");
    title.push_attribute(("lang", "en"));
    title.push_attribute(("primary", "true"));
    writer.write_event(Event::Start(title))?;
    writer.write_event(Event::Text(BytesText::new(&server.title)))?;
    writer.write_event(Event::End(BytesEnd::new("zr:title")))?;
    if let Some(description) = &server.description {
        let mut el = BytesStart::new("zr:description");
        el.push_attribute(("lang", "en"));
        el.push_attribute(("primary", "true"));
        writer.write_event(Event::Start(el))?;
        writer.write_event(Event::Text(BytesText::new(description)))?;
        writer.write_event(Event::End(BytesEnd::new("zr:description")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("zr:databaseInfo")))?;

    // advertised searchable corpora
    writer.write_event(Event::Start(BytesStart::new("zr:indexInfo")))?;
    for resource in registry.iter() {
        let mut index = BytesStart::new("zr:index");
        index.push_attribute(("search", "true"));
        writer.write_event(Event::Start(index))?;
        let mut title = BytesStart::new("zr:title");
        title.push_attribute(("lang", "en"));
        writer.write_event(Event::Start(title))?;
        writer.write_event(Event::Text(BytesText::new(&resource.name)))?;
        writer.write_event(Event::End(BytesEnd::new("zr:title")))?;
        writer.write_event(Event::End(BytesEnd::new("zr:index")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("zr:indexInfo")))?;

    writer.write_event(Event::End(BytesEnd::new("zr:explain")))?;
    writer.write_event(Event::End(BytesEnd::new("sru:recordData")))?;
    writer.write_event(Event::End(BytesEnd::new("sru:record")))?;
    writer.write_event(Event::End(BytesEnd::new("sru:explainResponse")))?;
    into_string(writer)
}

fn text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn into_string(writer: Writer<Cursor<Vec<u8>>>) -> Result<String> {
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::test_registry;
    use crate::sru::diagnostics::DiagnosticCode;

    fn echoed() -> EchoedRequest {
        EchoedRequest {
            query: "cat".to_string(),
            start_record: 1,
        }
    }

    #[test]
    fn search_retrieve_with_rows() {
        let rows = vec![SearchRow {
            position: 1,
            pid: "c1".to_string(),
            ref_uri: "http://hdl.example.org/c1".to_string(),
            tokens: vec![
                RowToken {
                    text: "the".to_string(),
                    hit: false,
                },
                RowToken {
                    text: "cat".to_string(),
                    hit: true,
                },
            ],
        }];
        let xml = search_retrieve(&rows, &echoed(), &[]).unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<sru:numberOfRecords>1</sru:numberOfRecords>"));
        assert!(xml.contains(r#"<fcs:Resource xmlns:fcs="http://clarin.eu/fcs/resource" pid="c1">"#));
        assert!(xml.contains("the <hits:Hit>cat</hits:Hit>"));
        assert!(xml.contains("<sru:recordPosition>1</sru:recordPosition>"));
        assert!(xml.contains("<sru:query>cat</sru:query>"));
        assert!(!xml.contains("sru:diagnostics"));
    }

    #[test]
    fn search_retrieve_with_diagnostics_only() {
        let diags = vec![FcsError::new(
            DiagnosticCode::FirstRecordPosOutOfRange,
            "rows range out of conc",
        )];
        let xml = search_retrieve(&[], &echoed(), &diags).unwrap();

        assert!(!xml.contains("<sru:records>"));
        assert!(xml.contains("<diag:uri>info:srw/diagnostic/1/61</diag:uri>"));
        assert!(xml.contains("<diag:details>rows range out of conc</diag:details>"));
    }

    #[test]
    fn text_is_escaped() {
        let diags = vec![FcsError::new(
            DiagnosticCode::QuerySyntaxError,
            r#"<&">"#,
        )];
        let xml = search_retrieve(&[], &echoed(), &diags).unwrap();
        assert!(xml.contains("&lt;&amp;"));
        assert!(!xml.contains(r#"<&">"#));
    }

    #[test]
    fn explain_lists_resources() {
        let server = ServerInfo {
            host: "fcs.example.org".to_string(),
            port: 443,
            database: "fcs".to_string(),
            title: "Example federated search".to_string(),
            description: Some("Corpus endpoint".to_string()),
        };
        let registry = test_registry(&["alpha", "beta"]);
        let xml = explain(&server, &registry).unwrap();

        assert!(xml.contains("<sru:explainResponse"));
        assert!(xml.contains("<zr:host>fcs.example.org</zr:host>"));
        assert!(xml.contains(">alpha</zr:title>"));
        assert!(xml.contains(">beta</zr:title>"));
    }
}
