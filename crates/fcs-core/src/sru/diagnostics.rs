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

//! SRU diagnostic codes and the error value that travels through a request.
//! The numeric codes are part of the protocol and stable.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    GeneralSystemError,
    UnsupportedOperation,
    UnsupportedParameterValue,
    MandatoryParameterNotSupplied,
    UnsupportedParameter,
    QuerySyntaxError,
    QueryCannotProcess,
    FirstRecordPosOutOfRange,
}

impl DiagnosticCode {
    pub fn number(&self) -> u32 {
        match self {
            DiagnosticCode::GeneralSystemError => 1,
            DiagnosticCode::UnsupportedOperation => 4,
            DiagnosticCode::UnsupportedParameterValue => 6,
            DiagnosticCode::MandatoryParameterNotSupplied => 7,
            DiagnosticCode::UnsupportedParameter => 8,
            DiagnosticCode::QuerySyntaxError => 10,
            DiagnosticCode::QueryCannotProcess => 47,
            DiagnosticCode::FirstRecordPosOutOfRange => 61,
        }
    }

    pub fn as_urn(&self) -> String {
        format!("info:srw/diagnostic/1/{}", self.number())
    }

    pub fn as_message(&self) -> &'static str {
        match self {
            DiagnosticCode::GeneralSystemError => "General system error",
            DiagnosticCode::UnsupportedOperation => "Unsupported operation",
            DiagnosticCode::UnsupportedParameterValue => "Unsupported parameter value",
            DiagnosticCode::MandatoryParameterNotSupplied => "Mandatory parameter not supplied",
            DiagnosticCode::UnsupportedParameter => "Unsupported parameter",
            DiagnosticCode::QuerySyntaxError => "Query syntax error",
            DiagnosticCode::QueryCannotProcess => "Cannot process query",
            DiagnosticCode::FirstRecordPosOutOfRange => {
                "First record position out of range"
            }
        }
    }
}

/// One diagnostic as it ends up in the response: code, the offending
/// identifier (`details` on the wire) and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FcsError {
    pub code: DiagnosticCode,
    pub ident: String,
    pub message: String,
}

impl FcsError {
    pub fn new(code: DiagnosticCode, ident: impl Into<String>) -> Self {
        FcsError {
            code,
            ident: ident.into(),
            message: code.as_message().to_string(),
        }
    }

    pub fn with_message(
        code: DiagnosticCode,
        ident: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        FcsError {
            code,
            ident: ident.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FcsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.message, self.code.as_urn(), self.ident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_code_numbers() {
        assert_eq!(DiagnosticCode::GeneralSystemError.number(), 1);
        assert_eq!(DiagnosticCode::UnsupportedOperation.number(), 4);
        assert_eq!(DiagnosticCode::UnsupportedParameterValue.number(), 6);
        assert_eq!(DiagnosticCode::MandatoryParameterNotSupplied.number(), 7);
        assert_eq!(DiagnosticCode::UnsupportedParameter.number(), 8);
        assert_eq!(DiagnosticCode::QuerySyntaxError.number(), 10);
        assert_eq!(DiagnosticCode::QueryCannotProcess.number(), 47);
        assert_eq!(DiagnosticCode::FirstRecordPosOutOfRange.number(), 61);
    }

    #[test]
    fn urn_form() {
        assert_eq!(
            DiagnosticCode::QuerySyntaxError.as_urn(),
            "info:srw/diagnostic/1/10"
        );
    }
}
