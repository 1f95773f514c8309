//! Uniform outcome of every client operation.

use xmltree::Element;

use crate::response::Response;

/// Structured payload carried by an [`AemResult`].
///
/// Which variant an operation produces is fixed per operation; consumers
/// match on the one they expect.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultData {
    #[default]
    None,
    Bool(bool),
    Strings(Vec<String>),
    /// Parsed document fragment, kept as a tree for downstream queries.
    Document(Element),
}

impl ResultData {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ResultData::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            ResultData::Strings(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Element> {
        match self {
            ResultData::Document(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of a single operation.
///
/// Built once by a handler or a derived query and never mutated afterwards;
/// the `with_*` methods consume `self` and are only used while constructing.
#[derive(Debug, Clone, PartialEq)]
pub struct AemResult {
    message: String,
    response: Option<Response>,
    data: ResultData,
    success: bool,
}

impl AemResult {
    /// A successful result with no response and no data.
    pub fn new(message: impl Into<String>) -> Self {
        AemResult {
            message: message.into(),
            response: None,
            data: ResultData::None,
            success: true,
        }
    }

    /// A non-success result with no response and no data.
    pub fn failure(message: impl Into<String>) -> Self {
        AemResult {
            success: false,
            ..AemResult::new(message)
        }
    }

    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_data(mut self, data: ResultData) -> Self {
        self.data = data;
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn data(&self) -> &ResultData {
        &self.data
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// True only when the payload is `Bool(true)`.
    pub fn is_true(&self) -> bool {
        self.data.as_bool() == Some(true)
    }

    pub fn into_data(self) -> ResultData {
        self.data
    }
}

impl std::fmt::Display for AemResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
