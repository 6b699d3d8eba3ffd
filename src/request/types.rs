use serde::{Deserialize, Serialize};

/// One request as handed over by the embedding layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RequestSpec {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl RequestSpec {
    pub fn new(url: impl Into<String>, method: impl Into<String>, body: Option<&str>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            body: body.map(str::to_string),
        }
    }

    /// The body that will actually be written: absent and empty bodies
    /// both send nothing.
    pub fn payload(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }
}

/// Reply of the bridge surface: the response body, or `null` on any failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BridgeResponse {
    pub result: Option<String>,
}

impl From<Option<String>> for BridgeResponse {
    fn from(result: Option<String>) -> Self {
        Self { result }
    }
}
