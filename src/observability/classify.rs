//! Response classification for analytics

use serde::{Deserialize, Serialize};

const CANVA_MARKER: &str = "canva.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogStage {
    Response,
    ResponseWithPortfolio,
}

impl LogStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStage::Response => "Response",
            LogStage::ResponseWithPortfolio => "ResponseWithPortfolio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseLog {
    pub stage: LogStage,
    pub contains_portfolio_link: bool,
}

/// Tags generated replies that carry a portfolio link
#[derive(Debug, Clone, Default)]
pub struct ResponseClassifier {
    portfolio_url: Option<String>,
}

impl ResponseClassifier {
    /// Blank URLs are treated as unset so they never match every response
    pub fn new(portfolio_url: Option<String>) -> Self {
        Self {
            portfolio_url: portfolio_url.filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn classify_for_log(&self, response_text: &str) -> ResponseLog {
        let contains_portfolio_link = response_text.contains(CANVA_MARKER)
            || self
                .portfolio_url
                .as_deref()
                .is_some_and(|url| response_text.contains(url));

        ResponseLog {
            stage: if contains_portfolio_link {
                LogStage::ResponseWithPortfolio
            } else {
                LogStage::Response
            },
            contains_portfolio_link,
        }
    }
}
