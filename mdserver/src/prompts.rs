//! Canned prompt templates parameterized by a ticker.

use mdtooling::ToolError;
use mdtooling::rpc::{
    ContentBlock, GetPromptParams, GetPromptResult, PromptArgument, PromptDescriptor,
    PromptMessage,
};
use serde_json::Value;

pub fn stock_summary_prompt(ticker: &str) -> String {
    format!(
        "Please provide a comprehensive summary of the stock '{ticker}'. Include the recent price, volume, news, and any notable events."
    )
}

pub fn investment_thesis_prompt(ticker: &str) -> String {
    format!(
        "Write an investment thesis for '{ticker}'. Include the company's strengths, weaknesses, opportunities, and threats, and a summary of recent analyst recommendations."
    )
}

struct PromptTemplate {
    name: &'static str,
    description: &'static str,
    render: fn(&str) -> String,
}

pub struct PromptCatalog {
    templates: Vec<PromptTemplate>,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self {
            templates: vec![
                PromptTemplate {
                    name: "stock_summary_prompt",
                    description: "Ask for a comprehensive summary of a stock",
                    render: stock_summary_prompt,
                },
                PromptTemplate {
                    name: "investment_thesis_prompt",
                    description: "Ask for an investment thesis with a SWOT analysis and analyst views",
                    render: investment_thesis_prompt,
                },
            ],
        }
    }
}

impl PromptCatalog {
    pub fn descriptors(&self) -> Vec<PromptDescriptor> {
        self.templates
            .iter()
            .map(|template| PromptDescriptor {
                name: template.name.to_string(),
                description: template.description.to_string(),
                arguments: vec![PromptArgument {
                    name: "ticker".to_string(),
                    description: "Stock symbol, for example 'AAPL' or 'VALE3.SA'".to_string(),
                    required: true,
                }],
            })
            .collect()
    }

    /// Unknown names are `NotFound`; a missing or non-string `ticker` is
    /// `InvalidArguments`.
    pub fn render(&self, params: &GetPromptParams) -> Result<GetPromptResult, ToolError> {
        let template = self
            .templates
            .iter()
            .find(|template| template.name == params.name)
            .ok_or_else(|| ToolError::not_found(format!("unknown prompt '{}'", params.name)))?;

        let ticker = params
            .arguments
            .get("ticker")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|ticker| !ticker.is_empty())
            .ok_or_else(|| {
                ToolError::invalid_arguments(format!(
                    "prompt '{}' requires a 'ticker' argument",
                    template.name
                ))
            })?;

        Ok(GetPromptResult {
            description: template.description.to_string(),
            messages: vec![PromptMessage {
                role: "user".to_string(),
                content: ContentBlock::text((template.render)(ticker)),
            }],
        })
    }
}
