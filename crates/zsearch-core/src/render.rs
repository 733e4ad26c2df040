use crate::{Error, Result};
use std::fmt::Write;
use std::str::FromStr;
use zsearch_api::{SearchResultItem, WebSearchResponse};

/// How search results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The response body as the service sent it, pretty-printed
    #[default]
    Json,
    Text,
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" | "txt" => Ok(OutputFormat::Text),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            other => Err(Error::ConfigError(format!(
                "Unknown output format '{}'. Use json, text or markdown",
                other
            ))),
        }
    }
}

/// Turns search responses into printable strings
pub struct Renderer;

impl Renderer {
    /// Render a raw response body in the requested format
    pub fn render(raw: &serde_json::Value, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Self::to_json(raw),
            OutputFormat::Text => {
                let response: WebSearchResponse = serde_json::from_value(raw.clone())?;
                Ok(Self::to_text(&response))
            }
            OutputFormat::Markdown => {
                let response: WebSearchResponse = serde_json::from_value(raw.clone())?;
                Ok(Self::to_markdown(&response))
            }
        }
    }

    pub fn to_json(raw: &serde_json::Value) -> Result<String> {
        Ok(serde_json::to_string_pretty(raw)?)
    }

    pub fn to_text(response: &WebSearchResponse) -> String {
        let mut output = String::new();

        if response.search_result.is_empty() {
            output.push_str("No results.\n");
            return output;
        }

        for (i, item) in response.search_result.iter().enumerate() {
            let _ = writeln!(output, "{}. {}", i + 1, title_of(item));
            let _ = writeln!(output, "   {}", item.link);
            if let Some(meta) = meta_line(item) {
                let _ = writeln!(output, "   {}", meta);
            }
            if let Some(content) = non_empty(&item.content) {
                for line in content.lines().filter(|l| !l.trim().is_empty()) {
                    let _ = writeln!(output, "   {}", line.trim());
                }
            }
            output.push('\n');
        }

        let _ = writeln!(output, "{} result(s)", response.search_result.len());
        output
    }

    pub fn to_markdown(response: &WebSearchResponse) -> String {
        let mut output = String::new();

        output.push_str("# Web Search Results\n\n");

        for intent in response.search_intent.iter().filter(|i| !i.query.is_empty()) {
            let _ = writeln!(output, "**Query:** {}  ", intent.query);
            if !intent.keywords.is_empty() {
                let _ = writeln!(output, "**Keywords:** {}  ", intent.keywords);
            }
        }
        if let Some(created) = response.created_at() {
            let _ = writeln!(output, "**Retrieved:** {}  ", created.format("%Y-%m-%d %H:%M UTC"));
        }
        let _ = writeln!(output, "**Results:** {}\n", response.search_result.len());
        output.push_str("---\n\n");

        for (i, item) in response.search_result.iter().enumerate() {
            let _ = writeln!(output, "## {}. [{}]({})\n", i + 1, escape_md(title_of(item)), item.link);
            if let Some(meta) = meta_line(item) {
                let _ = writeln!(output, "_{}_\n", meta);
            }
            if let Some(content) = non_empty(&item.content) {
                let _ = writeln!(output, "{}\n", content.trim());
            }
        }

        output
    }
}

fn title_of(item: &SearchResultItem) -> &str {
    non_empty(&item.title).unwrap_or(item.link.as_str())
}

fn meta_line(item: &SearchResultItem) -> Option<String> {
    let parts: Vec<&str> = [&item.media, &item.publish_date]
        .into_iter()
        .filter_map(non_empty)
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" · "))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn escape_md(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}
