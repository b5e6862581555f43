//! Focus modes and the prompt templates they select.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CONTENT_PROMPT_TEMPLATE, DATA_SECTION_HEADER, GENERAL_PROMPT_TEMPLATE, MARKDOWN_INSTRUCTION,
    SEO_PROMPT_TEMPLATE, TECHNICAL_PROMPT_TEMPLATE, TRUNCATION_MARKER,
};
use crate::error::{Error, Result};
use crate::storage::SiteRecord;

/// Analysis intent, selects the prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Focus {
    General,
    Technical,
    Content,
    Seo,
}

impl Focus {
    pub const ALL: [Focus; 4] = [Focus::General, Focus::Technical, Focus::Content, Focus::Seo];

    pub fn as_str(self) -> &'static str {
        match self {
            Focus::General => "general",
            Focus::Technical => "technical",
            Focus::Content => "content",
            Focus::Seo => "seo",
        }
    }

    /// Parses every name, failing on the first unknown one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFocus`] for a name outside the fixed set
    pub fn parse_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<Focus>> {
        names.iter().map(|name| name.as_ref().parse()).collect()
    }
}

impl FromStr for Focus {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        Focus::ALL
            .into_iter()
            .find(|focus| focus.as_str().eq_ignore_ascii_case(input.trim()))
            .ok_or_else(|| Error::UnknownFocus(input.to_string()))
    }
}

impl AsRef<str> for Focus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Focus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Template per focus mode. Templates may use `{url}` and `{data}`; a template
/// without `{data}` gets the site data appended after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    templates: BTreeMap<Focus, String>,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        let templates = Focus::ALL
            .into_iter()
            .map(|focus| {
                let template = match focus {
                    Focus::General => GENERAL_PROMPT_TEMPLATE,
                    Focus::Technical => TECHNICAL_PROMPT_TEMPLATE,
                    Focus::Content => CONTENT_PROMPT_TEMPLATE,
                    Focus::Seo => SEO_PROMPT_TEMPLATE,
                };
                (focus, template.trim().to_string())
            })
            .collect();

        Self { templates }
    }
}

impl PromptTemplates {
    /// Replaces the template of `focus`.
    pub fn with_template(mut self, focus: Focus, template: impl Into<String>) -> Self {
        self.templates.insert(focus, template.into());
        self
    }

    pub fn template(&self, focus: Focus) -> &str {
        self.templates
            .get(&focus)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Builds the prompt for one site under `focus`, spending at most `char_budget`
    /// characters on the site data.
    pub fn render(&self, focus: Focus, record: &SiteRecord, text: &str, char_budget: usize) -> String {
        let template = self.template(focus);
        let data = site_data(record, text, char_budget);
        let prompt = template.replace("{url}", &record.url);

        if template.contains("{data}") {
            prompt.replace("{data}", &data)
        } else {
            format!("{prompt}\n\n{DATA_SECTION_HEADER}\n{data}\n\n{MARKDOWN_INSTRUCTION}\n")
        }
    }
}

/// Markdown summary of an archived site, truncated to `char_budget` characters.
pub fn site_data(record: &SiteRecord, text: &str, char_budget: usize) -> String {
    let metadata = &record.metadata;
    let data = format!(
        "## Site: {domain}\n\
         - **URL**: {url}\n\
         - **Title**: {title}\n\
         - **Description**: {description}\n\
         - **JavaScript Files**: {scripts}\n\
         \n\
         ### Content Preview:\n\
         {text}",
        domain = record.domain,
        url = record.url,
        title = metadata.title.as_deref().unwrap_or("N/A"),
        description = metadata.description.as_deref().unwrap_or("N/A"),
        scripts = record.script_files.len(),
    );

    if data.chars().count() > char_budget {
        let truncated: String = data.chars().take(char_budget).collect();
        format!("{truncated}{TRUNCATION_MARKER}")
    } else {
        data
    }
}
