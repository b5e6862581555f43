use std::time::Duration;

pub const MODEL_API_KEY_ENV_NAME: &str = "SITESCRIBE_MODEL_API_KEY";

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; SiteScribe/0.1)";

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_BACKEND: &str = "ollama";
pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_OUTPUT_DIR: &str = "data";
pub const DEFAULT_ANALYSIS_DIR: &str = "analysis";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_SCRIPTS: usize = 10;
pub const DEFAULT_CRAWL_MAX_PAGES: usize = 10;

/// Characters of site data handed to the model per prompt.
pub const DEFAULT_CHAR_BUDGET: usize = 6000;
/// Characters of visible text kept per page.
pub const MAX_TEXT_CHARS: usize = 10_000;

pub const SCRIPT_DELAY: Duration = Duration::from_millis(300);
pub const SITE_DELAY: Duration = Duration::from_millis(1000);
/// Headroom on top of curl's own `--max-time` before the process is killed.
pub const FETCH_GRACE: Duration = Duration::from_secs(5);
pub const MODELS_TIMEOUT: Duration = Duration::from_secs(5);

pub const SITES_INDEX_FILE: &str = "sites_index.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const HTML_FILE: &str = "index.html";
pub const TEXT_FILE: &str = "content.txt";
pub const SCRIPTS_DIR: &str = "js";
pub const ANALYSIS_JSON_FILE: &str = "analysis.json";
pub const ANALYSIS_REPORT_FILE: &str = "README.md";

pub(crate) const THINK_STRIPPER: &str = r"<think>[\s\S]*</think>\s*";

pub(crate) const TRUNCATION_MARKER: &str = "\n\n[Content truncated...]";

pub(crate) const DATA_SECTION_HEADER: &str = "## Scraped Website Data:";

pub(crate) const MARKDOWN_INSTRUCTION: &str = "Provide your analysis in well-formatted Markdown:";

pub(crate) const GENERAL_PROMPT_TEMPLATE: &str = r#"
You are an AI analyst. Analyze the scraped website data from {url} and provide:
1. **Overview**: What is this website about?
2. **Key Content**: Main topics and themes
3. **Technical Stack**: Technologies detected
4. **Data Insights**: Interesting patterns or information
5. **Recommendations**: Potential use cases or improvements

Be concise and insightful."#;

pub(crate) const TECHNICAL_PROMPT_TEMPLATE: &str = r#"
You are a technical analyst. Looking at {url}, focus on:
1. **Tech Stack**: Frontend/backend technologies detected
2. **JavaScript Analysis**: Frameworks, libraries, APIs used
3. **Performance**: Page structure and optimization opportunities
4. **Security**: Potential concerns or best practices
5. **Architecture**: Overall technical approach"#;

pub(crate) const CONTENT_PROMPT_TEMPLATE: &str = r#"
You are a content analyst. Looking at {url}, focus on:
1. **Content Quality**: Writing style and clarity
2. **SEO Elements**: Titles, descriptions, keywords
3. **Structure**: Information hierarchy and organization
4. **Engagement**: Call-to-actions and user journey
5. **Audience**: Target demographic and tone"#;

pub(crate) const SEO_PROMPT_TEMPLATE: &str = r#"
You are an SEO specialist. Looking at {url}, analyze:
1. **Meta Tags**: Title, description, keywords quality
2. **Content Structure**: Headers, semantic HTML
3. **Technical SEO**: Page speed indicators, mobile-friendliness
4. **Improvements**: Specific SEO recommendations
5. **Competitive Edge**: Unique value propositions"#;
