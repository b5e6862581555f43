#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use llm::{
    chat::{ChatMessage, ChatProvider, ChatResponse, Tool},
    error::LLMError,
};
use sitescribe::{PromptTemplates, SiteRecord, analyze::AnalyzeContext, parse::PageMetadata};

#[macro_export]
macro_rules! assert_responses {
    (
        $(
            $test_name:ident : response => $response:expr, result => $result:expr
        ),+ $(,)?
    ) => {
        $(
            #[tokio::test]
            async fn $test_name() {
                let model = StubLlmProvider::new($response.to_owned());
                let templates = sitescribe::PromptTemplates::default();
                let context = analyze_context(&model, &templates);
                let result = sitescribe::analyze::ask_model("", &context)
                    .await
                    .expect("Expected successful processing.");

                assert_that(&result).is_equal_to($result.to_owned());
            }
        )+
    }
}

pub(crate) fn analyze_context<'a>(
    model: &'a StubLlmProvider,
    templates: &'a PromptTemplates,
) -> AnalyzeContext<'a> {
    AnalyzeContext {
        model,
        model_name: "stub-model",
        templates,
        char_budget: 6000,
        rate_limiter: None,
    }
}

/// A successfully archived record whose text lives in `dir`.
pub(crate) fn archived_record(dir: &Path, url: &str, text: &str) -> SiteRecord {
    let text_file = dir.join(format!("{}.txt", sitescribe::storage::safe_filename(url)));
    std::fs::write(&text_file, text).expect("Unable to write fixture text");

    SiteRecord {
        domain: sitescribe::storage::domain_of(url),
        url: url.to_string(),
        depth: 0,
        directory: dir.to_path_buf(),
        html_file: None,
        text_file: Some(text_file),
        metadata: PageMetadata {
            title: Some("Fixture Title".to_string()),
            description: Some("Fixture description".to_string()),
            ..PageMetadata::default()
        },
        script_files: Vec::new(),
        missing_scripts: Vec::new(),
        fetched_at: Utc::now(),
        success: true,
        error: None,
    }
}

#[derive(Debug)]
struct StringResponse(String);

impl ChatResponse for StringResponse {
    fn text(&self) -> Option<String> {
        Some(self.0.clone())
    }

    fn tool_calls(&self) -> Option<Vec<llm::ToolCall>> {
        panic!()
    }

    fn thinking(&self) -> Option<String> {
        None
    }

    fn usage(&self) -> Option<llm::chat::Usage> {
        None
    }
}

impl std::fmt::Display for StringResponse {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Chat provider answering every prompt with the same text, or the same error.
pub(crate) struct StubLlmProvider {
    response_content: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl StubLlmProvider {
    pub fn new(response_content: String) -> Self {
        StubLlmProvider {
            response_content: Ok(response_content),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        StubLlmProvider {
            response_content: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("Stub mutex poisoned").clone()
    }
}

impl ChatProvider for StubLlmProvider {
    fn chat<'life0, 'life1, 'async_trait>(
        &'life0 self,
        messages: &'life1 [ChatMessage],
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        self.prompts
            .lock()
            .expect("Stub mutex poisoned")
            .extend(messages.iter().map(|message| message.content.clone()));
        let response_content = self.response_content.clone();

        Box::pin(async move {
            match response_content {
                Ok(text) => Ok(Box::new(StringResponse(text)) as Box<dyn ChatResponse>),
                Err(message) => Err(LLMError::ProviderError(message)),
            }
        })
    }

    fn chat_with_tools<'life0, 'life1, 'life2, 'async_trait>(
        &'life0 self,
        _messages: &'life1 [ChatMessage],
        _tools: Option<&'life2 [Tool]>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        'life2: 'async_trait,
        Self: 'async_trait,
    {
        panic!()
    }
}
