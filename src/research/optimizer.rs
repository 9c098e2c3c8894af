use crate::llm::LLMClient;
use crate::research::decode::decode_structured;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{OptimizedQuery, Result};
use std::sync::Arc;

pub const SYSTEM_PROMPT: &str = "You are a research assistant that turns a topic into a \
focused web search query and a precise research brief. Respond with JSON only.";

/// Topic that short-circuits to [`canned_response`] for deterministic runs
pub const TEST_TOPIC: &str = "test";

/// Turns a free-form topic into a search query, refined prompt and outline
pub struct QueryOptimizer {
    llm: Arc<dyn LLMClient>,
    retry: RetryPolicy,
}

impl QueryOptimizer {
    pub fn new(llm: Arc<dyn LLMClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    pub async fn optimize(&self, topic: &str) -> Result<OptimizedQuery> {
        if is_test_topic(topic) {
            tracing::debug!("Test topic, returning canned optimization");
            return Ok(canned_response());
        }

        let prompt = build_prompt(topic);
        let raw = with_retry(&self.retry, || self.llm.generate_with_system(SYSTEM_PROMPT, &prompt))
            .await?;
        let optimized: OptimizedQuery = decode_structured(&raw)?;

        tracing::info!(query = %optimized.query, "Optimized research topic");
        Ok(optimized)
    }
}

pub fn is_test_topic(topic: &str) -> bool {
    topic.trim().eq_ignore_ascii_case(TEST_TOPIC)
}

pub fn canned_response() -> OptimizedQuery {
    OptimizedQuery {
        query: TEST_TOPIC.to_string(),
        optimized_prompt: "Summarize the canned test sources into a short report.".to_string(),
        explanation: "Canned response for the test topic.".to_string(),
        suggested_structure: vec![
            "Overview".to_string(),
            "Findings".to_string(),
            "Conclusion".to_string(),
        ],
    }
}

fn build_prompt(topic: &str) -> String {
    format!(
        r#"Research topic: {topic}

Return a JSON object with exactly these fields:
{{
  "query": "a concise web search query (max 10 words)",
  "optimizedPrompt": "a detailed brief describing what the report must cover",
  "explanation": "one sentence on why this query fits the topic",
  "suggestedStructure": ["section title", "..."]
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppError;
    use async_trait::async_trait;

    struct FixedClient(&'static str);

    #[async_trait]
    impl LLMClient for FixedClient {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }

        async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct PanickingClient;

    #[async_trait]
    impl LLMClient for PanickingClient {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            panic!("model must not be called")
        }

        async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
            panic!("model must not be called")
        }

        fn model_name(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_test_topic_bypasses_model() {
        let optimizer = QueryOptimizer::new(Arc::new(PanickingClient), RetryPolicy::default());
        let result = optimizer.optimize("  TeSt ").await.unwrap();
        assert_eq!(result, canned_response());
    }

    #[tokio::test]
    async fn test_decodes_fenced_response() {
        let client = FixedClient(
            "```json\n{\"query\": \"rust async runtimes\", \"optimizedPrompt\": \"Compare runtimes\", \
             \"explanation\": \"focused\", \"suggestedStructure\": [\"Intro\"],}\n```",
        );
        let optimizer = QueryOptimizer::new(Arc::new(client), RetryPolicy::default());
        let result = optimizer.optimize("async rust").await.unwrap();
        assert_eq!(result.query, "rust async runtimes");
        assert_eq!(result.suggested_structure, vec!["Intro"]);
    }

    #[tokio::test]
    async fn test_malformed_response_propagates() {
        let optimizer =
            QueryOptimizer::new(Arc::new(FixedClient("no json here")), RetryPolicy::default());
        let err = optimizer.optimize("anything").await.unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));
    }
}
