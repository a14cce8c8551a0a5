//! OpenAI-compatible chat client for sentence analysis and relation classification.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::parse;
use super::types::{
    CausalRelation, DetailRelation, NodeText, OrderingCandidate, OrderingReview, RelationRequest,
    RelationResponse, SentenceStructures, TimePlace,
};
use super::usage::TokenUsage;
use super::{StructureExtractor, TextClassifier};
use crate::config::LlmConfig;
use crate::error::{CollaboratorError, Result};

// ============================================================================
// Prompts
// ============================================================================

const TIME_PLACE_PROMPT: &str = "以下の文から時間表現と場所表現を抽出してください。\n\
- 時間表現は年月日、曜日、午前午後、または季節を含む名詞句のみ。\n\
- 場所表現は地名、施設名、または特定の場所を表す名詞句のみ。\n\
- 複数ある場合は <time : 表現1>, <time : 表現2> のように全て出力する。\n\
- 存在しない場合は <time : 無し> / <place : 無し> と明示する。\n\
出力形式: <time : ...>, <place : ...>";

const STRUCTURE_PROMPT: &str = "以下の文から事象を表す述語ごとに述語項構造を抽出し、\
述語項構造に含まれないエンティティ（名詞句）を列挙してください。\n\
- 述語項構造は「表現(役割)」をカンマで区切って一行で書く。役割は 述語, 修飾, ガ格, ヲ格, ニ格, デ格 などの格。\n\
- 時間表現・場所表現はエンティティに含めない。\n\
- 該当が無い場合は 無し と書く。\n\
出力形式:\n[述語項構造]\n(1) エスカレーター(ガ格), 自動停止し(述語)\n[エンティティ]\n(1) 荷重オーバー";

const RELATION_PROMPT: &str = "与えられたノードの間に、既存のエッジでは表現されていない関係があれば付与してください。\n\
- 既存の固定エッジ語彙と自動生成エッジ辞書を確認し、意味が重複するラベルは新規作成しない。\n\
- 新しいラベルが必要な場合のみ (自動生成エッジ辞書追加) に (x)-[ラベル]→(y) : 説明 の形で書く。\n\
- 付与するエッジは (自動生成エッジ) に (from, to, ラベル) の形で列挙する。\n\
- 付与すべき関係が無い場合は 無し とだけ出力する。";

const CAUSAL_PROMPT: &str = "文中の手がかり表現（ため、により、から、ので、原因 など）に基づき、ノード間の因果関係を抽出してください。\n\
- 直接的な原因は 'cause'、理由・根拠は 'reason' とする。\n\
出力形式:\n[CAUSAL_RELATION]\n(1) (原因ノードindex, 結果ノードindex, 'cause', '手がかり表現')\n\
該当が無い場合は [CAUSAL_RELATION] の次の行に 無し と書く。";

const DETAIL_PROMPT: &str = "ノード間で、一方が他方に詳細な情報を提供している関係を抽出してください。\n\
出力形式:\n[EXPLAIN_RELATION]\n(1) (被説明ノードindex, 説明ノードindex, '説明対象')\n\
該当が無い場合は [EXPLAIN_RELATION] の次の行に 無し と書く。";

const ORDERING_PROMPT: &str = "原文と、時間的に直後である (from, to) の組の一覧が与えられます。\n\
原文から読み取れる時間的な前後関係のうち、一覧に直接欠けているものだけを報告してください。\n\
- 中間のノードを経由して既に表現されている組は報告しない。\n\
出力形式:\n[MISSING_ORDER]\n(1) (fromノードindex, toノードindex)\n\
該当が無い場合は [MISSING_ORDER] の次の行に 無し と書く。";

// ============================================================================
// Client
// ============================================================================

/// Chat-completions client implementing [`StructureExtractor`] and [`TextClassifier`].
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    timeout_secs: u64,
    usage: TokenUsage,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl ChatResponse {
    /// Trimmed content of the first choice.
    fn content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
    }
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                CollaboratorError::MissingApiKey(
                    "llm.api_key not set and OPENAI_API_KEY env var not set".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            usage: TokenUsage::new(),
        })
    }

    /// Count tokens into a shared ledger.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn usage(&self) -> &TokenUsage {
        &self.usage
    }

    /// One system + user exchange; returns the assistant message content.
    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout(self.timeout_secs)
                } else {
                    CollaboratorError::Api(format!("LLM API error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|r| r.error.message)
                .unwrap_or(error_text);
            return Err(CollaboratorError::Api(format!("LLM API error {}: {}", status, message)).into());
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::MalformedResponse(e.to_string()))?;

        if let Some(usage) = &result.usage {
            self.usage.record(usage.total_tokens);
        }

        result.content().ok_or_else(|| {
            CollaboratorError::MalformedResponse("missing message content".to_string()).into()
        })
    }
}

fn node_lines(nodes: &[NodeText]) -> String {
    let mut out = String::new();
    for node in nodes {
        let _ = writeln!(out, "{{index:{}, text:{}}}", node.id, node.text);
    }
    out
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        parse::NONE_MARKER.to_string()
    } else {
        values.join(", ")
    }
}

fn relation_input(request: &RelationRequest) -> String {
    let mut input = String::new();
    let _ = writeln!(input, "原文:\n{}\n", request.text);
    let _ = writeln!(input, "ノード:\n{}", node_lines(&request.nodes));
    input.push_str("既存エッジ:\n");
    for edge in &request.edges {
        let _ = writeln!(input, "({}, {}, {})", edge.from, edge.to, edge.label);
    }
    input.push_str("\n固定エッジ語彙:\n");
    for entry in &request.vocabulary {
        let _ = writeln!(input, "(x)-[{}]→(y) : {}", entry.label, entry.explanation);
    }
    input.push_str("\n自動生成エッジ辞書:\n");
    if request.discovered.is_empty() {
        let _ = writeln!(input, "{}", parse::NONE_MARKER);
    }
    for entry in &request.discovered {
        let _ = writeln!(input, "(x)-[{}]→(y) : {}", entry.label, entry.explanation);
    }
    input
}

#[async_trait]
impl StructureExtractor for OpenAiClient {
    async fn extract_time_and_place(&self, sentence: &str) -> Result<TimePlace> {
        let content = self
            .chat(TIME_PLACE_PROMPT, &format!("文: {}", sentence))
            .await?;
        Ok(parse::parse_time_place(&content))
    }

    async fn extract_structures(
        &self,
        sentence: &str,
        time_place: &TimePlace,
    ) -> Result<SentenceStructures> {
        let input = format!(
            "文: {}\n時間表現: {}\n場所表現: {}",
            sentence,
            join_or_none(&time_place.time),
            join_or_none(&time_place.place)
        );
        let content = self.chat(STRUCTURE_PROMPT, &input).await?;
        Ok(parse::parse_structures(&content))
    }
}

#[async_trait]
impl TextClassifier for OpenAiClient {
    async fn discover_relations(&self, request: &RelationRequest) -> Result<RelationResponse> {
        let content = self.chat(RELATION_PROMPT, &relation_input(request)).await?;
        Ok(parse::parse_relation_response(&content))
    }

    async fn extract_causal(
        &self,
        sentence: &str,
        nodes: &[NodeText],
    ) -> Result<Vec<CausalRelation>> {
        let input = format!("文: {}\nノード:\n{}", sentence, node_lines(nodes));
        let content = self.chat(CAUSAL_PROMPT, &input).await?;
        Ok(parse::parse_causal(&content))
    }

    async fn extract_details(
        &self,
        sentence: &str,
        nodes: &[NodeText],
    ) -> Result<Vec<DetailRelation>> {
        let input = format!("文: {}\nノード:\n{}", sentence, node_lines(nodes));
        let content = self.chat(DETAIL_PROMPT, &input).await?;
        Ok(parse::parse_details(&content))
    }

    async fn check_ordering(&self, review: &OrderingReview) -> Result<Vec<OrderingCandidate>> {
        let mut input = format!(
            "原文:\n{}\n\nノード:\n{}\n直後関係:\n",
            review.text,
            node_lines(&review.nodes)
        );
        for (from, to) in &review.accepted {
            let _ = writeln!(input, "({}, {})", from, to);
        }
        let content = self.chat(ORDERING_PROMPT, &input).await?;
        Ok(parse::parse_ordering(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::EdgeTriple;
    use crate::graph::RelationLabel;

    #[test]
    fn test_from_config_with_api_key() {
        let config = LlmConfig {
            api_key: Some("test-key".to_string()),
            api_endpoint: "http://localhost:8080/v1/".to_string(),
            ..LlmConfig::default()
        };
        let client = OpenAiClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert_eq!(client.model, "gpt-4o");
    }

    #[test]
    fn test_relation_input_lists_context() {
        let request = RelationRequest {
            nodes: vec![NodeText::new(3, "停止し"), NodeText::new(4, "逆走した")],
            edges: vec![EdgeTriple {
                id: 1,
                label: "next_TimeStamp".to_string(),
                from: 3,
                to: 4,
            }],
            text: "停止し逆走した。".to_string(),
            vocabulary: vec![RelationLabel::new("sub", "(y)は(x)の下位である")],
            discovered: vec![],
        };
        let input = relation_input(&request);
        assert!(input.contains("{index:3, text:停止し}"));
        assert!(input.contains("(3, 4, next_TimeStamp)"));
        assert!(input.contains("(x)-[sub]→(y) : (y)は(x)の下位である"));
        assert!(input.contains("自動生成エッジ辞書:\n無し"));
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o",
            messages: [
                ChatMessage {
                    role: "system",
                    content: TIME_PLACE_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: "文: 午前10時に停止した。",
                },
            ],
            temperature: 0.0,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "文: 午前10時に停止した。");
    }

    #[test]
    fn test_chat_response_content_and_usage() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "  <time : 午前10時>\n"}}],
            "usage": {"prompt_tokens": 90, "completion_tokens": 12, "total_tokens": 102}
        }"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.usage.as_ref().map(|u| u.total_tokens), Some(102));
        assert_eq!(response.content().as_deref(), Some("<time : 午前10時>"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(empty.usage.is_none());
        assert!(empty.content().is_none());
    }

    #[test]
    fn test_shared_usage_ledger() {
        let config = LlmConfig {
            api_key: Some("test-key".to_string()),
            ..LlmConfig::default()
        };
        let usage = TokenUsage::new();
        let client = OpenAiClient::from_config(&config)
            .unwrap()
            .with_usage(usage.clone());
        client.usage().record(40);
        assert_eq!(usage.snapshot().tokens, 40);
    }

    #[test]
    fn test_join_or_none() {
        assert_eq!(join_or_none(&[]), "無し");
        assert_eq!(
            join_or_none(&["事故当時".to_string(), "午前".to_string()]),
            "事故当時, 午前"
        );
    }
}
