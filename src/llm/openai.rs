use axum::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    malformed, parse_food_name, parse_nutrition, AdviceRequester, FoodNutritionResolver,
    NutritionEstimate, ResolveError,
};
use crate::config::LlmConfig;

const NUTRITION_SYSTEM_PROMPT: &str = "음식이 입력되면 영양정보(이름, 칼로리, 탄수화물, 단백질, 지방)를 분석해줘.\n\
예를 들어 \"돈까스 2개 먹었어\"를 입력받으면 (돈까스, 1400, 50, 90, 60) 이런식으로 추출해줘.\n\
반드시 아래 JSON 형식으로만 응답해:\n\
{\"food_name\": \"음식 이름\", \"calorie\": 0, \"carbohydrate\": 0, \"protein\": 0, \"fat\": 0}";

const FOOD_NAME_PROMPT: &str = "다음 이미지를 설명하세요. 음식 이름을 추출하여 JSON 형식으로 반환해주세요.\n\
추출할 정보:\n\
- 음식이름: 한글로 음식 이름\n\
반환 형식:\n\
{\"음식\": \"음식 이름\"}";

const ADVICE_SYSTEM_PROMPT: &str = "You are a nutrition expert providing dietary advice based on \
user's nutrient intake. Give 5 sentences of advice in Korean";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        #[serde(rename = "type")]
        kind: &'static str,
        text: String,
    },
    ImageUrl {
        #[serde(rename = "type")]
        kind: &'static str,
        image_url: ImageUrl,
    },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

/// Azure OpenAI chat-completions client backing both resolver traits.
pub struct AzureOpenAi {
    client: reqwest::Client,
    endpoint: String,
    deployment: String,
    api_version: String,
    api_key: String,
}

impl AzureOpenAi {
    pub fn new(cfg: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            deployment: cfg.deployment.clone(),
            api_version: cfg.api_version.clone(),
            api_key: cfg.api_key.clone(),
        }
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, ResolveError> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        );
        let body = ChatRequest {
            messages,
            temperature: 1.0,
            max_tokens: 800,
        };
        let raw = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let parsed: ChatResponse = serde_json::from_str(&raw)
            .map_err(|e| malformed(format!("unexpected completion payload: {e}"), &raw))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| malformed("completion had no choices", &raw))?;
        debug!(content = %content, "llm response content");
        Ok(content)
    }
}

#[async_trait]
impl FoodNutritionResolver for AzureOpenAi {
    async fn nutrition_for_name(&self, food_name: &str) -> Result<NutritionEstimate, ResolveError> {
        let content = self
            .chat(vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(NUTRITION_SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Text(food_name.to_string()),
                },
            ])
            .await?;
        parse_nutrition(&content)
    }

    async fn nutrition_for_image(
        &self,
        image: Bytes,
        content_type: &str,
    ) -> Result<NutritionEstimate, ResolveError> {
        let data_url = format!(
            "data:{};base64,{}",
            content_type,
            general_purpose::STANDARD.encode(&image)
        );
        let content = self
            .chat(vec![ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        kind: "text",
                        text: FOOD_NAME_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        kind: "image_url",
                        image_url: ImageUrl { url: data_url },
                    },
                ]),
            }])
            .await?;
        let food_name = parse_food_name(&content)?;
        debug!(food_name = %food_name, "recognized food from image");

        // Second step reuses the text lookup; the recognized name wins over
        // whatever the model echoes back.
        let mut estimate = self.nutrition_for_name(&food_name).await?;
        estimate.food_name = food_name;
        Ok(estimate)
    }
}

#[async_trait]
impl AdviceRequester for AzureOpenAi {
    async fn dietary_advice(
        &self,
        carb_pct: f64,
        protein_pct: f64,
        fat_pct: f64,
    ) -> Result<String, ResolveError> {
        let prompt = format!(
            "Here are my monthly nutrient intake percentages:\n\
             Carbohydrates: {carb_pct}%\n\
             Protein: {protein_pct}%\n\
             Fat: {fat_pct}%\n\
             Please provide advice on how to improve my diet"
        );
        self.chat(vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(ADVICE_SYSTEM_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user",
                content: MessageContent::Text(prompt),
            },
        ])
        .await
    }
}
