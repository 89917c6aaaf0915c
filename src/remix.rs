use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::RemixError;
use crate::recipe::Recipe;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_MAX_TOKENS: u32 = 450;
pub const DEFAULT_TEMPERATURE: f64 = 0.8;

pub const NO_AI_RESPONSE: &str = "Sorry, no response from the AI.";

/// Themes offered as buttons. `/remix` without an argument picks one at random.
pub const REMIX_THEMES: [&str; 6] = [
    "Tex-Mex",
    "Vegan",
    "Breakfast",
    "Date night",
    "Street food",
    "Kid friendly",
];

const SYSTEM_PROMPT: &str = "You are a playful, concise chef assistant. Produce a short, fun, \
creative, and totally doable remix of the provided recipe. Be explicit about any changed \
ingredients or changed cooking steps.";

#[async_trait]
pub trait Remixer: Send + Sync {
    async fn remix(&self, recipe: &Recipe, theme: &str) -> Result<String, RemixError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemixSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for RemixSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub fn user_prompt(recipe: &Recipe, theme: &str) -> String {
    format!(
        "Original recipe JSON:\n{}\n\nRemix theme: {theme}\n\nRespond with a short title, a clear \
         ingredients list (note substitutions), and step-by-step instructions. Boldly call out \
         changed items with a short note. Keep it practical and under ~300 words.",
        recipe.to_json()
    )
}

pub fn chat_request<'a>(
    settings: &'a RemixSettings,
    recipe: &Recipe,
    theme: &str,
) -> ChatRequest<'a> {
    ChatRequest {
        model: &settings.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: user_prompt(recipe, theme),
            },
        ],
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    }
}

pub fn reply_text(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.is_empty())
        .unwrap_or_else(|| NO_AI_RESPONSE.to_string())
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    settings: RemixSettings,
}

impl OpenAiClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        settings: RemixSettings,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            api_key,
            settings,
        }
    }

    fn completion_request(
        &self,
        api_key: &str,
        recipe: &Recipe,
        theme: &str,
    ) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&chat_request(&self.settings, recipe, theme))
    }
}

#[async_trait]
impl Remixer for OpenAiClient {
    async fn remix(&self, recipe: &Recipe, theme: &str) -> Result<String, RemixError> {
        let api_key = self.api_key.as_deref().ok_or(RemixError::MissingApiKey)?;
        log::debug!(
            "Requesting {} remix of {:?}",
            self.settings.model,
            recipe.name()
        );

        let response = self
            .completion_request(api_key, recipe, theme)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemixError::Status { status, body });
        }

        Ok(reply_text(response.json().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::sample;
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client(base_url: &str, api_key: Option<&str>) -> OpenAiClient {
        OpenAiClient::new(
            Client::builder().no_proxy().build().unwrap(),
            base_url,
            api_key.map(str::to_string),
            RemixSettings::default(),
        )
    }

    /// Answers a single HTTP request with `status` and `body`, after reading it whole.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                request.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[test]
    fn request_embeds_recipe_and_theme() {
        let settings = RemixSettings::default();
        let recipe = sample(json!({ "strMeal": "Lasagne" }));
        let body = serde_json::to_value(chat_request(&settings, &recipe, "Vegan")).unwrap();

        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["max_tokens"], 450);
        assert_eq!(body["temperature"], 0.8);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");

        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.starts_with("Original recipe JSON:\n{\"strMeal\":\"Lasagne\"}"));
        assert!(user.contains("Remix theme: Vegan"));
    }

    #[test]
    fn reply_text_takes_first_choice() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Vegan Lasagne\n1. ..." } }]
        }))
        .unwrap();
        assert_eq!(reply_text(response), "Vegan Lasagne\n1. ...");
    }

    #[test]
    fn reply_text_falls_back_when_empty() {
        let empty: ChatResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(reply_text(empty), NO_AI_RESPONSE);

        let no_content: ChatResponse =
            serde_json::from_value(json!({ "choices": [{ "message": { "content": null } }] }))
                .unwrap();
        assert_eq!(reply_text(no_content), NO_AI_RESPONSE);
    }

    #[test]
    fn completion_request_posts_with_bearer_token() {
        let client = client("https://api.openai.com/v1/", Some("sk-test"));
        let recipe = sample(json!({ "strMeal": "Goulash" }));
        let request = client
            .completion_request("sk-test", &recipe, "Street food")
            .build()
            .unwrap();

        assert_eq!(request.method(), &reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(request.headers()["authorization"], "Bearer sk-test");
        assert_eq!(request.headers()["content-type"], "application/json");

        let body: Value =
            serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["model"], "gpt-4.1");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("Remix theme: Street food"));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let base = serve_once("429 Too Many Requests", r#"{"error":"quota exceeded"}"#).await;
        let err = client(&base, Some("sk-test"))
            .remix(&sample(json!({ "strMeal": "Stew" })), "Vegan")
            .await
            .unwrap_err();
        match err {
            RemixError::Status { status, body } => {
                assert_eq!(status, reqwest::StatusCode::TOO_MANY_REQUESTS);
                assert!(body.contains("quota exceeded"));
            }
            other => panic!("expected a status error, got {other}"),
        }
    }

    #[tokio::test]
    async fn successful_reply_is_returned() {
        let base = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"Vegan Stew"}}]}"#,
        )
        .await;
        let text = client(&base, Some("sk-test"))
            .remix(&sample(json!({ "strMeal": "Stew" })), "Vegan")
            .await
            .unwrap();
        assert_eq!(text, "Vegan Stew");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        // Nothing listens on port 9, so a request would surface as Http.
        let err = client("http://127.0.0.1:9", None)
            .remix(&sample(json!({ "strMeal": "Stew" })), "Tex-Mex")
            .await
            .unwrap_err();
        assert!(matches!(err, RemixError::MissingApiKey));
    }
}
