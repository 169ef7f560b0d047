use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::types::{KindStats, SubConditionKind};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AdviceConfig {
    /// Chat-completions endpoint of the advice provider.
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key; the key itself never lives
    /// in the config file.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/chat/completions".to_string(),
            model: "deepseek-chat".to_string(),
            api_key_env: "SITSENSE_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Plain-data session report handed to the advice generator.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub duration_secs: f64,
    pub stats: Vec<(SubConditionKind, KindStats)>,
    /// One line per recorded occurrence, e.g. "头部前倾 第1次: 16.0 秒".
    pub detailed_records: Vec<String>,
}

impl SessionSummary {
    pub fn new(duration_secs: f64, stats: Vec<(SubConditionKind, KindStats)>) -> Self {
        let mut detailed_records = Vec::new();
        for (kind, kind_stats) in &stats {
            for (i, secs) in kind_stats.durations_secs.iter().enumerate() {
                detailed_records.push(format!("{} 第{}次: {:.1} 秒", kind.label(), i + 1, secs));
            }
        }
        Self {
            duration_secs,
            stats,
            detailed_records,
        }
    }

    pub fn total_occurrences(&self) -> u32 {
        self.stats.iter().map(|(_, s)| s.count).sum()
    }
}

#[derive(Debug, Error)]
pub enum AdviceError {
    #[error("API key is not configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    BadStatus(reqwest::StatusCode),
    #[error("could not find advice text in the provider response")]
    MalformedResponse,
}

/// Turns a session summary into readable posture advice via a remote
/// chat-completions call. The response is opaque text; no schema contract
/// beyond that.
pub struct AdviceClient {
    config: AdviceConfig,
    api_key: String,
    http: reqwest::blocking::Client,
}

impl AdviceClient {
    pub fn new(config: AdviceConfig, api_key: String) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            api_key,
            http,
        })
    }

    /// Error-text variant: a failed call yields a readable message instead
    /// of an error, so end-of-session reporting never aborts.
    pub fn generate(&self, summary: &SessionSummary) -> String {
        match self.request(summary) {
            Ok(text) => text,
            Err(err) => format!("AI评估生成失败: {err}"),
        }
    }

    pub fn request(&self, summary: &SessionSummary) -> Result<String, AdviceError> {
        if self.api_key.is_empty() {
            return Err(AdviceError::MissingApiKey);
        }

        let payload = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": "你是一个专业的坐姿矫正师，专注于帮助用户改善坐姿问题，预防颈椎和脊柱疾病。"
                },
                { "role": "user", "content": build_prompt(summary) },
            ],
            "temperature": 0.7,
            "max_tokens": 800,
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdviceError::BadStatus(status));
        }

        let body: Value = response.json()?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(AdviceError::MalformedResponse)
    }
}

fn build_prompt(summary: &SessionSummary) -> String {
    let mut lines = vec![
        "你是一个专业的坐姿矫正师，请你依据坐姿检测数据说明用户存在的坐姿问题并且给出建议。".to_string(),
        String::new(),
        "坐姿检测数据：".to_string(),
        format!("- 检测总时长：{:.1}秒", summary.duration_secs),
    ];

    for (kind, stats) in &summary.stats {
        lines.push(format!(
            "- {}：发生了{}次，平均每次持续{:.1}秒",
            kind.label(),
            stats.count,
            stats.avg_duration_secs
        ));
    }

    lines.push(String::new());
    lines.push("详细记录：".to_string());
    if summary.detailed_records.is_empty() {
        lines.push("检测期间未记录详细问题。".to_string());
    } else {
        lines.extend(summary.detailed_records.iter().cloned());
    }

    lines.push(String::new());
    lines.push("请用专业但易懂的语言，以200-300字分析问题、给出建议、指出注意事项。".to_string());
    lines.join("\n")
}
