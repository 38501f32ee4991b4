use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{IntelError, IntelResult};
use crate::models::CompanyData;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

// --- Provider trait ---

/// Opaque text-in/text-out generation call.
pub trait ExtractionProvider {
    fn complete(&self, prompt: &str) -> IntelResult<String>;
    fn model_name(&self) -> &str;
}

// --- Gemini provider ---

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug)]
pub struct GeminiProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, model_id: String) -> Self {
        let client = reqwest::blocking::Client::new();
        Self { api_key, model_id, client }
    }
}

impl ExtractionProvider for GeminiProvider {
    fn complete(&self, prompt: &str) -> IntelResult<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt.to_string() }],
            }],
        };

        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model_id);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .map_err(|e| IntelError::NetworkFailure(format!("Failed to reach Gemini API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(IntelError::NetworkFailure(format!(
                "Gemini API request failed with status {}: {}",
                status, error_text
            )));
        }

        let api_response: GeminiResponse = response
            .json()
            .map_err(|e| IntelError::NetworkFailure(format!("Failed to read Gemini API response: {}", e)))?;

        let text: String = api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(IntelError::MalformedExtractionOutput(
                "Empty response from AI".to_string(),
            ));
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Prompt and response handling ---

/// Instruction text for extracting one company card from `url`. Used both for
/// the direct API call and for manual copy/paste into a chat window.
pub fn extraction_prompt(url: &str) -> String {
    format!(
        "I will provide a company URL: \"{url}\"\n\n\
        Please act as a Data Extraction Engine. Your task is to extract specific details about this company and return them in a strict JSON format.\n\n\
        CRITICAL RULE FOR ROLE:\n\
        You must look SPECIFICALLY for \"Product Designer\", \"UI/UX Designer\", or \"Experience Designer\" roles.\n\
        If exact data for these is not found, default to \"Product Designer\" and estimate salaries based on the company location and industry standard for Design roles.\n\n\
        RULES:\n\
        1. Return ONLY a single valid JSON object.\n\
        2. Do NOT wrap the output in markdown code blocks.\n\
        3. Salaries must be annual.\n\n\
        JSON STRUCTURE:\n\
        {{\n  \
          \"companyName\": \"String\",\n  \
          \"type\": \"String (Product / Tech / Service / Platform)\",\n  \
          \"website\": \"String (URL)\",\n  \
          \"country\": \"String (HQ Location)\",\n  \
          \"companyType\": \"String (e.g. Startup, Scale-up, Enterprise)\",\n  \
          \"industryDomain\": \"String (e.g. SaaS, FinTech, AI)\",\n  \
          \"entryLevelSalary\": Number (Annual base salary integer for Junior/Entry Designer (0-2 yrs). Estimate if needed.),\n  \
          \"midLevelSalary\": Number (Annual base salary integer for Mid-Level Designer (2-5 yrs). Estimate if needed.),\n  \
          \"currency\": \"String (ISO code e.g. USD, VND)\",\n  \
          \"role\": \"String (Must be Design related, e.g. Product Designer)\",\n  \
          \"salaryExplanation\": \"String (Source or reasoning for the numbers)\",\n  \
          \"workplaceRating\": Number (Integer 1-5. Estimate the 'Great Place to Work' vibe based on benefits, culture pages, and reputation. 5 is best.),\n  \
          \"sizeRating\": Number (Integer 1-5. Estimate company size/scale. 1=Seed/Startup (<50), 3=Mid-size (200+), 5=Enterprise/Big Tech (1000+).)\n\
        }}\n\n\
        Analyze the URL now and return the JSON."
    )
}

/// Parse model output into company data. Markdown fences pasted along with
/// the JSON are tolerated.
pub fn parse_extraction(text: &str) -> IntelResult<CompanyData> {
    let fence = regex::Regex::new(r"```(?:json)?")
        .map_err(|e| IntelError::MalformedExtractionOutput(e.to_string()))?;
    let cleaned = fence.replace_all(text, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(IntelError::MalformedExtractionOutput(
            "Nothing to parse. Paste the entire JSON response.".to_string(),
        ));
    }

    serde_json::from_str::<CompanyData>(cleaned).map_err(|e| {
        warn!(error = %e, "extraction output did not parse");
        IntelError::MalformedExtractionOutput(format!(
            "{}. Please ensure you copied the entire JSON response.",
            e
        ))
    })
}

/// Parse pasted output, pinning the website to the URL the user asked about.
pub fn parse_for_url(text: &str, url: Option<&str>) -> IntelResult<CompanyData> {
    let mut data = parse_extraction(text)?;
    if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
        data.website = url.trim().to_string();
    }
    Ok(data)
}

/// Run one extraction through `provider`. The caller is responsible for
/// consulting the governor first.
pub fn extract_company(provider: &dyn ExtractionProvider, url: &str) -> IntelResult<CompanyData> {
    info!(%url, "requesting extraction");
    let response = provider.complete(&extraction_prompt(url))?;
    debug!(bytes = response.len(), "extraction response received");
    parse_for_url(&response, Some(url))
}
