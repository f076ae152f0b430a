//! External document-analysis collaborator
//!
//! The analysis service is a black box: it receives an uploaded file and
//! returns extracted fields plus free-form insights. Its output feeds the
//! normalizer unchanged. The only contract this module enforces is the
//! document lifecycle: a failed analysis leaves the document in `error`
//! status, never stuck in `processing`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::Document;
use crate::normalize::{self, DateFallback};

/// Environment variable naming the analysis service base URL
pub const ANALYSIS_URL_ENV: &str = "CONTAAI_ANALYSIS_URL";
/// Optional API key for the analysis service
pub const ANALYSIS_KEY_ENV: &str = "CONTAAI_ANALYSIS_KEY";

/// Fields the analysis service extracts from a document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub description: String,
    /// Free-text amount ("1.234,56 RON"); parsed by the normalizer
    pub amount: String,
    pub category: String,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    /// Free-text date; parsed by the normalizer
    #[serde(default)]
    pub document_date: String,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub cui: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Analysis service configuration (env or TOML file)
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl AnalysisConfig {
    /// Read configuration from the environment; None when not configured
    pub fn from_env() -> Option<Self> {
        let url = std::env::var(ANALYSIS_URL_ENV).ok()?;
        Some(Self {
            url,
            api_key: std::env::var(ANALYSIS_KEY_ENV).ok(),
            timeout_secs: default_timeout_secs(),
        })
    }

    /// Read configuration from a TOML file with an `[analysis]` table
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        #[derive(Deserialize)]
        struct ConfigFile {
            analysis: AnalysisConfig,
        }
        let raw = std::fs::read_to_string(path)?;
        let parsed: ConfigFile = toml::from_str(&raw)
            .map_err(|e| Error::InvalidData(format!("Invalid analysis config: {}", e)))?;
        Ok(parsed.analysis)
    }
}

/// Request body sent to the analysis service
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    file_name: &'a str,
    file_type: Option<&'a str>,
    /// Base64 payload
    file_data: &'a str,
}

/// HTTP client for the analysis service
#[derive(Clone)]
pub struct AnalysisClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AnalysisClient {
    pub fn new(config: AnalysisConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        }
    }

    /// Build a client from the environment; None when not configured
    pub fn from_env() -> Option<Self> {
        AnalysisConfig::from_env().map(Self::new)
    }

    pub fn host(&self) -> &str {
        &self.base_url
    }

    /// Check whether the service answers its health endpoint
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Submit a document for analysis
    pub async fn analyze_document(
        &self,
        file_name: &str,
        file_type: Option<&str>,
        file_data: &str,
    ) -> Result<DocumentAnalysis> {
        let url = format!("{}/analyze", self.base_url);
        let mut request = self.http.post(&url).json(&AnalyzeRequest {
            file_name,
            file_type,
            file_data,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Analysis(format!(
                "Analysis service returned {}",
                response.status()
            )));
        }

        Ok(response.json::<DocumentAnalysis>().await?)
    }
}

/// Run a stored document through analysis and write the results back.
///
/// On success the document carries the extracted fields, one generated
/// transaction and `completed` status. On any failure the document is
/// marked `error` before the error propagates.
pub async fn process_document(
    db: &Database,
    client: &AnalysisClient,
    company_id: i64,
    document_id: i64,
    today: NaiveDate,
) -> Result<Document> {
    let document = db
        .get_document(company_id, document_id)?
        .ok_or_else(|| Error::NotFound(format!("Document {}", document_id)))?;

    let file_data = db
        .get_document_file_data(company_id, document_id)?
        .unwrap_or_default();

    let analysis = match client
        .analyze_document(
            &document.file_name,
            document.file_type.as_deref(),
            &file_data,
        )
        .await
    {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!(document_id, error = %e, "Document analysis failed");
            db.mark_document_error(company_id, document_id)?;
            return Err(e);
        }
    };

    let transaction =
        normalize::transaction_from_analysis(&analysis, DateFallback::Today(today));
    db.apply_document_analysis(company_id, document_id, &analysis, &[transaction])?;

    info!(
        document_id,
        confidence = analysis.confidence,
        "Document analysis complete"
    );

    db.get_document(company_id, document_id)?
        .ok_or_else(|| Error::NotFound(format!("Document {}", document_id)))
}
