//! HTTP clients for the session-initiation and submission services.

use assess_core::model::{GradeReport, Quiz, QuizId, SubmissionPayload};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use url::Url;

use crate::bundle::QuizBundle;
use crate::config::EngineConfig;
use crate::error::{InitiationError, SubmissionError};
use crate::initiation::InitiationService;
use crate::submission::Grader;

#[derive(Clone, Debug)]
struct Endpoint {
    base_url: Url,
    token: Option<String>,
}

impl Endpoint {
    fn from_config(config: &EngineConfig) -> Option<Self> {
        config.api_base_url.clone().map(|base_url| Self {
            base_url,
            token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// `POST {base}/quizzes/{quiz_id}/sessions`.
#[derive(Clone)]
pub struct HttpInitiationService {
    client: Client,
    endpoint: Option<Endpoint>,
}

impl HttpInitiationService {
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: Endpoint::from_config(config),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[async_trait]
impl InitiationService for HttpInitiationService {
    async fn initiate(&self, quiz_id: QuizId) -> Result<Quiz, InitiationError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or(InitiationError::NotConfigured)?;

        let url = endpoint.url(&format!("quizzes/{quiz_id}/sessions"));
        let response = endpoint.authorize(self.client.post(url)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(InitiationError::UnknownQuiz(quiz_id)),
            status if !status.is_success() => return Err(InitiationError::HttpStatus(status)),
            _ => {}
        }

        let bundle: QuizBundle = response.json().await?;
        Ok(bundle.into_quiz(quiz_id)?)
    }
}

/// `POST {base}/sessions/{session_id}/submission`.
///
/// Without a base URL every call reports `NotImplemented`, which sends the
/// coordinator straight to local grading.
#[derive(Clone)]
pub struct HttpSubmissionService {
    client: Client,
    endpoint: Option<Endpoint>,
}

impl HttpSubmissionService {
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: Endpoint::from_config(config),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[async_trait]
impl Grader for HttpSubmissionService {
    async fn grade(
        &self,
        _quiz: &Quiz,
        payload: &SubmissionPayload,
    ) -> Result<GradeReport, SubmissionError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or(SubmissionError::NotImplemented)?;

        let url = endpoint.url(&format!("sessions/{}/submission", payload.session_id));
        let response = endpoint
            .authorize(self.client.post(url))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_IMPLEMENTED => Err(SubmissionError::NotImplemented),
            status if !status.is_success() => Err(SubmissionError::HttpStatus(status)),
            _ => Ok(response.json().await?),
        }
    }
}
