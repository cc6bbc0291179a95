use super::error::ApiError;
use super::AppState;
use crate::analysis::{AnalysisResult, ImageInput, ProblemInput, Subject};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Body of `POST /api/solve`
#[derive(Debug, Deserialize)]
pub struct SolveBody {
    pub subject: String,
    /// Data URL or bare base64
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl SolveBody {
    fn into_parts(self) -> Result<(Subject, ProblemInput), ApiError> {
        let subject: Subject = self.subject.parse()?;
        let input = ProblemInput {
            text: self.text.filter(|t| !t.trim().is_empty()),
            image: self
                .image
                .filter(|i| !i.trim().is_empty())
                .map(|i| ImageInput::from_data_url(&i)),
        };
        Ok((subject, input))
    }
}

pub async fn solve(
    State(state): State<AppState>,
    body: Result<Json<SolveBody>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let (subject, input) = body.into_parts()?;
    debug!(
        "Solve request: subject={} text={} image={}",
        subject,
        input.has_text(),
        input.image.is_some()
    );

    let result = state.orchestrator.solve(subject, &input).await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
