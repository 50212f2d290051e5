use super::{AppState, error::ApiResult, form::ParseForm};
use crate::gateway::TextBody;
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use serde::Serialize;

#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { status: "ok" })
}

#[derive(Serialize)]
pub struct PipelineBody {
    pub result: String,
    pub status: &'static str,
}

pub async fn file_parse_text(
    State(gateway): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<TextBody>> {
    let mut form = ParseForm::read(multipart?).await?;
    let doc = form.take_file()?;
    let opts = form.text_options(gateway.config())?;

    let outcome = gateway.parse_text(doc, opts).await?;
    Ok(Json(outcome.into_body(opts.return_content_list)))
}

pub async fn file_parse_pipeline(
    State(gateway): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PipelineBody>> {
    let mut form = ParseForm::read(multipart?).await?;
    let doc = form.take_file()?;
    let opts = form.pipeline_options(gateway.config())?;

    let result = gateway.parse_pipeline(doc, opts).await?;
    Ok(Json(PipelineBody {
        result,
        status: "success",
    }))
}
