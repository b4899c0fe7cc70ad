use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::current_actor;
use crate::errors::AppError;
use crate::workflow::WorkflowEngine;

#[derive(Debug, Deserialize)]
pub struct ClubQuery {
    pub club_id: Option<i64>,
}

/// POST /api/v1/proposals/{id}/archive
pub async fn archive(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let proposal = engine.archive(&ctx, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(proposal))
}

/// POST /api/v1/proposals/{id}/restore
pub async fn restore(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let proposal = engine.restore(&ctx, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(proposal))
}

/// DELETE /api/v1/proposals/{id} - Permanent delete.
pub async fn delete(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    engine.delete_permanently(&ctx, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/v1/archive?club_id= - Archived proposals, after the retention sweep.
pub async fn list(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    query: web::Query<ClubQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let proposals = engine.list_archived(&ctx, query.club_id).await?;
    Ok(HttpResponse::Ok().json(proposals))
}

/// DELETE /api/v1/archive?club_id= - Permanently delete the whole archive.
pub async fn empty(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    query: web::Query<ClubQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let deleted = engine.empty_archive(&ctx, query.club_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "deleted": deleted })))
}
