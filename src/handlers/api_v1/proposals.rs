use actix_session::Session;
use actix_web::{web, HttpResponse};

use super::current_actor;
use crate::errors::AppError;
use crate::models::proposal::{NewProposal, ProposalPayload};
use crate::workflow::WorkflowEngine;

/// GET /api/v1/proposals - Active proposals visible to the actor.
pub async fn list(
    engine: web::Data<WorkflowEngine>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let proposals = engine.list_proposals(&ctx).await?;
    Ok(HttpResponse::Ok().json(proposals))
}

/// POST /api/v1/proposals - Submit a new proposal for the president's club.
pub async fn create(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    body: web::Json<NewProposal>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let proposal = engine.create_proposal(&ctx, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(proposal))
}

/// GET /api/v1/proposals/{id}
pub async fn read(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let detail = engine.get_proposal(&ctx, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// PUT /api/v1/proposals/{id} - Replace event details, occurrences and
/// participants. Status does not change.
pub async fn update(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<ProposalPayload>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let proposal = engine.edit_proposal(&ctx, path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(proposal))
}

/// GET /api/v1/proposals/{id}/audit
pub async fn audit_trail(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let entries = engine.audit_trail(&ctx, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(entries))
}
