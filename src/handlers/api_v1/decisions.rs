use actix_session::Session;
use actix_web::{web, HttpResponse};

use super::current_actor;
use crate::errors::AppError;
use crate::models::proposal::{DirectorDecisionForm, LeadDecisionForm, StudentUnionDecisionForm};
use crate::workflow::WorkflowEngine;

/// POST /api/v1/proposals/{id}/lead-decision
pub async fn lead(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<LeadDecisionForm>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let proposal = engine
        .record_lead_decision(&ctx, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(proposal))
}

/// POST /api/v1/proposals/{id}/student-union-decision
pub async fn student_union(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<StudentUnionDecisionForm>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let proposal = engine
        .record_student_union_decision(&ctx, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(proposal))
}

/// POST /api/v1/proposals/{id}/director-decision
pub async fn director(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<DirectorDecisionForm>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let proposal = engine
        .record_director_decision(&ctx, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(proposal))
}

/// POST /api/v1/proposals/{id}/resubmit
pub async fn resubmit(
    engine: web::Data<WorkflowEngine>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = current_actor(&engine, &session).await?;
    let proposal = engine.resubmit(&ctx, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(proposal))
}
