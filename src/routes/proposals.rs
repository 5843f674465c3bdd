use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Job, NewProposal, Proposal, ProposalStatus, Role, User};
use crate::schema::{jobs, profiles, proposals, users};
use crate::state::AppState;

use super::jobs::{load_users_by_id, to_iso};

#[derive(Deserialize)]
pub struct CreateProposalRequest {
    pub job_id: Option<Uuid>,
    pub freelancer_id: Option<Uuid>,
    pub cover_letter: Option<String>,
    pub proposed_price: Option<f64>,
    pub delivery_time_days: Option<i32>,
}

#[derive(Deserialize)]
pub struct JobProposalsQuery {
    pub client_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateProposalStatusRequest {
    pub status: Option<String>,
    pub client_id: Option<Uuid>,
}

/// Counterparty block attached to enriched listings. `email` and `phone`
/// are populated only once the surrounding record is accepted; until then
/// the projection withholds them.
#[derive(Serialize)]
pub struct ContactCard {
    pub name: String,
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct ProposalJobView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner: Option<ContactCard>,
}

#[derive(Serialize)]
pub struct ProposalView {
    pub id: Uuid,
    pub job_id: Uuid,
    pub freelancer_id: Uuid,
    pub cover_letter: String,
    pub proposed_price: f64,
    pub delivery_time_days: i32,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freelancer: Option<ContactCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<ProposalJobView>,
}

#[derive(Serialize)]
pub struct ProposalResponse {
    pub ok: bool,
    pub proposal: ProposalView,
}

#[derive(Serialize)]
pub struct ProposalsListResponse {
    pub ok: bool,
    pub proposals: Vec<ProposalView>,
}

pub async fn create_proposal(
    State(state): State<AppState>,
    Json(payload): Json<CreateProposalRequest>,
) -> AppResult<Json<ProposalResponse>> {
    let job_id = payload
        .job_id
        .ok_or_else(|| AppError::validation("all fields are required"))?;
    let freelancer_id = payload
        .freelancer_id
        .ok_or_else(|| AppError::validation("all fields are required"))?;
    let cover_letter = payload
        .cover_letter
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::validation("all fields are required"))?;
    let proposed_price = payload
        .proposed_price
        .ok_or_else(|| AppError::validation("all fields are required"))?;
    let delivery_time_days = payload
        .delivery_time_days
        .ok_or_else(|| AppError::validation("all fields are required"))?;

    if !(proposed_price >= 0.0) {
        return Err(AppError::validation("proposed_price must not be negative"));
    }
    if delivery_time_days < 1 {
        return Err(AppError::validation(
            "delivery_time_days must be at least 1",
        ));
    }

    let mut conn = state.db()?;
    let freelancer: User = users::table
        .find(freelancer_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    if Role::parse(&freelancer.role) != Some(Role::Freelancer) {
        return Err(AppError::forbidden("only freelancers can send proposals"));
    }

    let job_exists = jobs::table
        .find(job_id)
        .first::<Job>(&mut conn)
        .optional()?
        .is_some();
    if !job_exists {
        return Err(AppError::not_found("job not found"));
    }

    let new_proposal = NewProposal {
        id: Uuid::new_v4(),
        job_id,
        freelancer_id,
        cover_letter: cover_letter.to_string(),
        proposed_price,
        delivery_time_days,
        status: ProposalStatus::Pending.as_str().to_string(),
    };

    // One proposal per (job, freelancer) in any status; the unique index
    // decides, so two concurrent submissions cannot both land.
    match diesel::insert_into(proposals::table)
        .values(&new_proposal)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::conflict("proposal already submitted"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let proposal: Proposal = proposals::table.find(new_proposal.id).first(&mut conn)?;
    Ok(Json(ProposalResponse {
        ok: true,
        proposal: bare_view(proposal),
    }))
}

pub async fn list_for_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<JobProposalsQuery>,
) -> AppResult<Json<ProposalsListResponse>> {
    let client_id = query
        .client_id
        .ok_or_else(|| AppError::validation("client_id is required"))?;

    let mut conn = state.db()?;
    let job: Job = jobs::table
        .find(job_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("job not found"))?;
    if job.owner_id != client_id {
        return Err(AppError::forbidden("not authorized to view proposals"));
    }

    let proposal_list: Vec<Proposal> = proposals::table
        .filter(proposals::job_id.eq(job_id))
        .order(proposals::created_at.desc())
        .load(&mut conn)?;

    let freelancer_ids: Vec<Uuid> = proposal_list
        .iter()
        .map(|proposal| proposal.freelancer_id)
        .collect();
    let freelancers = load_users_by_id(&mut conn, &freelancer_ids)?;
    let phones = load_phones(&mut conn, &freelancer_ids)?;

    let views = proposal_list
        .into_iter()
        .map(|proposal| {
            let accepted = ProposalStatus::parse(&proposal.status)
                == Some(ProposalStatus::Accepted);
            let freelancer = freelancers.get(&proposal.freelancer_id).map(|user| {
                contact_card(user, phones.get(&user.id).cloned().flatten(), accepted)
            });
            let mut view = bare_view(proposal);
            view.freelancer = freelancer;
            view
        })
        .collect();

    Ok(Json(ProposalsListResponse {
        ok: true,
        proposals: views,
    }))
}

pub async fn list_for_freelancer(
    State(state): State<AppState>,
    Path(freelancer_id): Path<Uuid>,
) -> AppResult<Json<ProposalsListResponse>> {
    let mut conn = state.db()?;
    let freelancer_exists = users::table
        .find(freelancer_id)
        .first::<User>(&mut conn)
        .optional()?
        .is_some();
    if !freelancer_exists {
        return Err(AppError::not_found("user not found"));
    }

    let proposal_list: Vec<Proposal> = proposals::table
        .filter(proposals::freelancer_id.eq(freelancer_id))
        .order(proposals::created_at.desc())
        .load(&mut conn)?;

    let job_ids: Vec<Uuid> = proposal_list.iter().map(|proposal| proposal.job_id).collect();
    let job_rows: Vec<Job> = if job_ids.is_empty() {
        Vec::new()
    } else {
        jobs::table
            .filter(jobs::id.eq_any(&job_ids))
            .load(&mut conn)?
    };
    let owner_ids: Vec<Uuid> = job_rows.iter().map(|job| job.owner_id).collect();
    let owners = load_users_by_id(&mut conn, &owner_ids)?;
    let job_map: HashMap<Uuid, Job> =
        job_rows.into_iter().map(|job| (job.id, job)).collect();

    let views = proposal_list
        .into_iter()
        .map(|proposal| {
            let accepted = ProposalStatus::parse(&proposal.status)
                == Some(ProposalStatus::Accepted);
            let job = job_map.get(&proposal.job_id).map(|job| ProposalJobView {
                id: job.id,
                title: job.title.clone(),
                description: job.description.clone(),
                owner: owners
                    .get(&job.owner_id)
                    .map(|owner| contact_card(owner, None, accepted)),
            });
            let mut view = bare_view(proposal);
            view.job = job;
            view
        })
        .collect();

    Ok(Json(ProposalsListResponse {
        ok: true,
        proposals: views,
    }))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(proposal_id): Path<Uuid>,
    Json(payload): Json<UpdateProposalStatusRequest>,
) -> AppResult<Json<ProposalResponse>> {
    let next = payload
        .status
        .as_deref()
        .and_then(ProposalStatus::parse)
        .filter(|status| {
            matches!(status, ProposalStatus::Accepted | ProposalStatus::Rejected)
        })
        .ok_or_else(|| AppError::validation("invalid status"))?;
    let client_id = payload
        .client_id
        .ok_or_else(|| AppError::validation("client_id is required"))?;

    let mut conn = state.db()?;
    let proposal: Proposal = proposals::table
        .find(proposal_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("proposal not found"))?;

    let job: Job = jobs::table.find(proposal.job_id).first(&mut conn)?;
    if job.owner_id != client_id {
        return Err(AppError::forbidden(
            "only the job owner can update proposal status",
        ));
    }

    let current = ProposalStatus::parse(&proposal.status)
        .ok_or_else(|| AppError::internal("proposal has unknown status"))?;
    if !current.can_transition_to(next) {
        return Err(AppError::conflict(format!(
            "proposal already {}",
            proposal.status
        )));
    }

    // Compare-and-swap: the row is only touched while still pending, so a
    // losing concurrent transition matches zero rows instead of clobbering.
    let updated = diesel::update(
        proposals::table
            .find(proposal_id)
            .filter(proposals::status.eq(ProposalStatus::Pending.as_str())),
    )
    .set((
        proposals::status.eq(next.as_str()),
        proposals::updated_at.eq(Utc::now().naive_utc()),
    ))
    .execute(&mut conn)?;

    let proposal: Proposal = proposals::table.find(proposal_id).first(&mut conn)?;
    if updated == 0 {
        return Err(AppError::conflict(format!(
            "proposal already {}",
            proposal.status
        )));
    }

    Ok(Json(ProposalResponse {
        ok: true,
        proposal: bare_view(proposal),
    }))
}

fn bare_view(proposal: Proposal) -> ProposalView {
    ProposalView {
        id: proposal.id,
        job_id: proposal.job_id,
        freelancer_id: proposal.freelancer_id,
        cover_letter: proposal.cover_letter,
        proposed_price: proposal.proposed_price,
        delivery_time_days: proposal.delivery_time_days,
        status: proposal.status,
        created_at: to_iso(proposal.created_at),
        updated_at: to_iso(proposal.updated_at),
        freelancer: None,
        job: None,
    }
}

pub(super) fn contact_card(user: &User, phone: Option<String>, revealed: bool) -> ContactCard {
    ContactCard {
        name: user.name.clone(),
        email: revealed.then(|| user.email.clone()),
        phone: if revealed { phone } else { None },
    }
}

fn load_phones(
    conn: &mut PgConnection,
    user_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Option<String>>> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, Option<String>)> = profiles::table
        .filter(profiles::user_id.eq_any(user_ids))
        .select((profiles::user_id, profiles::phone))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}
