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
use crate::models::{Invitation, InvitationStatus, Job, NewInvitation, Role, User};
use crate::schema::{invitations, jobs, users};
use crate::state::AppState;

use super::jobs::{load_users_by_id, to_iso};
use super::proposals::{contact_card, ContactCard};

#[derive(Deserialize)]
pub struct CreateInvitationRequest {
    pub job_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub freelancer_id: Option<Uuid>,
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct InboxQuery {
    pub freelancer_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct SentQuery {
    pub client_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub status: Option<String>,
    pub freelancer_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct InvitationJobView {
    pub id: Uuid,
    pub title: String,
}

#[derive(Serialize)]
pub struct InvitationView {
    pub id: Uuid,
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub freelancer_id: Uuid,
    pub message: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<InvitationJobView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ContactCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freelancer: Option<ContactCard>,
}

#[derive(Serialize)]
pub struct InvitationResponse {
    pub ok: bool,
    pub invitation: InvitationView,
}

#[derive(Serialize)]
pub struct InvitationsListResponse {
    pub ok: bool,
    pub invitations: Vec<InvitationView>,
}

pub async fn create_invitation(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvitationRequest>,
) -> AppResult<Json<InvitationResponse>> {
    let (job_id, client_id, freelancer_id) = match (
        payload.job_id,
        payload.client_id,
        payload.freelancer_id,
    ) {
        (Some(job_id), Some(client_id), Some(freelancer_id)) => {
            (job_id, client_id, freelancer_id)
        }
        _ => {
            return Err(AppError::validation(
                "job_id, client_id and freelancer_id are required",
            ))
        }
    };

    let mut conn = state.db()?;
    let job: Job = jobs::table
        .find(job_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("job not found"))?;
    if job.owner_id != client_id {
        return Err(AppError::forbidden("only the job owner can invite"));
    }

    // Rejected before the role lookup so the rule holds no matter what the
    // actor's role is.
    if freelancer_id == client_id {
        return Err(AppError::validation("cannot invite yourself"));
    }

    let freelancer: Option<User> = users::table
        .find(freelancer_id)
        .first(&mut conn)
        .optional()?;
    let freelancer = match freelancer {
        Some(user) if Role::parse(&user.role) == Some(Role::Freelancer) => user,
        _ => return Err(AppError::validation("invalid freelancer")),
    };

    let new_invitation = NewInvitation {
        id: Uuid::new_v4(),
        job_id,
        client_id,
        freelancer_id,
        message: payload
            .message
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty()),
        status: InvitationStatus::Pending.as_str().to_string(),
    };

    // The partial unique index over pending rows arbitrates concurrent
    // invites; resolved invitations do not occupy the slot.
    match diesel::insert_into(invitations::table)
        .values(&new_invitation)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::conflict(
                "invite already pending for this freelancer",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let invitation: Invitation = invitations::table
        .find(new_invitation.id)
        .first(&mut conn)?;
    let client: User = users::table.find(client_id).first(&mut conn)?;
    let view = enriched_view(invitation, Some(&job), Some(&client), Some(&freelancer));

    Ok(Json(InvitationResponse {
        ok: true,
        invitation: view,
    }))
}

pub async fn list_for_freelancer(
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> AppResult<Json<InvitationsListResponse>> {
    let freelancer_id = query
        .freelancer_id
        .ok_or_else(|| AppError::validation("freelancer_id is required"))?;

    let mut conn = state.db()?;
    let invitation_list: Vec<Invitation> = invitations::table
        .filter(invitations::freelancer_id.eq(freelancer_id))
        .order(invitations::created_at.desc())
        .load(&mut conn)?;

    let views = compose_views(&mut conn, invitation_list)?;
    Ok(Json(InvitationsListResponse {
        ok: true,
        invitations: views,
    }))
}

pub async fn list_for_client(
    State(state): State<AppState>,
    Query(query): Query<SentQuery>,
) -> AppResult<Json<InvitationsListResponse>> {
    let client_id = query
        .client_id
        .ok_or_else(|| AppError::validation("client_id is required"))?;

    let mut conn = state.db()?;
    let invitation_list: Vec<Invitation> = invitations::table
        .filter(invitations::client_id.eq(client_id))
        .order(invitations::created_at.desc())
        .load(&mut conn)?;

    let views = compose_views(&mut conn, invitation_list)?;
    Ok(Json(InvitationsListResponse {
        ok: true,
        invitations: views,
    }))
}

pub async fn respond(
    State(state): State<AppState>,
    Path(invitation_id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> AppResult<Json<InvitationResponse>> {
    let next = payload
        .status
        .as_deref()
        .and_then(InvitationStatus::parse)
        .filter(|status| {
            matches!(
                status,
                InvitationStatus::Accepted | InvitationStatus::Rejected
            )
        })
        .ok_or_else(|| AppError::validation("invalid status"))?;
    let freelancer_id = payload
        .freelancer_id
        .ok_or_else(|| AppError::validation("freelancer_id is required"))?;

    let mut conn = state.db()?;
    let invitation: Invitation = invitations::table
        .find(invitation_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("invitation not found"))?;

    if invitation.freelancer_id != freelancer_id {
        return Err(AppError::forbidden(
            "only the invited freelancer can respond",
        ));
    }

    let current = InvitationStatus::parse(&invitation.status)
        .ok_or_else(|| AppError::internal("invitation has unknown status"))?;
    if !current.can_transition_to(next) {
        return Err(AppError::conflict(format!(
            "invitation already {}",
            invitation.status
        )));
    }

    let updated = diesel::update(
        invitations::table
            .find(invitation_id)
            .filter(invitations::status.eq(InvitationStatus::Pending.as_str())),
    )
    .set((
        invitations::status.eq(next.as_str()),
        invitations::updated_at.eq(Utc::now().naive_utc()),
    ))
    .execute(&mut conn)?;

    let invitation: Invitation = invitations::table.find(invitation_id).first(&mut conn)?;
    if updated == 0 {
        return Err(AppError::conflict(format!(
            "invitation already {}",
            invitation.status
        )));
    }

    let mut views = compose_views(&mut conn, vec![invitation])?;
    let view = views
        .pop()
        .ok_or_else(|| AppError::internal("failed to compose invitation"))?;

    Ok(Json(InvitationResponse {
        ok: true,
        invitation: view,
    }))
}

fn compose_views(
    conn: &mut PgConnection,
    invitation_list: Vec<Invitation>,
) -> AppResult<Vec<InvitationView>> {
    let job_ids: Vec<Uuid> = invitation_list.iter().map(|invite| invite.job_id).collect();
    let mut user_ids: Vec<Uuid> = Vec::with_capacity(invitation_list.len() * 2);
    for invite in &invitation_list {
        user_ids.push(invite.client_id);
        user_ids.push(invite.freelancer_id);
    }

    let job_rows: Vec<Job> = if job_ids.is_empty() {
        Vec::new()
    } else {
        jobs::table.filter(jobs::id.eq_any(&job_ids)).load(conn)?
    };
    let job_map: HashMap<Uuid, Job> =
        job_rows.into_iter().map(|job| (job.id, job)).collect();
    let user_map = load_users_by_id(conn, &user_ids)?;

    Ok(invitation_list
        .into_iter()
        .map(|invite| {
            let job = job_map.get(&invite.job_id);
            let client = user_map.get(&invite.client_id);
            let freelancer = user_map.get(&invite.freelancer_id);
            enriched_view(invite, job, client, freelancer)
        })
        .collect())
}

fn enriched_view(
    invitation: Invitation,
    job: Option<&Job>,
    client: Option<&User>,
    freelancer: Option<&User>,
) -> InvitationView {
    let accepted =
        InvitationStatus::parse(&invitation.status) == Some(InvitationStatus::Accepted);
    InvitationView {
        id: invitation.id,
        job_id: invitation.job_id,
        client_id: invitation.client_id,
        freelancer_id: invitation.freelancer_id,
        message: invitation.message,
        status: invitation.status,
        created_at: to_iso(invitation.created_at),
        updated_at: to_iso(invitation.updated_at),
        job: job.map(|job| InvitationJobView {
            id: job.id,
            title: job.title.clone(),
        }),
        client: client.map(|user| contact_card(user, None, accepted)),
        freelancer: freelancer.map(|user| contact_card(user, None, accepted)),
    }
}
