use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Job, JobApplicant, NewJob, NewJobApplicant, Role, User};
use crate::schema::{job_applicants, jobs, users};
use crate::state::AppState;

use super::users::UserSummary;

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub budget: Option<f64>,
    pub category: Option<String>,
    pub owner_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ActorRequest {
    pub user_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct JobView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub budget: f64,
    pub category: String,
    pub owner_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserSummary>,
    pub applicants: Vec<Uuid>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct JobResponse {
    pub ok: bool,
    pub job: JobView,
}

#[derive(Serialize)]
pub struct JobsListResponse {
    pub ok: bool,
    pub jobs: Vec<JobView>,
}

#[derive(Serialize)]
pub struct AckResponse {
    pub ok: bool,
    pub message: String,
}

pub async fn create_job(
    State(state): State<AppState>,
    Json(payload): Json<CreateJobRequest>,
) -> AppResult<Json<JobResponse>> {
    let title = required_field(payload.title.as_deref())?;
    let description = required_field(payload.description.as_deref())?;
    let category = required_field(payload.category.as_deref())?;
    let owner_id = payload
        .owner_id
        .ok_or_else(|| AppError::validation("all fields are required"))?;
    let budget = payload
        .budget
        .ok_or_else(|| AppError::validation("all fields are required"))?;
    if !(budget > 0.0) {
        return Err(AppError::validation("budget must be a positive number"));
    }

    let mut conn = state.db()?;
    let owner: User = users::table
        .find(owner_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    if Role::parse(&owner.role) != Some(Role::Client) {
        return Err(AppError::forbidden("only clients can post jobs"));
    }

    let new_job = NewJob {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: description.to_string(),
        budget,
        category: category.to_string(),
        owner_id,
    };
    diesel::insert_into(jobs::table)
        .values(&new_job)
        .execute(&mut conn)?;

    let job: Job = jobs::table.find(new_job.id).first(&mut conn)?;
    Ok(Json(JobResponse {
        ok: true,
        job: job_view(job, Some(&owner), Vec::new()),
    }))
}

pub async fn list_jobs(State(state): State<AppState>) -> AppResult<Json<JobsListResponse>> {
    let mut conn = state.db()?;

    let job_list: Vec<Job> = jobs::table.order(jobs::created_at.desc()).load(&mut conn)?;
    let job_ids: Vec<Uuid> = job_list.iter().map(|job| job.id).collect();
    let owner_ids: Vec<Uuid> = job_list.iter().map(|job| job.owner_id).collect();

    let mut applicants_map = load_applicants(&mut conn, &job_ids)?;
    let owners = load_users_by_id(&mut conn, &owner_ids)?;

    let views = job_list
        .into_iter()
        .map(|job| {
            let owner = owners.get(&job.owner_id);
            let applicants = applicants_map.remove(&job.id).unwrap_or_default();
            job_view(job, owner, applicants)
        })
        .collect();

    Ok(Json(JobsListResponse {
        ok: true,
        jobs: views,
    }))
}

pub async fn apply_to_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<ActorRequest>,
) -> AppResult<Json<JobResponse>> {
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::validation("user_id is required"))?;

    let mut conn = state.db()?;
    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    if Role::parse(&user.role) != Some(Role::Freelancer) {
        return Err(AppError::forbidden("only freelancers can apply"));
    }

    let job: Job = jobs::table
        .find(job_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("job not found"))?;

    // The composite primary key on (job_id, user_id) makes a repeat
    // application a database conflict even under concurrent requests.
    match diesel::insert_into(job_applicants::table)
        .values(&NewJobApplicant { job_id, user_id })
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::conflict("already applied"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let owner = load_users_by_id(&mut conn, &[job.owner_id])?;
    let applicants = load_applicants(&mut conn, &[job.id])?
        .remove(&job.id)
        .unwrap_or_default();
    Ok(Json(JobResponse {
        ok: true,
        job: job_view(job.clone(), owner.get(&job.owner_id), applicants),
    }))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<ActorRequest>,
) -> AppResult<Json<AckResponse>> {
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::validation("user_id is required"))?;

    let mut conn = state.db()?;
    let job: Job = jobs::table
        .find(job_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("job not found"))?;

    if job.owner_id != user_id {
        return Err(AppError::forbidden("not authorized"));
    }

    // Proposals, invitations and applicant rows go with the job via
    // ON DELETE CASCADE.
    diesel::delete(jobs::table.find(job_id)).execute(&mut conn)?;

    Ok(Json(AckResponse {
        ok: true,
        message: "job deleted".to_string(),
    }))
}

pub(super) fn job_view(job: Job, owner: Option<&User>, applicants: Vec<Uuid>) -> JobView {
    JobView {
        id: job.id,
        title: job.title,
        description: job.description,
        budget: job.budget,
        category: job.category,
        owner_id: job.owner_id,
        owner: owner.map(UserSummary::from_user),
        applicants,
        created_at: to_iso(job.created_at),
        updated_at: to_iso(job.updated_at),
    }
}

pub(super) fn load_users_by_id(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> AppResult<HashMap<Uuid, User>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<User> = users::table
        .filter(users::id.eq_any(ids))
        .load(conn)?;
    Ok(rows.into_iter().map(|user| (user.id, user)).collect())
}

fn load_applicants(
    conn: &mut PgConnection,
    job_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<Uuid>>> {
    if job_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<JobApplicant> = job_applicants::table
        .filter(job_applicants::job_id.eq_any(job_ids))
        .order(job_applicants::applied_at.asc())
        .load(conn)?;

    let mut map: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in rows {
        map.entry(row.job_id).or_default().push(row.user_id);
    }
    Ok(map)
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

fn required_field(value: Option<&str>) -> AppResult<&str> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .ok_or_else(|| AppError::validation("all fields are required"))
}
