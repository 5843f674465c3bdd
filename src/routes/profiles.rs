use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{NewProfile, Profile, ProfileChangeset, Role, User};
use crate::schema::{profiles, users};
use crate::state::AppState;

use super::jobs::to_iso;
use super::users::UserSummary;

#[derive(Deserialize)]
pub struct SaveProfileRequest {
    pub user_id: Option<Uuid>,
    pub title: Option<String>,
    pub bio: Option<String>,
    // Accepts either a JSON array of strings or one comma-delimited string.
    #[serde(default)]
    pub skills: Option<Value>,
    pub hourly_rate: Option<f64>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub avatar_url: Option<String>,
    pub available: Option<bool>,
}

#[derive(Deserialize)]
pub struct MyProfileQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct ProfileView {
    pub user_id: Uuid,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub avatar_url: Option<String>,
    pub available: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub ok: bool,
    pub profile: ProfileView,
}

#[derive(Serialize)]
pub struct OptionalProfileResponse {
    pub ok: bool,
    pub profile: Option<ProfileView>,
}

#[derive(Serialize)]
pub struct ProfilesListResponse {
    pub ok: bool,
    pub profiles: Vec<ProfileView>,
}

pub async fn save_my_profile(
    State(state): State<AppState>,
    Json(payload): Json<SaveProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::validation("user_id is required"))?;

    let mut conn = state.db()?;
    let owner: Option<User> = users::table.find(user_id).first(&mut conn).optional()?;
    match owner {
        Some(user) if Role::parse(&user.role) == Some(Role::Freelancer) => {}
        _ => return Err(AppError::forbidden("only freelancers can edit profile")),
    }

    let skills = normalize_skills(payload.skills.as_ref())?;
    let skills_json = Value::from(skills);
    let available = payload.available.unwrap_or(true);

    let new_profile = NewProfile {
        user_id,
        title: clean(payload.title),
        bio: clean(payload.bio),
        skills: skills_json.clone(),
        hourly_rate: payload.hourly_rate,
        location: clean(payload.location),
        phone: clean(payload.phone),
        website: clean(payload.website),
        avatar_url: clean(payload.avatar_url),
        available,
    };
    let changeset = ProfileChangeset {
        title: new_profile.title.clone(),
        bio: new_profile.bio.clone(),
        skills: skills_json,
        hourly_rate: new_profile.hourly_rate,
        location: new_profile.location.clone(),
        phone: new_profile.phone.clone(),
        website: new_profile.website.clone(),
        avatar_url: new_profile.avatar_url.clone(),
        available,
        updated_at: Utc::now().naive_utc(),
    };

    // Atomic create-or-replace keyed on user_id; concurrent first saves
    // cannot produce two rows.
    diesel::insert_into(profiles::table)
        .values(&new_profile)
        .on_conflict(profiles::user_id)
        .do_update()
        .set(&changeset)
        .execute(&mut conn)?;

    let profile: Profile = profiles::table.find(user_id).first(&mut conn)?;
    Ok(Json(ProfileResponse {
        ok: true,
        profile: profile_view(profile, None),
    }))
}

pub async fn my_profile(
    State(state): State<AppState>,
    Query(query): Query<MyProfileQuery>,
) -> AppResult<Json<OptionalProfileResponse>> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::validation("user_id is required"))?;

    let mut conn = state.db()?;
    let profile: Option<Profile> = profiles::table
        .find(user_id)
        .first(&mut conn)
        .optional()?;

    Ok(Json(OptionalProfileResponse {
        ok: true,
        profile: profile.map(|profile| profile_view(profile, None)),
    }))
}

pub async fn search_profiles(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ProfilesListResponse>> {
    let mut conn = state.db()?;

    // Role is checked at read time: only rows whose owner is currently a
    // freelancer are eligible.
    let rows: Vec<(Profile, User)> = profiles::table
        .inner_join(users::table)
        .filter(users::role.eq(Role::Freelancer.as_str()))
        .order(profiles::updated_at.desc())
        .load(&mut conn)?;

    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_lowercase();

    let views = rows
        .into_iter()
        .filter(|(profile, user)| needle.is_empty() || profile_matches(&needle, profile, user))
        .map(|(profile, user)| {
            let summary = UserSummary::from_user(&user);
            profile_view(profile, Some(summary))
        })
        .collect();

    Ok(Json(ProfilesListResponse {
        ok: true,
        profiles: views,
    }))
}

pub async fn profile_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ProfileResponse>> {
    let mut conn = state.db()?;
    let row: Option<(Profile, User)> = profiles::table
        .inner_join(users::table)
        .filter(profiles::user_id.eq(user_id))
        .first(&mut conn)
        .optional()?;

    match row {
        Some((profile, user)) if Role::parse(&user.role) == Some(Role::Freelancer) => {
            let summary = UserSummary::from_user(&user);
            Ok(Json(ProfileResponse {
                ok: true,
                profile: profile_view(profile, Some(summary)),
            }))
        }
        _ => Err(AppError::not_found("profile not found")),
    }
}

fn profile_view(profile: Profile, user: Option<UserSummary>) -> ProfileView {
    ProfileView {
        user_id: profile.user_id,
        title: profile.title,
        bio: profile.bio,
        skills: skills_from_value(&profile.skills),
        hourly_rate: profile.hourly_rate,
        location: profile.location,
        phone: profile.phone,
        website: profile.website,
        avatar_url: profile.avatar_url,
        available: profile.available,
        created_at: to_iso(profile.created_at),
        updated_at: to_iso(profile.updated_at),
        user,
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Skills arrive as either `["rust", "sql"]` or `"rust, sql"`; both collapse
/// into an ordered list of trimmed non-empty strings.
fn normalize_skills(raw: Option<&Value>) -> AppResult<Vec<String>> {
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(joined)) => Ok(joined
            .split(',')
            .map(str::trim)
            .filter(|skill| !skill.is_empty())
            .map(str::to_string)
            .collect()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(skill) => Ok(skill.trim().to_string()),
                _ => Err(AppError::validation(
                    "skills must be a list of strings or a comma-delimited string",
                )),
            })
            .filter(|skill| !matches!(skill, Ok(value) if value.is_empty()))
            .collect(),
        Some(_) => Err(AppError::validation(
            "skills must be a list of strings or a comma-delimited string",
        )),
    }
}

fn skills_from_value(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn profile_matches(needle: &str, profile: &Profile, user: &User) -> bool {
    let skills = skills_from_value(&profile.skills).join(" ");
    let fields = [
        profile.title.as_deref().unwrap_or_default(),
        profile.bio.as_deref().unwrap_or_default(),
        skills.as_str(),
        profile.location.as_deref().unwrap_or_default(),
        user.name.as_str(),
        user.email.as_str(),
    ];
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}
