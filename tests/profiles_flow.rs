mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct ProfileResponse {
    profile: ProfileView,
}

#[derive(Deserialize)]
struct OptionalProfileResponse {
    profile: Option<ProfileView>,
}

#[derive(Deserialize)]
struct ProfilesListResponse {
    profiles: Vec<ProfileView>,
}

#[derive(Deserialize)]
struct ProfileView {
    user_id: Uuid,
    title: Option<String>,
    skills: Vec<String>,
    hourly_rate: Option<f64>,
    location: Option<String>,
    available: bool,
    user: Option<OwnerView>,
}

#[derive(Deserialize)]
struct OwnerView {
    name: String,
    email: String,
}

#[tokio::test]
async fn upsert_creates_then_updates_in_place() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let client_id = app
        .insert_user("Carl", "carl@example.com", "pw", "client")
        .await?;
    let freelancer_id = app
        .insert_user("Freja", "freja@example.com", "pw", "freelancer")
        .await?;

    // Clients have no editable profile.
    let response = app
        .put_json(
            "/api/profiles/me",
            &json!({ "user_id": client_id, "title": "Sneaky" }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .put_json("/api/profiles/me", &json!({ "title": "No id" }))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // First save creates; skills arrive as a comma-delimited string.
    let response = app
        .put_json(
            "/api/profiles/me",
            &json!({
                "user_id": freelancer_id,
                "title": "Backend developer",
                "skills": "rust, diesel, postgres",
                "hourly_rate": 80.0,
                "location": "Lisbon",
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let created: ProfileResponse = serde_json::from_slice(&body)?;
    assert_eq!(created.profile.user_id, freelancer_id);
    assert_eq!(created.profile.skills, vec!["rust", "diesel", "postgres"]);
    assert!(created.profile.available);

    // Second save updates the same row; skills arrive as an array and
    // omitted fields clear.
    let response = app
        .put_json(
            "/api/profiles/me",
            &json!({
                "user_id": freelancer_id,
                "title": "Senior backend developer",
                "skills": ["rust", "axum"],
                "available": false,
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let updated: ProfileResponse = serde_json::from_slice(&body)?;
    assert_eq!(
        updated.profile.title.as_deref(),
        Some("Senior backend developer")
    );
    assert_eq!(updated.profile.skills, vec!["rust", "axum"]);
    assert!(updated.profile.hourly_rate.is_none());
    assert!(updated.profile.location.is_none());
    assert!(!updated.profile.available);

    // Still exactly one profile for the user.
    let response = app.get("/api/profiles", None).await?;
    let body = body_to_vec(response.into_body()).await?;
    let listing: ProfilesListResponse = serde_json::from_slice(&body)?;
    assert_eq!(listing.profiles.len(), 1);

    let response = app
        .get(&format!("/api/profiles/me?user_id={freelancer_id}"), None)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let fetched: OptionalProfileResponse = serde_json::from_slice(&body)?;
    assert!(fetched.profile.is_some());

    // Reading a missing profile is not an error; it is simply absent.
    let response = app
        .get(&format!("/api/profiles/me?user_id={}", Uuid::new_v4()), None)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let absent: OptionalProfileResponse = serde_json::from_slice(&body)?;
    assert!(absent.profile.is_none());

    let response = app.get("/api/profiles/me", None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn invalid_skills_payloads_are_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let freelancer_id = app
        .insert_user("Skilda", "skilda@example.com", "pw", "freelancer")
        .await?;

    let response = app
        .put_json(
            "/api/profiles/me",
            &json!({ "user_id": freelancer_id, "skills": ["rust", 42] }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .put_json(
            "/api/profiles/me",
            &json!({ "user_id": freelancer_id, "skills": {"main": "rust"} }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn search_matches_any_field_and_empty_query_is_superset() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let rust_dev = app
        .insert_user("Rita Rustacean", "rita@example.com", "pw", "freelancer")
        .await?;
    let designer = app
        .insert_user("Devon Designer", "devon@studio.example", "pw", "freelancer")
        .await?;
    app.insert_user("Clara Client", "clara@example.com", "pw", "client")
        .await?;

    let response = app
        .put_json(
            "/api/profiles/me",
            &json!({
                "user_id": rust_dev,
                "title": "Systems programmer",
                "bio": "Servers and pipelines",
                "skills": ["Rust", "Tokio"],
                "location": "Berlin",
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .put_json(
            "/api/profiles/me",
            &json!({
                "user_id": designer,
                "title": "Product designer",
                "bio": "Brands and identity",
                "skills": "figma, illustration",
                "location": "Porto",
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // No query and an empty query return the same full set.
    let response = app.get("/api/profiles", None).await?;
    let body = body_to_vec(response.into_body()).await?;
    let all: ProfilesListResponse = serde_json::from_slice(&body)?;
    assert_eq!(all.profiles.len(), 2);
    for profile in &all.profiles {
        assert!(profile.user.is_some(), "owner summary attached");
    }

    let response = app.get("/api/profiles?search=", None).await?;
    let body = body_to_vec(response.into_body()).await?;
    let empty_query: ProfilesListResponse = serde_json::from_slice(&body)?;
    assert_eq!(empty_query.profiles.len(), 2);

    // Case-insensitive skill match.
    let response = app.get("/api/profiles?search=rUsT", None).await?;
    let body = body_to_vec(response.into_body()).await?;
    let by_skill: ProfilesListResponse = serde_json::from_slice(&body)?;
    assert_eq!(by_skill.profiles.len(), 1);
    assert_eq!(by_skill.profiles[0].user_id, rust_dev);

    // Owner email domain matches too.
    let response = app.get("/api/profiles?search=studio.example", None).await?;
    let body = body_to_vec(response.into_body()).await?;
    let by_email: ProfilesListResponse = serde_json::from_slice(&body)?;
    assert_eq!(by_email.profiles.len(), 1);
    assert_eq!(by_email.profiles[0].user_id, designer);
    assert_eq!(
        by_email.profiles[0]
            .user
            .as_ref()
            .map(|user| user.name.as_str()),
        Some("Devon Designer")
    );

    // Location match.
    let response = app.get("/api/profiles?search=berlin", None).await?;
    let body = body_to_vec(response.into_body()).await?;
    let by_location: ProfilesListResponse = serde_json::from_slice(&body)?;
    assert_eq!(by_location.profiles.len(), 1);

    // No match.
    let response = app.get("/api/profiles?search=cobol", None).await?;
    let body = body_to_vec(response.into_body()).await?;
    let none: ProfilesListResponse = serde_json::from_slice(&body)?;
    assert!(none.profiles.is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn most_recently_updated_profile_lists_first() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let first = app
        .insert_user("Early Bird", "early@example.com", "pw", "freelancer")
        .await?;
    let second = app
        .insert_user("Late Riser", "late@example.com", "pw", "freelancer")
        .await?;

    let response = app
        .put_json(
            "/api/profiles/me",
            &json!({ "user_id": first, "title": "First profile" }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .put_json(
            "/api/profiles/me",
            &json!({ "user_id": second, "title": "Second profile" }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/api/profiles", None).await?;
    let body = body_to_vec(response.into_body()).await?;
    let listing: ProfilesListResponse = serde_json::from_slice(&body)?;
    assert_eq!(listing.profiles.len(), 2);
    assert_eq!(listing.profiles[0].user_id, second);

    // Updating the older profile moves it back to the front.
    let response = app
        .put_json(
            "/api/profiles/me",
            &json!({ "user_id": first, "title": "First profile, refreshed" }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/api/profiles", None).await?;
    let body = body_to_vec(response.into_body()).await?;
    let listing: ProfilesListResponse = serde_json::from_slice(&body)?;
    assert_eq!(listing.profiles[0].user_id, first);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn public_profile_read_requires_a_freelancer_owner() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let freelancer_id = app
        .insert_user("Paula Public", "paula@example.com", "pw", "freelancer")
        .await?;
    let client_id = app
        .insert_user("Quiet Client", "quiet@example.com", "pw", "client")
        .await?;

    let response = app
        .put_json(
            "/api/profiles/me",
            &json!({ "user_id": freelancer_id, "title": "Copywriter" }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .get(&format!("/api/profiles/{freelancer_id}"), None)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let fetched: ProfileResponse = serde_json::from_slice(&body)?;
    assert_eq!(fetched.profile.user_id, freelancer_id);
    assert_eq!(
        fetched
            .profile
            .user
            .as_ref()
            .map(|user| user.email.as_str()),
        Some("paula@example.com")
    );

    let response = app.get(&format!("/api/profiles/{client_id}"), None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .get(&format!("/api/profiles/{}", Uuid::new_v4()), None)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
