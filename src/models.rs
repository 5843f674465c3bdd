use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

/// Account roles. Stored as text in `users.role`; immutable after signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Freelancer,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "client" => Some(Role::Client),
            "freelancer" => Some(Role::Freelancer),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Freelancer => "freelancer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ProposalStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ProposalStatus::Pending),
            "accepted" => Some(ProposalStatus::Accepted),
            "rejected" => Some(ProposalStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
        }
    }

    /// Transition table: pending may resolve to accepted or rejected, both
    /// terminal. Every other combination is illegal.
    pub fn can_transition_to(self, next: ProposalStatus) -> bool {
        matches!(
            (self, next),
            (ProposalStatus::Pending, ProposalStatus::Accepted)
                | (ProposalStatus::Pending, ProposalStatus::Rejected)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl InvitationStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "rejected" => Some(InvitationStatus::Rejected),
            "cancelled" => Some(InvitationStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
            InvitationStatus::Cancelled => "cancelled",
        }
    }

    /// Transition table: only pending invitations may be resolved. Cancelled
    /// is a terminal state no operation currently produces; it still counts
    /// as resolved for the pending-uniqueness rule.
    pub fn can_transition_to(self, next: InvitationStatus) -> bool {
        matches!(
            (self, next),
            (InvitationStatus::Pending, InvitationStatus::Accepted)
                | (InvitationStatus::Pending, InvitationStatus::Rejected)
                | (InvitationStatus::Pending, InvitationStatus::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub provider: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub provider: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = jobs)]
#[diesel(belongs_to(User, foreign_key = owner_id))]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub budget: f64,
    pub category: String,
    pub owner_id: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub budget: f64,
    pub category: String,
    pub owner_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = job_applicants)]
#[diesel(belongs_to(Job))]
#[diesel(belongs_to(User))]
#[diesel(primary_key(job_id, user_id))]
pub struct JobApplicant {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub applied_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_applicants)]
pub struct NewJobApplicant {
    pub job_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = proposals)]
#[diesel(belongs_to(Job))]
pub struct Proposal {
    pub id: Uuid,
    pub job_id: Uuid,
    pub freelancer_id: Uuid,
    pub cover_letter: String,
    pub proposed_price: f64,
    pub delivery_time_days: i32,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = proposals)]
pub struct NewProposal {
    pub id: Uuid,
    pub job_id: Uuid,
    pub freelancer_id: Uuid,
    pub cover_letter: String,
    pub proposed_price: f64,
    pub delivery_time_days: i32,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = invitations)]
#[diesel(belongs_to(Job))]
pub struct Invitation {
    pub id: Uuid,
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub freelancer_id: Uuid,
    pub message: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invitations)]
pub struct NewInvitation {
    pub id: Uuid,
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub freelancer_id: Uuid,
    pub message: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = profiles)]
#[diesel(belongs_to(User))]
#[diesel(primary_key(user_id))]
pub struct Profile {
    pub user_id: Uuid,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub skills: serde_json::Value,
    pub hourly_rate: Option<f64>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub avatar_url: Option<String>,
    pub available: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub user_id: Uuid,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub skills: serde_json::Value,
    pub hourly_rate: Option<f64>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub avatar_url: Option<String>,
    pub available: bool,
}

// Full-overwrite changeset for the profile upsert: omitted fields clear.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = profiles)]
#[diesel(treat_none_as_null = true)]
pub struct ProfileChangeset {
    pub title: Option<String>,
    pub bio: Option<String>,
    pub skills: serde_json::Value,
    pub hourly_rate: Option<f64>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub avatar_url: Option<String>,
    pub available: bool,
    pub updated_at: NaiveDateTime,
}
