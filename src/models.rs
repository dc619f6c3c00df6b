use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// --- Guard Contract ---

/// UnauthorizedParams
///
/// The three diagnostic query parameters attached to a wrong-role redirect
/// (`/unauthorized?user_role=..&path_tried=..&correct_role=..`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UnauthorizedParams {
    /// The role the caller actually has.
    pub user_role: String,
    /// The attempted path, without its leading slash.
    pub path_tried: String,
    /// The role the path requires: `admin` or `user`.
    pub correct_role: String,
}

/// UnauthorizedQuery
///
/// Lenient view of the same parameters for the access-denied page, which may be
/// opened directly without any of them.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct UnauthorizedQuery {
    pub user_role: Option<String>,
    pub path_tried: Option<String>,
    pub correct_role: Option<String>,
}

// --- Page Payloads (Output Schemas) ---

/// AccessDeniedResponse
///
/// Body of `GET /unauthorized`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AccessDeniedResponse {
    pub user_role: String,
    pub path_tried: String,
    pub correct_role: String,
    pub message: String,
}

/// UserProfile
///
/// The signed-in caller as resolved by the guard.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: String,
}

/// HomeResponse
///
/// Body of the public landing page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HomeResponse {
    pub message: String,
    pub signed_in: bool,
    // Present only when a session was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub message: String,
    pub signed_in: bool,
}

/// DashboardResponse
///
/// Body of the scoped dashboards (`/user`, `/admin`). `scope` names the area reached.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DashboardResponse {
    pub scope: String,
    pub user: UserProfile,
}
