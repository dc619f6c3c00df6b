use url::form_urlencoded;

use crate::models::UnauthorizedParams;

/// Role carried by administrators.
pub const ADMIN_ROLE: &str = "admin";
/// Role carried by regular members, and the fallback for a token without a claim.
pub const USER_ROLE: &str = "user";

/// PathClass
///
/// Category of a request path, computed purely from the path string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Reachable without a session.
    Public,
    /// Requires the `admin` role.
    AdminScoped,
    /// Requires the `user` or `admin` role.
    UserScoped,
    /// Any path not covered above. Requires a session but no particular role.
    DefaultProtected,
}

/// AccessRules
///
/// The fixed route table the guard evaluates against, plus the two redirect targets
/// other pages depend on.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRules {
    pub public_paths: Vec<String>,
    pub admin_prefix: String,
    pub user_prefix: String,
    pub login_path: String,
    pub unauthorized_path: String,
}

impl Default for AccessRules {
    fn default() -> Self {
        Self {
            public_paths: vec!["/".into(), "/login".into(), "/unauthorized".into()],
            admin_prefix: "/admin".into(),
            user_prefix: "/user".into(),
            login_path: "/login".into(),
            unauthorized_path: "/unauthorized".into(),
        }
    }
}

impl AccessRules {
    /// classify
    ///
    /// Precedence: public allowlist (exact match, or `rule + "/"` prefix), then the
    /// admin prefix, then the user prefix, then the protected default.
    pub fn classify(&self, path: &str) -> PathClass {
        if self.public_paths.iter().any(|rule| is_public_match(path, rule)) {
            PathClass::Public
        } else if path.starts_with(&self.admin_prefix) {
            PathClass::AdminScoped
        } else if path.starts_with(&self.user_prefix) {
            PathClass::UserScoped
        } else {
            PathClass::DefaultProtected
        }
    }

    /// Runs the full decision for one request: classification, state transition and
    /// the resulting redirect (if any). `role` is `None` when no session was resolved.
    pub fn evaluate(&self, path: &str, role: Option<&str>) -> AccessDecision {
        let class = self.classify(path);
        let state = AccessState::default().advance(class, role);
        AccessDecision::from_state(state, path, role)
    }

    /// Location header value for a redirecting decision. `None` for `Allow`.
    pub fn redirect_target(&self, decision: &AccessDecision) -> Option<String> {
        match decision {
            AccessDecision::Allow => None,
            AccessDecision::RedirectToLogin => Some(self.login_path.clone()),
            AccessDecision::RedirectToUnauthorized(params) => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("user_role", &params.user_role)
                    .append_pair("path_tried", &params.path_tried)
                    .append_pair("correct_role", &params.correct_role)
                    .finish();
                Some(format!("{}?{}", self.unauthorized_path, query))
            }
        }
    }
}

fn is_public_match(path: &str, rule: &str) -> bool {
    if path == rule {
        return true;
    }
    // "/" only ever matches exactly; "//" is not a meaningful prefix.
    rule != "/"
        && path
            .strip_prefix(rule)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// AccessState
///
/// Per-request state machine. Starts `Unchecked`; every other state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessState {
    #[default]
    Unchecked,
    Allowed,
    DeniedNoSession,
    DeniedWrongRole { required_role: &'static str },
}

impl AccessState {
    /// Applies the transition rules. Terminal states are returned unchanged.
    pub fn advance(self, class: PathClass, role: Option<&str>) -> AccessState {
        if self.is_terminal() {
            return self;
        }

        match (role, class) {
            (None, PathClass::Public) => AccessState::Allowed,
            (None, _) => AccessState::DeniedNoSession,
            (Some(role), PathClass::AdminScoped) if role != ADMIN_ROLE => {
                AccessState::DeniedWrongRole {
                    required_role: ADMIN_ROLE,
                }
            }
            (Some(role), PathClass::UserScoped) if role != USER_ROLE && role != ADMIN_ROLE => {
                AccessState::DeniedWrongRole {
                    required_role: USER_ROLE,
                }
            }
            (Some(_), _) => AccessState::Allowed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AccessState::Unchecked)
    }
}

/// AccessDecision
///
/// What the guard does with the request. Diagnostic parameters exist only on the
/// unauthorized redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    RedirectToLogin,
    RedirectToUnauthorized(UnauthorizedParams),
}

impl AccessDecision {
    pub fn from_state(state: AccessState, path: &str, role: Option<&str>) -> Self {
        match state {
            // An unchecked request is never let through.
            AccessState::Unchecked | AccessState::DeniedNoSession => {
                AccessDecision::RedirectToLogin
            }
            AccessState::Allowed => AccessDecision::Allow,
            AccessState::DeniedWrongRole { required_role } => {
                AccessDecision::RedirectToUnauthorized(UnauthorizedParams {
                    user_role: role.unwrap_or(USER_ROLE).to_string(),
                    path_tried: path.strip_prefix('/').unwrap_or(path).to_string(),
                    correct_role: required_role.to_string(),
                })
            }
        }
    }
}
