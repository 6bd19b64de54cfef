//! Per-view access decisions.

use serde::Serialize;

use crate::session::{Identity, ADMIN_ROLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Decision {
    Allow,
    RedirectToLogin,
    RedirectToHome,
}

impl Decision {
    pub fn redirect_route(self) -> Option<&'static str> {
        match self {
            Decision::Allow => None,
            Decision::RedirectToLogin => Some(View::Login.route()),
            Decision::RedirectToHome => Some(View::Dashboard.route()),
        }
    }

    pub fn error_code(self) -> Option<&'static str> {
        match self {
            Decision::Allow => None,
            Decision::RedirectToLogin => Some("redirect_login"),
            Decision::RedirectToHome => Some("redirect_home"),
        }
    }
}

/// `required` empty means any authenticated identity may enter.
pub fn decide(identity: Option<&Identity>, required: &[&str]) -> Decision {
    let Some(identity) = identity else {
        return Decision::RedirectToLogin;
    };
    if required.is_empty() || required.contains(&identity.role.as_str()) {
        Decision::Allow
    } else {
        Decision::RedirectToHome
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Register,
    Dashboard,
    Schools,
    Parents,
    Students,
    Reports,
    ReportSchool,
    ReportStudent,
}

const ADMIN_ONLY: &[&str] = &[ADMIN_ROLE];

impl View {
    pub const ALL: [View; 9] = [
        View::Login,
        View::Register,
        View::Dashboard,
        View::Schools,
        View::Parents,
        View::Students,
        View::Reports,
        View::ReportSchool,
        View::ReportStudent,
    ];

    pub fn route(self) -> &'static str {
        match self {
            View::Login => "/login",
            View::Register => "/register",
            View::Dashboard => "/",
            View::Schools => "/schools",
            View::Parents => "/parents",
            View::Students => "/students",
            View::Reports => "/reports",
            View::ReportSchool => "/reportSchool",
            View::ReportStudent => "/reportStudent",
        }
    }

    pub fn from_route(route: &str) -> Option<View> {
        let route = route.trim();
        View::ALL.into_iter().find(|v| v.route() == route)
    }

    pub fn is_public(self) -> bool {
        matches!(self, View::Login | View::Register)
    }

    pub fn required_roles(self) -> &'static [&'static str] {
        match self {
            View::Login | View::Register | View::Dashboard | View::Schools => &[],
            View::Parents
            | View::Students
            | View::Reports
            | View::ReportSchool
            | View::ReportStudent => ADMIN_ONLY,
        }
    }

    pub fn check(self, identity: Option<&Identity>) -> Decision {
        if self.is_public() {
            return Decision::Allow;
        }
        decide(identity, self.required_roles())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    fn who(role: &str) -> Identity {
        Identity {
            username: "u".into(),
            role: Role::new(role),
            token: "t".into(),
            school_id: None,
        }
    }

    #[test]
    fn decisions_follow_identity_and_roles() {
        assert_eq!(decide(None, &[]), Decision::RedirectToLogin);
        assert_eq!(
            decide(Some(&who("Usuario")), &[ADMIN_ROLE]),
            Decision::RedirectToHome
        );
        assert_eq!(
            decide(Some(&who(ADMIN_ROLE)), &[ADMIN_ROLE]),
            Decision::Allow
        );
        assert_eq!(decide(Some(&who("Usuario")), &[]), Decision::Allow);
    }

    #[test]
    fn absent_identity_goes_to_login_even_for_role_gated_views() {
        assert_eq!(View::Reports.check(None), Decision::RedirectToLogin);
        assert_eq!(View::Login.check(None), Decision::Allow);
    }

    #[test]
    fn navigation_matrix() {
        let user = who("Usuario");
        assert_eq!(View::Dashboard.check(Some(&user)), Decision::Allow);
        assert_eq!(View::Schools.check(Some(&user)), Decision::Allow);
        for v in [
            View::Parents,
            View::Students,
            View::Reports,
            View::ReportSchool,
            View::ReportStudent,
        ] {
            assert_eq!(v.check(Some(&user)), Decision::RedirectToHome, "{v:?}");
        }
    }

    #[test]
    fn routes_roundtrip() {
        for v in View::ALL {
            assert_eq!(View::from_route(v.route()), Some(v));
        }
        assert_eq!(View::from_route("/nope"), None);
        assert_eq!(Decision::RedirectToHome.redirect_route(), Some("/"));
    }
}
