//! Client-side router with an authentication guard.
//!
//! The router maps paths to views through a static route table. Every
//! navigation passes the guard: when any route in the matched chain requires
//! authentication and the session is anonymous, navigation is redirected to
//! the login page and the original target is dropped. Redirect entries are
//! followed and the guard is applied again at each hop.

pub mod routes;

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::auth::{Session, SessionStore};

pub use routes::{
    app_routes, normalize_path, RouteEntry, RouteRecord, RouteTarget, DASHBOARD_PATH, LOGIN_PATH,
    PROJECT_DETAIL_PATH, REGISTER_PATH,
};
use routes::{join_path, Pattern};

/// Upper bound on redirect hops for one navigation
const MAX_REDIRECTS: usize = 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouteError {
    #[error("Redirect loop while navigating to {path}")]
    RedirectLoop { path: String },

    #[error("No route named {0}")]
    UnknownRoute(String),

    #[error("Route {route} needs param {param}")]
    MissingParam { route: String, param: String },
}

/// Anything the guard can ask whether the user is logged in.
pub trait AuthState {
    fn is_authenticated(&self) -> bool;
}

impl AuthState for SessionStore {
    fn is_authenticated(&self) -> bool {
        SessionStore::is_authenticated(self)
    }
}

impl AuthState for Session {
    fn is_authenticated(&self) -> bool {
        Session::is_authenticated(self)
    }
}

impl AuthState for bool {
    fn is_authenticated(&self) -> bool {
        *self
    }
}

/// A resolved path: the matched route, its ancestors, and captured params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Normalized path that was matched
    pub path: String,
    /// Root-first chain of matched records; the last one is the route itself
    pub chain: Vec<RouteRecord>,
    pub params: BTreeMap<String, String>,
}

impl RouteMatch {
    pub fn record(&self) -> &RouteRecord {
        // Matches are only built from non-empty chains.
        &self.chain[self.chain.len() - 1]
    }

    pub fn name(&self) -> Option<&str> {
        self.record().name.as_deref()
    }

    pub fn view(&self) -> Option<&str> {
        self.record().view()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// True when any record in the chain is guarded
    pub fn requires_auth(&self) -> bool {
        self.chain.iter().any(|r| r.requires_auth)
    }
}

/// Outcome of a navigation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// The requested route is shown
    Proceed(RouteMatch),
    /// Navigation ended somewhere else; `to` is the final path
    Redirected {
        from: String,
        to: String,
        route: RouteMatch,
    },
    /// No route matches the path
    NotFound(String),
}

impl Navigation {
    /// Path the user ends up at
    pub fn final_path(&self) -> &str {
        match self {
            Navigation::Proceed(route) => &route.path,
            Navigation::Redirected { to, .. } => to,
            Navigation::NotFound(path) => path,
        }
    }

    pub fn route(&self) -> Option<&RouteMatch> {
        match self {
            Navigation::Proceed(route) | Navigation::Redirected { route, .. } => Some(route),
            Navigation::NotFound(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRoute {
    pattern: Pattern,
    chain: Vec<RouteRecord>,
}

/// The route table plus the guard. Immutable once built.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<CompiledRoute>,
    login_path: String,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(app_routes())
    }
}

impl Router {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        let mut routes = Vec::new();
        for entry in &entries {
            Self::compile(entry, "/", &[], &mut routes);
        }
        debug!(count = routes.len(), "Route table compiled");
        Self {
            routes,
            login_path: LOGIN_PATH.to_string(),
        }
    }

    /// Use a different login page for guard redirects.
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = normalize_path(&path.into());
        self
    }

    fn compile(entry: &RouteEntry, parent: &str, ancestors: &[RouteRecord], out: &mut Vec<CompiledRoute>) {
        let path = join_path(parent, &entry.path);
        let record = RouteRecord {
            path: path.clone(),
            name: entry.name.clone(),
            target: entry.target.clone(),
            requires_auth: entry.requires_auth,
        };
        let mut chain = ancestors.to_vec();
        chain.push(record);

        for child in &entry.children {
            Self::compile(child, &path, &chain, out);
        }
        out.push(CompiledRoute {
            pattern: Pattern::parse(&path),
            chain,
        });
    }

    /// Every route in the table, parents before their children
    pub fn records(&self) -> impl Iterator<Item = &RouteRecord> {
        let mut records: Vec<&RouteRecord> = self
            .routes
            .iter()
            .filter_map(|r| r.chain.last())
            .collect();
        records.sort_by_key(|r| r.path.matches('/').count());
        records.into_iter()
    }

    /// Find the route for `path` without applying the guard.
    ///
    /// When several patterns match, the one with static segments earliest
    /// wins; ties go to the route defined first.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let path = normalize_path(path);
        let mut best: Option<(Vec<bool>, &CompiledRoute, BTreeMap<String, String>)> = None;

        for route in &self.routes {
            let Some((params, specificity)) = route.pattern.matches(&path) else {
                continue;
            };
            let better = match best {
                Some((ref current, _, _)) => specificity > *current,
                None => true,
            };
            if better {
                best = Some((specificity, route, params));
            }
        }

        best.map(|(_, route, params)| RouteMatch {
            path,
            chain: route.chain.clone(),
            params,
        })
    }

    /// Navigate to `path`, applying redirects and the authentication guard.
    pub fn navigate(&self, path: &str, auth: &impl AuthState) -> Result<Navigation, RouteError> {
        let requested = normalize_path(path);
        let mut current = requested.clone();

        for _ in 0..=MAX_REDIRECTS {
            let Some(route) = self.resolve(&current) else {
                debug!(path = %current, "No route matches");
                return Ok(Navigation::NotFound(current));
            };

            let next = match route.record().target {
                RouteTarget::Redirect(ref to) => Some(normalize_path(to)),
                RouteTarget::View(_) if route.requires_auth() && !auth.is_authenticated() => {
                    debug!(path = %current, login = %self.login_path, "Guarded route, redirecting to login");
                    Some(self.login_path.clone())
                }
                RouteTarget::View(_) => None,
            };

            match next {
                Some(next) => current = next,
                None if current == requested => return Ok(Navigation::Proceed(route)),
                None => {
                    debug!(from = %requested, to = %current, "Navigation redirected");
                    return Ok(Navigation::Redirected {
                        from: requested,
                        to: current,
                        route,
                    });
                }
            }
        }

        Err(RouteError::RedirectLoop { path: requested })
    }

    /// Build the path of a named route.
    pub fn path_for(&self, name: &str, params: &BTreeMap<String, String>) -> Result<String, RouteError> {
        let route = self
            .routes
            .iter()
            .find(|r| r.chain.last().and_then(|rec| rec.name.as_deref()) == Some(name))
            .ok_or_else(|| RouteError::UnknownRoute(name.to_string()))?;

        route.pattern.build(params).map_err(|param| RouteError::MissingParam {
            route: name.to_string(),
            param,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANONYMOUS: bool = false;
    const AUTHENTICATED: bool = true;

    fn router() -> Router {
        Router::default()
    }

    #[test]
    fn test_dashboard_anonymous_redirects_to_login() {
        let nav = router().navigate("/dashboard", &ANONYMOUS).unwrap();
        match nav {
            Navigation::Redirected { ref from, ref to, ref route } => {
                assert_eq!(from, "/dashboard");
                assert_eq!(to, LOGIN_PATH);
                assert_eq!(route.view(), Some("Login"));
            }
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    #[test]
    fn test_dashboard_authenticated_proceeds() {
        let nav = router().navigate("/dashboard", &AUTHENTICATED).unwrap();
        assert!(matches!(nav, Navigation::Proceed(_)));
        assert_eq!(nav.final_path(), DASHBOARD_PATH);
        assert_eq!(nav.route().unwrap().name(), Some("Dashboard"));
    }

    #[test]
    fn test_login_and_register_always_proceed() {
        let router = router();
        for path in [LOGIN_PATH, REGISTER_PATH] {
            for auth in [ANONYMOUS, AUTHENTICATED] {
                let nav = router.navigate(path, &auth).unwrap();
                assert!(matches!(nav, Navigation::Proceed(_)), "{path} with auth={auth}");
                assert_eq!(nav.final_path(), path);
            }
        }
    }

    #[test]
    fn test_root_redirects_to_dashboard_then_guard() {
        let router = router();

        let nav = router.navigate("/", &AUTHENTICATED).unwrap();
        assert_eq!(
            nav,
            Navigation::Redirected {
                from: "/".to_string(),
                to: DASHBOARD_PATH.to_string(),
                route: router.resolve(DASHBOARD_PATH).unwrap(),
            }
        );

        let nav = router.navigate("/", &ANONYMOUS).unwrap();
        assert_eq!(nav.final_path(), LOGIN_PATH);
    }

    #[test]
    fn test_project_detail_guarded_with_param() {
        let router = router();

        let nav = router.navigate("/projects/65f1c0ffee", &AUTHENTICATED).unwrap();
        let route = nav.route().unwrap();
        assert_eq!(route.name(), Some("ProjectDetail"));
        assert_eq!(route.param("id"), Some("65f1c0ffee"));

        let nav = router.navigate("/projects/65f1c0ffee", &ANONYMOUS).unwrap();
        assert_eq!(nav.final_path(), LOGIN_PATH);
    }

    #[test]
    fn test_unknown_path_not_found() {
        let router = router();
        assert_eq!(
            router.navigate("/nowhere", &AUTHENTICATED).unwrap(),
            Navigation::NotFound("/nowhere".to_string())
        );
        assert_eq!(
            router.navigate("/projects", &ANONYMOUS).unwrap(),
            Navigation::NotFound("/projects".to_string())
        );
    }

    #[test]
    fn test_query_and_trailing_slash_ignored() {
        let nav = router().navigate("/dashboard/?tab=recent", &AUTHENTICATED).unwrap();
        assert!(matches!(nav, Navigation::Proceed(_)));
        assert_eq!(nav.final_path(), DASHBOARD_PATH);
    }

    #[test]
    fn test_static_route_beats_param_route() {
        let router = Router::new(vec![
            RouteEntry::view("/projects/:id", "ProjectDetail", "ProjectDetail"),
            RouteEntry::view("/projects/new", "NewProject", "NewProject"),
        ]);
        assert_eq!(router.resolve("/projects/new").unwrap().name(), Some("NewProject"));
        assert_eq!(router.resolve("/projects/7").unwrap().name(), Some("ProjectDetail"));
    }

    #[test]
    fn test_first_defined_wins_on_tie() {
        let router = Router::new(vec![
            RouteEntry::view("/a/:x", "First", "First"),
            RouteEntry::view("/a/:y", "Second", "Second"),
        ]);
        assert_eq!(router.resolve("/a/1").unwrap().name(), Some("First"));
    }

    #[test]
    fn test_guarded_parent_covers_children() {
        let router = Router::new(vec![
            RouteEntry::view(LOGIN_PATH, "Login", "Login"),
            RouteEntry::view("/projects/:id", "ProjectDetail", "ProjectDetail")
                .requires_auth()
                .with_children(vec![RouteEntry::view("tasks", "ProjectTasks", "ProjectTasks")]),
        ]);

        let route = router.resolve("/projects/3/tasks").unwrap();
        assert_eq!(route.chain.len(), 2);
        assert!(!route.record().requires_auth);
        assert!(route.requires_auth());

        let nav = router.navigate("/projects/3/tasks", &ANONYMOUS).unwrap();
        assert_eq!(nav.final_path(), LOGIN_PATH);

        let nav = router.navigate("/projects/3/tasks", &AUTHENTICATED).unwrap();
        assert_eq!(nav.route().unwrap().param("id"), Some("3"));
    }

    #[test]
    fn test_redirect_loop_detected() {
        let router = Router::new(vec![
            RouteEntry::redirect("/a", "/b"),
            RouteEntry::redirect("/b", "/a"),
        ]);
        assert_eq!(
            router.navigate("/a", &AUTHENTICATED),
            Err(RouteError::RedirectLoop { path: "/a".to_string() })
        );
    }

    #[test]
    fn test_guarded_login_page_is_a_loop() {
        let router = Router::new(vec![RouteEntry::view(LOGIN_PATH, "Login", "Login").requires_auth()]);
        assert!(matches!(
            router.navigate(LOGIN_PATH, &ANONYMOUS),
            Err(RouteError::RedirectLoop { .. })
        ));
    }

    #[test]
    fn test_redirect_to_missing_route() {
        let router = Router::new(vec![RouteEntry::redirect("/", "/gone")]);
        assert_eq!(
            router.navigate("/", &AUTHENTICATED).unwrap(),
            Navigation::NotFound("/gone".to_string())
        );
    }

    #[test]
    fn test_custom_login_path() {
        let router = Router::new(vec![
            RouteEntry::view("/signin", "SignIn", "SignIn"),
            RouteEntry::view(DASHBOARD_PATH, "Dashboard", "Dashboard").requires_auth(),
        ])
        .with_login_path("/signin/");
        assert_eq!(router.navigate(DASHBOARD_PATH, &ANONYMOUS).unwrap().final_path(), "/signin");
    }

    #[test]
    fn test_path_for() {
        let router = router();
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), "42".to_string());

        assert_eq!(router.path_for("ProjectDetail", &params).unwrap(), "/projects/42");
        assert_eq!(router.path_for("Dashboard", &BTreeMap::new()).unwrap(), DASHBOARD_PATH);
        assert_eq!(
            router.path_for("ProjectDetail", &BTreeMap::new()),
            Err(RouteError::MissingParam {
                route: "ProjectDetail".to_string(),
                param: "id".to_string(),
            })
        );
        assert_eq!(
            router.path_for("Settings", &params),
            Err(RouteError::UnknownRoute("Settings".to_string()))
        );
    }

    #[test]
    fn test_records_lists_table() {
        let router = router();
        let paths: Vec<&str> = router.records().map(|r| r.path.as_str()).collect();
        assert_eq!(paths.len(), 5);
        assert!(paths.contains(&"/"));
        assert!(paths.contains(&PROJECT_DETAIL_PATH));
    }

    #[test]
    fn test_session_as_auth_state() {
        let nav = router().navigate(DASHBOARD_PATH, &Session::anonymous()).unwrap();
        assert_eq!(nav.final_path(), LOGIN_PATH);
    }
}
