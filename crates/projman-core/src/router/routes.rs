//! Route table entries and path matching.

use std::collections::BTreeMap;

/// Login page path; unauthenticated navigation to a guarded route ends here.
pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const PROJECT_DETAIL_PATH: &str = "/projects/:id";

/// What a matched route does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Render the view with this identifier
    View(String),
    /// Navigate to this path instead
    Redirect(String),
}

/// A static route table entry. Child paths are relative to the parent
/// unless they start with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub path: String,
    pub name: Option<String>,
    pub target: RouteTarget,
    pub requires_auth: bool,
    pub children: Vec<RouteEntry>,
}

impl RouteEntry {
    pub fn view(path: impl Into<String>, name: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: Some(name.into()),
            target: RouteTarget::View(view.into()),
            requires_auth: false,
            children: Vec::new(),
        }
    }

    pub fn redirect(path: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            target: RouteTarget::Redirect(to.into()),
            requires_auth: false,
            children: Vec::new(),
        }
    }

    /// Mark the entry, and so every route nested under it, as guarded.
    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn with_children(mut self, children: Vec<RouteEntry>) -> Self {
        self.children = children;
        self
    }
}

/// An entry flattened out of the tree: its absolute path, without children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    pub path: String,
    pub name: Option<String>,
    pub target: RouteTarget,
    pub requires_auth: bool,
}

impl RouteRecord {
    /// View identifier, `None` for redirects
    pub fn view(&self) -> Option<&str> {
        match self.target {
            RouteTarget::View(ref view) => Some(view),
            RouteTarget::Redirect(_) => None,
        }
    }
}

/// The application's route table.
pub fn app_routes() -> Vec<RouteEntry> {
    vec![
        RouteEntry::view(LOGIN_PATH, "Login", "Login"),
        RouteEntry::view(REGISTER_PATH, "Register", "Register"),
        RouteEntry::view(DASHBOARD_PATH, "Dashboard", "Dashboard").requires_auth(),
        RouteEntry::view(PROJECT_DETAIL_PATH, "ProjectDetail", "ProjectDetail").requires_auth(),
        RouteEntry::redirect("/", DASHBOARD_PATH),
    ]
}

// ============================================================================
// Patterns
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Static(String),
    Param(String),
}

/// A route path split into segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    pub(crate) fn parse(path: &str) -> Self {
        let segments = split_segments(path)
            .map(|s| match s.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Static(s.to_string()),
            })
            .collect();
        Self { segments }
    }

    /// Match `path` against the pattern, returning captured params and a
    /// specificity key. Keys compare lexicographically; a static segment
    /// outranks a param at the first position where two patterns differ.
    pub(crate) fn matches(&self, path: &str) -> Option<(BTreeMap<String, String>, Vec<bool>)> {
        let parts: Vec<&str> = split_segments(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        let mut specificity = Vec::with_capacity(parts.len());
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(s) if s == part => specificity.push(true),
                Segment::Static(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                    specificity.push(false);
                }
            }
        }
        Some((params, specificity))
    }

    /// Fill params back in. Returns the name of the first missing param.
    pub(crate) fn build(&self, params: &BTreeMap<String, String>) -> Result<String, String> {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Static(s) => path.push_str(s),
                Segment::Param(name) => match params.get(name).filter(|v| !v.is_empty()) {
                    Some(value) => path.push_str(value),
                    None => return Err(name.clone()),
                },
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Canonical form of a navigation target: no query or fragment, no empty
/// or trailing segments, always rooted.
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = split_segments(path).collect();
    format!("/{}", segments.join("/"))
}

/// Join a child route path onto its parent's absolute path.
pub(crate) fn join_path(parent: &str, child: &str) -> String {
    if child.starts_with('/') {
        normalize_path(child)
    } else {
        normalize_path(&format!("{}/{}", parent, child))
    }
}
