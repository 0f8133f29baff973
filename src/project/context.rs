use super::ProjectId;

/// The authentication/authorization context carried on every operation.
///
/// This is deliberately thin: the core treats authentication as an
/// external collaborator (§6) and consumes only the four fields a
/// storage operation actually needs to enforce scoping.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The caller's project.
    pub project: ProjectId,

    /// When true, project scoping is bypassed entirely: reads and
    /// searches are not filtered by `projectId`.
    pub super_admin: bool,

    /// Opaque caller identity, carried for audit purposes by collaborators
    /// outside the core; never interpreted here.
    pub user_id: Option<String>,

    /// Opaque authorization scopes, carried for collaborators outside the
    /// core (e.g. a SMART-on-FHIR scope check); never interpreted here.
    pub scopes: Vec<String>,

    /// When true, unknown search parameters are rejected with
    /// `InvalidSearchRequest` instead of producing a warning.
    pub strict: bool,
}

impl RequestContext {
    /// Builds a context scoped to `project` with no special privileges.
    pub fn new(project: ProjectId) -> Self {
        Self {
            project,
            super_admin: false,
            user_id: None,
            scopes: Vec::new(),
            strict: false,
        }
    }

    /// Builds a super-admin context that bypasses project scoping.
    pub fn super_admin(project: ProjectId) -> Self {
        Self {
            super_admin: true,
            ..Self::new(project)
        }
    }

    /// Returns true if `other` is visible under this context, i.e. `other`
    /// equals this context's project or the context is a super admin.
    pub fn can_see(&self, other: ProjectId) -> bool {
        self.super_admin || self.project == other
    }
}
