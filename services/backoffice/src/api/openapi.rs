//! OpenAPI schema aggregation for the back-office API.
use crate::api::types::{
    AdminCreateRequest, AdminListRequest, AdminListResponse, AdminUpdateRequest, ErrorResponse,
    HealthStatus, RoleCreateRequest, RoleDeleteResponse, RoleInfoResponse, RoleListRequest,
    RoleListResponse, RoleMutationResponse, RoleUpdateRequest, RuleTreeResponse,
};
use crate::api::{admins, roles, rules, system};
use crate::store::{AdminAccount, Role};
use bastion_rbac::{PolicyRule, RuleFailure, RuleNode, RuleTree};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "bastion-backoffice",
        version = "v1",
        description = "Back-office administration API guarded by role-based access control"
    ),
    paths(
        system::system_health,
        roles::list_roles,
        roles::all_roles,
        roles::role_info,
        roles::create_role,
        roles::update_role,
        roles::delete_role,
        rules::list_rules,
        admins::list_admins,
        admins::admin_info,
        admins::create_admin,
        admins::update_admin,
        admins::delete_admin
    ),
    components(schemas(
        HealthStatus,
        ErrorResponse,
        Role,
        RoleListRequest,
        RoleListResponse,
        RoleInfoResponse,
        RoleCreateRequest,
        RoleUpdateRequest,
        RoleMutationResponse,
        RoleDeleteResponse,
        RuleNode,
        RuleTree,
        RuleTreeResponse,
        RuleFailure,
        PolicyRule,
        AdminAccount,
        AdminListRequest,
        AdminListResponse,
        AdminCreateRequest,
        AdminUpdateRequest
    )),
    tags(
        (name = "system", description = "Health and discovery"),
        (name = "roles", description = "Role and permission administration"),
        (name = "rules", description = "Menu rule tree"),
        (name = "admins", description = "Admin accounts")
    )
)]
pub struct ApiDoc;
