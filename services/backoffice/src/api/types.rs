//! HTTP API request/response types.
//!
//! # Purpose
//! Payload shapes for the back-office REST API and OpenAPI schema generation.
use crate::store::{AdminAccount, Role};
use bastion_rbac::{RuleFailure, RuleTree};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub storage: String,
    pub policy_loaded: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema, Clone)]
pub struct RoleListRequest {
    #[serde(default)]
    pub page_num: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RoleListResponse {
    pub total: u64,
    pub data: Vec<Role>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RoleInfoResponse {
    pub role: Role,
    /// Menu rule ids currently granted to the role.
    pub ids: Vec<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RoleCreateRequest {
    pub name: String,
    /// Generated when omitted.
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ids: Vec<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RoleUpdateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub ids: Vec<u64>,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct RoleMutationResponse {
    pub role: Role,
    /// Menu rule ids whose permissions the role now holds.
    pub ids: Vec<u64>,
    pub failures: Vec<RuleFailure>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RoleDeleteResponse {
    pub alias: String,
    pub removed_permissions: u64,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct RuleTreeResponse {
    pub data: Vec<RuleTree>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema, Clone)]
pub struct AdminListRequest {
    #[serde(default)]
    pub page_num: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AdminListResponse {
    pub total: u64,
    pub data: Vec<AdminAccount>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AdminCreateRequest {
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub department: String,
    /// Alias of an existing role.
    pub role: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema, Clone)]
pub struct AdminUpdateRequest {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    /// Alias of an existing role.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}
