use crate::entities::user::{self, UserRole};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Login request. Fields are optional so missing values surface as a 400 with a message.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
}

/// Returned by login and register.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: user::Model,
    pub token: String,
}
