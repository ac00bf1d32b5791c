use crate::{
    auth::{
        password::{hash_password, verify_password},
        AuthError, AuthResponse, AuthService, LoginRequest, RegisterRequest,
    },
    db::DbPool,
    entities::user::{self, Entity as UserEntity, UserRole},
    errors::ServiceError,
    services::unique_violation,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accounts, credentials and login
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self { db_pool, auth }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(UserEntity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&*self.db_pool)
            .await?)
    }

    async fn insert_user(
        &self,
        name: String,
        email: String,
        password: &str,
        role: UserRole,
        is_active: bool,
    ) -> Result<user::Model, ServiceError> {
        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::BadRequest("Email already in use".to_string()));
        }
        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.trim().to_string()),
            email: Set(normalize_email(&email)),
            password_hash: Set(hash_password(password)?),
            role: Set(role),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| unique_violation(e, "Email already in use"))?;
        info!(user_id = %model.id, role = %model.role, "User created");
        Ok(model)
    }

    fn token_for(&self, user: user::Model) -> Result<AuthResponse, ServiceError> {
        let token = self.auth.generate_token(&user)?;
        Ok(AuthResponse { user, token })
    }

    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ServiceError> {
        let (Some(email), Some(password)) = (required(request.email), required(request.password))
        else {
            return Err(ServiceError::BadRequest(
                "Email and password are required".to_string(),
            ));
        };

        let user = self
            .find_by_email(&email)
            .await?
            .filter(|u| u.is_active)
            .filter(|u| verify_password(&password, &u.password_hash));
        match user {
            Some(user) => {
                info!(user_id = %user.id, "User logged in");
                self.token_for(user)
            }
            None => {
                warn!("Failed login attempt");
                Err(AuthError::InvalidCredentials.into())
            }
        }
    }

    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        let (Some(name), Some(email), Some(password)) = (
            required(request.name),
            required(request.email),
            required(request.password),
        ) else {
            return Err(ServiceError::BadRequest(
                "Name, email and password are required".to_string(),
            ));
        };

        let user = self
            .insert_user(name, email, &password, request.role.unwrap_or_default(), true)
            .await?;
        self.token_for(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        UserEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    pub async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(UserEntity::find()
            .order_by_desc(user::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<user::Model, ServiceError> {
        request.validate()?;
        let Some(password) = required(request.password) else {
            return Err(ServiceError::BadRequest("Password required".to_string()));
        };
        self.insert_user(
            request.name,
            request.email,
            &password,
            request.role.unwrap_or_default(),
            request.is_active.unwrap_or(true),
        )
        .await
    }

    #[instrument(skip(self, request))]
    pub async fn update_user(
        &self,
        id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<user::Model, ServiceError> {
        request.validate()?;
        let existing = self.get_user(id).await?;
        let mut active: user::ActiveModel = existing.into();

        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(email) = request.email {
            active.email = Set(normalize_email(&email));
        }
        if let Some(password) = request.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(role) = request.role {
            active.role = Set(role);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        let updated = active
            .update(&*self.db_pool)
            .await
            .map_err(|e| unique_violation(e, "Email already in use"))?;
        info!(user_id = %id, "User updated");
        Ok(updated)
    }
}
