use crate::app::{AppContext, blocking};
use crate::error::{Error, Result};
use crate::validation::{EmptyDirectory, Registration, RegistrationValidator, UserDirectory};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// User data structure representing a registered application user
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    /// Username (unique identifier for the user)
    pub username: String,

    /// Email address (unique across users)
    pub email: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,
}

/// Credential data for login
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UserCredentials {
    #[serde(default)]
    pub username: String,

    /// Password in plaintext (only transmitted, never stored)
    #[serde(default)]
    pub password: String,
}

/// Password change request data
///
/// The user is identified by their session, not by the body.
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordChangeRequest {
    /// Current password for verification
    pub old_password: String,

    /// New password to set
    pub new_password: String,

    /// Confirmation of the new password (must match new_password)
    pub confirm_password: String,
}

impl UserDirectory for HashMap<String, User> {
    fn username_exists(&self, username: &str) -> bool {
        self.contains_key(username)
    }

    fn email_exists(&self, email: &str) -> bool {
        self.values().any(|user| user.email == email)
    }
}

/// Registered users, kept in memory and mirrored to a JSON file.
#[derive(Debug)]
pub struct UserStore {
    path: PathBuf,
    users: RwLock<HashMap<String, User>>,
}

impl UserStore {
    /// Open the users file, creating it (and its directory) when missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        if !path.exists() {
            fs::write(&path, b"{}").map_err(|e| Error::io(&path, e))?;
        }

        let contents = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let users: HashMap<String, User> = serde_json::from_str(&contents)?;
        info!("loaded {} users from {}", users.len(), path.display());

        Ok(UserStore {
            path,
            users: RwLock::new(users),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn save(&self, users: &HashMap<String, User>) -> Result<()> {
        let json = serde_json::to_string_pretty(users)?;
        fs::write(&self.path, json).map_err(|e| Error::io(&self.path, e))
    }

    /// Register a new user
    ///
    /// Runs the standard registration rules against the current users, hashes
    /// the password and persists the new user. Hashing happens outside the
    /// lock; the rules run again once the lock is held.
    ///
    /// # Errors
    /// * `Error::Validation` naming the first rule the registration broke
    /// * `Error::Io` if the users file cannot be written, in which case the
    ///   user is not kept
    pub fn register(&self, registration: &Registration) -> Result<User> {
        let validator = RegistrationValidator::standard();
        validator.validate(
            registration,
            &*self.users.read().unwrap_or_else(PoisonError::into_inner),
        )?;

        let user = User {
            username: registration.username.clone(),
            email: registration.email.clone(),
            first_name: registration.first_name.clone(),
            last_name: registration.last_name.clone(),
            password_hash: hash_password(&registration.password)?,
        };

        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        validator.validate(registration, &*users)?;
        users.insert(user.username.clone(), user.clone());
        if let Err(e) = self.save(&users) {
            users.remove(&user.username);
            return Err(e);
        }
        info!("User `{}` created successfully", user.username);

        Ok(user)
    }

    pub fn get_by_username(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .cloned()
    }

    pub fn get_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|user| user.email == email)
            .cloned()
    }

    /// Verify user credentials
    ///
    /// Unknown users simply do not verify.
    pub fn verify(&self, username: &str, password: &str) -> Result<bool> {
        match self.get_by_username(username) {
            Some(user) => verify_password(password, &user.password_hash),
            None => Ok(false),
        }
    }

    /// Change a user's password after checking the current one.
    ///
    /// The new password goes through the same password rules as registration.
    /// If the users file cannot be written the old password stays in force.
    pub fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        let user = self
            .get_by_username(username)
            .ok_or_else(|| Error::NotFound(format!("user `{username}`")))?;

        if !verify_password(old_password, &user.password_hash)? {
            return Err(Error::Unauthorized("Invalid old password".to_string()));
        }
        if new_password != confirm_password {
            return Err(Error::Validation {
                field: "confirm_password",
                message: "New passwords don't match".to_string(),
            });
        }

        let candidate = Registration {
            username: user.username.clone(),
            email: user.email.clone(),
            password: new_password.to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        };
        RegistrationValidator::passwords().validate(&candidate, &EmptyDirectory)?;
        let new_hash = hash_password(new_password)?;

        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let stored = users
            .get_mut(username)
            .ok_or_else(|| Error::NotFound(format!("user `{username}`")))?;
        // Someone else changed it while we were hashing
        if stored.password_hash != user.password_hash {
            return Err(Error::Unauthorized("Invalid old password".to_string()));
        }
        stored.password_hash = new_hash;

        if let Err(e) = self.save(&users) {
            if let Some(stored) = users.get_mut(username) {
                stored.password_hash = user.password_hash;
            }
            return Err(e);
        }
        info!("User `{}` changed password", username);
        Ok(())
    }
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored hash
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| Error::Internal(format!("invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Live sessions keyed by token.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Start a session and return its token.
    ///
    /// Expired sessions are purged on the way in.
    pub fn create(&self, username: &str) -> Result<String> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| Error::Internal("session lifetime overflows the clock".to_string()))?;

        let token = Uuid::new_v4().to_string();
        let session = Session {
            username: username.to_string(),
            expires_at,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(token.clone(), session);
        Ok(token)
    }

    /// Number of sessions held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Username behind a live token. Expired sessions are dropped.
    pub fn validate(&self, token: &str) -> Option<String> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let live = sessions
            .get(token)
            .map(|session| (session.expires_at > Utc::now(), session.username.clone()));

        match live {
            Some((true, username)) => Some(username),
            Some((false, _)) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    /// End a session. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .is_some()
    }
}

// Bearer token first, then the session cookie
fn session_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
}

/// Username of the caller's live session.
pub fn authenticate(ctx: &AppContext, headers: &HeaderMap, jar: &CookieJar) -> Result<String> {
    let token = session_token(headers, jar)
        .ok_or_else(|| Error::Unauthorized("No session found".to_string()))?;
    ctx.sessions
        .validate(&token)
        .ok_or_else(|| Error::Unauthorized("Invalid session".to_string()))
}

/// Handle user registration
///
/// # Returns
/// * `201` with the username on success
/// * `400` naming the first failed registration rule
pub async fn handle_register(
    State(ctx): State<Arc<AppContext>>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<Value>)> {
    let job_ctx = ctx.clone();
    let user = blocking(move || job_ctx.users.register(&registration)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Registered successfully", "username": user.username })),
    ))
}

/// Handle user login requests
///
/// Verifies the credentials and starts a session. The token is returned in the
/// body and also set as the session cookie.
pub async fn handle_login(
    State(ctx): State<Arc<AppContext>>,
    jar: CookieJar,
    Json(credentials): Json<UserCredentials>,
) -> Result<(CookieJar, Json<Value>)> {
    if credentials.username.is_empty() || credentials.password.is_empty() {
        return Err(Error::invalid("Missing username or password"));
    }

    let job_ctx = ctx.clone();
    let (username, password) = (credentials.username.clone(), credentials.password);
    if !blocking(move || job_ctx.users.verify(&username, &password)).await? {
        warn!("failed login for `{}`", credentials.username);
        return Err(Error::Unauthorized("Invalid credentials".to_string()));
    }

    let token = ctx.sessions.create(&credentials.username)?;
    info!("User `{}` logged in", credentials.username);
    let cookie = Cookie::new(SESSION_COOKIE, token.clone());
    Ok((jar.add(cookie), Json(json!({ "token": token }))))
}

/// Handle user logout
///
/// Revokes the caller's session and clears the session cookie.
pub async fn handle_logout(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>)> {
    let token = session_token(&headers, &jar)
        .ok_or_else(|| Error::Unauthorized("No session found".to_string()))?;
    if !ctx.sessions.revoke(&token) {
        return Err(Error::Unauthorized("Invalid session".to_string()));
    }

    Ok((
        jar.remove(Cookie::from(SESSION_COOKIE)),
        Json(json!({ "message": "Logged out" })),
    ))
}

/// Handle password change for authenticated users
pub async fn handle_change_password(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(change): Json<PasswordChangeRequest>,
) -> Result<Json<Value>> {
    let username = authenticate(&ctx, &headers, &jar)?;
    let job_ctx = ctx.clone();
    blocking(move || {
        job_ctx.users.change_password(
            &username,
            &change.old_password,
            &change.new_password,
            &change.confirm_password,
        )
    })
    .await?;
    Ok(Json(json!({ "message": "Password changed successfully" })))
}
