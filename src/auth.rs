use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiny_keccak::{Hasher, Kmac};
use tracing::{info, warn};

use crate::config::MAX_TOKEN_TTL_HOURS;
use crate::inbox::InboxStore;

const ACCOUNTS_FILE: &str = "accounts.json";
const SECRET_FILE: &str = "token.key";
const SECRET_SIZE: usize = 32;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("User not found")]
    UserNotFound,
    #[error("You do not have permission to access this resource")]
    Forbidden,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Hash(#[from] argon2::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

mod b64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&base64::encode(bytes))
    }

    pub fn deserialize<'a, D: Deserializer<'a>>(de: D) -> Result<Vec<u8>, D::Error> {
        use serde::de::Error;
        String::deserialize(de)
            .and_then(|s| base64::decode(&s).map_err(|err| Error::custom(err.to_string())))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "b64")]
    password_hash: Vec<u8>,
    #[serde(with = "b64")]
    salt: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Public view of an account, as returned alongside a token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub role: Role,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserView,
}

/// The subject of a verified token, resolved against the live account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

#[derive(Serialize, Deserialize, Debug)]
struct Claims {
    sub: String,
    email: String,
    role: Role,
    iat: i64,
    exp: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_users: usize,
    pub total_inbox_items: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub message: String,
    pub user: UserView,
    pub stats: DashboardStats,
}

/// Rejects users whose role is not among the required ones.
///
/// A guard with no required roles lets everyone through, including nobody.
#[derive(Debug, Clone, Default)]
pub struct RoleGuard {
    required: Vec<Role>,
}

impl RoleGuard {
    pub fn new(required: &[Role]) -> Self {
        Self {
            required: required.to_vec(),
        }
    }

    pub fn check(&self, user: Option<&AuthUser>) -> Result<(), AuthError> {
        if self.required.is_empty() {
            return Ok(());
        }
        match user {
            Some(user) if self.required.contains(&user.role) => Ok(()),
            _ => {
                warn!(
                    user = user.map(|u| u.user_id.as_str()).unwrap_or("-"),
                    "role guard rejected access"
                );
                Err(AuthError::Forbidden)
            }
        }
    }
}

/// Accounts in `accounts.json` and tokens signed with the key in `token.key`.
pub struct AuthService {
    accounts_path: PathBuf,
    secret: [u8; SECRET_SIZE],
    admin_emails: Vec<String>,
    token_ttl: Duration,
}

impl AuthService {
    /// Opens the account file under `data_dir`, creating the token secret on
    /// first use.
    pub fn open(data_dir: &Path, admin_emails: &[String], token_ttl_hours: i64) -> Result<Self, AuthError> {
        std::fs::create_dir_all(data_dir)?;
        let secret_path = data_dir.join(SECRET_FILE);
        let secret = match std::fs::read(&secret_path) {
            Ok(bytes) if bytes.len() == SECRET_SIZE => {
                let mut secret = [0u8; SECRET_SIZE];
                secret.copy_from_slice(&bytes);
                secret
            }
            _ => {
                let mut secret = [0u8; SECRET_SIZE];
                OsRng.fill_bytes(&mut secret);
                std::fs::write(&secret_path, secret)?;
                info!("Generated new token secret at {}", secret_path.display());
                secret
            }
        };
        Ok(Self {
            accounts_path: data_dir.join(ACCOUNTS_FILE),
            secret,
            admin_emails: admin_emails.iter().map(|e| normalize_email(e)).collect(),
            token_ttl: Duration::hours(token_ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS)),
        })
    }

    pub fn signup(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(email);
        if !is_plausible_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort);
        }

        let mut accounts = self.accounts()?;
        if accounts.iter().any(|a| a.email == email) {
            return Err(AuthError::EmailTaken);
        }

        let mut salt = [0u8; 32];
        OsRng.fill_bytes(&mut salt);
        let role = if self.admin_emails.contains(&email) {
            Role::Admin
        } else {
            Role::User
        };
        let account = Account {
            id: new_account_id(),
            email,
            role,
            password_hash: hash_password(password.as_bytes(), &salt)?.to_vec(),
            salt: salt.to_vec(),
            created_at: now,
        };
        info!(user = %account.id, role = ?account.role, "account created");

        let response = self.respond(&account, now)?;
        accounts.push(account);
        self.store_accounts(&accounts)?;
        Ok(response)
    }

    pub fn login(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(email);
        let accounts = self.accounts()?;
        let Some(account) = accounts.iter().find(|a| a.email == email) else {
            info!("login rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        let hash = hash_password(password.as_bytes(), &account.salt)?;
        if !constant_time_eq(&hash, &account.password_hash) {
            info!(user = %account.id, "login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        info!(user = %account.id, "login");
        self.respond(account, now)
    }

    /// Verifies `token` and resolves its subject to a live account.
    pub fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Result<AuthUser, AuthError> {
        let claims = self.verify(token)?;
        if now.timestamp() >= claims.exp {
            return Err(AuthError::TokenExpired);
        }
        let account = self
            .accounts()?
            .into_iter()
            .find(|a| a.id == claims.sub)
            .ok_or(AuthError::UserNotFound)?;
        Ok(AuthUser {
            user_id: account.id,
            email: account.email,
            role: account.role,
        })
    }

    pub fn profile(&self, user: &AuthUser) -> AuthUser {
        user.clone()
    }

    pub fn admin_dashboard(&self, user: &AuthUser, store: &dyn InboxStore) -> Result<Dashboard, AuthError> {
        RoleGuard::new(&[Role::Admin]).check(Some(user))?;
        let total_inbox_items = store
            .customer_ids()
            .iter()
            .map(|id| store.inbox(id).item_count())
            .sum();
        Ok(Dashboard {
            message: "Welcome to the admin dashboard".to_string(),
            user: UserView {
                id: user.user_id.clone(),
                email: user.email.clone(),
                role: user.role,
            },
            stats: DashboardStats {
                total_users: self.accounts()?.len(),
                total_inbox_items,
            },
        })
    }

    /// Every account; a missing file means no accounts yet.
    pub fn accounts(&self) -> Result<Vec<Account>, AuthError> {
        match std::fs::read_to_string(&self.accounts_path) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn customers(&self) -> Result<Vec<Account>, AuthError> {
        let mut customers: Vec<Account> = self
            .accounts()?
            .into_iter()
            .filter(|a| a.role == Role::User)
            .collect();
        customers.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(customers)
    }

    fn store_accounts(&self, accounts: &[Account]) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(accounts)?;
        std::fs::write(&self.accounts_path, json)?;
        Ok(())
    }

    fn respond(&self, account: &Account, now: DateTime<Utc>) -> Result<AuthResponse, AuthError> {
        let claims = Claims {
            sub: account.id.clone(),
            email: account.email.clone(),
            role: account.role,
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.token_ttl)
                .ok_or(AuthError::InvalidToken)?
                .timestamp(),
        };
        Ok(AuthResponse {
            access_token: self.sign(&claims)?,
            user: UserView {
                id: account.id.clone(),
                email: account.email.clone(),
                role: account.role,
            },
        })
    }

    /// `base64url(claims).base64url(KMAC256(secret, claims, "token"))`
    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        let payload = base64::encode_config(serde_json::to_vec(claims)?, base64::URL_SAFE_NO_PAD);
        let tag = self.tag(payload.as_bytes());
        Ok(format!(
            "{}.{}",
            payload,
            base64::encode_config(tag, base64::URL_SAFE_NO_PAD)
        ))
    }

    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (payload, tag) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let tag = base64::decode_config(tag, base64::URL_SAFE_NO_PAD)
            .map_err(|_| AuthError::InvalidToken)?;
        if !constant_time_eq(&self.tag(payload.as_bytes()), &tag) {
            return Err(AuthError::InvalidToken);
        }
        let json = base64::decode_config(payload, base64::URL_SAFE_NO_PAD)
            .map_err(|_| AuthError::InvalidToken)?;
        serde_json::from_slice(&json).map_err(|_| AuthError::InvalidToken)
    }

    fn tag(&self, payload: &[u8]) -> [u8; 32] {
        let mut k = Kmac::v256(&self.secret, b"token");
        k.update(payload);
        let mut tag = [0u8; 32];
        k.finalize(&mut tag);
        tag
    }
}

fn hash_password(password: &[u8], salt: &[u8]) -> Result<[u8; 32], argon2::Error> {
    let raw_hash = argon2::hash_raw(
        password,
        salt,
        &argon2::Config {
            hash_length: 32,
            lanes: 1,
            mem_cost: 4096,
            thread_mode: argon2::ThreadMode::Sequential,
            time_cost: 3,
            variant: argon2::Variant::Argon2i,
            version: argon2::Version::Version13,
            ..argon2::Config::default()
        },
    )?;

    let mut hash = [0u8; 32];
    let mut k = Kmac::v256(salt, b"check");
    k.update(&raw_hash);
    k.finalize(&mut hash);
    Ok(hash)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn new_account_id() -> String {
    let mut bytes = [0u8; 12];
    OsRng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("user-{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::items;
    use crate::inbox::{MemoryInboxStore, PhotoKind};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    fn service(dir: &Path) -> AuthService {
        AuthService::open(dir, &["Boss@Example.com".to_string()], 24).unwrap()
    }

    #[test]
    fn signup_then_login_returns_a_token_for_the_same_user() {
        let dir = tempfile::tempdir().unwrap();
        let auth = service(dir.path());

        let signed_up = auth.signup("test@example.com", "password123", now()).unwrap();
        assert_eq!(signed_up.user.role, Role::User);

        let logged_in = auth.login(" Test@Example.com ", "password123", now()).unwrap();
        assert_eq!(logged_in.user, signed_up.user);

        let user = auth.authenticate(&logged_in.access_token, now()).unwrap();
        assert_eq!(user.user_id, signed_up.user.id);
        assert_eq!(user.email, "test@example.com");
    }

    #[test]
    fn signup_validates_input() {
        let dir = tempfile::tempdir().unwrap();
        let auth = service(dir.path());
        assert!(matches!(
            auth.signup("not-an-email", "password123", now()),
            Err(AuthError::InvalidEmail)
        ));
        assert!(matches!(
            auth.signup("a@b.c", "short", now()),
            Err(AuthError::PasswordTooShort)
        ));
        auth.signup("a@b.c", "password123", now()).unwrap();
        assert!(matches!(
            auth.signup("A@B.C", "password456", now()),
            Err(AuthError::EmailTaken)
        ));
    }

    #[test]
    fn wrong_password_and_unknown_email_look_the_same() {
        let dir = tempfile::tempdir().unwrap();
        let auth = service(dir.path());
        auth.signup("a@b.c", "password123", now()).unwrap();
        assert!(matches!(
            auth.login("a@b.c", "password124", now()),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("x@b.c", "password123", now()),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn configured_admin_emails_get_the_admin_role() {
        let dir = tempfile::tempdir().unwrap();
        let auth = service(dir.path());
        let admin = auth.signup("boss@example.com", "password123", now()).unwrap();
        assert_eq!(admin.user.role, Role::Admin);
        assert!(auth.customers().unwrap().is_empty());
    }

    #[test]
    fn tampered_and_expired_tokens_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let auth = service(dir.path());
        let token = auth.signup("a@b.c", "password123", now()).unwrap().access_token;

        let (payload, _) = token.split_once('.').unwrap();
        let forged = format!("{payload}.AAAA");
        assert!(matches!(auth.authenticate(&forged, now()), Err(AuthError::InvalidToken)));
        assert!(matches!(auth.authenticate("garbage", now()), Err(AuthError::InvalidToken)));

        let later = now() + Duration::hours(25);
        assert!(matches!(auth.authenticate(&token, later), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn huge_token_lifetime_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let auth = AuthService::open(dir.path(), &[], 10_000_000_000).unwrap();
        let token = auth.signup("a@b.c", "password123", now()).unwrap().access_token;

        let just_inside = now() + Duration::hours(MAX_TOKEN_TTL_HOURS - 1);
        assert!(auth.authenticate(&token, just_inside).is_ok());
        let past_cap = now() + Duration::hours(MAX_TOKEN_TTL_HOURS);
        assert!(matches!(auth.authenticate(&token, past_cap), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn tokens_survive_reopening_but_not_a_new_secret() {
        let dir = tempfile::tempdir().unwrap();
        let token = service(dir.path())
            .signup("a@b.c", "password123", now())
            .unwrap()
            .access_token;
        assert!(service(dir.path()).authenticate(&token, now()).is_ok());

        std::fs::remove_file(dir.path().join(SECRET_FILE)).unwrap();
        assert!(matches!(
            service(dir.path()).authenticate(&token, now()),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn deleted_subject_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let auth = service(dir.path());
        let token = auth.signup("a@b.c", "password123", now()).unwrap().access_token;
        std::fs::write(dir.path().join(ACCOUNTS_FILE), "[]").unwrap();
        assert!(matches!(auth.authenticate(&token, now()), Err(AuthError::UserNotFound)));
    }

    #[test]
    fn role_guard_checks_membership() {
        let user = AuthUser {
            user_id: "user-123".into(),
            email: "test@example.com".into(),
            role: Role::User,
        };
        let admin = AuthUser {
            role: Role::Admin,
            ..user.clone()
        };
        let guard = RoleGuard::new(&[Role::Admin]);
        assert!(matches!(guard.check(Some(&user)), Err(AuthError::Forbidden)));
        assert!(matches!(guard.check(None), Err(AuthError::Forbidden)));
        assert!(guard.check(Some(&admin)).is_ok());
        assert!(RoleGuard::default().check(None).is_ok());
        assert_eq!(
            AuthError::Forbidden.to_string(),
            "You do not have permission to access this resource"
        );
    }

    #[test]
    fn admin_dashboard_counts_users_and_items() {
        let dir = tempfile::tempdir().unwrap();
        let auth = service(dir.path());
        let customer = auth.signup("a@b.c", "password123", now()).unwrap();
        let admin = auth.signup("boss@example.com", "password123", now()).unwrap();
        let admin = auth.authenticate(&admin.access_token, now()).unwrap();

        let mut store = MemoryInboxStore::default();
        store
            .append_photos(&customer.user.id, PhotoKind::Letters, items("let", 3))
            .unwrap();

        let dashboard = auth.admin_dashboard(&admin, &store).unwrap();
        assert_eq!(dashboard.message, "Welcome to the admin dashboard");
        assert_eq!(dashboard.user.email, "boss@example.com");
        assert_eq!(
            dashboard.stats,
            DashboardStats {
                total_users: 2,
                total_inbox_items: 3
            }
        );

        let customer = auth.authenticate(&customer.access_token, now()).unwrap();
        assert!(matches!(
            auth.admin_dashboard(&customer, &store),
            Err(AuthError::Forbidden)
        ));
    }
}
