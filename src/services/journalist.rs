//! Journalist service
//!
//! Roster management and caller resolution. A signed-in auth user maps to a
//! journalist by `auth_user_id`, falling back to a case-insensitive email
//! match; the journalist's role decides what the caller may do.

use crate::db::now_utc;
use crate::db::repositories::{is_unique_violation, JournalistRepository};
use crate::models::{
    Journalist, JournalistInput, JournalistRole, JournalistStatus, JournalistUpsert,
};
use crate::platform::{AuthError, AuthProvider, AuthUser};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;

/// Message returned to callers without the Editor in Chief role
pub const EIC_ONLY_MESSAGE: &str = "Only Editor in Chief can manage journalists";

#[derive(Debug, thiserror::Error)]
pub enum JournalistServiceError {
    #[error("Journalist not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    /// Platform credentials are not configured
    #[error("Server is missing platform credentials")]
    MissingConfig,

    /// The auth platform or datastore refused a privileged write
    #[error("{0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// New journalist with a login account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub department: Option<String>,
}

/// Fields written by an email-keyed upsert
#[derive(Debug, Clone)]
pub struct EmailUpsert {
    pub name: String,
    pub email: String,
    pub role: JournalistRole,
    pub department: Option<String>,
    /// `None` keeps any existing account link
    pub auth_user_id: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct JournalistService {
    repo: Arc<dyn JournalistRepository>,
    auth: Option<Arc<dyn AuthProvider>>,
}

impl JournalistService {
    pub fn new(repo: Arc<dyn JournalistRepository>, auth: Option<Arc<dyn AuthProvider>>) -> Self {
        Self { repo, auth }
    }

    /// Public roster: Active journalists by name
    pub async fn list_active(&self) -> Result<Vec<Journalist>, JournalistServiceError> {
        Ok(self
            .repo
            .list_active()
            .await
            .context("Failed to list journalists")?)
    }

    /// Admin roster: everyone, newest first
    pub async fn list_all(&self) -> Result<Vec<Journalist>, JournalistServiceError> {
        Ok(self
            .repo
            .list_all()
            .await
            .context("Failed to list journalists")?)
    }

    pub async fn count(&self) -> Result<i64, JournalistServiceError> {
        Ok(self
            .repo
            .count()
            .await
            .context("Failed to count journalists")?)
    }

    /// The journalist record behind a signed-in user, if any
    pub async fn resolve_caller(
        &self,
        user: &AuthUser,
    ) -> Result<Option<Journalist>, JournalistServiceError> {
        if let Some(journalist) = self
            .repo
            .find_by_auth_user_id(&user.id)
            .await
            .context("Failed to look up journalist by account")?
        {
            return Ok(Some(journalist));
        }
        let Some(email) = user.email.as_deref().filter(|e| !e.trim().is_empty()) else {
            return Ok(None);
        };
        Ok(self
            .repo
            .find_by_email(email)
            .await
            .context("Failed to look up journalist by email")?)
    }

    /// Fail unless the caller is an Editor in Chief
    pub fn require_editor_in_chief(
        caller: Option<&Journalist>,
        message: &str,
    ) -> Result<(), JournalistServiceError> {
        match caller {
            Some(j) if j.is_editor_in_chief() => Ok(()),
            _ => Err(JournalistServiceError::Forbidden(message.to_string())),
        }
    }

    /// Insert a roster entry without a login account (EIC only)
    pub async fn create(
        &self,
        caller: Option<&Journalist>,
        input: JournalistInput,
    ) -> Result<Journalist, JournalistServiceError> {
        Self::require_editor_in_chief(caller, EIC_ONLY_MESSAGE)?;
        let journalist = Self::build(uuid::Uuid::new_v4().to_string(), input, None)?;
        self.insert(&journalist).await?;
        tracing::info!("Journalist {} added to the roster", journalist.id);
        Ok(journalist)
    }

    /// Overwrite the journalist with this id, or insert it (EIC only).
    /// An absent `auth_user_id` keeps the stored link.
    pub async fn upsert(
        &self,
        caller: Option<&Journalist>,
        upsert: JournalistUpsert,
    ) -> Result<Journalist, JournalistServiceError> {
        Self::require_editor_in_chief(caller, EIC_ONLY_MESSAGE)?;
        let id = upsert.id.trim().to_string();
        if id.is_empty() {
            return Err(JournalistServiceError::ValidationError(
                "Journalist id is required".to_string(),
            ));
        }
        let existing = self
            .repo
            .get_by_id(&id)
            .await
            .context("Failed to load journalist")?;
        let journalist = Self::build(id, upsert.fields, existing.as_ref())?;

        self.repo
            .upsert_by_id(&journalist)
            .await
            .map_err(|e| self.map_write_error(e))?;
        Ok(journalist)
    }

    /// Upsert keyed by case-insensitive email; repeating it never adds rows.
    ///
    /// A concurrent upsert can insert the same email between the lookup and
    /// the write. The unique index rejects the second insert, which is then
    /// retried once as an update of the row that won.
    pub async fn upsert_by_email(
        &self,
        input: EmailUpsert,
    ) -> Result<Journalist, JournalistServiceError> {
        let email = input.email.trim().to_string();
        let mut retried = false;
        loop {
            let existing = self
                .repo
                .find_by_email(&email)
                .await
                .context("Failed to look up journalist by email")?;
            let inserting = existing.is_none();
            let journalist = email_upsert_row(&input, &email, existing);

            match self.repo.upsert_by_id(&journalist).await {
                Ok(()) => return Ok(journalist),
                Err(e) if inserting && !retried && is_unique_violation(&e) => {
                    tracing::info!("Journalist {} was inserted concurrently; updating instead", email);
                    retried = true;
                }
                Err(e) => return Err(JournalistServiceError::Upstream(e.to_string())),
            }
        }
    }

    /// Create a login account with a password, then the journalist linked to
    /// it (EIC only). If the journalist insert fails, the new account is
    /// deleted again on a best-effort basis.
    pub async fn create_with_account(
        &self,
        caller: Option<&Journalist>,
        input: AccountInput,
    ) -> Result<Journalist, JournalistServiceError> {
        Self::require_editor_in_chief(caller, EIC_ONLY_MESSAGE)?;
        self.provision_account(input).await
    }

    /// Account provisioning without a caller check, for operator tooling
    pub async fn provision_account(
        &self,
        input: AccountInput,
    ) -> Result<Journalist, JournalistServiceError> {
        let auth = self
            .auth
            .as_ref()
            .ok_or(JournalistServiceError::MissingConfig)?;

        let email = input.email.trim();
        let name = input.name.trim();
        let role = input.role.trim();
        if email.is_empty() || input.password.is_empty() || name.is_empty() || role.is_empty() {
            return Err(JournalistServiceError::ValidationError(
                "Missing email, password, name, or role".to_string(),
            ));
        }
        let role: JournalistRole = role
            .parse()
            .map_err(|_| JournalistServiceError::ValidationError("Invalid role".to_string()))?;

        let user = auth
            .create_user(email, &input.password)
            .await
            .map_err(|e: AuthError| JournalistServiceError::Upstream(e.to_string()))?;

        let now = now_utc();
        let journalist = Journalist {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: Some(email.to_string()),
            role,
            department: trimmed(input.department),
            bio: None,
            avatar_url: None,
            status: JournalistStatus::Active,
            auth_user_id: Some(user.id.clone()),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.repo.insert(&journalist).await {
            if let Err(cleanup) = auth.delete_user(&user.id).await {
                tracing::warn!("Failed to roll back account {}: {}", user.id, cleanup);
            }
            return Err(JournalistServiceError::Upstream(e.to_string()));
        }
        tracing::info!("Created account and journalist {}", journalist.id);
        Ok(journalist)
    }

    fn build(
        id: String,
        input: JournalistInput,
        existing: Option<&Journalist>,
    ) -> Result<Journalist, JournalistServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(JournalistServiceError::ValidationError(
                "Name cannot be empty".to_string(),
            ));
        }
        let now = now_utc();
        Ok(Journalist {
            id,
            name,
            email: trimmed(input.email),
            role: input.role,
            department: trimmed(input.department),
            bio: trimmed(input.bio),
            avatar_url: trimmed(input.avatar_url),
            status: input.status,
            auth_user_id: trimmed(input.auth_user_id)
                .or_else(|| existing.and_then(|j| j.auth_user_id.clone())),
            created_at: existing.map(|j| j.created_at).unwrap_or(now),
            updated_at: now,
        })
    }

    async fn insert(&self, journalist: &Journalist) -> Result<(), JournalistServiceError> {
        self.repo
            .insert(journalist)
            .await
            .map_err(|e| self.map_write_error(e))
    }

    fn map_write_error(&self, err: anyhow::Error) -> JournalistServiceError {
        if is_unique_violation(&err) {
            JournalistServiceError::ValidationError(
                "A journalist with this email already exists".to_string(),
            )
        } else {
            JournalistServiceError::InternalError(err.context("Failed to save journalist"))
        }
    }
}

/// Row written by an email upsert: the existing row updated, or a new one
fn email_upsert_row(input: &EmailUpsert, email: &str, existing: Option<Journalist>) -> Journalist {
    let now = now_utc();
    match existing {
        Some(current) => Journalist {
            name: input.name.trim().to_string(),
            email: Some(email.to_string()),
            role: input.role,
            department: trimmed(input.department.clone()),
            status: JournalistStatus::Active,
            auth_user_id: input.auth_user_id.clone().or(current.auth_user_id.clone()),
            updated_at: now,
            ..current
        },
        None => Journalist {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            email: Some(email.to_string()),
            role: input.role,
            department: trimmed(input.department.clone()),
            bio: None,
            avatar_url: None,
            status: JournalistStatus::Active,
            auth_user_id: input.auth_user_id.clone(),
            created_at: now,
            updated_at: now,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxJournalistRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::platform::AuthSession;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Auth fake that records account creation and deletion
    #[derive(Default)]
    struct AccountsFake {
        created: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AuthProvider for AccountsFake {
        async fn get_user(&self, _: &str) -> Result<AuthUser, AuthError> {
            Err(AuthError::InvalidSession)
        }
        async fn sign_in_with_password(&self, _: &str, _: &str) -> Result<AuthSession, AuthError> {
            Err(AuthError::InvalidCredentials)
        }
        async fn sign_out(&self, _: &str) -> Result<(), AuthError> {
            Ok(())
        }
        async fn invite_user_by_email(&self, _: &str, _: Option<&str>) -> Result<AuthUser, AuthError> {
            unreachable!("not used here")
        }
        async fn find_user_by_email(&self, _: &str) -> Result<Option<AuthUser>, AuthError> {
            Ok(None)
        }
        async fn create_user(&self, email: &str, _: &str) -> Result<AuthUser, AuthError> {
            if email.starts_with("taken") {
                return Err(AuthError::AlreadyRegistered("User already registered".into()));
            }
            let id = format!("acct-{email}");
            self.created.lock().unwrap().push(id.clone());
            Ok(AuthUser { id, email: Some(email.into()), user_metadata: serde_json::Value::Null })
        }
        async fn delete_user(&self, user_id: &str) -> Result<(), AuthError> {
            self.deleted.lock().unwrap().push(user_id.into());
            Ok(())
        }
        async fn send_password_reset(&self, _: &str, _: Option<&str>) -> Result<(), AuthError> {
            Ok(())
        }
    }

    async fn setup() -> (JournalistService, Arc<AccountsFake>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        let fake = Arc::new(AccountsFake::default());
        let service = JournalistService::new(
            SqlxJournalistRepository::boxed(pool),
            Some(fake.clone() as Arc<dyn AuthProvider>),
        );
        (service, fake)
    }

    fn eic() -> Journalist {
        let now = now_utc();
        Journalist {
            id: "eic".into(),
            name: "Chief".into(),
            email: Some("chief@school.edu".into()),
            role: JournalistRole::EditorInChief,
            department: None,
            bio: None,
            avatar_url: None,
            status: JournalistStatus::Active,
            auth_user_id: Some("auth-eic".into()),
            created_at: now,
            updated_at: now,
        }
    }

    fn input(name: &str, email: &str) -> JournalistInput {
        JournalistInput {
            name: name.into(),
            email: Some(email.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_requires_editor_in_chief() {
        let (service, _) = setup().await;
        let mut editor = eic();
        editor.role = JournalistRole::Editor;

        assert!(matches!(
            service.create(Some(&editor), input("Ada", "ada@school.edu")).await,
            Err(JournalistServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.create(None, input("Ada", "ada@school.edu")).await,
            Err(JournalistServiceError::Forbidden(_))
        ));
        assert_eq!(service.count().await.unwrap(), 0);

        let created = service.create(Some(&eic()), input("Ada", "ada@school.edu")).await.unwrap();
        assert_eq!(created.status, JournalistStatus::Active);
    }

    #[tokio::test]
    async fn test_create_duplicate_email_is_validation_error() {
        let (service, _) = setup().await;
        service.create(Some(&eic()), input("Ada", "ada@school.edu")).await.unwrap();
        let err = service
            .create(Some(&eic()), input("Ada Again", "ADA@school.edu"))
            .await
            .unwrap_err();
        assert!(matches!(err, JournalistServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_upsert_by_email_twice_leaves_one_row() {
        let (service, _) = setup().await;
        let first = service
            .upsert_by_email(EmailUpsert {
                name: "Ben".into(),
                email: "ben@school.edu".into(),
                role: JournalistRole::Contributor,
                department: None,
                auth_user_id: Some("acct-1".into()),
            })
            .await
            .unwrap();
        let second = service
            .upsert_by_email(EmailUpsert {
                name: "Ben Okafor".into(),
                email: "  BEN@school.edu ".into(),
                role: JournalistRole::Editor,
                department: Some("Sports".into()),
                auth_user_id: None,
            })
            .await
            .unwrap();

        assert_eq!(service.count().await.unwrap(), 1);
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Ben Okafor");
        assert_eq!(second.role, JournalistRole::Editor);
        assert_eq!(second.auth_user_id.as_deref(), Some("acct-1"), "link kept");
    }

    #[tokio::test]
    async fn test_resolve_caller_by_account_then_email() {
        let (service, _) = setup().await;
        let linked = service
            .upsert_by_email(EmailUpsert {
                name: "Linked".into(),
                email: "linked@school.edu".into(),
                role: JournalistRole::EditorInChief,
                department: None,
                auth_user_id: Some("acct-linked".into()),
            })
            .await
            .unwrap();
        let unlinked = service
            .upsert_by_email(EmailUpsert {
                name: "Unlinked".into(),
                email: "unlinked@school.edu".into(),
                role: JournalistRole::Editor,
                department: None,
                auth_user_id: None,
            })
            .await
            .unwrap();

        let by_account = AuthUser {
            id: "acct-linked".into(),
            email: Some("other@school.edu".into()),
            user_metadata: serde_json::Value::Null,
        };
        assert_eq!(service.resolve_caller(&by_account).await.unwrap().unwrap().id, linked.id);

        let by_email = AuthUser {
            id: "acct-new".into(),
            email: Some("Unlinked@School.edu".into()),
            user_metadata: serde_json::Value::Null,
        };
        assert_eq!(service.resolve_caller(&by_email).await.unwrap().unwrap().id, unlinked.id);

        let stranger = AuthUser {
            id: "nobody".into(),
            email: None,
            user_metadata: serde_json::Value::Null,
        };
        assert!(service.resolve_caller(&stranger).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_by_id_keeps_link_when_absent() {
        let (service, _) = setup().await;
        let mut fields = input("Cleo", "cleo@school.edu");
        fields.auth_user_id = Some("acct-cleo".into());
        service
            .upsert(Some(&eic()), JournalistUpsert { id: "j-cleo".into(), fields })
            .await
            .unwrap();

        let mut fields = input("Cleo M.", "cleo@school.edu");
        fields.status = JournalistStatus::OnLeave;
        let updated = service
            .upsert(Some(&eic()), JournalistUpsert { id: "j-cleo".into(), fields })
            .await
            .unwrap();

        assert_eq!(updated.auth_user_id.as_deref(), Some("acct-cleo"));
        assert_eq!(updated.status, JournalistStatus::OnLeave);
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_account_creation_links_and_rolls_back() {
        let (service, fake) = setup().await;
        let account = AccountInput {
            email: "dee@school.edu".into(),
            password: "pw-123456".into(),
            name: "Dee".into(),
            role: "Editor".into(),
            department: None,
        };
        let created = service.create_with_account(Some(&eic()), account.clone()).await.unwrap();
        assert_eq!(created.auth_user_id.as_deref(), Some("acct-dee@school.edu"));

        // Same email again: the account is created but the journalist insert
        // hits the unique index, so the account must be removed.
        let mut again = account.clone();
        again.email = "DEE@school.edu".into();
        let err = service.create_with_account(Some(&eic()), again).await.unwrap_err();
        assert!(matches!(err, JournalistServiceError::Upstream(_)));
        assert_eq!(fake.deleted.lock().unwrap().as_slice(), ["acct-DEE@school.edu"]);

        let mut taken = account;
        taken.email = "taken@school.edu".into();
        assert!(matches!(
            service.create_with_account(Some(&eic()), taken).await,
            Err(JournalistServiceError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_account_creation_validates_input() {
        let (service, _) = setup().await;
        let missing = AccountInput {
            email: "x@school.edu".into(),
            name: "X".into(),
            role: "Editor".into(),
            ..Default::default()
        };
        assert!(matches!(
            service.create_with_account(Some(&eic()), missing).await,
            Err(JournalistServiceError::ValidationError(_))
        ));

        let bad_role = AccountInput {
            email: "x@school.edu".into(),
            password: "pw".into(),
            name: "X".into(),
            role: "Publisher".into(),
            department: None,
        };
        let err = service.create_with_account(Some(&eic()), bad_role).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid role");
    }

    /// Repository whose first email lookup misses, as if another writer
    /// inserted the row just after it.
    struct LateLookup {
        inner: SqlxJournalistRepository,
        missed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl JournalistRepository for LateLookup {
        async fn list_all(&self) -> anyhow::Result<Vec<Journalist>> {
            self.inner.list_all().await
        }
        async fn list_active(&self) -> anyhow::Result<Vec<Journalist>> {
            self.inner.list_active().await
        }
        async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<Journalist>> {
            self.inner.get_by_id(id).await
        }
        async fn find_by_auth_user_id(&self, id: &str) -> anyhow::Result<Option<Journalist>> {
            self.inner.find_by_auth_user_id(id).await
        }
        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Journalist>> {
            if !self.missed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_email(email).await
        }
        async fn insert(&self, journalist: &Journalist) -> anyhow::Result<()> {
            self.inner.insert(journalist).await
        }
        async fn upsert_by_id(&self, journalist: &Journalist) -> anyhow::Result<()> {
            self.inner.upsert_by_id(journalist).await
        }
        async fn count(&self) -> anyhow::Result<i64> {
            self.inner.count().await
        }
    }

    #[tokio::test]
    async fn test_upsert_by_email_after_concurrent_insert_updates_row() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        let repo = SqlxJournalistRepository::new(pool.clone());
        let mut winner = eic();
        winner.id = "winner".into();
        winner.email = Some("race@school.edu".into());
        winner.role = JournalistRole::Contributor;
        winner.auth_user_id = Some("auth-race".into());
        repo.insert(&winner).await.unwrap();

        let service = JournalistService::new(
            Arc::new(LateLookup {
                inner: SqlxJournalistRepository::new(pool.clone()),
                missed: Default::default(),
            }),
            None,
        );
        let saved = service
            .upsert_by_email(EmailUpsert {
                name: "Late Writer".into(),
                email: "RACE@school.edu".into(),
                role: JournalistRole::Editor,
                department: None,
                auth_user_id: None,
            })
            .await
            .unwrap();

        assert_eq!(saved.id, "winner");
        assert_eq!(saved.auth_user_id.as_deref(), Some("auth-race"));
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.get_by_id("winner").await.unwrap().unwrap().name, "Late Writer");
    }
}
