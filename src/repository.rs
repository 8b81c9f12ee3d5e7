use crate::auth::hash_password;
use crate::error::AppError;
use crate::models::{
    Application, CreateApplicationRequest, CreateJobRequest, Job, UpdateProfileRequest, User,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the core
/// of the Repository Abstraction pattern, allowing the handlers to interact with
/// the data layer without knowing the specific implementation (Postgres, Mock, etc.).
///
/// Every operation returns `Result`: an infrastructure failure propagates with `?`
/// into the terminal error backstop rather than being swallowed into an empty
/// answer, so a broken database is visible as the generic 500, never as "no data".
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's asynchronous task
/// boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users / Credentials ---
    // Returns None when the email is already registered (uniqueness conflict).
    async fn create_user(&self, user: User) -> Result<Option<User>, AppError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    // Credential lookup for login; includes the password digest.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    // Partial profile update; None when the user does not exist.
    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError>;

    // --- Jobs ---
    // Public listing with optional keyword and location filters.
    async fn get_jobs(
        &self,
        search: Option<String>,
        location: Option<String>,
    ) -> Result<Vec<Job>, AppError>;
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, AppError>;
    async fn create_job(&self, req: CreateJobRequest, posted_by: Uuid) -> Result<Job, AppError>;
    // Owner-Only: deletes only if `posted_by` matches the posting's owner.
    // Returns true if a row was deleted.
    async fn delete_job(&self, id: Uuid, posted_by: Uuid) -> Result<bool, AppError>;

    // --- Applications ---
    // Returns None when the (job, applicant) pair already exists (duplicate
    // application conflict).
    async fn create_application(
        &self,
        req: CreateApplicationRequest,
        applicant_id: Uuid,
    ) -> Result<Option<Application>, AppError>;
    async fn get_my_applications(&self, applicant_id: Uuid) -> Result<Vec<Application>, AppError>;
    async fn get_applications_for_job(&self, job_id: Uuid) -> Result<Vec<Application>, AppError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// Inserts a new account row. Uses `ON CONFLICT DO NOTHING` against the email
    /// uniqueness constraint: a duplicate registration yields `None` instead of a
    /// database error, which the handler maps to a 409.
    async fn create_user(&self, user: User) -> Result<Option<User>, AppError> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, name, email, password_hash, role, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.created_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted)
    }

    /// get_user
    ///
    /// Retrieves the full account row by primary key.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// get_user_by_email
    ///
    /// Credential lookup for the login flow. Case-insensitive on the email side so
    /// `Ada@Example.com` and `ada@example.com` resolve to the same account.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// update_user
    ///
    /// Partial profile update. Uses the PostgreSQL `COALESCE` function to handle
    /// `Option<T>` fields, only changing a column when the corresponding request
    /// field is `Some`.
    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email)
            WHERE id = $1
            RETURNING id, name, email, password_hash, role, created_at
            "#,
        )
        .bind(id)
        .bind(req.name)
        .bind(req.email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// get_jobs
    ///
    /// Implements flexible search/filtering using QueryBuilder for safe
    /// parameterization: every user-supplied value travels as a bind, never as
    /// interpolated SQL. The keyword filter matches title, description, and
    /// company case-insensitively.
    async fn get_jobs(
        &self,
        search: Option<String>,
        location: Option<String>,
    ) -> Result<Vec<Job>, AppError> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT id, posted_by, title, description, company, location, salary, created_at
            FROM jobs
            WHERE true
            "#,
        );

        if let Some(s) = search {
            let pattern = format!("%{}%", s);
            builder.push(" AND (title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR description ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR company ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        if let Some(loc) = location {
            builder.push(" AND location ILIKE ");
            builder.push_bind(format!("%{}%", loc));
        }

        builder.push(" ORDER BY created_at DESC");

        let jobs = builder
            .build_query_as::<Job>()
            .fetch_all(&self.pool)
            .await?;
        Ok(jobs)
    }

    /// get_job
    ///
    /// Simple retrieval of a posting by ID.
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, AppError> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, posted_by, title, description, company, location, salary, created_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    /// create_job
    ///
    /// Inserts a new posting owned by the authenticated employer.
    async fn create_job(&self, req: CreateJobRequest, posted_by: Uuid) -> Result<Job, AppError> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (id, posted_by, title, description, company, location, salary, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id, posted_by, title, description, company, location, salary, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(posted_by)
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.company)
        .bind(&req.location)
        .bind(req.salary)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    /// delete_job
    ///
    /// Deletes a posting only if the provided `posted_by` matches the owner.
    /// This is the **Owner-Only** authorization check.
    async fn delete_job(&self, id: Uuid, posted_by: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND posted_by = $2")
            .bind(id)
            .bind(posted_by)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// create_application
    ///
    /// Inserts an application. Uses `ON CONFLICT DO NOTHING` over the
    /// (job_id, applicant_id) uniqueness constraint so a second application from
    /// the same seeker yields `None` (mapped to 409) instead of a second row.
    async fn create_application(
        &self,
        req: CreateApplicationRequest,
        applicant_id: Uuid,
    ) -> Result<Option<Application>, AppError> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (id, job_id, applicant_id, cover_letter, status, created_at)
            VALUES ($1, $2, $3, $4, 'submitted', NOW())
            ON CONFLICT (job_id, applicant_id) DO NOTHING
            RETURNING id, job_id, applicant_id, cover_letter, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.job_id)
        .bind(applicant_id)
        .bind(req.cover_letter)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    /// get_my_applications
    ///
    /// Retrieves every application the authenticated seeker has submitted.
    async fn get_my_applications(&self, applicant_id: Uuid) -> Result<Vec<Application>, AppError> {
        let applications = sqlx::query_as::<_, Application>(
            r#"
            SELECT id, job_id, applicant_id, cover_letter, status, created_at
            FROM applications
            WHERE applicant_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(applicant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    /// get_applications_for_job
    ///
    /// Retrieves every application submitted to one posting. The ownership check
    /// (only the poster may list them) happens in the handler against `get_job`.
    async fn get_applications_for_job(&self, job_id: Uuid) -> Result<Vec<Application>, AppError> {
        let applications = sqlx::query_as::<_, Application>(
            r#"
            SELECT id, job_id, applicant_id, cover_letter, status, created_at
            FROM applications
            WHERE job_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }
}

// --- The Mock Implementation (For Unit Tests) ---

/// MockRepository
///
/// An in-memory implementation of `Repository` used exclusively for unit and
/// integration testing. It behaves like the real thing for the thin handler
/// surface (uniqueness conflicts included) and carries two simulation knobs:
/// `new_failing` makes every operation report a database error, `new_panicking`
/// makes every operation panic. Those are the two paths the terminal backstop
/// must fold into the same generic 500.
pub struct MockRepository {
    data: RwLock<MockData>,
    should_fail: bool,
    should_panic: bool,
}

#[derive(Default)]
struct MockData {
    users: Vec<User>,
    jobs: Vec<Job>,
    applications: Vec<Application>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(MockData::default()),
            should_fail: false,
            should_panic: false,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    pub fn new_panicking() -> Self {
        Self {
            should_panic: true,
            ..Self::new()
        }
    }

    /// seed_user
    ///
    /// Inserts an account directly, bypassing the conflict check. Returns the
    /// stored row so tests know the generated ID.
    pub async fn seed_user(&self, name: &str, email: &str, password: &str, role: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password),
            role: role.to_string(),
            created_at: Utc::now(),
        };
        self.data.write().await.users.push(user.clone());
        user
    }

    fn simulate(&self) -> Result<(), AppError> {
        if self.should_panic {
            panic!("mock repository panic: simulation requested");
        }
        if self.should_fail {
            return Err(AppError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn create_user(&self, user: User) -> Result<Option<User>, AppError> {
        self.simulate()?;
        let mut data = self.data.write().await;
        if data
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Ok(None);
        }
        data.users.push(user.clone());
        Ok(Some(user))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.simulate()?;
        let data = self.data.read().await;
        Ok(data.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.simulate()?;
        let data = self.data.read().await;
        Ok(data
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError> {
        self.simulate()?;
        let mut data = self.data.write().await;
        let Some(user) = data.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            user.name = name;
        }
        if let Some(email) = req.email {
            user.email = email;
        }
        Ok(Some(user.clone()))
    }

    async fn get_jobs(
        &self,
        search: Option<String>,
        location: Option<String>,
    ) -> Result<Vec<Job>, AppError> {
        self.simulate()?;
        let data = self.data.read().await;
        let search = search.map(|s| s.to_lowercase());
        let location = location.map(|l| l.to_lowercase());
        let mut jobs: Vec<Job> = data
            .jobs
            .iter()
            .filter(|job| {
                let keyword_ok = search.as_ref().is_none_or(|s| {
                    job.title.to_lowercase().contains(s)
                        || job.description.to_lowercase().contains(s)
                        || job.company.to_lowercase().contains(s)
                });
                let location_ok = location
                    .as_ref()
                    .is_none_or(|l| job.location.to_lowercase().contains(l));
                keyword_ok && location_ok
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, AppError> {
        self.simulate()?;
        let data = self.data.read().await;
        Ok(data.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn create_job(&self, req: CreateJobRequest, posted_by: Uuid) -> Result<Job, AppError> {
        self.simulate()?;
        let job = Job {
            id: Uuid::new_v4(),
            posted_by,
            title: req.title,
            description: req.description,
            company: req.company,
            location: req.location,
            salary: req.salary,
            created_at: Utc::now(),
        };
        self.data.write().await.jobs.push(job.clone());
        Ok(job)
    }

    async fn delete_job(&self, id: Uuid, posted_by: Uuid) -> Result<bool, AppError> {
        self.simulate()?;
        let mut data = self.data.write().await;
        let before = data.jobs.len();
        data.jobs.retain(|j| !(j.id == id && j.posted_by == posted_by));
        Ok(data.jobs.len() < before)
    }

    async fn create_application(
        &self,
        req: CreateApplicationRequest,
        applicant_id: Uuid,
    ) -> Result<Option<Application>, AppError> {
        self.simulate()?;
        let mut data = self.data.write().await;
        if data
            .applications
            .iter()
            .any(|a| a.job_id == req.job_id && a.applicant_id == applicant_id)
        {
            return Ok(None);
        }
        let application = Application {
            id: Uuid::new_v4(),
            job_id: req.job_id,
            applicant_id,
            cover_letter: req.cover_letter,
            status: "submitted".to_string(),
            created_at: Utc::now(),
        };
        data.applications.push(application.clone());
        Ok(Some(application))
    }

    async fn get_my_applications(&self, applicant_id: Uuid) -> Result<Vec<Application>, AppError> {
        self.simulate()?;
        let data = self.data.read().await;
        Ok(data
            .applications
            .iter()
            .filter(|a| a.applicant_id == applicant_id)
            .cloned()
            .collect())
    }

    async fn get_applications_for_job(&self, job_id: Uuid) -> Result<Vec<Application>, AppError> {
        self.simulate()?;
        let data = self.data.read().await;
        Ok(data
            .applications
            .iter()
            .filter(|a| a.job_id == job_id)
            .cloned()
            .collect())
    }
}
