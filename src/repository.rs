use crate::{
    error::RepositoryError,
    models::{
        CreateSchoolRequest, CreateStudentRequest, DashboardStats, Page, Pagination, School,
        Student, UpdateSchoolRequest, UpdateStudentRequest, UpdateUserRequest, UserProfile,
    },
    roles::RoleStore,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// The abstract contract for every console read and write against the hosted database.
/// Handlers only see this trait, so tests swap in an in-memory implementation.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Dashboard ---
    async fn get_stats(&self) -> Result<DashboardStats, RepositoryError>;

    // --- Schools ---
    async fn list_schools(
        &self,
        search: Option<String>,
        pagination: Pagination,
    ) -> Result<Page<School>, RepositoryError>;
    async fn get_school(&self, id: Uuid) -> Result<Option<School>, RepositoryError>;
    async fn create_school(&self, req: CreateSchoolRequest) -> Result<School, RepositoryError>;
    // Uses COALESCE so absent fields keep their stored value.
    async fn update_school(
        &self,
        id: Uuid,
        req: UpdateSchoolRequest,
    ) -> Result<Option<School>, RepositoryError>;
    // Returns true if a row was deleted.
    async fn delete_school(&self, id: Uuid) -> Result<bool, RepositoryError>;

    // --- Users ---
    async fn list_users(
        &self,
        search: Option<String>,
        pagination: Pagination,
    ) -> Result<Page<UserProfile>, RepositoryError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError>;
    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<Option<UserProfile>, RepositoryError>;

    // --- Students ---
    async fn list_students(
        &self,
        school_id: Option<Uuid>,
        search: Option<String>,
        pagination: Pagination,
    ) -> Result<Page<Student>, RepositoryError>;
    async fn get_student(&self, id: Uuid) -> Result<Option<Student>, RepositoryError>;
    async fn create_student(&self, req: CreateStudentRequest) -> Result<Student, RepositoryError>;
    async fn update_student(
        &self,
        id: Uuid,
        req: UpdateStudentRequest,
    ) -> Result<Option<Student>, RepositoryError>;
    async fn delete_student(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` and `RoleStore` backed by the hosted Postgres database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SCHOOL_COLUMNS: &str =
    "id, name, code, city, phone, email, is_active, created_at, updated_at";

const STUDENT_COLUMNS: &str = "id, school_id, first_name, last_name, id_number, gender, \
     date_of_birth, created_at, updated_at";

// Profiles joined with their role values; every query appends its own WHERE / GROUP BY.
const USER_SELECT: &str = r#"
    SELECT p.id, p.email, p.first_name, p.last_name, p.phone, p.school_id, p.created_at,
           COALESCE(array_agg(r.role) FILTER (WHERE r.role IS NOT NULL), '{}') AS roles
    FROM profiles p
    LEFT JOIN user_roles r ON r.user_id = p.id
"#;

// Appended after every bound `like_pattern`.
const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// like_pattern
///
/// Substring pattern for `ILIKE ... ESCAPE '\'`: the search text's own `%`, `_` and `\`
/// match literally.
pub fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl Repository for PostgresRepository {
    /// get_stats
    ///
    /// All counters in one round trip.
    async fn get_stats(&self) -> Result<DashboardStats, RepositoryError> {
        let (total_schools, active_schools, total_students, total_users): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM schools),
                    (SELECT COUNT(*) FROM schools WHERE is_active),
                    (SELECT COUNT(*) FROM students),
                    (SELECT COUNT(*) FROM profiles)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardStats {
            total_schools,
            active_schools,
            total_students,
            total_users,
        })
    }

    /// list_schools
    ///
    /// Builds the filter with QueryBuilder so the search term is always a bind parameter.
    async fn list_schools(
        &self,
        search: Option<String>,
        pagination: Pagination,
    ) -> Result<Page<School>, RepositoryError> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM schools");
        let mut rows: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {SCHOOL_COLUMNS} FROM schools"));

        if let Some(s) = &search {
            for builder in [&mut count, &mut rows] {
                builder.push(" WHERE (name ILIKE ");
                builder.push_bind(like_pattern(s));
                builder.push(LIKE_ESCAPE);
                builder.push(" OR code ILIKE ");
                builder.push_bind(like_pattern(s));
                builder.push(LIKE_ESCAPE);
                builder.push(")");
            }
        }

        rows.push(" ORDER BY name ASC LIMIT ");
        rows.push_bind(pagination.per_page);
        rows.push(" OFFSET ");
        rows.push_bind(pagination.offset());

        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        let items = rows.build_query_as::<School>().fetch_all(&self.pool).await?;

        Ok(Page {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }

    async fn get_school(&self, id: Uuid) -> Result<Option<School>, RepositoryError> {
        let school = sqlx::query_as::<_, School>(&format!(
            "SELECT {SCHOOL_COLUMNS} FROM schools WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(school)
    }

    async fn create_school(&self, req: CreateSchoolRequest) -> Result<School, RepositoryError> {
        let school = sqlx::query_as::<_, School>(&format!(
            r#"INSERT INTO schools (name, code, city, phone, email)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {SCHOOL_COLUMNS}"#
        ))
        .bind(req.name)
        .bind(req.code)
        .bind(req.city)
        .bind(req.phone)
        .bind(req.email)
        .fetch_one(&self.pool)
        .await?;
        Ok(school)
    }

    async fn update_school(
        &self,
        id: Uuid,
        req: UpdateSchoolRequest,
    ) -> Result<Option<School>, RepositoryError> {
        let school = sqlx::query_as::<_, School>(&format!(
            r#"UPDATE schools SET
                   name = COALESCE($2, name),
                   code = COALESCE($3, code),
                   city = COALESCE($4, city),
                   phone = COALESCE($5, phone),
                   email = COALESCE($6, email),
                   is_active = COALESCE($7, is_active),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {SCHOOL_COLUMNS}"#
        ))
        .bind(id)
        .bind(req.name)
        .bind(req.code)
        .bind(req.city)
        .bind(req.phone)
        .bind(req.email)
        .bind(req.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(school)
    }

    async fn delete_school(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM schools WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(
        &self,
        search: Option<String>,
        pagination: Pagination,
    ) -> Result<Page<UserProfile>, RepositoryError> {
        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM profiles p");
        let mut rows: QueryBuilder<Postgres> = QueryBuilder::new(USER_SELECT);

        if let Some(s) = &search {
            for builder in [&mut count, &mut rows] {
                builder.push(" WHERE (p.email ILIKE ");
                builder.push_bind(like_pattern(s));
                builder.push(LIKE_ESCAPE);
                builder.push(" OR p.first_name ILIKE ");
                builder.push_bind(like_pattern(s));
                builder.push(LIKE_ESCAPE);
                builder.push(" OR p.last_name ILIKE ");
                builder.push_bind(like_pattern(s));
                builder.push(LIKE_ESCAPE);
                builder.push(")");
            }
        }

        rows.push(" GROUP BY p.id ORDER BY p.last_name ASC, p.first_name ASC LIMIT ");
        rows.push_bind(pagination.per_page);
        rows.push(" OFFSET ");
        rows.push_bind(pagination.offset());

        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        let items = rows
            .build_query_as::<UserProfile>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError> {
        let user = sqlx::query_as::<_, UserProfile>(&format!(
            "{USER_SELECT} WHERE p.id = $1 GROUP BY p.id"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        let updated = sqlx::query(
            r#"UPDATE profiles SET
                   first_name = COALESCE($2, first_name),
                   last_name = COALESCE($3, last_name),
                   phone = COALESCE($4, phone),
                   school_id = COALESCE($5, school_id),
                   updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(req.first_name)
        .bind(req.last_name)
        .bind(req.phone)
        .bind(req.school_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user(id).await
    }

    async fn list_students(
        &self,
        school_id: Option<Uuid>,
        search: Option<String>,
        pagination: Pagination,
    ) -> Result<Page<Student>, RepositoryError> {
        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM students WHERE true");
        let mut rows: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE true"
        ));

        for builder in [&mut count, &mut rows] {
            if let Some(school_id) = school_id {
                builder.push(" AND school_id = ");
                builder.push_bind(school_id);
            }
            if let Some(s) = &search {
                builder.push(" AND (first_name ILIKE ");
                builder.push_bind(like_pattern(s));
                builder.push(LIKE_ESCAPE);
                builder.push(" OR last_name ILIKE ");
                builder.push_bind(like_pattern(s));
                builder.push(LIKE_ESCAPE);
                builder.push(" OR id_number ILIKE ");
                builder.push_bind(like_pattern(s));
                builder.push(LIKE_ESCAPE);
                builder.push(")");
            }
        }

        rows.push(" ORDER BY last_name ASC, first_name ASC LIMIT ");
        rows.push_bind(pagination.per_page);
        rows.push(" OFFSET ");
        rows.push_bind(pagination.offset());

        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        let items = rows.build_query_as::<Student>().fetch_all(&self.pool).await?;

        Ok(Page {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }

    async fn get_student(&self, id: Uuid) -> Result<Option<Student>, RepositoryError> {
        let student = sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(student)
    }

    async fn create_student(&self, req: CreateStudentRequest) -> Result<Student, RepositoryError> {
        let student = sqlx::query_as::<_, Student>(&format!(
            r#"INSERT INTO students (school_id, first_name, last_name, id_number, gender, date_of_birth)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {STUDENT_COLUMNS}"#
        ))
        .bind(req.school_id)
        .bind(req.first_name)
        .bind(req.last_name)
        .bind(req.id_number)
        .bind(req.gender)
        .bind(req.date_of_birth)
        .fetch_one(&self.pool)
        .await?;
        Ok(student)
    }

    async fn update_student(
        &self,
        id: Uuid,
        req: UpdateStudentRequest,
    ) -> Result<Option<Student>, RepositoryError> {
        let student = sqlx::query_as::<_, Student>(&format!(
            r#"UPDATE students SET
                   first_name = COALESCE($2, first_name),
                   last_name = COALESCE($3, last_name),
                   id_number = COALESCE($4, id_number),
                   gender = COALESCE($5, gender),
                   date_of_birth = COALESCE($6, date_of_birth),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {STUDENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(req.first_name)
        .bind(req.last_name)
        .bind(req.id_number)
        .bind(req.gender)
        .bind(req.date_of_birth)
        .fetch_optional(&self.pool)
        .await?;
        Ok(student)
    }

    async fn delete_student(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RoleStore for PostgresRepository {
    /// has_role
    ///
    /// Single indexed lookup, never cached: role changes apply on the next request.
    async fn has_role(&self, user_id: Uuid, role: &str) -> Result<bool, RepositoryError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_roles WHERE user_id = $1 AND role = $2)",
        )
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }
}
