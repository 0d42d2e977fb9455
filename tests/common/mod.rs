#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response, header},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::SystemTime,
};
use tower::ServiceExt;
use uuid::Uuid;
use yeko_admin::{
    AppConfig, AppState, RoleChecker, create_router,
    auth::{Claims, TOKEN_AUDIENCE},
    error::{RepositoryError, SessionError},
    identity::{IdentityProvider, ProviderUser, TokenGrant},
    models::{
        CreateSchoolRequest, CreateStudentRequest, DashboardStats, Page, Pagination, School,
        Student, UpdateSchoolRequest, UpdateStudentRequest, UpdateUserRequest, UserProfile,
    },
    repository::Repository,
    roles::RoleStore,
    session::{SessionIdentity, SessionResolution, SessionResolver},
};

pub const OPERATOR_ID: Uuid = Uuid::from_u128(0x0a);
pub const ADMIN_ID: Uuid = Uuid::from_u128(0xad);

pub fn test_secret() -> String {
    AppConfig::default().jwt_secret
}

/// Mints an access token the way the identity provider does. Negative offsets are in the past.
pub fn mint_token(user_id: Uuid, secret: &str, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
        aud: TOKEN_AUDIENCE.to_string(),
        email: Some("operator@yeko.test".to_string()),
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

// --- Mock Repository ---

/// In-memory stand-in for the hosted database.
#[derive(Default)]
pub struct MockRepo {
    pub schools: Mutex<Vec<School>>,
    pub students: Mutex<Vec<Student>>,
    pub users: Mutex<Vec<UserProfile>>,
    pub stats: DashboardStats,
    pub failing: bool,
}

impl MockRepo {
    fn check(&self) -> Result<(), RepositoryError> {
        if self.failing {
            Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

fn paginate<T: Clone>(items: Vec<T>, pagination: Pagination) -> Page<T> {
    let total = items.len() as i64;
    let items = items
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.per_page as usize)
        .collect();
    Page {
        items,
        total,
        page: pagination.page,
        per_page: pagination.per_page,
    }
}

fn contains(haystack: &str, needle: &Option<String>) -> bool {
    match needle {
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
        None => true,
    }
}

pub fn school(name: &str, code: &str) -> School {
    School {
        id: Uuid::new_v4(),
        name: name.to_string(),
        code: code.to_string(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        ..School::default()
    }
}

pub fn profile(id: Uuid, email: &str, roles: &[&str]) -> UserProfile {
    UserProfile {
        id,
        email: email.to_string(),
        first_name: "Awa".to_string(),
        last_name: "Kone".to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        created_at: Utc::now(),
        ..UserProfile::default()
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn get_stats(&self) -> Result<DashboardStats, RepositoryError> {
        self.check()?;
        Ok(self.stats.clone())
    }

    async fn list_schools(
        &self,
        search: Option<String>,
        pagination: Pagination,
    ) -> Result<Page<School>, RepositoryError> {
        self.check()?;
        let matching = self
            .schools
            .lock()
            .unwrap()
            .iter()
            .filter(|s| contains(&s.name, &search) || contains(&s.code, &search))
            .cloned()
            .collect();
        Ok(paginate(matching, pagination))
    }

    async fn get_school(&self, id: Uuid) -> Result<Option<School>, RepositoryError> {
        self.check()?;
        Ok(self.schools.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn create_school(&self, req: CreateSchoolRequest) -> Result<School, RepositoryError> {
        self.check()?;
        let mut schools = self.schools.lock().unwrap();
        if schools.iter().any(|s| s.code == req.code) {
            return Err(RepositoryError::Conflict("schools_code_key".to_string()));
        }
        let created = School {
            city: req.city,
            phone: req.phone,
            email: req.email,
            ..school(&req.name, &req.code)
        };
        schools.push(created.clone());
        Ok(created)
    }

    async fn update_school(
        &self,
        id: Uuid,
        req: UpdateSchoolRequest,
    ) -> Result<Option<School>, RepositoryError> {
        self.check()?;
        let mut schools = self.schools.lock().unwrap();
        let Some(school) = schools.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            school.name = name;
        }
        if let Some(code) = req.code {
            school.code = code;
        }
        if let Some(active) = req.is_active {
            school.is_active = active;
        }
        school.city = req.city.or(school.city.take());
        Ok(Some(school.clone()))
    }

    async fn delete_school(&self, id: Uuid) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut schools = self.schools.lock().unwrap();
        let before = schools.len();
        schools.retain(|s| s.id != id);
        Ok(schools.len() < before)
    }

    async fn list_users(
        &self,
        search: Option<String>,
        pagination: Pagination,
    ) -> Result<Page<UserProfile>, RepositoryError> {
        self.check()?;
        let matching = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| contains(&u.email, &search))
            .cloned()
            .collect();
        Ok(paginate(matching, pagination))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError> {
        self.check()?;
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(first_name) = req.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            user.last_name = last_name;
        }
        Ok(Some(user.clone()))
    }

    async fn list_students(
        &self,
        school_id: Option<Uuid>,
        search: Option<String>,
        pagination: Pagination,
    ) -> Result<Page<Student>, RepositoryError> {
        self.check()?;
        let matching = self
            .students
            .lock()
            .unwrap()
            .iter()
            .filter(|s| school_id.is_none_or(|id| s.school_id == id))
            .filter(|s| contains(&s.last_name, &search) || contains(&s.id_number, &search))
            .cloned()
            .collect();
        Ok(paginate(matching, pagination))
    }

    async fn get_student(&self, id: Uuid) -> Result<Option<Student>, RepositoryError> {
        self.check()?;
        Ok(self.students.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn create_student(&self, req: CreateStudentRequest) -> Result<Student, RepositoryError> {
        self.check()?;
        let mut students = self.students.lock().unwrap();
        if students.iter().any(|s| s.id_number == req.id_number) {
            return Err(RepositoryError::Conflict("students_id_number_key".to_string()));
        }
        let created = Student {
            id: Uuid::new_v4(),
            school_id: req.school_id,
            first_name: req.first_name,
            last_name: req.last_name,
            id_number: req.id_number,
            gender: req.gender,
            date_of_birth: req.date_of_birth,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        students.push(created.clone());
        Ok(created)
    }

    async fn update_student(
        &self,
        id: Uuid,
        req: UpdateStudentRequest,
    ) -> Result<Option<Student>, RepositoryError> {
        self.check()?;
        let mut students = self.students.lock().unwrap();
        let Some(student) = students.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if let Some(first_name) = req.first_name {
            student.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            student.last_name = last_name;
        }
        Ok(Some(student.clone()))
    }

    async fn delete_student(&self, id: Uuid) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut students = self.students.lock().unwrap();
        let before = students.len();
        students.retain(|s| s.id != id);
        Ok(students.len() < before)
    }
}

// --- Mock Role Store ---

/// Role store that knows a fixed set of super admins, or fails every lookup.
#[derive(Default)]
pub struct MockRoles {
    pub admins: Vec<Uuid>,
    pub failing: bool,
    pub lookups: AtomicUsize,
}

impl MockRoles {
    pub fn admins(admins: &[Uuid]) -> Self {
        Self {
            admins: admins.to_vec(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleStore for MockRoles {
    async fn has_role(&self, user_id: Uuid, role: &str) -> Result<bool, RepositoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(role == yeko_admin::roles::SUPER_ADMIN_ROLE && self.admins.contains(&user_id))
    }
}

// --- Mock Identity Provider ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Grant,
    Refuse,
    Outage,
}

/// Identity provider that answers every call with the same outcome and records calls.
pub struct MockIdentity {
    pub outcome: Outcome,
    pub user_id: Uuid,
    pub calls: Mutex<Vec<String>>,
}

impl MockIdentity {
    pub fn new(outcome: Outcome, user_id: Uuid) -> Self {
        Self {
            outcome,
            user_id,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn grant(&self) -> TokenGrant {
        TokenGrant {
            access_token: mint_token(self.user_id, &test_secret(), 3600),
            refresh_token: "fresh-refresh-token".to_string(),
            expires_in: 3600,
            token_type: Some("bearer".to_string()),
            user: ProviderUser {
                id: self.user_id,
                email: Some("operator@yeko.test".to_string()),
            },
        }
    }

    fn answer(&self, call: String) -> Result<Option<TokenGrant>, SessionError> {
        self.calls.lock().unwrap().push(call);
        match self.outcome {
            Outcome::Grant => Ok(Some(self.grant())),
            Outcome::Refuse => Ok(None),
            Outcome::Outage => Err(SessionError::Upstream {
                status: 503,
                body: "unavailable".to_string(),
            }),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<TokenGrant>, SessionError> {
        self.answer(format!("refresh:{refresh_token}"))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<Option<TokenGrant>, SessionError> {
        self.answer(format!("password:{email}"))
    }

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Option<TokenGrant>, SessionError> {
        self.answer(format!("pkce:{auth_code}:{code_verifier}"))
    }

    async fn send_password_recovery(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), SessionError> {
        self.answer(format!("recover:{email}:{redirect_to}:{code_challenge}"))
            .map(|_| ())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), SessionError> {
        self.answer(format!("logout:{access_token}")).map(|_| ())
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        format!(
            "https://idp.test/authorize?provider={provider}&redirect_to={redirect_to}&code_challenge={code_challenge}"
        )
    }
}

// --- Mock Session Resolver ---

/// Resolver that returns a fixed identity and cookie set, or an outage.
pub struct MockSessions {
    pub identity: SessionIdentity,
    pub cookies: Vec<Cookie<'static>>,
    pub failing: bool,
}

impl MockSessions {
    pub fn anonymous() -> Self {
        Self::as_identity(SessionIdentity::Anonymous)
    }

    pub fn user(id: Uuid) -> Self {
        Self::as_identity(SessionIdentity::User(id))
    }

    pub fn as_identity(identity: SessionIdentity) -> Self {
        Self {
            identity,
            cookies: Vec::new(),
            failing: false,
        }
    }

    pub fn with_cookie(mut self, name: &'static str, value: &'static str) -> Self {
        self.cookies
            .push(Cookie::build((name, value)).path("/").http_only(true).build());
        self
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::anonymous()
        }
    }
}

#[async_trait]
impl SessionResolver for MockSessions {
    async fn resolve(&self, _jar: &CookieJar) -> Result<SessionResolution, SessionError> {
        if self.failing {
            return Err(SessionError::Upstream {
                status: 502,
                body: "gateway".to_string(),
            });
        }
        Ok(SessionResolution {
            identity: self.identity,
            cookies: self.cookies.clone(),
        })
    }
}

// --- State & Request Helpers ---

pub struct TestApp {
    pub state: AppState,
    pub repo: Arc<MockRepo>,
    pub roles: Arc<MockRoles>,
    pub identity: Arc<MockIdentity>,
}

impl TestApp {
    pub fn new(sessions: MockSessions, roles: MockRoles) -> Self {
        Self::with_parts(sessions, roles, MockRepo::default(), MockIdentity::new(Outcome::Grant, OPERATOR_ID))
    }

    pub fn with_parts(
        sessions: MockSessions,
        roles: MockRoles,
        repo: MockRepo,
        identity: MockIdentity,
    ) -> Self {
        let repo = Arc::new(repo);
        let roles = Arc::new(roles);
        let identity = Arc::new(identity);
        let state = AppState {
            repo: repo.clone(),
            identity: identity.clone(),
            sessions: Arc::new(sessions),
            roles: RoleChecker::new(roles.clone()),
            config: AppConfig::default(),
        };
        Self {
            state,
            repo,
            roles,
            identity,
        }
    }

    /// Sends one request through the full router, gate and layers included.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        create_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Value of the cookie `name` as set by `response`, if any.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|c| {
        let pair = c.split(';').next()?.to_string();
        let (n, v) = pair.split_once('=')?;
        (n == name).then(|| v.to_string())
    })
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
