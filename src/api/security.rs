use super::*;

pub(super) const DEFAULT_API_RATE_LIMIT_PER_SEC: u32 = 60;
const MAX_TRACKED_CLIENTS: usize = 4096;

#[derive(Clone)]
pub(super) struct ApiSecurity {
    pub required_token: Option<String>,
    pub rate_limit_per_sec: u32,
    pub buckets: Arc<Mutex<HashMap<String, RateBucket>>>,
}

#[derive(Clone)]
pub(super) struct RateBucket {
    pub window_start: std::time::Instant,
    pub count: u32,
}

impl ApiSecurity {
    pub(super) fn new(required_token: Option<String>, rate_limit_per_sec: u32) -> Self {
        Self {
            required_token,
            rate_limit_per_sec: rate_limit_per_sec.max(1),
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(super) fn from_env() -> Self {
        let required_token = crate::config::env_var("SYLVAN_API_TOKEN");
        let rate_limit_per_sec = crate::config::env_var("SYLVAN_API_RATE_LIMIT_PER_SEC")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_API_RATE_LIMIT_PER_SEC);
        if required_token.is_none() {
            warn!("[Sylvan API] SYLVAN_API_TOKEN is not set; the API accepts unauthenticated requests");
        }
        Self::new(required_token, rate_limit_per_sec)
    }

    /// Counts one request for `client`; false once the per-second budget
    /// is spent.
    fn admit(&self, client: String) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = std::time::Instant::now();
        let entry = buckets.entry(client).or_insert(RateBucket {
            window_start: now,
            count: 0,
        });
        if now.duration_since(entry.window_start).as_secs_f32() >= 1.0 {
            entry.window_start = now;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);
        let admitted = entry.count <= self.rate_limit_per_sec;

        if buckets.len() > MAX_TRACKED_CLIENTS {
            buckets.retain(|_, v| now.duration_since(v.window_start).as_secs_f32() < 10.0);
        }
        admitted
    }
}

fn header<'a>(req: &'a Request, name: &str) -> &'a str {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
}

pub(super) async fn api_guard(
    State(security): State<ApiSecurity>,
    req: Request,
    next: Next,
) -> axum::response::Response {
    if let Some(expected_token) = security.required_token.as_deref() {
        let auth_header = header(&req, "authorization");
        let bearer = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .unwrap_or(auth_header);

        if bearer != expected_token && header(&req, "x-api-key") != expected_token {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::err(
                    "Unauthorized: send Authorization: Bearer <SYLVAN_API_TOKEN>",
                )),
            )
                .into_response();
        }
    }

    let client = [header(&req, "x-forwarded-for"), header(&req, "x-real-ip")]
        .into_iter()
        .find(|v| !v.is_empty())
        .unwrap_or("local")
        .to_string();
    if !security.admit(client) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::err("Rate limit exceeded")),
        )
            .into_response();
    }

    next.run(req).await
}
