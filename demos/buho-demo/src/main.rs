//! Runs the Buho API in-process and walks a client session through it.
//!
//! ```text
//! BUHO_JWT_SECRET=... RUST_LOG=buho=debug cargo run -p buho-demo
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use buho::prelude::*;
use buho::router::{Handler, RouterError};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::info;

const DEV_SECRET: &str = "buho-dev-secret-change-me";
const TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// ---------------------------------------------------------------------------
// Demo data
// ---------------------------------------------------------------------------

struct Account {
    id: u64,
    email: &'static str,
    password: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    role: Role,
}

const ACCOUNTS: &[Account] = &[
    Account {
        id: 1,
        email: "admin@buho.mx",
        password: "Admin#2025",
        first_name: "Marta",
        last_name: "Salgado",
        role: Role::Admin,
    },
    Account {
        id: 2,
        email: "ana@buho.mx",
        password: "Owner#2025",
        first_name: "Ana",
        last_name: "Ruiz",
        role: Role::Owner,
    },
    Account {
        id: 3,
        email: "leo@buho.mx",
        password: "Diner#2025",
        first_name: "Leo",
        last_name: "Campos",
        role: Role::User,
    },
];

fn restaurants() -> Value {
    json!([
        { "id": 1, "name": "La Cocina de Ana", "cuisine": "mexicana", "rating": 4.7 },
        { "id": 2, "name": "Tacos El Búho", "cuisine": "tacos", "rating": 4.5 },
        { "id": 3, "name": "Café Nocturno", "cuisine": "café", "rating": 4.2 },
    ])
}

/// Favorite restaurant ids per user.
type Favorites = Arc<Mutex<HashMap<UserId, Vec<u64>>>>;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn reply(data: Value) -> HandlerResult {
    Ok(ResponseEnvelope::ok(data))
}

fn caller(req: &HandlerRequest) -> Result<AuthContext, HandlerError> {
    req.auth.ok_or_else(|| "handler reached without auth context".into())
}

fn login(jwt: JwtVerifier) -> impl Handler {
    move |req: HandlerRequest| {
        let jwt = jwt.clone();
        async move {
            let body = req.body.unwrap_or_default();
            let account = ACCOUNTS.iter().find(|a| {
                body["email"] == a.email && body["password"] == a.password
            });
            let Some(account) = account else {
                return Ok(ResponseEnvelope::unauthorized("invalid credentials"));
            };
            let token = jwt.issue(UserId(account.id), account.role, TOKEN_TTL)?;
            reply(json!({
                "token": token,
                "user": {
                    "id": account.id,
                    "firstName": account.first_name,
                    "lastName": account.last_name,
                    "email": account.email,
                    "role": account.role,
                },
            }))
        }
    }
}

/// Accepts any new email. Nothing is persisted, so the account can't log in.
async fn register(req: HandlerRequest) -> HandlerResult {
    let body = req.body.unwrap_or_default();
    let Some(email) = body["email"].as_str() else {
        return Ok(ResponseEnvelope::failure(status::BAD_REQUEST, "email is required"));
    };
    if ACCOUNTS.iter().any(|a| a.email == email) {
        return Ok(ResponseEnvelope::failure(status::BAD_REQUEST, "email already registered"));
    }
    Ok(ResponseEnvelope {
        status_code: status::CREATED,
        ..ResponseEnvelope::ok(json!({
            "email": email,
            "role": body["role"],
            "restaurant": body["restaurant"],
        }))
    })
}

async fn logout(_req: HandlerRequest) -> HandlerResult {
    reply(json!({ "message": "logged out" }))
}

async fn verify(req: HandlerRequest) -> HandlerResult {
    let ctx = caller(&req)?;
    reply(json!({ "valid": true, "userId": ctx.user_id, "role": ctx.role }))
}

async fn list_restaurants(_req: HandlerRequest) -> HandlerResult {
    reply(restaurants())
}

async fn get_restaurant(req: HandlerRequest) -> HandlerResult {
    let id: u64 = req.param("id").unwrap_or_default().parse()?;
    let found = restaurants()
        .as_array()
        .and_then(|list| list.iter().find(|r| r["id"] == id).cloned());
    Ok(match found {
        Some(restaurant) => ResponseEnvelope::ok(restaurant),
        None => ResponseEnvelope::failure(status::NOT_FOUND, "restaurant not found"),
    })
}

async fn profile(req: HandlerRequest) -> HandlerResult {
    let ctx = caller(&req)?;
    let account = ACCOUNTS
        .iter()
        .find(|a| UserId(a.id) == ctx.user_id)
        .ok_or("verified user has no account")?;
    reply(json!({
        "id": account.id,
        "firstName": account.first_name,
        "lastName": account.last_name,
        "email": account.email,
        "role": account.role,
    }))
}

fn list_favorites(favorites: Favorites) -> impl Handler {
    move |req: HandlerRequest| {
        let favorites = Arc::clone(&favorites);
        async move {
            let ctx = caller(&req)?;
            let ids = favorites
                .lock()
                .await
                .get(&ctx.user_id)
                .cloned()
                .unwrap_or_default();
            reply(json!(ids))
        }
    }
}

fn add_favorite(favorites: Favorites) -> impl Handler {
    move |req: HandlerRequest| {
        let favorites = Arc::clone(&favorites);
        async move {
            let ctx = caller(&req)?;
            let Some(id) = req.body.as_ref().and_then(|b| b["restaurantId"].as_u64()) else {
                return Ok(ResponseEnvelope::failure(status::BAD_REQUEST, "restaurantId is required"));
            };
            let mut favorites = favorites.lock().await;
            let ids = favorites.entry(ctx.user_id).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
            Ok::<_, HandlerError>(ResponseEnvelope {
                status_code: status::CREATED,
                ..ResponseEnvelope::ok(json!(ids))
            })
        }
    }
}

async fn assign_owner_role(req: HandlerRequest) -> HandlerResult {
    reply(json!({ "userId": req.param("id"), "role": "owner" }))
}

async fn not_implemented(_req: HandlerRequest) -> HandlerResult {
    Ok(ResponseEnvelope::failure(501, "not available in the demo"))
}

/// The API surface of the restaurant app.
fn build_table(jwt: &JwtVerifier, favorites: Favorites) -> Result<RouteTable, RouterError> {
    RouteTable::builder()
        // Public
        .public(Method::Post, "/api/auth/register", register)
        .public(Method::Post, "/api/auth/login", login(jwt.clone()))
        .public(Method::Get, "/api/restaurants", list_restaurants)
        .public(Method::Get, "/api/restaurants/:id", get_restaurant)
        .public(Method::Get, "/api/reviews", not_implemented)
        .public(Method::Get, "/api/menu", not_implemented)
        .public(Method::Get, "/api/menu/:id", not_implemented)
        // Authenticated
        .authenticated(Method::Get, "/api/auth/verify", verify)
        .authenticated(Method::Post, "/api/auth/logout", logout)
        .authenticated(Method::Post, "/api/restaurants", not_implemented)
        .authenticated(Method::Put, "/api/restaurants/:id", not_implemented)
        .authenticated(Method::Delete, "/api/restaurants/:id", not_implemented)
        .authenticated(Method::Post, "/api/reviews", not_implemented)
        .authenticated(Method::Put, "/api/reviews/:id", not_implemented)
        .authenticated(Method::Delete, "/api/reviews/:id", not_implemented)
        .authenticated(Method::Post, "/api/menu", not_implemented)
        .authenticated(Method::Put, "/api/menu/:id", not_implemented)
        .authenticated(Method::Delete, "/api/menu/:id", not_implemented)
        .authenticated(Method::Get, "/api/users/profile", profile)
        .authenticated(Method::Put, "/api/users/profile", not_implemented)
        .authenticated(Method::Put, "/api/users/password", not_implemented)
        .authenticated(Method::Put, "/api/users/photo", not_implemented)
        .authenticated(Method::Delete, "/api/users/photo", not_implemented)
        .authenticated(Method::Get, "/api/favorites", list_favorites(Arc::clone(&favorites)))
        .authenticated(Method::Post, "/api/favorites", add_favorite(favorites))
        .authenticated(Method::Delete, "/api/favorites", not_implemented)
        .authenticated(Method::Post, "/api/favorites/check", not_implemented)
        .authenticated(Method::Post, "/api/upload/image", not_implemented)
        .authenticated(Method::Delete, "/api/upload/image/:filename", not_implemented)
        // Admin
        .restricted(Method::Post, "/api/admin/users/:id/roles", &[Role::Admin], assign_owner_role)
        .build()
}

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), BuhoError> {
    buho::telemetry::init("buho=info,buho_demo=info");

    let secret = std::env::var("BUHO_JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("BUHO_JWT_SECRET not set, using the development secret");
        DEV_SECRET.to_string()
    });
    let jwt = JwtVerifier::new(secret)?;
    let table = build_table(&jwt, Favorites::default())?;
    for route in table.routes() {
        info!(method = %route.method, pattern = %route.pattern, auth = route.requires_auth, "route");
    }
    let dispatcher = Arc::new(Dispatcher::new(table, jwt));

    let session = Arc::new(
        SessionManagerBuilder::new()
            .config(SessionConfig::from_env())
            .build(
                MemoryStore::new(),
                LoopbackTransport::new(dispatcher),
                TokenCodec::new(&DeviceFingerprint::from_host()),
            ),
    );
    let watch = SessionWatch::spawn(Arc::clone(&session));

    let listed = session.send(Method::Get, "/restaurants", None).await?;
    info!(status = listed.status_code, "anonymous restaurant list");

    let denied = session.request(Method::Get, "/favorites", None).await;
    info!(denied = denied.is_err(), "favorites without a session");

    let weak = session
        .register(RegisterRequest {
            email: "sol@buho.mx".into(),
            password: "short".into(),
            ..RegisterRequest::default()
        })
        .await;
    info!(error = ?weak.err(), "registration with a weak password");

    let registered = session
        .register(RegisterRequest {
            first_name: "Sol".into(),
            last_name: "Vega".into(),
            email: "Sol@Buho.mx".into(),
            password: "Fonda#2025".into(),
            role: Role::Owner,
            restaurant: Some(RestaurantDetails {
                name: "Fonda Sol".into(),
                address: "Av. Juárez 10".into(),
            }),
        })
        .await?;
    info!(data = %registered, "registered an owner");

    let user = session.login("ana@buho.mx", "Owner#2025").await?;
    info!(name = %user.display_name(), role = %user.role, "logged in");

    session.on_interaction(ActivityEvent::PointerDown).await;
    let added = session
        .request(Method::Post, "/favorites", Some(json!({ "restaurantId": 2 })))
        .await?;
    info!(status = added.status_code, data = ?added.data, "favorite added");

    let admin = session
        .request(Method::Post, "/admin/users/3/roles", Some(json!({ "role": "owner" })))
        .await?;
    info!(status = admin.status_code, "owner tried an admin route");

    if !session.require_role(&[Role::Admin]).await {
        info!("admin page refused, sent to the owner dashboard");
    }
    info!(
        remaining_secs = session.time_remaining().await.as_secs(),
        "session time left"
    );

    session.logout().await;
    info!(status = ?session.status().await, "logged out");

    watch.stop().await;
    tokio::task::yield_now().await;
    Ok(())
}
