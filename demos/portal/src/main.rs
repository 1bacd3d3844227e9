use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use wicket::prelude::*;

// ---------------------------------------------------------------------------
// HTTP routes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Login {
    user: Option<String>,
}

async fn home(Extension(session): Extension<SessionHandle>) -> Json<SessionData> {
    Json(session.lock().await.serialize())
}

/// Stand-in for a real identity provider: `?user=name` logs in as `name`.
async fn authorize(
    Extension(session): Extension<SessionHandle>,
    Query(login): Query<Login>,
) -> Response {
    let Some(name) = login.user else {
        return (StatusCode::UNAUTHORIZED, "log in with /authorize?user=<name>").into_response();
    };

    let mut session = session.lock().await;
    session.set_token(Some(format!("demo-{name}")));
    session.set_user(Some(serde_json::json!({ "name": name })));
    let target = session.take_redirect_uri().unwrap_or_else(|| "/".into());
    tracing::info!(session_id = %session.id(), %name, "logged in");

    Redirect::to(&target).into_response()
}

async fn logout(Extension(session): Extension<SessionHandle>) -> Response {
    match session.lock().await.destroy().await {
        Ok(_) => Redirect::to("/authorize").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "logout failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn app(config: SharedConfig) -> Router {
    let routes = Router::new()
        .route("/", get(home))
        .route("/authorize", get(authorize))
        .route("/logout", get(logout))
        .route("/public/health", get(|| async { "ok" }));

    wicket::express(config, SessionOptions::new()).apply(routes)
}

// ---------------------------------------------------------------------------
// Live connections
// ---------------------------------------------------------------------------

/// Greets the logged-in user, then echoes every message back.
struct Greeter;

impl ConnectionHandler for Greeter {
    async fn handle(
        &self,
        conn: &WebSocketConnection,
        session: SessionHandle,
    ) -> Result<(), WicketError> {
        let name = {
            let session = session.lock().await;
            session
                .user()
                .and_then(|user| user.get("name"))
                .and_then(|name| name.as_str())
                .unwrap_or("guest")
                .to_string()
        };
        conn.send(format!("hello, {name}").as_bytes()).await?;

        while let Some(data) = conn.recv().await? {
            conn.send(&data).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal=info,wicket=info,wicket_session=info".into()),
        )
        .init();

    let config = wicket::global();
    config.set(Setting::AllowPaths(vec!["/public".into()]));
    config.set(Setting::MaxAge(30));
    let _reaper = config.start_reaper();

    let live = WicketServerBuilder::new()
        .bind("0.0.0.0:9000")
        .config(config.clone())
        .build(Greeter)
        .await?;
    tokio::spawn(async move {
        if let Err(e) = live.run().await {
            tracing::error!(error = %e, "live server stopped");
        }
    });

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("portal listening on http://0.0.0.0:8080, live on ws://0.0.0.0:9000");
    axum::serve(listener, app(config)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
    use tower::ServiceExt;

    use super::*;

    fn config() -> SharedConfig {
        SharedConfig::new(SessionConfig {
            store: Arc::new(MemoryStore::new()),
            allow_paths: vec!["/public".into()],
            ..SessionConfig::default()
        })
    }

    async fn get_with(app: Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(COOKIE, cookie);
        }
        app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
    }

    fn session_cookie(res: &Response) -> String {
        let header = res.headers()[SET_COOKIE].to_str().unwrap();
        header.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_login_returns_to_original_page() {
        let config = config();

        let res = get_with(app(config.clone()), "/?tab=1", None).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        let cookie = session_cookie(&res);

        let res = get_with(app(config.clone()), "/authorize?user=ada", Some(&cookie)).await;
        assert!(res.status().is_redirection());
        assert_eq!(res.headers()[LOCATION], "/?tab=1");

        let res = get_with(app(config), "/", Some(&cookie)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_authorize_without_user_is_unauthorized() {
        let res = get_with(app(config()), "/authorize", None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_sends_back_to_login() {
        let config = config();
        let res = get_with(app(config.clone()), "/authorize?user=ada", None).await;
        let cookie = session_cookie(&res);

        let res = get_with(app(config.clone()), "/logout", Some(&cookie)).await;
        assert_eq!(res.headers()[LOCATION], "/authorize");

        let res = get_with(app(config), "/", Some(&cookie)).await;
        assert_eq!(res.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let res = get_with(app(config()), "/public/health", None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
