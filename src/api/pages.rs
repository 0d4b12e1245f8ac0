//! Server-rendered pages
//!
//! Public site: home, news list, article, about, journalists, contact.
//! Admin console: login, dashboard, analytics, journalists, media, settings.
//!
//! Public pages never fail hard: a datastore error renders the page with an
//! inline message. Admin pages sit behind `require_admin_page`.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware as axum_middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::auth::{end_session, session_cookie_header, sign_in};
use crate::api::middleware::{
    authenticate, clear_session_cookie, extract_ip_address, require_admin_page, AppState,
    AuthenticatedUser,
};
use crate::models::{ContactSubmission, GeneralSettings, Journalist, CATEGORIES, SUBJECT_TYPES};
use crate::services::media::MEDIA_LIST_LIMIT;
use crate::theme::{CurrentUser, StandardTemplateVars};

/// Related stories shown under an article
const RELATED_ARTICLES: usize = 3;

#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/news", get(news))
        .route("/news/{id}", get(article_page))
        .route("/about", get(about))
        .route("/journalists", get(journalists_page))
        .route("/contact", get(contact_page).post(contact_submit))
        .route("/admin/login", get(login_page).post(login_submit))
        .route("/admin/logout", post(logout_submit))
}

pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin", get(dashboard_page))
        .route("/admin/analytics", get(analytics_page))
        .route("/admin/journalists", get(admin_journalists_page))
        .route("/admin/media", get(media_page))
        .route("/admin/settings", get(settings_page).post(settings_submit))
        .route_layer(axum_middleware::from_fn_with_state(state, require_admin_page))
}

// ============================================================================
// Rendering helpers
// ============================================================================

async fn site_settings(state: &AppState) -> GeneralSettings {
    state.settings_service.general().await.unwrap_or_else(|e| {
        tracing::warn!("Falling back to default site settings: {}", e);
        GeneralSettings::default()
    })
}

async fn public_vars(state: &AppState, path: &str) -> StandardTemplateVars {
    StandardTemplateVars::new(site_settings(state).await, path)
}

async fn admin_vars(state: &AppState, path: &str, user: &AuthenticatedUser) -> StandardTemplateVars {
    let journalist = state
        .journalist_service
        .resolve_caller(&user.user)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Could not resolve journalist for {}: {}", user.user.id, e);
            None
        });
    let current = CurrentUser {
        email: user.user.email.clone(),
        name: journalist.as_ref().map(|j| j.name.clone()),
        role: journalist.as_ref().map(|j| j.role.to_string()),
        can_publish: journalist.as_ref().is_some_and(Journalist::is_editor_in_chief),
    };
    public_vars(state, path).await.with_user(current)
}

fn render(state: &AppState, template: &str, context: &TeraContext, vars: &StandardTemplateVars) -> Html<String> {
    Html(state.theme.render_with_standard_vars(template, context, vars))
}

fn inline_error(context: &mut TeraContext, what: &str, err: impl std::fmt::Display) {
    tracing::error!("Failed to load {}: {}", what, err);
    context.insert("error_message", &format!("We couldn't load {} right now.", what));
}

// ============================================================================
// Public site
// ============================================================================

async fn home(State(state): State<AppState>) -> Html<String> {
    let mut context = TeraContext::new();
    let mut articles = match state.article_service.list_published(None, None).await {
        Ok(articles) => articles,
        Err(e) => {
            inline_error(&mut context, "the latest stories", e);
            Vec::new()
        }
    };
    let lead = (!articles.is_empty()).then(|| articles.remove(0));
    context.insert("lead", &lead);
    context.insert("articles", &articles);
    render(&state, "home.html", &context, &public_vars(&state, "/").await)
}

async fn news(State(state): State<AppState>, Query(query): Query<NewsQuery>) -> Html<String> {
    let selected = query
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let mut context = TeraContext::new();
    let articles = match state
        .article_service
        .list_published(selected.as_deref(), None)
        .await
    {
        Ok(articles) => articles,
        Err(e) => {
            inline_error(&mut context, "the news", e);
            Vec::new()
        }
    };
    context.insert("articles", &articles);
    context.insert("categories", CATEGORIES);
    context.insert("selected_category", &selected);
    render(&state, "news.html", &context, &public_vars(&state, "/news").await)
}

async fn article_page(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let path = format!("/news/{}", id);
    let vars = public_vars(&state, &path).await;
    let mut context = TeraContext::new();

    let article = match state.article_service.get_published(&id).await {
        Ok(Some(article)) => article,
        Ok(None) => {
            context.insert("message", "That story doesn't exist or hasn't been published.");
            return (StatusCode::NOT_FOUND, render(&state, "not_found.html", &context, &vars))
                .into_response();
        }
        Err(e) => {
            inline_error(&mut context, "this story", e);
            return render(&state, "not_found.html", &context, &vars).into_response();
        }
    };

    let related = state
        .article_service
        .related(&article, RELATED_ARTICLES)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to load related articles: {}", e);
            Vec::new()
        });
    context.insert("article", &article);
    context.insert("related", &related);
    render(&state, "article.html", &context, &vars).into_response()
}

async fn about(State(state): State<AppState>) -> Html<String> {
    render(&state, "about.html", &TeraContext::new(), &public_vars(&state, "/about").await)
}

async fn journalists_page(State(state): State<AppState>) -> Html<String> {
    let mut context = TeraContext::new();
    let journalists = match state.journalist_service.list_active().await {
        Ok(journalists) => journalists,
        Err(e) => {
            inline_error(&mut context, "the roster", e);
            Vec::new()
        }
    };
    context.insert("journalists", &journalists);
    render(&state, "journalists.html", &context, &public_vars(&state, "/journalists").await)
}

fn contact_context(form: &ContactSubmission) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("subject_types", SUBJECT_TYPES);
    context
}

async fn contact_page(State(state): State<AppState>) -> Html<String> {
    let context = contact_context(&ContactSubmission::default());
    render(&state, "contact.html", &context, &public_vars(&state, "/contact").await)
}

async fn contact_submit(
    State(state): State<AppState>,
    Form(form): Form<ContactSubmission>,
) -> Response {
    let vars = public_vars(&state, "/contact").await;
    match state.contact_service.submit(form.clone()).await {
        Ok(_) => {
            let mut context = contact_context(&ContactSubmission::default());
            context.insert("success_message", "Thanks! Your message reached the newsroom.");
            render(&state, "contact.html", &context, &vars).into_response()
        }
        Err(e) => {
            let mut context = contact_context(&form);
            context.insert("error_message", &e.to_string());
            (StatusCode::BAD_REQUEST, render(&state, "contact.html", &context, &vars)).into_response()
        }
    }
}

// ============================================================================
// Admin console
// ============================================================================

async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if authenticate(&state, &headers).await.is_ok() {
        return Redirect::to("/admin").into_response();
    }
    let mut context = TeraContext::new();
    if state.auth.is_none() {
        context.insert("error_message", "Sign-in is unavailable: the auth service is not configured.");
    }
    render(&state, "admin/login.html", &context, &public_vars(&state, "/admin/login").await)
        .into_response()
}

async fn login_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let result = sign_in(&state, &form.email, &form.password, extract_ip_address(&headers)).await;
    let error = match result {
        Ok(session) => match session_cookie_header(&state, &session) {
            Ok(cookie) => {
                return ([(header::SET_COOKIE, cookie)], Redirect::to("/admin")).into_response();
            }
            Err(e) => e,
        },
        Err(e) => e,
    };

    let mut context = TeraContext::new();
    context.insert("email", &form.email);
    context.insert("error_message", &error.error);
    let vars = public_vars(&state, "/admin/login").await;
    (error.status(), render(&state, "admin/login.html", &context, &vars)).into_response()
}

async fn logout_submit(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Ok(user) = authenticate(&state, &headers).await {
        end_session(&state, &user).await;
    }
    let clear = clear_session_cookie(&state.config.session.cookie_name);
    match HeaderValue::from_str(&clear) {
        Ok(value) => ([(header::SET_COOKIE, value)], Redirect::to("/admin/login")).into_response(),
        Err(_) => Redirect::to("/admin/login").into_response(),
    }
}

async fn dashboard_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Html<String> {
    let mut context = TeraContext::new();
    match state.analytics_service.dashboard().await {
        Ok(dashboard) => context.insert("dashboard", &dashboard),
        Err(e) => inline_error(&mut context, "the dashboard", e),
    }
    render(&state, "admin/dashboard.html", &context, &admin_vars(&state, "/admin", &user).await)
}

async fn analytics_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Html<String> {
    let mut context = TeraContext::new();
    match state.analytics_service.analytics(chrono::Utc::now()).await {
        Ok(analytics) => context.insert("analytics", &analytics),
        Err(e) => inline_error(&mut context, "analytics", e),
    }
    let vars = admin_vars(&state, "/admin/analytics", &user).await;
    render(&state, "admin/analytics.html", &context, &vars)
}

async fn admin_journalists_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Html<String> {
    let mut context = TeraContext::new();
    let journalists = match state.journalist_service.list_all().await {
        Ok(journalists) => journalists,
        Err(e) => {
            inline_error(&mut context, "journalists", e);
            Vec::new()
        }
    };
    let vars = admin_vars(&state, "/admin/journalists", &user).await;
    let can_invite = vars.current_user.as_ref().is_some_and(|u| u.can_publish);
    context.insert("journalists", &journalists);
    context.insert("can_invite", &can_invite);
    render(&state, "admin/journalists.html", &context, &vars)
}

async fn media_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Html<String> {
    let mut context = TeraContext::new();
    let media = match state.media_service.list(Some(MEDIA_LIST_LIMIT)).await {
        Ok(media) => media,
        Err(e) => {
            inline_error(&mut context, "the media library", e);
            Vec::new()
        }
    };
    context.insert("media", &media);
    render(&state, "admin/media.html", &context, &admin_vars(&state, "/admin/media", &user).await)
}

async fn settings_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Html<String> {
    let vars = admin_vars(&state, "/admin/settings", &user).await;
    let mut context = TeraContext::new();
    context.insert("settings", &vars.site);
    render(&state, "admin/settings.html", &context, &vars)
}

async fn settings_submit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Form(settings): Form<GeneralSettings>,
) -> Html<String> {
    let mut context = TeraContext::new();
    match state.settings_service.save_general(&settings).await {
        Ok(_) => context.insert("success_message", "Settings saved."),
        Err(e) => {
            tracing::error!("Failed to save settings: {}", e);
            context.insert("error_message", &e.to_string());
        }
    }
    // Re-read so the page header shows the saved title
    let vars = admin_vars(&state, "/admin/settings", &user).await;
    context.insert("settings", &settings);
    render(&state, "admin/settings.html", &context, &vars)
}
