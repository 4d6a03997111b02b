use axum::{Router, middleware as axum_middleware};

use crate::{
    middleware::{auth as auth_mw, session},
    state::AppState,
};

pub mod auth;
pub mod cart;
pub mod categories;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod reviews;
pub mod users;

/// Assembles the /api/v1 surface. Admin groups sit under /admin and carry the
/// CSRF guard; cart and order groups carry the session-id layer so guests
/// always get an identity echoed back.
pub fn create_api_router(state: &AppState) -> Router<AppState> {
    let csrf = axum_middleware::from_fn_with_state(state.clone(), auth_mw::csrf_guard);
    let session_layer = axum_middleware::from_fn(session::ensure_session_id);

    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router().layer(csrf.clone()))
        .nest("/categories", categories::public_router())
        .nest(
            "/admin/categories",
            categories::admin_router().layer(csrf.clone()),
        )
        .nest("/products", products::public_router())
        .nest(
            "/admin/products",
            products::admin_router().layer(csrf.clone()),
        )
        .nest("/reviews", reviews::router(state))
        .nest("/cart", cart::router().layer(session_layer.clone()))
        .nest("/orders", orders::router().layer(session_layer))
        .nest("/admin/orders", orders::admin_router().layer(csrf))
}
