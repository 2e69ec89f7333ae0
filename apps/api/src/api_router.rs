use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/retreats/{retreat_id}/access",
            get(handlers::access::retreat_access_handler),
        )
        .route(
            "/api/retreats/{retreat_id}/permissions",
            get(handlers::access::effective_permissions_handler),
        )
        .route(
            "/api/retreats/{retreat_id}/permissions/check",
            get(handlers::access::check_permission_handler),
        )
        .route(
            "/api/retreats/{retreat_id}/roles/{role_name}/check",
            get(handlers::access::check_retreat_role_handler),
        )
        .route(
            "/api/retreats/{retreat_id}/roles/{role_name}/inherited",
            get(handlers::access::inherited_permissions_handler),
        )
        .route(
            "/api/retreats/{retreat_id}/members",
            get(handlers::members::list_members_handler)
                .post(handlers::members::assign_member_handler)
                .delete(handlers::members::revoke_member_handler),
        )
        .route(
            "/api/retreats/{retreat_id}/delegations/check",
            post(handlers::delegations::check_delegation_handler),
        )
        .route(
            "/api/retreats/{retreat_id}/delegations",
            get(handlers::delegations::list_delegations_handler)
                .post(handlers::delegations::create_delegation_handler),
        )
        .route(
            "/api/delegations/{delegation_id}/revoke",
            post(handlers::delegations::revoke_delegation_handler),
        )
        .route(
            "/api/retreats/{retreat_id}/overrides/{user_id}",
            get(handlers::overrides::get_overrides_handler)
                .put(handlers::overrides::set_overrides_handler)
                .delete(handlers::overrides::clear_overrides_handler),
        )
        .route(
            "/api/roles/{role_name}/check",
            get(handlers::access::check_global_role_handler),
        )
        .route(
            "/api/admin/inheritance-rules",
            get(handlers::admin::list_inheritance_rules_handler)
                .post(handlers::admin::add_inheritance_rule_handler)
                .delete(handlers::admin::remove_inheritance_rule_handler),
        )
        .route(
            "/api/admin/delegation-rules",
            get(handlers::admin::list_delegation_rules_handler)
                .post(handlers::admin::add_delegation_rule_handler)
                .delete(handlers::admin::remove_delegation_rule_handler),
        )
        .route(
            "/api/admin/global-roles",
            post(handlers::admin::assign_global_role_handler)
                .delete(handlers::admin::revoke_global_role_handler),
        )
        .route(
            "/api/admin/cache-stats",
            get(handlers::admin::cache_stats_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_identity,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
