//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{borrows, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "0.1.0",
        description = "Library borrow/return REST API. Every response is wrapped in \
                       {success, data, message, statusCode}."
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Borrow
        borrows::borrow_book,
        borrows::return_book,
        borrows::extend_borrow,
        borrows::pay_fine,
        borrows::get_borrow,
        borrows::list_current,
        borrows::list_overdue,
        borrows::search_borrows,
        borrows::get_statistics,
        borrows::member_borrows,
    ),
    components(
        schemas(
            crate::models::borrow::CreateBorrow,
            crate::models::borrow::ExtendBorrow,
            crate::models::borrow::BorrowRecordDetails,
            crate::models::borrow::BorrowState,
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::BorrowStatistics,
            crate::models::borrow::PopularBook,
            crate::models::book::BookShort,
            crate::models::member::MemberShort,
            health::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "borrow", description = "Borrow lifecycle management")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
