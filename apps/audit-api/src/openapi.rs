use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(axum_helpers::ErrorResponse)
    ),
    info(
        title = "Audit API",
        version = "0.1.0",
        description = "Read API over the appointment audit trail"
    ),
    servers(
        (url = "/api", description = "API base path")
    ),
    nest(
        (path = "/audit", api = domain_audit::ApiDoc)
    )
)]
pub struct ApiDoc;
