use utoipa::OpenApi;
use utoipa::ToSchema;

use crate::routes::auth::{RefreshRequest, SignupRequest, TokenForm, TokenOut, UserOut};

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::auth::token,
        crate::routes::auth::refresh,
        crate::routes::auth::logout,
        crate::routes::auth::signup,
        crate::routes::auth::me,
    ),
    components(
        schemas(
            HealthResponse,
            TokenForm,
            RefreshRequest,
            SignupRequest,
            TokenOut,
            UserOut,
        )
    ),
    tags(
        (name = "health"),
        (name = "auth")
    )
)]
pub struct ApiDoc;
