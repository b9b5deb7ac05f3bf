use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::{categories, payments, users};

/// Body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "domain error")]
    pub status: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = "Back-end is running...")]
    pub message: String,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BudgetWise API",
        description = "Personal budgeting: accounts, categories and payments. \
                       Sessions travel in the HTTP-only `token` cookie."
    ),
    paths(
        crate::app::status,
        users::handlers::list_users,
        users::handlers::get_user_by_email,
        users::handlers::get_user_by_username,
        users::handlers::register,
        users::handlers::update_user,
        users::handlers::delete_user,
        users::handlers::change_password,
        users::handlers::login,
        users::handlers::logout,
        users::handlers::me,
        users::handlers::forgot_password,
        users::handlers::reset_password,
        categories::handlers::list_categories,
        categories::handlers::create_category,
        payments::handlers::list_payments,
        payments::handlers::create_payment,
        payments::handlers::spending_summary,
    ),
    components(schemas(
        ErrorResponse,
        StatusResponse,
        users::repo_types::Role,
        users::dto::RegisterRequest,
        users::dto::LoginRequest,
        users::dto::LoginResponse,
        users::dto::MeResponse,
        users::dto::UpdateUserRequest,
        users::dto::ChangePasswordRequest,
        users::dto::ForgotPasswordRequest,
        users::dto::ResetPasswordRequest,
        users::dto::PublicUser,
        users::dto::MessageResponse,
        categories::dto::CreateCategoryRequest,
        categories::repo_types::Category,
        payments::dto::CreatePaymentRequest,
        payments::dto::SpendingSummary,
        payments::repo_types::Payment,
        payments::repo_types::PaymentView,
        payments::repo_types::CategoryTotal,
    )),
    tags(
        (name = "status"),
        (name = "users", description = "Account management"),
        (name = "session", description = "Login, logout and password reset"),
        (name = "categories"),
        (name = "payments")
    )
)]
pub struct ApiDoc;
