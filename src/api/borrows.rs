//! Borrow management endpoints

use axum::extract::State;

use crate::{
    error::{AppError, AppResult},
    models::borrow::{BorrowQuery, BorrowRecordDetails, BorrowStatistics, CreateBorrow, ExtendBorrow},
    AppState,
};

use super::{ApiPath, ApiQuery, ApiResponse, AuthenticatedUser, ValidatedJson};

/// Borrow a book for a member
#[utoipa::path(
    post,
    path = "/borrow",
    tag = "borrow",
    security(("bearer_auth" = [])),
    request_body = CreateBorrow,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowRecordDetails),
        (status = 400, description = "Unknown member or book, out of stock, inactive member, overdue items or borrow limit reached")
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<CreateBorrow>,
) -> AppResult<ApiResponse<BorrowRecordDetails>> {
    claims.require_admin()?;

    let record = state
        .services
        .borrows
        .borrow_book(request)
        .await
        .map_err(AppError::into_bad_reference)?;
    Ok(ApiResponse::created(record, "Book borrowed successfully"))
}

/// Return a borrowed book
#[utoipa::path(
    put,
    path = "/borrow/{id}/return",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = BorrowRecordDetails),
        (status = 404, description = "Borrow record not found"),
        (status = 400, description = "Already returned")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<ApiResponse<BorrowRecordDetails>> {
    claims.require_admin()?;

    let record = state.services.borrows.return_book(id).await?;
    Ok(ApiResponse::ok(record, "Book returned successfully"))
}

/// Extend the due date of a borrow
#[utoipa::path(
    put,
    path = "/borrow/{id}/extend",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    request_body = ExtendBorrow,
    responses(
        (status = 200, description = "Borrow extended", body = BorrowRecordDetails),
        (status = 404, description = "Borrow record not found"),
        (status = 400, description = "Already returned, overdue, or extendDays out of range")
    )
)]
pub async fn extend_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<i32>,
    ValidatedJson(request): ValidatedJson<ExtendBorrow>,
) -> AppResult<ApiResponse<BorrowRecordDetails>> {
    claims.require_admin()?;

    let record = state.services.borrows.extend_borrow(id, request).await?;
    Ok(ApiResponse::ok(record, "Borrow extended successfully"))
}

/// Mark the fine of a borrow as paid
#[utoipa::path(
    put,
    path = "/borrow/{id}/pay-fine",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Fine paid", body = BorrowRecordDetails),
        (status = 404, description = "Borrow record not found"),
        (status = 400, description = "No fine due")
    )
)]
pub async fn pay_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<ApiResponse<BorrowRecordDetails>> {
    claims.require_admin()?;

    let record = state.services.borrows.pay_fine(id).await?;
    let message = format!("Fine of {} paid", record.fine_amount);
    Ok(ApiResponse::ok(record, message))
}

/// Get a borrow record
#[utoipa::path(
    get,
    path = "/borrow/{id}",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Borrow record", body = BorrowRecordDetails),
        (status = 404, description = "Borrow record not found")
    )
)]
pub async fn get_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<ApiResponse<BorrowRecordDetails>> {
    claims.require_admin()?;

    let record = state.services.borrows.get_borrow(id).await?;
    Ok(ApiResponse::ok(record, "Borrow record retrieved"))
}

/// List unreturned borrows
#[utoipa::path(
    get,
    path = "/borrow/current",
    tag = "borrow",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current borrows", body = Vec<BorrowRecordDetails>)
    )
)]
pub async fn list_current(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<ApiResponse<Vec<BorrowRecordDetails>>> {
    claims.require_admin()?;

    let records = state.services.borrows.list_current().await?;
    Ok(ApiResponse::ok(records, "Current borrows retrieved"))
}

/// List overdue borrows with the fine they would incur today
#[utoipa::path(
    get,
    path = "/borrow/overdue",
    tag = "borrow",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue borrows", body = Vec<BorrowRecordDetails>)
    )
)]
pub async fn list_overdue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<ApiResponse<Vec<BorrowRecordDetails>>> {
    claims.require_admin()?;

    let records = state.services.borrows.list_overdue().await?;
    Ok(ApiResponse::ok(records, "Overdue borrows retrieved"))
}

/// Search borrows by member, book and status
#[utoipa::path(
    get,
    path = "/borrow",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(BorrowQuery),
    responses(
        (status = 200, description = "Matching borrows", body = Vec<BorrowRecordDetails>)
    )
)]
pub async fn search_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiQuery(query): ApiQuery<BorrowQuery>,
) -> AppResult<ApiResponse<Vec<BorrowRecordDetails>>> {
    claims.require_admin()?;

    let records = state.services.borrows.search(&query).await?;
    Ok(ApiResponse::ok(records, "Borrows retrieved"))
}

/// Borrow statistics
#[utoipa::path(
    get,
    path = "/borrow/statistics",
    tag = "borrow",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrow statistics", body = BorrowStatistics)
    )
)]
pub async fn get_statistics(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<ApiResponse<BorrowStatistics>> {
    claims.require_admin()?;

    let stats = state.services.borrows.statistics().await?;
    Ok(ApiResponse::ok(stats, "Borrow statistics retrieved"))
}

/// Unreturned borrows of a member
#[utoipa::path(
    get,
    path = "/members/{id}/borrows",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member's current borrows", body = Vec<BorrowRecordDetails>),
        (status = 404, description = "Member not found")
    )
)]
pub async fn member_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(member_id): ApiPath<i32>,
) -> AppResult<ApiResponse<Vec<BorrowRecordDetails>>> {
    claims.require_admin()?;

    let records = state.services.borrows.member_borrows(member_id).await?;
    Ok(ApiResponse::ok(records, "Member borrows retrieved"))
}
