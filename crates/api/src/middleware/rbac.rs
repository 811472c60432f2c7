//! Role-based access control extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose role does not
//! meet the requirement.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use frontdesk_core::error::CoreError;
use frontdesk_core::roles::{is_staff, ROLE_KIOSK};

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires `employee` or `admin`. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn register_only(RequireStaff(user): RequireStaff) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireStaff(pub AuthUser);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !is_staff(&user.role) {
            return Err(AppError::Core(CoreError::Forbidden(
                "Employee or Admin role required".into(),
            )));
        }
        Ok(RequireStaff(user))
    }
}

/// Requires the customer-facing `kiosk` role.
pub struct RequireKiosk(pub AuthUser);

impl FromRequestParts<AppState> for RequireKiosk {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != ROLE_KIOSK {
            return Err(AppError::Core(CoreError::Forbidden(
                "Kiosk role required".into(),
            )));
        }
        Ok(RequireKiosk(user))
    }
}

/// Requires any authenticated caller (any valid role).
///
/// Functionally equivalent to [`AuthUser`] but named explicitly for route
/// definitions where the intent should be self-documenting.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        Ok(RequireAuth(user))
    }
}
