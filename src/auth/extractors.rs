use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use super::{jwt::JwtKeys, SESSION_COOKIE};
use crate::{error::AppError, state::AppState, users::repo_types::Role};

/// Username and role proven by a valid session token.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub username: String,
    pub role: Role,
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Allows acting on `username` when it is the caller's own account or the caller is an admin.
    pub fn ensure_can_act_for(&self, username: &str) -> Result<(), AppError> {
        if self.is_admin() || self.username == username {
            Ok(())
        } else {
            warn!(caller = %self.username, target = %username, "forbidden cross-account action");
            Err(AppError::Forbidden(
                "You are not allowed to act on behalf of another user".into(),
            ))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        // Cookie first, bearer header for non-browser clients
        let token = match jar.get(SESSION_COOKIE) {
            Some(c) => c.value().to_string(),
            None => parts
                .headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
                .ok_or_else(|| AppError::Unauthorized("Not logged in".into()))?,
        };

        let claims = keys.verify_session(&token).map_err(|e| {
            warn!(error = %e, "invalid or expired session token");
            AppError::Unauthorized("Invalid or expired session".into())
        })?;

        let role = claims
            .role
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".into()))?;
        Ok(SessionUser {
            username: claims.sub,
            role,
        })
    }
}

/// Whether `X-Forwarded-For` comes from a trusted reverse proxy.
#[derive(Debug, Clone, Copy)]
pub struct TrustProxy(pub bool);

impl FromRef<AppState> for TrustProxy {
    fn from_ref(state: &AppState) -> Self {
        TrustProxy(state.config.trust_proxy)
    }
}

/// Source address used to key the login limiter.
///
/// The socket peer is used unless `TRUST_PROXY` is on, in which case the
/// first `X-Forwarded-For` entry wins.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
    TrustProxy: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TrustProxy(trust_proxy) = TrustProxy::from_ref(state);
        if trust_proxy {
            let forwarded = parts
                .headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .and_then(|v| v.trim().parse::<IpAddr>().ok());
            if let Some(ip) = forwarded {
                return Ok(ClientIp(ip));
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(peer.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))))
    }
}
