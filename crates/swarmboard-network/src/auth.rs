//! 인증 API 클라이언트.
//!
//! 외부 인증 API에 로그인/회원가입/프로필 조회를 요청하고,
//! 발급받은 bearer 토큰을 `TokenStore`에 보관한다.

use std::time::Duration;
use swarmboard_core::error::CoreError;
use swarmboard_core::models::auth::{Credentials, SignupRequest, TokenResponse, UserProfile};
use swarmboard_core::token_store::{StoredToken, TokenStore};
use tracing::{debug, info};

use crate::http_client::{extract_error_message, map_transport_error};

/// 인증 클라이언트
pub struct AuthClient {
    base_url: String,
    client: reqwest::Client,
    store: TokenStore,
}

impl AuthClient {
    pub fn new(base_url: &str, timeout: Duration, store: TokenStore) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            store,
        })
    }

    /// 저장된 토큰
    pub fn stored_token(&self) -> Option<StoredToken> {
        self.store.load()
    }

    /// 로그인 후 토큰 저장
    ///
    /// POST /api/login
    pub async fn login(&self, email: &str, password: &str) -> Result<StoredToken, CoreError> {
        let body = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp = self
            .client
            .post(format!("{}/api/login", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            debug!("로그인 실패 ({status}): {text}");
            return Err(match status.as_u16() {
                400 | 401 | 403 => CoreError::Auth("Invalid credentials".to_string()),
                _ => CoreError::Auth("Login failed".to_string()),
            });
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Auth(format!("Login failed: {e}")))?;
        let stored = StoredToken::new(token, email);
        self.store.save(&stored)?;
        info!("로그인 완료: {email}");
        Ok(stored)
    }

    /// 회원가입 후 바로 로그인
    ///
    /// POST /api/signup
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        full_name: Option<String>,
    ) -> Result<StoredToken, CoreError> {
        let body = SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name,
        };
        let resp = self
            .client
            .post(format!("{}/api/signup", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                400 | 409 | 422 => CoreError::Auth(
                    extract_error_message(&text).unwrap_or_else(|| "Signup failed".to_string()),
                ),
                _ => CoreError::Auth("Signup failed".to_string()),
            });
        }

        info!("회원가입 완료: {email}");
        self.login(email, password).await
    }

    /// 현재 사용자 프로필
    ///
    /// GET /api/users/me
    pub async fn me(&self) -> Result<UserProfile, CoreError> {
        let token = self
            .store
            .load()
            .ok_or_else(|| CoreError::Auth("Not logged in".to_string()))?;

        let resp = self
            .client
            .get(format!("{}/api/users/me", self.base_url))
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(map_transport_error)?;

        match resp.status().as_u16() {
            200..=299 => resp
                .json()
                .await
                .map_err(|e| CoreError::Internal(format!("프로필 파싱 실패: {e}"))),
            401 | 403 => {
                // 만료/무효 토큰은 버린다
                self.store.clear()?;
                Err(CoreError::Auth(
                    "Session expired, please log in again".to_string(),
                ))
            }
            code => Err(CoreError::Internal(format!("프로필 조회 실패 ({code})"))),
        }
    }

    /// 로그아웃 (로컬 토큰 삭제)
    pub fn logout(&self) -> Result<(), CoreError> {
        self.store.clear()?;
        info!("로그아웃");
        Ok(())
    }
}
