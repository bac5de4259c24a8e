//! 인증 토큰 로컬 저장.
//!
//! 로그인으로 받은 bearer 토큰을 설정 디렉토리의 `token.json`에 보관한다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::models::auth::TokenResponse;

/// 토큰 파일 이름
const TOKEN_FILE_NAME: &str = "token.json";

/// 저장된 토큰
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub token_type: String,
    /// 로그인한 계정
    pub email: String,
    pub saved_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn new(token: TokenResponse, email: impl Into<String>) -> Self {
        Self {
            access_token: token.access_token,
            token_type: token.token_type,
            email: email.into(),
            saved_at: Utc::now(),
        }
    }
}

/// 토큰 파일 저장소
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// 설정 파일과 같은 디렉토리에 둔다
    pub fn beside(config_path: &Path) -> Self {
        let dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        Self::with_path(dir.join(TOKEN_FILE_NAME))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 저장된 토큰 읽기
    ///
    /// 파일이 없거나 읽을 수 없으면 `None` (로그아웃 상태로 취급).
    pub fn load(&self) -> Option<StoredToken> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("토큰 파일 읽기 실패: {}: {e}", self.path.display());
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("토큰 파일 파싱 실패, 무시: {e}");
                None
            }
        }
    }

    /// 토큰 저장 (기존 토큰 덮어쓰기)
    pub fn save(&self, token: &StoredToken) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(token)?)?;
        restrict_permissions(&self.path)?;
        debug!("토큰 저장: {}", self.path.display());
        Ok(())
    }

    /// 토큰 삭제. 파일이 없어도 성공.
    pub fn clear(&self) -> Result<(), CoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("토큰 삭제: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}
