//! WebSocket 실시간 피드.
//!
//! GET /ws — 대시보드 호환 경로. 샘플은 수신한 JSON 그대로,
//! 실행 상태는 `{"status": ..., "run_id": ...}`로 보낸다.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::AppState;

/// WebSocket 업그레이드
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| feed(socket, state))
}

async fn feed(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();
    debug!("WebSocket 연결 (구독자 {}명)", state.event_tx.receiver_count());

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let payload = match event.ws_payload() {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!("이벤트 직렬화 실패: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("WebSocket 구독자 지연, {skipped}개 건너뜀");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    // 클라이언트가 보내는 텍스트는 무시 (keep-alive 용도)
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    debug!("WebSocket 연결 종료");
}
