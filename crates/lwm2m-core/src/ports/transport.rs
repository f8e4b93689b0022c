//! 전송 포트.
//!
//! CoAP/DTLS 메시지 인코딩과 소켓 I/O는 이 경계 밖에 있다.
//! 네트워크/프로토콜 결과는 전송 에러 코드가 아니라 결과 enum으로 돌려준다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

use crate::error::CoreError;
use crate::models::binding::ConnectionType;
use crate::models::ids::Ssid;
use crate::models::registration::{RegisterRequest, UpdateRequest};

/// 소켓 식별자 (소켓 → 서버 역조회용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketId(pub u64);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket#{}", self.0)
    }
}

/// 소켓 종료 후에도 유지되는 연결 상태
///
/// 재연결 시 재사용하여 재협상 비용을 줄인다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NontransientState {
    /// 마지막으로 성공한 원격 주소
    pub preferred_endpoint: Option<SocketAddr>,
    /// DTLS 세션 재개 데이터
    pub session_cache: Vec<u8>,
    /// 마지막으로 바인드한 로컬 포트
    pub last_local_port: Option<u16>,
}

/// 연결 대상
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// 서버 SSID
    pub ssid: Ssid,
    /// 전송 종류
    pub conn_type: ConnectionType,
    /// 서버 URI
    pub uri: String,
    /// SMS 서버 번호
    pub sms_number: Option<String>,
}

/// Register 교환 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// 성공, 서버가 할당한 경로
    Registered { endpoint_path: Vec<String> },
    /// 4.03 Forbidden
    Forbidden,
    /// 그 밖의 에러 응답
    Rejected { code: u16 },
    /// 전송 계층 실패 (타임아웃 포함)
    NetworkError(String),
}

/// Update 교환 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// 성공
    Updated,
    /// 서버가 Update를 거부 (재등록 필요)
    Rejected { code: u16 },
    /// 전송 계층 실패 (타임아웃 포함)
    NetworkError(String),
    /// 요청을 보내지 못함 (인코딩 실패 등)
    Failed(String),
}

/// 서버 하나, 전송 하나에 대한 소켓
#[async_trait]
pub trait ServerSocket: Send + Sync {
    /// 소켓 식별자
    fn id(&self) -> SocketId;

    /// 열려 있어 송수신 가능한지
    fn is_open(&self) -> bool;

    /// 닫힌 소켓 다시 연결
    ///
    /// 세션을 재개했으면 `true`, 새로 협상했으면 `false`.
    async fn reconnect(&mut self, nontransient: &mut NontransientState) -> Result<bool, CoreError>;

    /// 소켓 닫기 (세션 재개 데이터는 유지)
    fn close(&mut self);

    /// Register 교환
    async fn register(&mut self, request: &RegisterRequest) -> RegisterOutcome;

    /// Update 교환
    async fn update(&mut self, endpoint_path: &[String], request: &UpdateRequest) -> UpdateOutcome;

    /// Deregister 교환
    async fn deregister(&mut self, endpoint_path: &[String]) -> Result<(), CoreError>;
}

/// 새 소켓 생성
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// 대상 서버에 연결 (캐시된 세션 데이터가 있으면 재개 시도)
    async fn connect(
        &self,
        target: &ConnectTarget,
        nontransient: &mut NontransientState,
    ) -> Result<Box<dyn ServerSocket>, CoreError>;
}
