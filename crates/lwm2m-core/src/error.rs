//! LwM2M 클라이언트 핵심 에러 타입.
//!
//! 모든 crate는 이 에러 타입을 그대로 전파한다.
//! 네트워크/프로토콜 결과는 에러가 아니라 전송 포트의 결과 enum으로 전달된다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 유효성 검증, 트랜잭션, 설정, 연결 등 도메인 공통 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패 (Bad Request)
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드 (예: "/1/0/7")
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 허용되지 않는 바인딩 모드 문자열
    #[error("잘못된 바인딩 모드: {0:?}")]
    InvalidBinding(String),

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Server", "Instance")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 서버가 등록을 금지함 (4.03)
    #[error("등록 거부됨: {0}")]
    Forbidden(String),

    /// 트랜잭션 상태 오류 (중첩 begin 등)
    #[error("트랜잭션 에러: {0}")]
    Transaction(String),

    /// 내부 에러 (할당 실패 등)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// 네트워크 에러 (연결 실패, 소켓 종료)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 오프라인 모드에서 허용되지 않는 작업
    #[error("오프라인 모드에서는 수행할 수 없음")]
    Offline,

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// 설정 작성자에게 거부(Bad Request)로 보고되는 에러인지
    pub fn is_bad_request(&self) -> bool {
        matches!(self, CoreError::Validation { .. } | CoreError::InvalidBinding(_))
    }

    /// 데이터 모델 디스패치 계층용 CoAP 응답 코드 (class * 100 + detail)
    pub fn coap_code(&self) -> u16 {
        match self {
            CoreError::Validation { .. } | CoreError::InvalidBinding(_) => 400,
            CoreError::Forbidden(_) => 403,
            CoreError::NotFound { .. } => 404,
            CoreError::Offline | CoreError::Network(_) => 503,
            _ => 500,
        }
    }

    /// `Validation` 에러 생성 헬퍼
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
