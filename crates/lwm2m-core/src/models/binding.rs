//! 바인딩 모드 변환.
//!
//! 전송별 연결 모드 `(udp_mode, sms_mode)`와 LwM2M 바인딩 문자열 사이의 순수 변환.
//! 유효한 바인딩 문자열은 `U, UQ, S, SQ, US, UQS` 여섯 가지뿐이다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 허용되는 바인딩 문자열 목록
pub const VALID_BINDINGS: [&str; 6] = ["U", "UQ", "S", "SQ", "US", "UQS"];

/// 전송 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConnectionType {
    /// UDP (CoAP over UDP/DTLS)
    Udp,
    /// SMS
    Sms,
}

impl ConnectionType {
    /// 모든 전송 종류 (우선순위 순: UDP가 primary 후보 1순위)
    pub const ALL: [ConnectionType; 2] = [ConnectionType::Udp, ConnectionType::Sms];

    /// 바인딩 문자열에서 이 전송을 나타내는 문자
    pub fn letter(self) -> char {
        match self {
            ConnectionType::Udp => 'U',
            ConnectionType::Sms => 'S',
        }
    }

    /// 연결 배열 인덱스
    pub fn index(self) -> usize {
        match self {
            ConnectionType::Udp => 0,
            ConnectionType::Sms => 1,
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Udp => write!(f, "UDP"),
            ConnectionType::Sms => write!(f, "SMS"),
        }
    }
}

/// 전송별 연결 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionMode {
    /// 현재 바인딩에서 사용하지 않음
    #[default]
    Disabled,
    /// 상시 연결
    Online,
    /// 큐 모드 (유휴 시 소켓 종료)
    Queue,
}

/// 검증된 LwM2M 바인딩 모드 문자열
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BindingMode(String);

impl BindingMode {
    /// 바인딩 문자열 검증 후 생성
    pub fn new(binding: &str) -> Result<Self, CoreError> {
        if Self::is_valid(binding) {
            Ok(Self(binding.to_string()))
        } else {
            Err(CoreError::InvalidBinding(binding.to_string()))
        }
    }

    /// 허용 목록에 있는 바인딩인지
    pub fn is_valid(binding: &str) -> bool {
        VALID_BINDINGS.contains(&binding)
    }

    /// 전송별 연결 모드로부터 바인딩 모드 유도
    ///
    /// 조합 결과가 허용 목록에 없으면 실패한다 (예: `U` + `SQ`, 둘 다 비활성).
    pub fn from_connection_modes(
        udp_mode: ConnectionMode,
        sms_mode: ConnectionMode,
    ) -> Result<Self, CoreError> {
        Self::new(&compose_binding(udp_mode, sms_mode))
    }

    /// 특정 전송의 연결 모드
    ///
    /// 전송 문자가 없으면 `Disabled`, 바로 뒤에 `Q`가 오면 `Queue`.
    pub fn connection_mode(&self, conn_type: ConnectionType) -> ConnectionMode {
        let mut chars = self.0.chars().skip_while(|c| *c != conn_type.letter());
        match (chars.next(), chars.next()) {
            (None, _) => ConnectionMode::Disabled,
            (Some(_), Some('Q')) => ConnectionMode::Queue,
            (Some(_), _) => ConnectionMode::Online,
        }
    }

    /// 바인딩 문자열
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 전송별 연결 모드를 바인딩 문자열로 조합 (검증 전)
///
/// UDP 문자 다음 SMS 문자 순서로 붙이며, 큐 모드이면 해당 문자 뒤에 `Q`를 붙인다.
/// `Online + Queue` 는 `"USQ"` 가 되지만 허용 목록에 없으므로
/// [`BindingMode::from_connection_modes`] 에서는 거부된다.
pub fn compose_binding(udp_mode: ConnectionMode, sms_mode: ConnectionMode) -> String {
    let mut binding = String::with_capacity(4);
    for (conn_type, mode) in [
        (ConnectionType::Udp, udp_mode),
        (ConnectionType::Sms, sms_mode),
    ] {
        match mode {
            ConnectionMode::Online => binding.push(conn_type.letter()),
            ConnectionMode::Queue => {
                binding.push(conn_type.letter());
                binding.push('Q');
            }
            ConnectionMode::Disabled => {}
        }
    }
    binding
}

impl FromStr for BindingMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BindingMode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<BindingMode> for String {
    fn from(binding: BindingMode) -> Self {
        binding.0
    }
}

impl fmt::Display for BindingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
