//! 서버 정의 모델.

use serde::{Deserialize, Serialize};

use crate::models::binding::{BindingMode, ConnectionMode, ConnectionType};
use crate::models::ids::{Ssid, SSID_BOOTSTRAP};

/// 데이터 모델에서 읽어 온 관리 서버 정의
///
/// Server 오브젝트(수명, 바인딩)와 Security 오브젝트(URI, SMS 번호)를 합친 값.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// Short Server ID
    pub ssid: Ssid,
    /// 바인딩 모드
    pub binding: BindingMode,
    /// 등록 수명 (초)
    pub lifetime_s: i64,
    /// 서버 URI (예: `coap://lwm2m.example.com:5683`)
    pub uri: String,
    /// SMS 전송 시 서버 번호
    #[serde(default)]
    pub sms_number: Option<String>,
}

impl ServerDefinition {
    /// Bootstrap 서버인지
    pub fn is_bootstrap(&self) -> bool {
        self.ssid == SSID_BOOTSTRAP
    }

    /// 특정 전송의 연결 모드
    pub fn connection_mode(&self, conn_type: ConnectionType) -> ConnectionMode {
        self.binding.connection_mode(conn_type)
    }
}
