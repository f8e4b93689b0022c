//! 클라이언트 설정 구조체.
//!
//! 엔드포인트 이름, 전송별 CoAP 전송 파라미터, 재시도 백오프 등
//! 서버 관리 계층의 런타임 설정을 정의한다.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 클라이언트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 엔드포인트 이름 (`ep=`)
    #[serde(default = "default_endpoint_name")]
    pub endpoint_name: String,
    /// LwM2M 버전 (`lwm2m=`)
    #[serde(default = "default_lwm2m_version")]
    pub lwm2m_version: String,
    /// UDP 전송 파라미터
    #[serde(default = "TxParams::udp_default")]
    pub udp_tx_params: TxParams,
    /// SMS 전송 파라미터
    #[serde(default = "TxParams::sms_default")]
    pub sms_tx_params: TxParams,
    /// 재시도 백오프
    #[serde(default)]
    pub retry: RetryConfig,
    /// 단말 MSISDN (SMS 바인딩 시 `sms=`로 전송)
    #[serde(default)]
    pub local_msisdn: Option<String>,
}

fn default_endpoint_name() -> String {
    "lwm2m-client".to_string()
}

fn default_lwm2m_version() -> String {
    "1.0".to_string()
}

impl ClientConfig {
    /// 기본 설정 생성
    pub fn default_config() -> Self {
        Self {
            endpoint_name: default_endpoint_name(),
            lwm2m_version: default_lwm2m_version(),
            udp_tx_params: TxParams::udp_default(),
            sms_tx_params: TxParams::sms_default(),
            retry: RetryConfig::default(),
            local_msisdn: None,
        }
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.endpoint_name.trim().is_empty() {
            return Err(CoreError::Config("endpoint_name이 비어 있음".to_string()));
        }
        self.udp_tx_params.validate("udp_tx_params")?;
        self.sms_tx_params.validate("sms_tx_params")?;
        if self.retry.initial_delay_secs == 0 {
            return Err(CoreError::Config(
                "retry.initial_delay_secs는 0보다 커야 함".to_string(),
            ));
        }
        if self.retry.initial_delay_secs > self.retry.max_delay_secs {
            return Err(CoreError::Config(format!(
                "retry.initial_delay_secs({})가 max_delay_secs({})보다 큼",
                self.retry.initial_delay_secs, self.retry.max_delay_secs
            )));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

// ============================================================
// CoAP 전송 파라미터
// ============================================================

/// CoAP 전송 파라미터 (RFC 7252 §4.8)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TxParams {
    /// ACK_TIMEOUT (ms)
    pub ack_timeout_ms: u64,
    /// ACK_RANDOM_FACTOR
    pub ack_random_factor: f64,
    /// MAX_RETRANSMIT
    pub max_retransmit: u32,
}

impl TxParams {
    /// UDP 기본값 (2초, 1.5, 4)
    pub fn udp_default() -> Self {
        Self {
            ack_timeout_ms: 2_000,
            ack_random_factor: 1.5,
            max_retransmit: 4,
        }
    }

    /// SMS 기본값 (60초, 1.5, 4)
    pub fn sms_default() -> Self {
        Self {
            ack_timeout_ms: 60_000,
            ack_random_factor: 1.5,
            max_retransmit: 4,
        }
    }

    /// MAX_TRANSMIT_WAIT = ACK_TIMEOUT * (2^(MAX_RETRANSMIT+1) - 1) * ACK_RANDOM_FACTOR
    pub fn max_transmit_wait(&self) -> Duration {
        let exp = self.max_retransmit.saturating_add(1).min(31);
        let factor = ((1u64 << exp) - 1) as f64 * self.ack_random_factor;
        Duration::from_millis((self.ack_timeout_ms as f64 * factor) as u64)
    }

    fn validate(&self, field: &str) -> Result<(), CoreError> {
        if self.ack_timeout_ms == 0 {
            return Err(CoreError::Config(format!(
                "{field}.ack_timeout_ms는 0보다 커야 함"
            )));
        }
        if self.ack_random_factor.is_nan() || self.ack_random_factor < 1.0 {
            return Err(CoreError::Config(format!(
                "{field}.ack_random_factor는 1 이상이어야 함: {}",
                self.ack_random_factor
            )));
        }
        Ok(())
    }
}

// ============================================================
// 재시도 설정
// ============================================================

/// 재시도 백오프 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 첫 재시도 지연 (초)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,
    /// 최대 재시도 지연 (초)
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

fn default_initial_delay() -> u64 {
    1
}
fn default_max_delay() -> u64 {
    120
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay(),
            max_delay_secs: default_max_delay(),
        }
    }
}
