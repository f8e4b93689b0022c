//! 서버 작업 실행 환경.

use std::time::Duration;

use lwm2m_core::config::ClientConfig;
use lwm2m_core::models::binding::ConnectionType;
use lwm2m_core::ports::bootstrap::BootstrapNotifier;
use lwm2m_core::ports::clock::Clock;
use lwm2m_core::ports::data_model::DataModel;
use lwm2m_core::ports::scheduler::{RetryBackoff, Scheduler};
use lwm2m_core::ports::transport::TransportConnector;

/// 한 번의 작업 실행 동안 빌려 쓰는 협력자 묶음
///
/// 레지스트리와 분리해서 빌리므로 서버 항목을 가변으로 잡은 채 스케줄러를 쓸 수 있다.
pub(crate) struct ServerEnv<'a> {
    pub config: &'a ClientConfig,
    pub clock: &'a dyn Clock,
    pub data_model: &'a dyn DataModel,
    pub connector: &'a dyn TransportConnector,
    pub bootstrap: &'a dyn BootstrapNotifier,
    pub scheduler: &'a mut dyn Scheduler,
}

impl ServerEnv<'_> {
    /// 전송별 MAX_TRANSMIT_WAIT
    pub fn max_transmit_wait(&self, conn_type: ConnectionType) -> Duration {
        match conn_type {
            ConnectionType::Udp => self.config.udp_tx_params.max_transmit_wait(),
            ConnectionType::Sms => self.config.sms_tx_params.max_transmit_wait(),
        }
    }

    /// 재시도 백오프 정책
    pub fn backoff(&self) -> RetryBackoff {
        RetryBackoff::from(&self.config.retry)
    }
}
