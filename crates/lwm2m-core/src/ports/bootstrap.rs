//! Bootstrap 알림 포트.

use crate::error::CoreError;

/// Bootstrap 계층 알림 훅
///
/// 일반 서버에 대한 Register가 성공할 때마다 호출된다.
/// 실패는 로그만 남기고 등록 결과에는 영향을 주지 않는다.
pub trait BootstrapNotifier: Send + Sync {
    /// 일반 서버 연결 확보 알림
    fn regular_connection_available(&self) -> Result<(), CoreError>;
}

/// Bootstrap 미지원 구성용 no-op 구현
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBootstrap;

impl BootstrapNotifier for NoBootstrap {
    fn regular_connection_available(&self) -> Result<(), CoreError> {
        Ok(())
    }
}
