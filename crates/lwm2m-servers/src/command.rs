//! 실행 루프로 보내는 외부 명령.
//!
//! `ServersManager::run`이 관리자를 독점하는 동안에도 외부 진입점을 쓸 수 있도록
//! 명령을 채널로 넘기고 루프가 순서대로 적용한다.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use lwm2m_core::error::CoreError;
use lwm2m_core::models::ids::{Ssid, SsidTarget};
use lwm2m_core::ports::transport::SocketId;

/// 실행 루프가 처리하는 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    /// 다음 Update 즉시 실행
    ScheduleUpdate(SsidTarget),
    /// 광고 오브젝트 목록 변경
    ObjectsChanged,
    /// 비활성 서버 활성화
    Enable(Ssid),
    /// 서버 비활성화 (`timeout` 뒤 자동 재활성화)
    Disable {
        ssid: Ssid,
        timeout: Option<Duration>,
    },
    /// 재등록 강제
    Reregister(Ssid),
    /// 재연결 강제
    Reconnect(SsidTarget),
    /// 설정 동기화
    Reload,
    /// 소켓 트래픽 발생
    SocketActivity(SocketId),
    /// 오프라인 진입
    EnterOffline,
    /// 오프라인 해제
    ExitOffline,
}

/// 실행 중인 관리자에 명령을 보내는 핸들 (복제 가능)
///
/// 명령은 비동기로 적용되며 실패는 루프에서 로그로 남는다.
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    command_tx: mpsc::UnboundedSender<ServerCommand>,
}

impl ManagerHandle {
    pub(crate) fn new(command_tx: mpsc::UnboundedSender<ServerCommand>) -> Self {
        Self { command_tx }
    }

    /// 명령 전송 (관리자가 해제되었으면 에러)
    pub fn send(&self, command: ServerCommand) -> Result<(), CoreError> {
        self.command_tx.send(command).map_err(|e| {
            warn!(command = ?e.0, "관리자 종료됨, 명령 전달 실패");
            CoreError::Internal("서버 관리자가 종료됨".to_string())
        })
    }

    /// 다음 Update를 즉시 실행하도록 요청
    pub fn schedule_registration_update(
        &self,
        target: impl Into<SsidTarget>,
    ) -> Result<(), CoreError> {
        self.send(ServerCommand::ScheduleUpdate(target.into()))
    }

    /// 광고 오브젝트 목록 변경 알림
    pub fn notify_objects_changed(&self) -> Result<(), CoreError> {
        self.send(ServerCommand::ObjectsChanged)
    }

    pub fn enable_server(&self, ssid: Ssid) -> Result<(), CoreError> {
        self.send(ServerCommand::Enable(ssid))
    }

    pub fn disable_server(&self, ssid: Ssid, timeout: Option<Duration>) -> Result<(), CoreError> {
        self.send(ServerCommand::Disable { ssid, timeout })
    }

    pub fn schedule_reregister(&self, ssid: Ssid) -> Result<(), CoreError> {
        self.send(ServerCommand::Reregister(ssid))
    }

    pub fn schedule_reconnect(&self, target: impl Into<SsidTarget>) -> Result<(), CoreError> {
        self.send(ServerCommand::Reconnect(target.into()))
    }

    /// 설정 동기화 요청
    pub fn reload(&self) -> Result<(), CoreError> {
        self.send(ServerCommand::Reload)
    }

    pub fn handle_socket_activity(&self, socket_id: SocketId) -> Result<(), CoreError> {
        self.send(ServerCommand::SocketActivity(socket_id))
    }

    pub fn enter_offline(&self) -> Result<(), CoreError> {
        self.send(ServerCommand::EnterOffline)
    }

    pub fn exit_offline(&self) -> Result<(), CoreError> {
        self.send(ServerCommand::ExitOffline)
    }
}
