//! 전송별 연결 수명주기.
//!
//! 서버 하나, 전송 하나의 소켓 상태를 명시적 상태로 관리한다.
//! 소켓이 사라져도 `NontransientState`(선호 주소, 세션 재개 데이터, 로컬 포트)는 유지된다.

use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use lwm2m_core::error::CoreError;
use lwm2m_core::models::binding::{ConnectionMode, ConnectionType};
use lwm2m_core::models::ids::Ssid;
use lwm2m_core::ports::scheduler::{Job, JobHandle, Scheduler};
use lwm2m_core::ports::transport::{
    ConnectTarget, NontransientState, ServerSocket, SocketId, TransportConnector,
};

/// 소켓 상태
#[derive(Default)]
pub enum SocketState {
    /// 연결한 적 없음, 현재 바인딩에서 미사용, 또는 정리됨
    #[default]
    NotProvisioned,
    /// 닫힘 (세션 재개 데이터 보존)
    Suspended(Box<dyn ServerSocket>),
    /// 연결됨
    Online(Box<dyn ServerSocket>),
}

impl SocketState {
    fn socket(&self) -> Option<&dyn ServerSocket> {
        match self {
            SocketState::NotProvisioned => None,
            SocketState::Suspended(socket) | SocketState::Online(socket) => Some(socket.as_ref()),
        }
    }
}

impl fmt::Debug for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketState::NotProvisioned => f.write_str("NotProvisioned"),
            SocketState::Suspended(socket) => write!(f, "Suspended({})", socket.id()),
            SocketState::Online(socket) => write!(f, "Online({})", socket.id()),
        }
    }
}

/// 연결 확보 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionUp {
    /// 이미 연결되어 있었음
    AlreadyOnline,
    /// 닫힌 소켓을 세션 재개로 다시 연결
    Resumed,
    /// 새 세션으로 연결 (서버 측 상태를 신뢰할 수 없음)
    NewSession,
}

/// 서버 하나, 전송 하나에 대한 연결
#[derive(Debug)]
pub struct ServerConnection {
    conn_type: ConnectionType,
    mode: ConnectionMode,
    socket: SocketState,
    nontransient: NontransientState,
    queue_close_handle: Option<JobHandle>,
}

impl ServerConnection {
    /// 소켓 없는 연결 생성
    pub fn new(conn_type: ConnectionType) -> Self {
        Self::with_nontransient(conn_type, NontransientState::default())
    }

    /// 보존된 상태로부터 연결 생성 (재활성화 시)
    pub fn with_nontransient(conn_type: ConnectionType, nontransient: NontransientState) -> Self {
        Self {
            conn_type,
            mode: ConnectionMode::Disabled,
            socket: SocketState::NotProvisioned,
            nontransient,
            queue_close_handle: None,
        }
    }

    /// 전송 종류
    pub fn conn_type(&self) -> ConnectionType {
        self.conn_type
    }

    /// 마지막으로 읽은 바인딩 기준 연결 모드
    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// 연결 모드 설정
    pub fn set_mode(&mut self, mode: ConnectionMode) {
        self.mode = mode;
    }

    /// 소켓 상태
    pub fn socket_state(&self) -> &SocketState {
        &self.socket
    }

    /// 보존 상태
    pub fn nontransient(&self) -> &NontransientState {
        &self.nontransient
    }

    /// 실제로 쓰이는 모드 (소켓이 없으면 `Disabled`)
    pub fn current_mode(&self) -> ConnectionMode {
        match self.socket {
            SocketState::NotProvisioned => ConnectionMode::Disabled,
            _ => self.mode,
        }
    }

    /// 등록 트래픽에 사용 가능한지 (모드 활성 + 소켓 열림)
    pub fn is_online(&self) -> bool {
        self.mode != ConnectionMode::Disabled
            && matches!(&self.socket, SocketState::Online(socket) if socket.is_open())
    }

    /// 사용 가능한 소켓
    pub fn online_socket(&mut self) -> Option<&mut dyn ServerSocket> {
        if !self.is_online() {
            return None;
        }
        match &mut self.socket {
            SocketState::Online(socket) => Some(socket.as_mut()),
            _ => None,
        }
    }

    /// 현재 보유한 소켓 ID (닫힌 소켓 포함)
    pub fn socket_id(&self) -> Option<SocketId> {
        self.socket.socket().map(|socket| socket.id())
    }

    /// 연결 확보
    ///
    /// 소켓이 없으면 새로 연결하고, 닫혀 있으면 보존된 세션으로 재연결한다.
    /// 실패해도 보유 중인 소켓과 보존 상태는 그대로 남는다.
    pub async fn bring_online(
        &mut self,
        connector: &dyn TransportConnector,
        target: &ConnectTarget,
    ) -> Result<ConnectionUp, CoreError> {
        match std::mem::take(&mut self.socket) {
            SocketState::Online(socket) if socket.is_open() => {
                self.socket = SocketState::Online(socket);
                Ok(ConnectionUp::AlreadyOnline)
            }
            SocketState::Online(mut socket) | SocketState::Suspended(mut socket) => {
                match socket.reconnect(&mut self.nontransient).await {
                    Ok(resumed) => {
                        debug!(
                            ssid = target.ssid,
                            conn_type = %self.conn_type,
                            resumed,
                            "소켓 재연결"
                        );
                        self.socket = SocketState::Online(socket);
                        Ok(if resumed {
                            ConnectionUp::Resumed
                        } else {
                            ConnectionUp::NewSession
                        })
                    }
                    Err(e) => {
                        self.socket = SocketState::Suspended(socket);
                        Err(e)
                    }
                }
            }
            SocketState::NotProvisioned => {
                let socket = connector.connect(target, &mut self.nontransient).await?;
                info!(
                    ssid = target.ssid,
                    conn_type = %self.conn_type,
                    socket = %socket.id(),
                    "서버 연결 생성"
                );
                self.socket = SocketState::Online(socket);
                Ok(ConnectionUp::NewSession)
            }
        }
    }

    /// 소켓 닫기 (세션 데이터 보존)
    pub fn suspend(&mut self, scheduler: &mut dyn Scheduler) {
        self.cancel_queue_close(scheduler);
        self.socket = match std::mem::take(&mut self.socket) {
            SocketState::Online(mut socket) => {
                socket.close();
                debug!(conn_type = %self.conn_type, socket = %socket.id(), "소켓 일시 중단");
                SocketState::Suspended(socket)
            }
            other => other,
        };
    }

    /// 소켓 정리 (보존 상태만 남김)
    pub fn clean_socket(&mut self, scheduler: &mut dyn Scheduler) {
        self.cancel_queue_close(scheduler);
        if let SocketState::Online(socket) | SocketState::Suspended(socket) =
            std::mem::take(&mut self.socket)
        {
            debug!(conn_type = %self.conn_type, socket = %socket.id(), "소켓 정리");
        }
    }

    /// 큐 모드이면 유휴 후 소켓 종료 예약 (기존 예약은 다시 설정)
    pub fn schedule_queue_close(
        &mut self,
        ssid: Ssid,
        idle: Duration,
        scheduler: &mut dyn Scheduler,
    ) {
        self.cancel_queue_close(scheduler);
        if self.mode != ConnectionMode::Queue || !self.is_online() {
            return;
        }
        let handle = scheduler.schedule(
            idle,
            Job::QueueModeClose {
                ssid,
                conn_type: self.conn_type,
            },
        );
        self.queue_close_handle = Some(handle);
    }

    /// 큐 모드 종료 예약 취소
    pub fn cancel_queue_close(&mut self, scheduler: &mut dyn Scheduler) {
        if let Some(handle) = self.queue_close_handle.take() {
            scheduler.cancel(handle);
        }
    }

    /// 실행된 큐 모드 종료 작업 처리
    pub fn on_queue_close_fired(&mut self, scheduler: &mut dyn Scheduler) {
        self.queue_close_handle = None;
        if matches!(self.socket, SocketState::Online(_)) {
            debug!(conn_type = %self.conn_type, "큐 모드 유휴 시간 경과, 소켓 종료");
        }
        self.suspend(scheduler);
    }

    /// 큐 모드 종료 예약 여부
    pub fn queue_close_pending(&self) -> bool {
        self.queue_close_handle.is_some()
    }

    /// 비활성화: 소켓을 버리고 보존 상태만 돌려줌
    pub fn into_nontransient(mut self, scheduler: &mut dyn Scheduler) -> NontransientState {
        self.clean_socket(scheduler);
        self.nontransient
    }
}
