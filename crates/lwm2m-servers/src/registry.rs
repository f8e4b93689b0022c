//! 서버 레지스트리.
//!
//! 설정된 서버 항목(활성/비활성)의 순서 있는 목록.
//! SSID 조회와 소켓 역조회 모두 첫 일치에서 멈추는 선형 탐색이다.

use chrono::{DateTime, Utc};
use std::ops::ControlFlow;

use lwm2m_core::error::CoreError;
use lwm2m_core::models::binding::{BindingMode, ConnectionType};
use lwm2m_core::models::ids::Ssid;
use lwm2m_core::models::registration::{RegistrationInfo, RegistrationState};
use lwm2m_core::ports::scheduler::{JobHandle, Scheduler};
use lwm2m_core::ports::transport::{NontransientState, SocketId};

use crate::connection::ServerConnection;

/// 전송별 연결 묶음 (UDP, SMS)
#[derive(Debug)]
pub struct ConnectionSet {
    conns: [ServerConnection; 2],
}

impl ConnectionSet {
    /// 보존 상태로부터 연결 묶음 생성
    pub fn from_nontransient(states: [NontransientState; 2]) -> Self {
        let [udp, sms] = states;
        Self {
            conns: [
                ServerConnection::with_nontransient(ConnectionType::Udp, udp),
                ServerConnection::with_nontransient(ConnectionType::Sms, sms),
            ],
        }
    }

    /// 특정 전송의 연결
    pub fn get(&self, conn_type: ConnectionType) -> &ServerConnection {
        &self.conns[conn_type.index()]
    }

    /// 특정 전송의 연결 (가변)
    pub fn get_mut(&mut self, conn_type: ConnectionType) -> &mut ServerConnection {
        &mut self.conns[conn_type.index()]
    }

    /// 전체 연결 순회
    pub fn iter(&self) -> impl Iterator<Item = &ServerConnection> {
        self.conns.iter()
    }

    /// 전체 연결 순회 (가변)
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ServerConnection> {
        self.conns.iter_mut()
    }

    /// 실제 연결 상태 기준 바인딩 모드
    ///
    /// 소켓이 없는 전송은 제외된다.
    pub fn actual_binding_mode(&self) -> Result<BindingMode, CoreError> {
        BindingMode::from_connection_modes(
            self.get(ConnectionType::Udp).current_mode(),
            self.get(ConnectionType::Sms).current_mode(),
        )
    }

    /// 연결된 첫 전송 (우선순위: UDP, SMS)
    pub fn first_online(&self) -> Option<ConnectionType> {
        ConnectionType::ALL
            .into_iter()
            .find(|ct| self.get(*ct).is_online())
    }

    /// 모든 소켓 일시 중단
    pub fn suspend_all(&mut self, scheduler: &mut dyn Scheduler) {
        for conn in self.iter_mut() {
            conn.suspend(scheduler);
        }
    }

    /// 비활성화: 소켓을 버리고 보존 상태만 남김
    pub fn into_nontransient(self, scheduler: &mut dyn Scheduler) -> [NontransientState; 2] {
        let [udp, sms] = self.conns;
        [
            udp.into_nontransient(scheduler),
            sms.into_nontransient(scheduler),
        ]
    }
}

/// 활성 서버 상태
#[derive(Debug)]
pub struct ActiveServer {
    /// 전송별 연결
    pub connections: ConnectionSet,
    /// 등록 트래픽 전송 (미정이면 `None`)
    pub primary_conn_type: Option<ConnectionType>,
    /// 등록 정보
    pub registration_info: RegistrationInfo,
    /// 등록 상태
    pub state: RegistrationState,
}

impl ActiveServer {
    /// 비활성 상태에서 넘어온 보존 상태로 생성
    pub fn new(nontransient: [NontransientState; 2]) -> Self {
        Self {
            connections: ConnectionSet::from_nontransient(nontransient),
            primary_conn_type: None,
            registration_info: RegistrationInfo::default(),
            state: RegistrationState::NeedsRegistration,
        }
    }

    /// 주 연결이 등록 트래픽에 사용 가능한지
    pub fn primary_connection_valid(&self) -> bool {
        self.primary_conn_type
            .is_some_and(|ct| self.connections.get(ct).is_online())
    }
}

/// 비활성 서버 상태
#[derive(Debug, Default)]
pub struct InactiveServer {
    /// 다음 활성화 때 재사용할 보존 상태
    pub nontransient: [NontransientState; 2],
    /// 등록 금지 등으로 재활성화를 포기했는지
    pub reactivate_failed: bool,
    /// 자동 재활성화 시각 (`None`이면 명시적으로 켤 때까지 비활성)
    pub reactivate_time: Option<DateTime<Utc>>,
}

/// 활성화 상태
#[derive(Debug)]
pub enum Activation {
    /// 비활성
    Inactive(InactiveServer),
    /// 활성
    Active(ActiveServer),
}

/// 설정된 관리 서버 하나
#[derive(Debug)]
pub struct ServerEntry {
    /// Short Server ID
    pub ssid: Ssid,
    /// 활성화 상태
    pub activation: Activation,
    /// 대기 중인 서버 작업 (최대 1개)
    pub next_action: Option<JobHandle>,
}

impl ServerEntry {
    /// 비활성 항목 생성 (자동 재활성화 없음)
    pub fn new_inactive(ssid: Ssid) -> Self {
        Self {
            ssid,
            activation: Activation::Inactive(InactiveServer::default()),
            next_action: None,
        }
    }

    /// 지정 시각에 활성화될 비활성 항목 생성
    pub fn inactive_until(ssid: Ssid, reactivate_time: DateTime<Utc>) -> Self {
        Self {
            ssid,
            activation: Activation::Inactive(InactiveServer {
                reactivate_time: Some(reactivate_time),
                ..Default::default()
            }),
            next_action: None,
        }
    }

    /// 비활성 상태
    pub fn inactive(&self) -> Option<&InactiveServer> {
        match &self.activation {
            Activation::Inactive(server) => Some(server),
            Activation::Active(_) => None,
        }
    }

    /// 비활성 상태 (가변)
    pub fn inactive_mut(&mut self) -> Option<&mut InactiveServer> {
        match &mut self.activation {
            Activation::Inactive(server) => Some(server),
            Activation::Active(_) => None,
        }
    }

    /// 활성 여부
    pub fn is_active(&self) -> bool {
        matches!(self.activation, Activation::Active(_))
    }

    /// 활성 상태
    pub fn active(&self) -> Option<&ActiveServer> {
        match &self.activation {
            Activation::Active(server) => Some(server),
            Activation::Inactive(_) => None,
        }
    }

    /// 활성 상태 (가변)
    pub fn active_mut(&mut self) -> Option<&mut ActiveServer> {
        match &mut self.activation {
            Activation::Active(server) => Some(server),
            Activation::Inactive(_) => None,
        }
    }

    /// 대기 작업 취소
    pub fn cancel_next_action(&mut self, scheduler: &mut dyn Scheduler) {
        if let Some(handle) = self.next_action.take() {
            scheduler.cancel(handle);
        }
    }

    /// 대기 작업 교체 (기존 작업 취소 후 설정)
    pub fn set_next_action(&mut self, scheduler: &mut dyn Scheduler, handle: JobHandle) {
        self.cancel_next_action(scheduler);
        self.next_action = Some(handle);
    }

    /// 실행된 작업이 이 항목의 대기 작업이면 핸들 해제
    pub fn clear_fired(&mut self, handle: JobHandle) {
        if self.next_action == Some(handle) {
            self.next_action = None;
        }
    }
}

/// 서버 레지스트리
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: Vec<ServerEntry>,
}

impl ServerRegistry {
    /// 빈 레지스트리
    pub fn new() -> Self {
        Self::default()
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// 비어 있는지
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// 등록 순서대로 SSID 목록
    pub fn ssids(&self) -> Vec<Ssid> {
        self.servers.iter().map(|entry| entry.ssid).collect()
    }

    /// 전체 순회
    pub fn iter(&self) -> impl Iterator<Item = &ServerEntry> {
        self.servers.iter()
    }

    /// 전체 순회 (가변)
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ServerEntry> {
        self.servers.iter_mut()
    }

    /// SSID로 조회
    pub fn find(&self, ssid: Ssid) -> Option<&ServerEntry> {
        self.servers.iter().find(|entry| entry.ssid == ssid)
    }

    /// SSID로 조회 (가변)
    pub fn find_mut(&mut self, ssid: Ssid) -> Option<&mut ServerEntry> {
        self.servers.iter_mut().find(|entry| entry.ssid == ssid)
    }

    /// 활성 서버 조회
    pub fn find_active(&mut self, ssid: Ssid) -> Option<&mut ServerEntry> {
        self.find_mut(ssid).filter(|entry| entry.is_active())
    }

    /// 소켓 소유 서버와 전송 종류 조회
    pub fn find_by_socket(&self, socket_id: SocketId) -> Option<(Ssid, ConnectionType)> {
        self.servers.iter().find_map(|entry| {
            let server = entry.active()?;
            server
                .connections
                .iter()
                .find(|conn| conn.socket_id() == Some(socket_id))
                .map(|conn| (entry.ssid, conn.conn_type()))
        })
    }

    /// 활성 서버 순회 (방문자가 `Break`를 돌려주면 중단)
    pub fn foreach_active<B, F>(&mut self, mut visit: F) -> ControlFlow<B>
    where
        F: FnMut(&mut ServerEntry) -> ControlFlow<B>,
    {
        for entry in self.servers.iter_mut().filter(|entry| entry.is_active()) {
            if let ControlFlow::Break(value) = visit(entry) {
                return ControlFlow::Break(value);
            }
        }
        ControlFlow::Continue(())
    }

    /// 항목 추가 (같은 SSID가 있으면 거부)
    pub fn insert(&mut self, entry: ServerEntry) -> Result<(), CoreError> {
        if self.find(entry.ssid).is_some() {
            return Err(CoreError::validation(
                "ssid",
                format!("이미 등록된 SSID: {}", entry.ssid),
            ));
        }
        self.servers.push(entry);
        Ok(())
    }

    /// 항목 제거
    pub fn remove(&mut self, ssid: Ssid) -> Option<ServerEntry> {
        let pos = self.servers.iter().position(|entry| entry.ssid == ssid)?;
        Some(self.servers.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{target, MockConnector, MockNetwork};
    use lwm2m_core::models::binding::ConnectionMode;

    async fn active_entry(ssid: Ssid, connector: &MockConnector) -> ServerEntry {
        let mut server = ActiveServer::new(Default::default());
        let conn = server.connections.get_mut(ConnectionType::Udp);
        conn.set_mode(ConnectionMode::Online);
        conn.bring_online(connector, &target(ssid, ConnectionType::Udp))
            .await
            .unwrap();
        server.primary_conn_type = Some(ConnectionType::Udp);
        ServerEntry {
            ssid,
            activation: Activation::Active(server),
            next_action: None,
        }
    }

    #[tokio::test]
    async fn lookup_by_ssid_and_socket() {
        let connector = MockConnector::new(MockNetwork::new());
        let mut registry = ServerRegistry::new();
        registry.insert(active_entry(7, &connector).await).unwrap();
        registry.insert(ServerEntry::new_inactive(3)).unwrap();
        registry.insert(active_entry(5, &connector).await).unwrap();

        // 등록 순서 유지
        assert_eq!(registry.ssids(), vec![7, 3, 5]);
        assert!(registry.find_active(3).is_none());
        assert!(registry.find(3).is_some());

        let socket = registry
            .find(5)
            .and_then(ServerEntry::active)
            .and_then(|s| s.connections.get(ConnectionType::Udp).socket_id())
            .unwrap();
        assert_eq!(
            registry.find_by_socket(socket),
            Some((5, ConnectionType::Udp))
        );
        assert_eq!(registry.find_by_socket(SocketId(9999)), None);
    }

    #[tokio::test]
    async fn foreach_active_stops_on_break() {
        let connector = MockConnector::new(MockNetwork::new());
        let mut registry = ServerRegistry::new();
        for ssid in [1, 2, 3] {
            registry.insert(active_entry(ssid, &connector).await).unwrap();
        }
        registry.insert(ServerEntry::new_inactive(4)).unwrap();

        let mut visited = Vec::new();
        let flow = registry.foreach_active(|entry| {
            visited.push(entry.ssid);
            if entry.ssid == 2 {
                ControlFlow::Break(entry.ssid)
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(flow, ControlFlow::Break(2));
        assert_eq!(visited, vec![1, 2]);

        let mut count = 0;
        let flow: ControlFlow<()> = registry.foreach_active(|_| {
            count += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(flow, ControlFlow::Continue(()));
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn actual_binding_follows_sockets() {
        let connector = MockConnector::new(MockNetwork::new());
        let entry = active_entry(1, &connector).await;
        let server = entry.active().unwrap();
        assert!(server.primary_connection_valid());
        assert_eq!(server.connections.actual_binding_mode().unwrap().as_str(), "U");
        assert_eq!(server.connections.first_online(), Some(ConnectionType::Udp));

        let empty = ActiveServer::new(Default::default());
        assert!(!empty.primary_connection_valid());
        assert!(empty.connections.actual_binding_mode().is_err());
    }

    #[test]
    fn duplicate_ssid_rejected() {
        let mut registry = ServerRegistry::new();
        registry.insert(ServerEntry::new_inactive(1)).unwrap();
        assert!(registry.insert(ServerEntry::new_inactive(1)).is_err());
        assert!(registry.remove(1).is_some());
        assert!(registry.remove(1).is_none());
        assert!(registry.is_empty());
    }
}
