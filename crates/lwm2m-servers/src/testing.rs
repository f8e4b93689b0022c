//! 테스트용 목(mock) 전송/데이터 모델.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lwm2m_core::error::CoreError;
use lwm2m_core::models::binding::{BindingMode, ConnectionType};
use lwm2m_core::models::ids::Ssid;
use lwm2m_core::models::registration::{ObjectLink, RegisterRequest, UpdateRequest};
use lwm2m_core::models::server::ServerDefinition;
use lwm2m_core::ports::bootstrap::BootstrapNotifier;
use lwm2m_core::ports::data_model::DataModel;
use lwm2m_core::ports::transport::{
    ConnectTarget, NontransientState, RegisterOutcome, ServerSocket, SocketId,
    TransportConnector, UpdateOutcome,
};

/// 테스트 로그를 test writer로 출력
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn target(ssid: Ssid, conn_type: ConnectionType) -> ConnectTarget {
    ConnectTarget {
        ssid,
        conn_type,
        uri: format!("coap://server-{ssid}.example.com:5683"),
        sms_number: None,
    }
}

pub fn server(ssid: Ssid, binding: &str, lifetime_s: i64) -> ServerDefinition {
    ServerDefinition {
        ssid,
        binding: BindingMode::new(binding).unwrap(),
        lifetime_s,
        uri: format!("coap://server-{ssid}.example.com:5683"),
        sms_number: Some("+48600000000".to_string()),
    }
}

/// 기록된 전송 호출
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(Ssid, ConnectionType),
    Reconnect(Ssid, ConnectionType),
    Register(Ssid, RegisterRequest),
    Update(Ssid, Vec<String>, UpdateRequest),
    Deregister(Ssid, Vec<String>),
}

#[derive(Default)]
struct NetworkState {
    calls: Vec<Call>,
    failing_connects: HashSet<(Ssid, ConnectionType)>,
    register_script: HashMap<Ssid, VecDeque<RegisterOutcome>>,
    update_script: HashMap<Ssid, VecDeque<UpdateOutcome>>,
    deregister_fails: bool,
    resume_sessions: bool,
}

/// 스크립트 가능한 가짜 네트워크
pub struct MockNetwork {
    state: Mutex<NetworkState>,
    next_socket: AtomicUsize,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(NetworkState {
                resume_sessions: true,
                ..Default::default()
            }),
            next_socket: AtomicUsize::new(1),
        })
    }

    pub fn fail_connect(&self, ssid: Ssid, conn_type: ConnectionType) {
        self.state.lock().failing_connects.insert((ssid, conn_type));
    }

    pub fn allow_connect(&self, ssid: Ssid, conn_type: ConnectionType) {
        self.state.lock().failing_connects.remove(&(ssid, conn_type));
    }

    pub fn push_register(&self, ssid: Ssid, outcome: RegisterOutcome) {
        self.state
            .lock()
            .register_script
            .entry(ssid)
            .or_default()
            .push_back(outcome);
    }

    pub fn push_update(&self, ssid: Ssid, outcome: UpdateOutcome) {
        self.state
            .lock()
            .update_script
            .entry(ssid)
            .or_default()
            .push_back(outcome);
    }

    pub fn set_deregister_fails(&self, fails: bool) {
        self.state.lock().deregister_fails = fails;
    }

    pub fn set_resume_sessions(&self, resume: bool) {
        self.state.lock().resume_sessions = resume;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn connect_count(&self, ssid: Ssid) -> usize {
        self.count(|c| matches!(c, Call::Connect(s, _) if *s == ssid))
    }

    pub fn register_count(&self, ssid: Ssid) -> usize {
        self.count(|c| matches!(c, Call::Register(s, _) if *s == ssid))
    }

    pub fn update_count(&self, ssid: Ssid) -> usize {
        self.count(|c| matches!(c, Call::Update(s, ..) if *s == ssid))
    }

    pub fn deregister_count(&self, ssid: Ssid) -> usize {
        self.count(|c| matches!(c, Call::Deregister(s, _) if *s == ssid))
    }

    pub fn last_register(&self, ssid: Ssid) -> Option<RegisterRequest> {
        self.state.lock().calls.iter().rev().find_map(|c| match c {
            Call::Register(s, request) if *s == ssid => Some(request.clone()),
            _ => None,
        })
    }

    pub fn last_update(&self, ssid: Ssid) -> Option<UpdateRequest> {
        self.state.lock().calls.iter().rev().find_map(|c| match c {
            Call::Update(s, _, request) if *s == ssid => Some(request.clone()),
            _ => None,
        })
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

pub struct MockConnector {
    net: Arc<MockNetwork>,
}

impl MockConnector {
    pub fn new(net: Arc<MockNetwork>) -> Self {
        Self { net }
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(
        &self,
        target: &ConnectTarget,
        nontransient: &mut NontransientState,
    ) -> Result<Box<dyn ServerSocket>, CoreError> {
        self.net.record(Call::Connect(target.ssid, target.conn_type));
        if self
            .net
            .state
            .lock()
            .failing_connects
            .contains(&(target.ssid, target.conn_type))
        {
            return Err(CoreError::Network(format!("연결 실패: {}", target.uri)));
        }
        let id = self.net.next_socket.fetch_add(1, Ordering::Relaxed) as u64;
        nontransient.preferred_endpoint = Some(SocketAddr::from(([127, 0, 0, 1], 5683)));
        nontransient.last_local_port = Some(40_000 + id as u16);
        nontransient.session_cache = vec![id as u8];
        Ok(Box::new(MockSocket {
            id: SocketId(id),
            ssid: target.ssid,
            conn_type: target.conn_type,
            open: true,
            net: self.net.clone(),
        }))
    }
}

pub struct MockSocket {
    id: SocketId,
    ssid: Ssid,
    conn_type: ConnectionType,
    open: bool,
    net: Arc<MockNetwork>,
}

#[async_trait]
impl ServerSocket for MockSocket {
    fn id(&self) -> SocketId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn reconnect(&mut self, _nontransient: &mut NontransientState) -> Result<bool, CoreError> {
        self.net.record(Call::Reconnect(self.ssid, self.conn_type));
        let (failing, resume) = {
            let state = self.net.state.lock();
            (
                state.failing_connects.contains(&(self.ssid, self.conn_type)),
                state.resume_sessions,
            )
        };
        if failing {
            return Err(CoreError::Network("재연결 실패".to_string()));
        }
        self.open = true;
        Ok(resume)
    }

    fn close(&mut self) {
        self.open = false;
    }

    async fn register(&mut self, request: &RegisterRequest) -> RegisterOutcome {
        self.net.record(Call::Register(self.ssid, request.clone()));
        let scripted = self
            .net
            .state
            .lock()
            .register_script
            .get_mut(&self.ssid)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| RegisterOutcome::Registered {
            endpoint_path: vec!["rd".to_string(), format!("{}", self.ssid)],
        })
    }

    async fn update(&mut self, endpoint_path: &[String], request: &UpdateRequest) -> UpdateOutcome {
        self.net
            .record(Call::Update(self.ssid, endpoint_path.to_vec(), request.clone()));
        let scripted = self
            .net
            .state
            .lock()
            .update_script
            .get_mut(&self.ssid)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or(UpdateOutcome::Updated)
    }

    async fn deregister(&mut self, endpoint_path: &[String]) -> Result<(), CoreError> {
        self.net
            .record(Call::Deregister(self.ssid, endpoint_path.to_vec()));
        if self.net.state.lock().deregister_fails {
            Err(CoreError::Network("Deregister 타임아웃".to_string()))
        } else {
            Ok(())
        }
    }
}

/// 가변 데이터 모델
#[derive(Default)]
pub struct MockDataModel {
    servers: Mutex<Vec<ServerDefinition>>,
    objects: Mutex<Vec<ObjectLink>>,
}

impl MockDataModel {
    pub fn new(servers: Vec<ServerDefinition>) -> Arc<Self> {
        Arc::new(Self {
            servers: Mutex::new(servers),
            objects: Mutex::new(vec![
                ObjectLink {
                    oid: 1,
                    version: None,
                    instances: vec![0],
                },
                ObjectLink {
                    oid: 3,
                    version: None,
                    instances: vec![0],
                },
            ]),
        })
    }

    pub fn set_servers(&self, servers: Vec<ServerDefinition>) {
        *self.servers.lock() = servers;
    }

    pub fn update_server(&self, ssid: Ssid, f: impl FnOnce(&mut ServerDefinition)) {
        if let Some(def) = self.servers.lock().iter_mut().find(|d| d.ssid == ssid) {
            f(def);
        }
    }

    pub fn set_objects(&self, objects: Vec<ObjectLink>) {
        *self.objects.lock() = objects;
    }
}

impl DataModel for MockDataModel {
    fn server_definitions(&self) -> Result<Vec<ServerDefinition>, CoreError> {
        Ok(self.servers.lock().clone())
    }

    fn registered_objects(&self) -> Vec<ObjectLink> {
        self.objects.lock().clone()
    }
}

/// 호출 횟수를 세는 Bootstrap 알림
#[derive(Default)]
pub struct CountingBootstrap {
    count: AtomicUsize,
}

impl CountingBootstrap {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl BootstrapNotifier for CountingBootstrap {
    fn regular_connection_available(&self) -> Result<(), CoreError> {
        self.count.fetch_add(1, Ordering::Relaxed);
        // 실패해도 등록 결과에는 영향 없어야 함
        Err(CoreError::Internal("bootstrap 상태 없음".to_string()))
    }
}
