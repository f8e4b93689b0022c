//! 서버 관리자.
//!
//! 서버 레지스트리, 스케줄러, 전송/데이터 모델 포트를 소유하는 단일 실행 컨텍스트.
//! 모든 레지스트리 변경과 작업 디스패치는 `&mut self`를 통해서만 일어나므로
//! 내부 잠금이 필요 없다.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use lwm2m_core::config::ClientConfig;
use lwm2m_core::error::CoreError;
use lwm2m_core::models::binding::ConnectionType;
use lwm2m_core::models::ids::{Ssid, SsidTarget, SSID_BOOTSTRAP};
use lwm2m_core::models::registration::{
    RegistrationInfo, RegistrationResult, RegistrationState, UpdateResult,
};
use lwm2m_core::ports::bootstrap::{BootstrapNotifier, NoBootstrap};
use lwm2m_core::ports::clock::Clock;
use lwm2m_core::ports::data_model::DataModel;
use lwm2m_core::ports::scheduler::{FiredJob, Job, JobHandle, RetryBackoff, Scheduler};
use lwm2m_core::ports::transport::{SocketId, TransportConnector};
use lwm2m_sched::JobQueue;

use crate::activate::{self, RefreshOutcome};
use crate::command::{ManagerHandle, ServerCommand};
use crate::context::ServerEnv;
use crate::registration;
use crate::registry::{ServerEntry, ServerRegistry};

/// 연결된 소켓 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSocketInfo {
    /// 소유 서버
    pub ssid: Ssid,
    /// 전송 종류
    pub conn_type: ConnectionType,
    /// 소켓 식별자
    pub socket_id: SocketId,
}

/// 서버 연결/등록 관리자
pub struct ServersManager {
    config: ClientConfig,
    clock: Arc<dyn Clock>,
    scheduler: Box<dyn Scheduler>,
    connector: Arc<dyn TransportConnector>,
    data_model: Arc<dyn DataModel>,
    bootstrap: Arc<dyn BootstrapNotifier>,
    registry: ServerRegistry,
    offline: bool,
    reload_handle: Option<JobHandle>,
    command_tx: mpsc::UnboundedSender<ServerCommand>,
    command_rx: mpsc::UnboundedReceiver<ServerCommand>,
}

/// 실행 루프 한 번의 대기 결과
enum LoopEvent {
    Timer,
    Command(ServerCommand),
    Shutdown,
}

impl ServersManager {
    /// 새 관리자 생성 (같은 시계를 쓰는 `JobQueue` 스케줄러 사용)
    pub fn new(
        config: ClientConfig,
        clock: Arc<dyn Clock>,
        connector: Arc<dyn TransportConnector>,
        data_model: Arc<dyn DataModel>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let scheduler = Box::new(JobQueue::new(clock.clone()));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            clock,
            scheduler,
            connector,
            data_model,
            bootstrap: Arc::new(NoBootstrap),
            registry: ServerRegistry::new(),
            offline: false,
            reload_handle: None,
            command_tx,
            command_rx,
        })
    }

    /// 스케줄러 교체 (주입한 시계와 같은 타임라인이어야 함)
    pub fn with_scheduler(mut self, scheduler: Box<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Bootstrap 알림 훅 설정
    pub fn with_bootstrap(mut self, bootstrap: Arc<dyn BootstrapNotifier>) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// 실행 루프에 명령을 보내는 핸들
    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle::new(self.command_tx.clone())
    }

    /// 작업 실행 환경과 레지스트리를 따로 빌림
    fn split(&mut self) -> (ServerEnv<'_>, &mut ServerRegistry) {
        (
            ServerEnv {
                config: &self.config,
                clock: self.clock.as_ref(),
                data_model: self.data_model.as_ref(),
                connector: self.connector.as_ref(),
                bootstrap: self.bootstrap.as_ref(),
                scheduler: self.scheduler.as_mut(),
            },
            &mut self.registry,
        )
    }

    // ============================================================
    // 조회
    // ============================================================

    /// 클라이언트 설정
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 서버 레지스트리
    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// 레지스트리 순서대로 SSID 목록
    pub fn server_ssids(&self) -> Vec<Ssid> {
        self.registry.ssids()
    }

    /// 활성 서버인지
    pub fn is_active(&self, ssid: Ssid) -> bool {
        self.registry.find(ssid).is_some_and(ServerEntry::is_active)
    }

    /// 활성 서버의 등록 상태
    pub fn registration_state(&self, ssid: Ssid) -> Option<RegistrationState> {
        self.registry
            .find(ssid)
            .and_then(ServerEntry::active)
            .map(|server| server.state)
    }

    /// 활성 서버의 등록 정보
    pub fn registration_info(&self, ssid: Ssid) -> Option<&RegistrationInfo> {
        self.registry
            .find(ssid)
            .and_then(ServerEntry::active)
            .map(|server| &server.registration_info)
    }

    /// 오프라인 모드 여부
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// 연결된 소켓 목록
    pub fn sockets(&self) -> Vec<ServerSocketInfo> {
        self.registry
            .iter()
            .filter_map(|entry| entry.active().map(|server| (entry.ssid, server)))
            .flat_map(|(ssid, server)| {
                server
                    .connections
                    .iter()
                    .filter(|conn| conn.is_online())
                    .filter_map(move |conn| {
                        conn.socket_id().map(|socket_id| ServerSocketInfo {
                            ssid,
                            conn_type: conn.conn_type(),
                            socket_id,
                        })
                    })
            })
            .collect()
    }

    /// 다음 작업까지 남은 시간 (대기 작업이 없으면 `None`)
    pub fn next_wakeup(&self) -> Option<Duration> {
        let due = self.scheduler.next_due()?;
        Some((due - self.clock.now()).to_std().unwrap_or(Duration::ZERO))
    }

    // ============================================================
    // 외부 진입점
    // ============================================================

    /// 다음 Update를 즉시 실행하도록 재예약 (하나 또는 모든 활성 서버)
    pub fn schedule_registration_update(
        &mut self,
        target: impl Into<SsidTarget>,
    ) -> Result<(), CoreError> {
        if self.offline {
            error!("오프라인 상태에서는 등록 갱신을 예약할 수 없음");
            return Err(CoreError::Offline);
        }
        let target = target.into();
        let (mut env, registry) = self.split();
        match target {
            SsidTarget::All => {
                let _: ControlFlow<()> = registry.foreach_active(|entry| {
                    registration::schedule_update(&mut env, entry, Duration::ZERO);
                    ControlFlow::Continue(())
                });
                Ok(())
            }
            SsidTarget::One(ssid) => {
                let entry = registry.find_active(ssid).ok_or_else(|| {
                    error!(ssid, "활성 서버 없음");
                    not_active(ssid)
                })?;
                registration::schedule_update(&mut env, entry, Duration::ZERO);
                Ok(())
            }
        }
    }

    /// 등록 보장 (필요하면 Update 또는 새 Register 수행)
    pub async fn ensure_valid_registration(
        &mut self,
        ssid: Ssid,
    ) -> Result<RegistrationResult, CoreError> {
        if self.offline {
            return Err(CoreError::Offline);
        }
        let (mut env, registry) = self.split();
        let entry = registry.find_active(ssid).ok_or_else(|| not_active(ssid))?;
        if ssid != SSID_BOOTSTRAP {
            // 큐 모드로 닫힌 소켓은 등록 판단 전에 다시 연다
            if let Some(server) = entry.active_mut() {
                activate::refresh(&mut env, ssid, server).await?;
            }
        }
        Ok(registration::ensure_valid_registration(&mut env, entry).await)
    }

    /// 재등록 강제: 등록 무효화, 비활성화 후 즉시 재활성화
    pub async fn schedule_reregister(&mut self, ssid: Ssid) -> Result<(), CoreError> {
        let offline = self.offline;
        let (mut env, registry) = self.split();
        let entry = registry.find_active(ssid).ok_or_else(|| not_active(ssid))?;
        if let Some(server) = entry.active_mut() {
            server.registration_info.invalidate();
        }
        activate::deactivate(&mut env, entry, false, Some(Duration::ZERO)).await;
        if !offline {
            schedule_pending_activation(&mut env, entry);
        }
        Ok(())
    }

    /// 재연결 강제: 소켓을 닫고 즉시 Update (Update 작업이 다시 연결한다)
    pub fn schedule_reconnect(&mut self, target: impl Into<SsidTarget>) -> Result<(), CoreError> {
        if self.offline {
            return Err(CoreError::Offline);
        }
        let target = target.into();
        let (mut env, registry) = self.split();
        let mut reconnect = |entry: &mut ServerEntry| {
            if let Some(server) = entry.active_mut() {
                server.connections.suspend_all(env.scheduler);
            }
            registration::schedule_update(&mut env, entry, Duration::ZERO);
        };
        match target {
            SsidTarget::All => {
                let _: ControlFlow<()> = registry.foreach_active(|entry| {
                    reconnect(entry);
                    ControlFlow::Continue(())
                });
            }
            SsidTarget::One(ssid) => {
                let entry = registry.find_active(ssid).ok_or_else(|| not_active(ssid))?;
                reconnect(entry);
            }
        }
        Ok(())
    }

    /// 비활성 서버 즉시 활성화 예약
    pub fn enable_server(&mut self, ssid: Ssid) -> Result<(), CoreError> {
        let offline = self.offline;
        let (mut env, registry) = self.split();
        let now = env.clock.now();
        let entry = registry.find_mut(ssid).ok_or_else(|| CoreError::NotFound {
            resource_type: "Server".to_string(),
            id: ssid.to_string(),
        })?;
        let Some(inactive) = entry.inactive_mut() else {
            debug!(ssid, "이미 활성화된 서버");
            return Ok(());
        };
        inactive.reactivate_failed = false;
        inactive.reactivate_time = Some(now);
        if !offline {
            schedule_pending_activation(&mut env, entry);
        }
        info!(ssid, "서버 활성화 예약");
        Ok(())
    }

    /// 서버 비활성화 (등록이 유효하면 Deregister 1회 시도)
    ///
    /// `timeout`이 지나면 자동으로 다시 활성화된다. `None`이면 `enable_server`까지 비활성.
    pub async fn disable_server(
        &mut self,
        ssid: Ssid,
        timeout: Option<Duration>,
    ) -> Result<(), CoreError> {
        let offline = self.offline;
        let (mut env, registry) = self.split();
        let entry = registry.find_mut(ssid).ok_or_else(|| CoreError::NotFound {
            resource_type: "Server".to_string(),
            id: ssid.to_string(),
        })?;
        if entry.is_active() {
            activate::deactivate(&mut env, entry, !offline, timeout).await;
        } else {
            entry.cancel_next_action(env.scheduler);
            let now = env.clock.now();
            if let Some(inactive) = entry.inactive_mut() {
                inactive.reactivate_time = timeout.map(|delay| now + to_chrono(delay));
            }
        }
        if !offline {
            schedule_pending_activation(&mut env, entry);
        }
        info!(ssid, timeout_s = timeout.map(|t| t.as_secs()), "서버 비활성화");
        Ok(())
    }

    /// 광고 오브젝트 목록 변경 알림 (모든 활성 서버에 즉시 Update)
    pub fn notify_objects_changed(&mut self) {
        if self.offline {
            debug!("오프라인 상태, 오브젝트 변경은 온라인 복귀 시 반영");
            return;
        }
        if let Err(e) = self.schedule_registration_update(SsidTarget::All) {
            warn!(error = %e, "오브젝트 변경 Update 예약 실패");
        }
    }

    /// 소켓 트래픽 발생 알림 (큐 모드 종료 타이머 재설정)
    pub fn handle_socket_activity(&mut self, socket_id: SocketId) -> Option<Ssid> {
        let (ssid, conn_type) = self.registry.find_by_socket(socket_id)?;
        let (mut env, registry) = self.split();
        let idle = env.max_transmit_wait(conn_type);
        let server = registry.find_active(ssid)?.active_mut()?;
        server
            .connections
            .get_mut(conn_type)
            .schedule_queue_close(ssid, idle, env.scheduler);
        Some(ssid)
    }

    // ============================================================
    // 오프라인 모드
    // ============================================================

    /// 오프라인 진입: 모든 소켓을 닫고 서버 작업을 취소
    pub fn enter_offline(&mut self) {
        if self.offline {
            return;
        }
        if let Some(handle) = self.reload_handle.take() {
            self.scheduler.cancel(handle);
        }
        let (mut env, registry) = self.split();
        for entry in registry.iter_mut() {
            entry.cancel_next_action(env.scheduler);
            if let Some(server) = entry.active_mut() {
                server.connections.suspend_all(env.scheduler);
            }
        }
        self.offline = true;
        info!("오프라인 모드 진입");
    }

    /// 오프라인 해제: 서버 작업 재설정 후 설정 동기화 예약
    pub fn exit_offline(&mut self) {
        if !self.offline {
            return;
        }
        self.offline = false;
        let (mut env, registry) = self.split();
        for entry in registry.iter_mut() {
            if entry.is_active() {
                registration::schedule_update(&mut env, entry, Duration::ZERO);
            } else {
                schedule_pending_activation(&mut env, entry);
            }
        }
        self.schedule_reload();
        info!("오프라인 모드 해제");
    }

    // ============================================================
    // 설정 동기화
    // ============================================================

    /// 즉시 설정 동기화 예약
    pub fn schedule_reload(&mut self) {
        if let Some(handle) = self.reload_handle.take() {
            self.scheduler.cancel(handle);
        }
        self.reload_handle = Some(self.scheduler.schedule(Duration::ZERO, Job::ReloadServers));
    }

    /// 데이터 모델의 서버 정의와 레지스트리 동기화
    pub async fn reload(&mut self) -> Result<(), CoreError> {
        let partial_failure = self.reload_servers().await?;
        if partial_failure {
            self.schedule_transport_review(None);
        }
        Ok(())
    }

    /// 동기화 본체. 일부 전송 연결 실패가 있었으면 `true`.
    async fn reload_servers(&mut self) -> Result<bool, CoreError> {
        let definitions = self.data_model.server_definitions()?;
        let offline = self.offline;
        let (mut env, registry) = self.split();
        let now = env.clock.now();

        for ssid in registry.ssids() {
            if definitions.iter().any(|def| def.ssid == ssid) {
                continue;
            }
            if let Some(mut entry) = registry.remove(ssid) {
                activate::deactivate(&mut env, &mut entry, !offline, None).await;
                info!(ssid, "설정에서 제거된 서버 삭제");
            }
        }

        let mut partial_failure = false;
        for definition in &definitions {
            let ssid = definition.ssid;
            if registry.find(ssid).is_none() {
                registry.insert(ServerEntry::inactive_until(ssid, now))?;
                info!(ssid, binding = %definition.binding, "새 서버 추가");
            }
            let Some(entry) = registry.find_mut(ssid) else {
                continue;
            };
            if offline {
                continue;
            }
            if !entry.is_active() {
                if entry.next_action.is_none() {
                    schedule_pending_activation(&mut env, entry);
                }
                continue;
            }
            partial_failure |= refresh_active(&mut env, entry).await;
        }
        Ok(partial_failure)
    }

    /// 일부 전송 연결 실패 시 지연 동기화 예약
    fn schedule_transport_review(&mut self, fired: Option<FiredJob>) {
        if let Some(fired) = fired {
            if let Some(handle) = self.scheduler.retry(fired) {
                self.reload_handle = Some(handle);
                return;
            }
        }
        if self
            .reload_handle
            .is_some_and(|handle| self.scheduler.is_pending(handle))
        {
            return;
        }
        let backoff = RetryBackoff::from(&self.config.retry);
        let handle = self
            .scheduler
            .schedule_retryable(backoff.initial, backoff, Job::ReloadServers);
        debug!(delay_s = backoff.initial.as_secs(), "전송 재점검 예약");
        self.reload_handle = Some(handle);
    }

    // ============================================================
    // 작업 실행
    // ============================================================

    /// 실행 시각이 된 작업을 모두 실행, 실행한 작업 수 반환
    pub async fn run_due_jobs(&mut self) -> usize {
        let mut count = 0;
        while let Some(fired) = self.scheduler.pop_due() {
            self.dispatch(fired).await;
            count += 1;
        }
        count
    }

    async fn dispatch(&mut self, fired: FiredJob) {
        debug!(job = ?fired.job, handle = fired.handle.0, "작업 실행");
        match fired.job {
            Job::SendUpdate { ssid } => self.send_update_job(ssid, fired).await,
            Job::ActivateServer { ssid } => self.activate_job(ssid, fired).await,
            Job::QueueModeClose { ssid, conn_type } => self.queue_close_job(ssid, conn_type),
            Job::ReloadServers => self.reload_job(fired).await,
        }
    }

    /// 주기적 Update 작업
    ///
    /// 갱신 실패는 백오프로 재시도하고, 등록이 만료되었거나 재등록이 필요하면
    /// Deregister 없이 비활성화 후 즉시 재활성화한다.
    async fn send_update_job(&mut self, ssid: Ssid, fired: FiredJob) {
        let (mut env, registry) = self.split();
        let Some(entry) = registry.find_active(ssid) else {
            return;
        };
        entry.clear_fired(fired.handle);

        let refreshed = match entry.active_mut() {
            Some(server) => activate::refresh(&mut env, ssid, server).await,
            None => return,
        };
        let mut partial_failure = false;
        let result = match refreshed {
            Err(e) => {
                let now = env.clock.now();
                let expired = entry
                    .active()
                    .map_or(true, |server| server.registration_info.is_expired(now));
                warn!(ssid, error = %e, expired, "연결 갱신 실패");
                if expired {
                    UpdateResult::NeedsRegistration
                } else {
                    UpdateResult::Failed
                }
            }
            Ok(outcome) => {
                partial_failure = outcome == RefreshOutcome::PartialFailure;
                if ssid == SSID_BOOTSTRAP {
                    UpdateResult::Success
                } else {
                    registration::registration_update(&mut env, entry).await
                }
            }
        };

        match result {
            UpdateResult::Success => {}
            UpdateResult::Failed => {
                if let Some(handle) = env.scheduler.retry(fired) {
                    entry.set_next_action(env.scheduler, handle);
                }
            }
            UpdateResult::NeedsRegistration => {
                // 등록이 이미 끊긴 것으로 보고 Deregister 없이 재활성화
                if let Some(server) = entry.active_mut() {
                    server.registration_info.invalidate();
                }
                activate::deactivate(&mut env, entry, false, Some(Duration::ZERO)).await;
                schedule_pending_activation(&mut env, entry);
            }
        }
        if partial_failure {
            self.schedule_transport_review(None);
        }
    }

    /// 서버 활성화 작업
    async fn activate_job(&mut self, ssid: Ssid, fired: FiredJob) {
        let (mut env, registry) = self.split();
        let Some(entry) = registry.find_mut(ssid) else {
            return;
        };
        entry.clear_fired(fired.handle);
        if entry.is_active() {
            return;
        }

        let report = activate::activate(&mut env, entry).await;
        match report.result {
            RegistrationResult::Success => {}
            RegistrationResult::Forbidden => {
                warn!(ssid, "등록 금지됨, 재활성화 중단");
            }
            RegistrationResult::Failed => {
                if let Some(handle) = env.scheduler.retry(fired) {
                    entry.set_next_action(env.scheduler, handle);
                }
            }
        }
        if report.partial_failure {
            self.schedule_transport_review(None);
        }
    }

    /// 큐 모드 유휴 종료 작업
    fn queue_close_job(&mut self, ssid: Ssid, conn_type: ConnectionType) {
        let (mut env, registry) = self.split();
        if let Some(server) = registry.find_active(ssid).and_then(ServerEntry::active_mut) {
            server
                .connections
                .get_mut(conn_type)
                .on_queue_close_fired(env.scheduler);
        }
    }

    /// 설정 동기화 작업
    async fn reload_job(&mut self, fired: FiredJob) {
        if self.reload_handle == Some(fired.handle) {
            self.reload_handle = None;
        }
        match self.reload_servers().await {
            Ok(false) => {}
            Ok(true) => self.schedule_transport_review(Some(fired)),
            Err(e) => {
                error!(error = %e, "서버 목록 동기화 실패");
                self.schedule_transport_review(Some(fired));
            }
        }
    }

    // ============================================================
    // 실행 루프
    // ============================================================

    /// 종료 신호가 올 때까지 작업과 [`ManagerHandle`] 명령 실행
    ///
    /// 종료 시 모든 서버에 Deregister를 시도하고 비활성화한다.
    pub async fn run(&mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("서버 관리 루프 시작");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            self.run_due_jobs().await;
            let wait = self.next_wakeup();
            let event = tokio::select! {
                _ = sleep_or_pending(wait) => LoopEvent::Timer,
                command = self.command_rx.recv() => match command {
                    Some(command) => LoopEvent::Command(command),
                    None => LoopEvent::Shutdown,
                },
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        LoopEvent::Shutdown
                    } else {
                        LoopEvent::Timer
                    }
                }
            };
            match event {
                LoopEvent::Timer => {}
                LoopEvent::Command(command) => self.apply_command(command).await,
                LoopEvent::Shutdown => break,
            }
        }
        self.shutdown().await;
        info!("서버 관리 루프 종료");
    }

    /// 외부 명령 적용 (실패는 로그로 남김)
    pub async fn apply_command(&mut self, command: ServerCommand) {
        debug!(command = ?command, "명령 수신");
        let result = match command.clone() {
            ServerCommand::ScheduleUpdate(target) => self.schedule_registration_update(target),
            ServerCommand::ObjectsChanged => {
                self.notify_objects_changed();
                Ok(())
            }
            ServerCommand::Enable(ssid) => self.enable_server(ssid),
            ServerCommand::Disable { ssid, timeout } => self.disable_server(ssid, timeout).await,
            ServerCommand::Reregister(ssid) => self.schedule_reregister(ssid).await,
            ServerCommand::Reconnect(target) => self.schedule_reconnect(target),
            ServerCommand::Reload => self.reload().await,
            ServerCommand::SocketActivity(socket_id) => {
                if self.handle_socket_activity(socket_id).is_none() {
                    debug!(socket_id = socket_id.0, "알 수 없는 소켓");
                }
                Ok(())
            }
            ServerCommand::EnterOffline => {
                self.enter_offline();
                Ok(())
            }
            ServerCommand::ExitOffline => {
                self.exit_offline();
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(command = ?command, error = %e, "명령 처리 실패");
        }
    }

    /// 모든 서버 비활성화 (등록이 유효하면 Deregister 1회 시도)
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.reload_handle.take() {
            self.scheduler.cancel(handle);
        }
        let offline = self.offline;
        let (mut env, registry) = self.split();
        for entry in registry.iter_mut() {
            if entry.is_active() {
                activate::deactivate(&mut env, entry, !offline, None).await;
            } else {
                entry.cancel_next_action(env.scheduler);
            }
        }
        info!("모든 서버 비활성화 완료");
    }
}

/// 활성 서버 연결 갱신 후 필요하면 Update 예약. 일부 전송 실패면 `true`.
async fn refresh_active(env: &mut ServerEnv<'_>, entry: &mut ServerEntry) -> bool {
    let ssid = entry.ssid;
    let Some(server) = entry.active_mut() else {
        return false;
    };
    match activate::refresh(env, ssid, server).await {
        Err(e) => {
            warn!(ssid, error = %e, "연결 갱신 실패, 재활성화 예약");
            server.registration_info.invalidate();
            activate::deactivate(env, entry, false, Some(Duration::ZERO)).await;
            schedule_pending_activation(env, entry);
            false
        }
        Ok(outcome) => {
            if ssid != SSID_BOOTSTRAP {
                let now = env.clock.now();
                let changed = server.registration_info.is_expired(now)
                    || registration::current_update_params(env, ssid, server)
                        .map_or(true, |params| registration::needs_update(server, &params));
                if changed {
                    registration::schedule_update(env, entry, Duration::ZERO);
                } else if entry.next_action.is_none() {
                    registration::reschedule_update_job(env, entry);
                }
            }
            outcome == RefreshOutcome::PartialFailure
        }
    }
}

/// 재활성화 시각이 정해진 비활성 서버에 활성화 작업 예약
fn schedule_pending_activation(env: &mut ServerEnv<'_>, entry: &mut ServerEntry) {
    let Some(inactive) = entry.inactive() else {
        return;
    };
    if inactive.reactivate_failed {
        return;
    }
    let Some(at) = inactive.reactivate_time else {
        return;
    };
    let delay = (at - env.clock.now()).to_std().unwrap_or(Duration::ZERO);
    let backoff = env.backoff();
    let handle = env
        .scheduler
        .schedule_retryable(delay, backoff, Job::ActivateServer { ssid: entry.ssid });
    entry.set_next_action(env.scheduler, handle);
    debug!(ssid = entry.ssid, ?delay, "활성화 예약");
}

fn not_active(ssid: Ssid) -> CoreError {
    CoreError::NotFound {
        resource_type: "ActiveServer".to_string(),
        id: ssid.to_string(),
    }
}

fn to_chrono(delay: Duration) -> chrono::Duration {
    chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::days(365))
}

async fn sleep_or_pending(wait: Option<Duration>) {
    match wait {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}
