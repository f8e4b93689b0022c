//! 등록 상태 머신.
//!
//! 서버 하나에 대해 Register / Update / Deregister 교환을 수행하고,
//! 재등록과 Update 중 무엇이 필요한지 판단한 뒤 다음 Update를 예약한다.

use std::time::Duration;
use tracing::{debug, error, info, warn};

use lwm2m_core::error::CoreError;
use lwm2m_core::models::binding::{ConnectionMode, ConnectionType};
use lwm2m_core::models::ids::Ssid;
use lwm2m_core::models::registration::{
    RegisterRequest, RegistrationResult, RegistrationState, UpdateParameters, UpdateRequest,
    UpdateResult,
};
use lwm2m_core::ports::scheduler::Job;
use lwm2m_core::ports::transport::{RegisterOutcome, UpdateOutcome};

use crate::context::ServerEnv;
use crate::registry::{ActiveServer, ServerEntry};

/// Update는 수명의 1/2 또는 MAX_TRANSMIT_WAIT 중 작은 값만큼 만료 전에 보낸다
pub const UPDATE_INTERVAL_MARGIN_FACTOR: u64 = 2;

/// 수명이 매우 짧아도 Update 간격은 이보다 짧아지지 않는다
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// 만료 전 여유 시간: `min(lifetime / 2, max_transmit_wait)`
pub fn update_interval_margin(lifetime_s: i64, max_transmit_wait: Duration) -> Duration {
    let lifetime_ms = u64::try_from(lifetime_s).unwrap_or(0).saturating_mul(1000);
    Duration::from_millis(lifetime_ms / UPDATE_INTERVAL_MARGIN_FACTOR).min(max_transmit_wait)
}

/// 남은 등록 시간에서 여유 시간을 뺀 Update 지연 (최소 1초)
pub fn next_update_delay(remaining: chrono::Duration, margin: Duration) -> Duration {
    let remaining = remaining.to_std().unwrap_or(Duration::ZERO);
    remaining.saturating_sub(margin).max(MIN_UPDATE_INTERVAL)
}

/// 현재 데이터 모델과 연결 상태 기준 갱신 파라미터
pub(crate) fn current_update_params(
    env: &ServerEnv<'_>,
    ssid: Ssid,
    server: &ActiveServer,
) -> Result<UpdateParameters, CoreError> {
    let definition = env
        .data_model
        .server_definition(ssid)?
        .ok_or_else(|| CoreError::NotFound {
            resource_type: "Server".to_string(),
            id: ssid.to_string(),
        })?;
    Ok(UpdateParameters {
        lifetime_s: definition.lifetime_s,
        binding_mode: server.connections.actual_binding_mode()?,
        objects: env.data_model.registered_objects(),
    })
}

/// 마지막으로 보낸 파라미터와 달라 Update가 필요한지
pub(crate) fn needs_update(server: &ActiveServer, params: &UpdateParameters) -> bool {
    server.registration_info.last_update_params.as_ref() != Some(params)
}

/// 등록 보장 (필요하면 Update, 그래도 안 되면 새 Register)
///
/// 성공하면 다음 Update를 예약한다.
pub(crate) async fn ensure_valid_registration(
    env: &mut ServerEnv<'_>,
    entry: &mut ServerEntry,
) -> RegistrationResult {
    let ssid = entry.ssid;
    let Some(server) = entry.active_mut() else {
        return RegistrationResult::Failed;
    };
    let result = ensure_valid_registration_inner(env, ssid, server).await;
    finish_action(env, entry, result == RegistrationResult::Success);
    result
}

async fn ensure_valid_registration_inner(
    env: &mut ServerEnv<'_>,
    ssid: Ssid,
    server: &mut ActiveServer,
) -> RegistrationResult {
    let now = env.clock.now();
    let update_result = if !server.primary_connection_valid() {
        info!(ssid, "등록 인터페이스에 유효한 연결 없음, 재등록 필요");
        server.registration_info.invalidate();
        UpdateResult::NeedsRegistration
    } else if server.registration_info.is_expired(now) {
        debug!(ssid, "등록 만료, 재등록 필요");
        UpdateResult::NeedsRegistration
    } else {
        match current_update_params(env, ssid, server) {
            Ok(params) if !needs_update(server, &params) => UpdateResult::Success,
            Ok(params) => send_update(env, ssid, server, params).await,
            Err(e) => {
                error!(ssid, error = %e, "갱신 파라미터 계산 실패");
                UpdateResult::Failed
            }
        }
    };

    match update_result {
        UpdateResult::Success => RegistrationResult::Success,
        UpdateResult::Failed => RegistrationResult::Failed,
        UpdateResult::NeedsRegistration => {
            server.state = RegistrationState::NeedsRegistration;
            if !server.primary_connection_valid() {
                if let Err(e) = setup_primary_connection(env, ssid, server).await {
                    warn!(ssid, error = %e, "주 연결 확보 실패");
                    return RegistrationResult::Failed;
                }
            }
            register(env, ssid, server).await
        }
    }
}

/// 주기적 Update (재등록은 시도하지 않음)
///
/// 재등록이 필요하면 `NeedsRegistration`을 돌려주고, 비활성화/재활성화는 호출자가 맡는다.
pub(crate) async fn registration_update(
    env: &mut ServerEnv<'_>,
    entry: &mut ServerEntry,
) -> UpdateResult {
    let ssid = entry.ssid;
    let Some(server) = entry.active_mut() else {
        return UpdateResult::Failed;
    };
    let now = env.clock.now();

    let result = if !server.primary_connection_valid() {
        info!(ssid, "등록 인터페이스에 유효한 연결 없음, 재등록 필요");
        server.registration_info.invalidate();
        server.state = RegistrationState::NeedsRegistration;
        UpdateResult::NeedsRegistration
    } else if server.registration_info.is_expired(now) {
        server.state = RegistrationState::NeedsRegistration;
        UpdateResult::NeedsRegistration
    } else {
        match current_update_params(env, ssid, server) {
            Ok(params) => send_update(env, ssid, server, params).await,
            Err(e) => {
                error!(ssid, error = %e, "갱신 파라미터 계산 실패");
                UpdateResult::Failed
            }
        }
    };
    finish_action(env, entry, result == UpdateResult::Success);
    result
}

/// Update 교환
async fn send_update(
    env: &mut ServerEnv<'_>,
    ssid: Ssid,
    server: &mut ActiveServer,
    params: UpdateParameters,
) -> UpdateResult {
    let Some(primary) = server.primary_conn_type else {
        return UpdateResult::Failed;
    };
    let request = UpdateRequest::diff(server.registration_info.last_update_params.as_ref(), &params);
    let endpoint_path = server.registration_info.endpoint_path.clone();

    let previous_state = server.state;
    let Some(socket) = server.connections.get_mut(primary).online_socket() else {
        return UpdateResult::NeedsRegistration;
    };
    server.state = RegistrationState::UpdatePending;
    let outcome = socket.update(&endpoint_path, &request).await;

    match outcome {
        UpdateOutcome::Updated => {
            debug!(ssid, lifetime_s = params.lifetime_s, "Update 성공");
            server.registration_info.on_updated(params, env.clock.now());
            server.state = RegistrationState::Registered;
            UpdateResult::Success
        }
        UpdateOutcome::Rejected { code } => {
            debug!(ssid, code, "Update 거부됨, 재등록 필요");
            server.registration_info.invalidate();
            server.state = RegistrationState::NeedsRegistration;
            UpdateResult::NeedsRegistration
        }
        UpdateOutcome::NetworkError(reason) => {
            error!(ssid, %reason, "Update 중 네트워크 에러");
            // 재연결은 스케줄러 백오프에 맡긴다. 다음 실행의 refresh가 소켓을 다시 연다.
            server.connections.get_mut(primary).suspend(env.scheduler);
            server.state = previous_state;
            UpdateResult::Failed
        }
        UpdateOutcome::Failed(reason) => {
            error!(ssid, %reason, "Update 전송 실패");
            server.state = previous_state;
            UpdateResult::Failed
        }
    }
}

/// 주 연결 선택, 연결된 전송이 없으면 새로 연결
async fn setup_primary_connection(
    env: &mut ServerEnv<'_>,
    ssid: Ssid,
    server: &mut ActiveServer,
) -> Result<ConnectionType, CoreError> {
    if let Some(conn_type) = server.connections.first_online() {
        server.primary_conn_type = Some(conn_type);
        return Ok(conn_type);
    }

    let definition = env
        .data_model
        .server_definition(ssid)?
        .ok_or_else(|| CoreError::NotFound {
            resource_type: "Server".to_string(),
            id: ssid.to_string(),
        })?;
    let mut last_error = None;
    for conn_type in ConnectionType::ALL {
        let conn = server.connections.get_mut(conn_type);
        if conn.mode() == ConnectionMode::Disabled {
            continue;
        }
        let target = crate::activate::connect_target(&definition, conn_type);
        match conn.bring_online(env.connector, &target).await {
            Ok(_) => {
                server.primary_conn_type = Some(conn_type);
                return Ok(conn_type);
            }
            Err(e) => last_error = Some(e),
        }
    }
    server.primary_conn_type = None;
    Err(last_error.unwrap_or_else(|| CoreError::Network("사용 가능한 전송 없음".to_string())))
}

/// Register 교환
async fn register(
    env: &mut ServerEnv<'_>,
    ssid: Ssid,
    server: &mut ActiveServer,
) -> RegistrationResult {
    let Some(primary) = server.primary_conn_type else {
        return RegistrationResult::Failed;
    };
    let params = match current_update_params(env, ssid, server) {
        Ok(params) => params,
        Err(e) => {
            error!(ssid, error = %e, "등록 파라미터 계산 실패");
            return RegistrationResult::Failed;
        }
    };
    let msisdn = match params.binding_mode.connection_mode(ConnectionType::Sms) {
        ConnectionMode::Disabled => None,
        _ => env.config.local_msisdn.as_deref(),
    };
    let request = match RegisterRequest::new(
        &env.config.lwm2m_version,
        &env.config.endpoint_name,
        &params,
        msisdn,
    ) {
        Ok(request) => request,
        Err(e) => {
            error!(ssid, error = %e, "Register 요청 생성 실패");
            return RegistrationResult::Failed;
        }
    };

    let outcome = match server.connections.get_mut(primary).online_socket() {
        Some(socket) => socket.register(&request).await,
        None => return RegistrationResult::Failed,
    };

    match outcome {
        RegisterOutcome::Registered { endpoint_path } => {
            info!(
                ssid,
                conn_type = %primary,
                lifetime_s = params.lifetime_s,
                binding = %params.binding_mode,
                path = %endpoint_path.join("/"),
                "등록 완료"
            );
            server
                .registration_info
                .on_registered(endpoint_path, params, env.clock.now());
            server.state = RegistrationState::Registered;
            if let Err(e) = env.bootstrap.regular_connection_available() {
                debug!(ssid, error = %e, "Bootstrap 알림 실패 (무시)");
            }
            RegistrationResult::Success
        }
        RegisterOutcome::Forbidden => {
            warn!(ssid, "서버가 등록을 금지함");
            RegistrationResult::Forbidden
        }
        RegisterOutcome::Rejected { code } => {
            debug!(ssid, code, "재등록 실패");
            RegistrationResult::Failed
        }
        RegisterOutcome::NetworkError(reason) => {
            error!(ssid, %reason, "Register 중 네트워크 에러");
            server.connections.get_mut(primary).suspend(env.scheduler);
            RegistrationResult::Failed
        }
    }
}

/// 등록 작업 후처리: 큐 모드 종료 예약, 성공 시 다음 Update 예약
fn finish_action(env: &mut ServerEnv<'_>, entry: &mut ServerEntry, success: bool) {
    arm_queue_close(env, entry);
    if success {
        reschedule_update_job(env, entry);
    }
}

/// 큐 모드 연결의 유휴 종료 타이머 재설정
pub(crate) fn arm_queue_close(env: &mut ServerEnv<'_>, entry: &mut ServerEntry) {
    let ssid = entry.ssid;
    let Some(server) = entry.active_mut() else {
        return;
    };
    for conn in server.connections.iter_mut() {
        let idle = env.max_transmit_wait(conn.conn_type());
        conn.schedule_queue_close(ssid, idle, env.scheduler);
    }
}

/// 기존 작업을 지우고 다음 Update 예약
pub(crate) fn reschedule_update_job(env: &mut ServerEnv<'_>, entry: &mut ServerEntry) {
    let Some(server) = entry.active() else {
        return;
    };
    let info = &server.registration_info;
    let conn_type = server.primary_conn_type.unwrap_or(ConnectionType::Udp);
    let margin = update_interval_margin(
        info.lifetime_s().unwrap_or(0),
        env.max_transmit_wait(conn_type),
    );
    let delay = next_update_delay(info.time_remaining(env.clock.now()), margin);
    schedule_update(env, entry, delay);
}

/// 지정한 지연 후 Update 예약 (기존 작업 교체)
pub(crate) fn schedule_update(env: &mut ServerEnv<'_>, entry: &mut ServerEntry, delay: Duration) {
    debug!(ssid = entry.ssid, ?delay, "Update 예약");
    let backoff = env.backoff();
    entry.cancel_next_action(env.scheduler);
    let handle =
        env.scheduler
            .schedule_retryable(delay, backoff, Job::SendUpdate { ssid: entry.ssid });
    entry.next_action = Some(handle);
}

/// Deregister (1회, 최선 노력)
///
/// 실패는 로그만 남기며 재시도하지 않는다.
pub(crate) async fn deregister(
    env: &mut ServerEnv<'_>,
    ssid: Ssid,
    server: &mut ActiveServer,
) {
    let Some(primary) = server.primary_conn_type else {
        error!(ssid, "주 연결 없음, Deregister 생략");
        return;
    };
    let endpoint_path = server.registration_info.endpoint_path.clone();
    let conn = server.connections.get_mut(primary);
    // 큐 모드로 닫힌 소켓은 Deregister를 위해 다시 연다
    if !conn.is_online() {
        let target = match env.data_model.server_definition(ssid) {
            Ok(Some(definition)) => crate::activate::connect_target(&definition, primary),
            _ => {
                error!(ssid, "서버 정의 없음, Deregister 생략");
                return;
            }
        };
        if let Err(e) = conn.bring_online(env.connector, &target).await {
            error!(ssid, error = %e, "연결 불가, Deregister 생략");
            return;
        }
    }
    let Some(socket) = conn.online_socket() else {
        return;
    };

    server.state = RegistrationState::Deregistering;
    match socket.deregister(&endpoint_path).await {
        Ok(()) => info!(ssid, "Deregister 완료"),
        Err(e) => error!(ssid, error = %e, "Deregister 전송 실패"),
    }
    server.registration_info.invalidate();
    server.state = RegistrationState::NeedsRegistration;
}
