//! 서버 활성화/비활성화.
//!
//! 활성화 = 연결 갱신 후 등록 보장. 실패하면 서버는 비활성 상태로 돌아가고
//! 보존 상태(nontransient)만 남긴다.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

use lwm2m_core::error::CoreError;
use lwm2m_core::models::binding::{ConnectionMode, ConnectionType};
use lwm2m_core::models::ids::{Ssid, SSID_BOOTSTRAP};
use lwm2m_core::models::registration::RegistrationResult;
use lwm2m_core::models::server::ServerDefinition;
use lwm2m_core::ports::transport::ConnectTarget;

use crate::connection::ConnectionUp;
use crate::context::ServerEnv;
use crate::registration;
use crate::registry::{Activation, ActiveServer, InactiveServer, ServerEntry};

/// 서버 정의로부터 연결 대상 생성
pub(crate) fn connect_target(definition: &ServerDefinition, conn_type: ConnectionType) -> ConnectTarget {
    ConnectTarget {
        ssid: definition.ssid,
        conn_type,
        uri: definition.uri.clone(),
        sms_number: definition.sms_number.clone(),
    }
}

/// 연결 갱신 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    /// 바인딩의 모든 전송 연결됨
    AllOnline,
    /// 일부 전송 연결 실패 (나머지로 계속 진행)
    PartialFailure,
}

/// 활성화 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ActivationReport {
    pub result: RegistrationResult,
    pub partial_failure: bool,
}

/// 활성 서버의 연결을 현재 바인딩에 맞춰 갱신
///
/// 바인딩에서 빠진 전송은 정리하고, 남은 전송은 연결을 확보한다.
/// 연결된 전송이 하나도 없으면 에러.
pub(crate) async fn refresh(
    env: &mut ServerEnv<'_>,
    ssid: Ssid,
    server: &mut ActiveServer,
) -> Result<RefreshOutcome, CoreError> {
    let definition = env
        .data_model
        .server_definition(ssid)?
        .ok_or_else(|| CoreError::NotFound {
            resource_type: "Server".to_string(),
            id: ssid.to_string(),
        })?;

    let mut partial_failure = false;
    for conn_type in ConnectionType::ALL {
        let mode = definition.connection_mode(conn_type);
        let conn = server.connections.get_mut(conn_type);
        conn.set_mode(mode);
        if mode == ConnectionMode::Disabled {
            conn.clean_socket(env.scheduler);
            continue;
        }
        let target = connect_target(&definition, conn_type);
        match conn.bring_online(env.connector, &target).await {
            Ok(ConnectionUp::NewSession) if server.primary_conn_type == Some(conn_type) => {
                debug!(ssid, conn_type = %conn_type, "새 세션, 등록 정보 무효화");
                server.registration_info.invalidate();
            }
            Ok(_) => {}
            Err(e) => {
                warn!(ssid, conn_type = %conn_type, error = %e, "전송 연결 실패");
                partial_failure = true;
            }
        }
    }

    if !server.primary_connection_valid() {
        if let Some(next) = server.connections.first_online() {
            if server.primary_conn_type.is_some_and(|previous| previous != next) {
                // 등록 인터페이스 전송이 바뀌면 기존 등록을 쓸 수 없다
                server.registration_info.invalidate();
            }
            server.primary_conn_type = Some(next);
        }
    }

    if !server.primary_connection_valid() {
        return Err(CoreError::Network(format!(
            "SSID {ssid}: 연결 가능한 전송 없음"
        )));
    }
    if partial_failure {
        Ok(RefreshOutcome::PartialFailure)
    } else {
        Ok(RefreshOutcome::AllOnline)
    }
}

/// 비활성 서버 활성화
///
/// Bootstrap 서버는 연결만 확보하고 등록하지 않는다.
pub(crate) async fn activate(env: &mut ServerEnv<'_>, entry: &mut ServerEntry) -> ActivationReport {
    let ssid = entry.ssid;
    let nontransient = match &mut entry.activation {
        Activation::Inactive(inactive) => std::mem::take(&mut inactive.nontransient),
        Activation::Active(_) => {
            return ActivationReport {
                result: RegistrationResult::Success,
                partial_failure: false,
            }
        }
    };
    entry.activation = Activation::Active(ActiveServer::new(nontransient));

    let refreshed = match entry.active_mut() {
        Some(server) => refresh(env, ssid, server).await,
        None => Err(CoreError::Internal("활성화 직후 상태 불일치".to_string())),
    };
    let (result, partial_failure) = match refreshed {
        Err(e) => {
            warn!(ssid, error = %e, "서버 연결 갱신 실패");
            (RegistrationResult::Failed, false)
        }
        Ok(outcome) => {
            let partial = outcome == RefreshOutcome::PartialFailure;
            if ssid == SSID_BOOTSTRAP {
                (RegistrationResult::Success, partial)
            } else {
                (registration::ensure_valid_registration(env, entry).await, partial)
            }
        }
    };

    match result {
        RegistrationResult::Success => info!(ssid, "서버 활성화 완료"),
        RegistrationResult::Forbidden => {
            entry.cancel_next_action(env.scheduler);
            to_inactive(env, entry, None, true);
        }
        RegistrationResult::Failed => {
            entry.cancel_next_action(env.scheduler);
            let now = env.clock.now();
            to_inactive(env, entry, Some(now), false);
        }
    }
    ActivationReport {
        result,
        partial_failure,
    }
}

/// 활성 서버 비활성화
///
/// `deregister`가 참이고 등록이 아직 유효하면 Deregister를 1회 시도한다 (실패 무시).
/// `reactivate_after`가 `None`이면 명시적으로 켤 때까지 비활성으로 남는다.
pub(crate) async fn deactivate(
    env: &mut ServerEnv<'_>,
    entry: &mut ServerEntry,
    deregister: bool,
    reactivate_after: Option<Duration>,
) {
    let ssid = entry.ssid;
    entry.cancel_next_action(env.scheduler);
    let now = env.clock.now();
    if let Some(server) = entry.active_mut() {
        if deregister && ssid != SSID_BOOTSTRAP && !server.registration_info.is_expired(now) {
            registration::deregister(env, ssid, server).await;
        }
    } else {
        return;
    }
    let reactivate_time = reactivate_after.map(|delay| {
        now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::days(365))
    });
    to_inactive(env, entry, reactivate_time, false);
    info!(ssid, "서버 비활성화");
}

fn to_inactive(
    env: &mut ServerEnv<'_>,
    entry: &mut ServerEntry,
    reactivate_time: Option<DateTime<Utc>>,
    reactivate_failed: bool,
) {
    let previous = std::mem::replace(
        &mut entry.activation,
        Activation::Inactive(InactiveServer::default()),
    );
    entry.activation = Activation::Inactive(match previous {
        Activation::Active(server) => InactiveServer {
            nontransient: server.connections.into_nontransient(env.scheduler),
            reactivate_failed,
            reactivate_time,
        },
        Activation::Inactive(mut inactive) => {
            inactive.reactivate_failed |= reactivate_failed;
            inactive.reactivate_time = reactivate_time;
            inactive
        }
    });
}
