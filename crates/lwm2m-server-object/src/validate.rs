//! Server 오브젝트 검증.

use tracing::error;

use lwm2m_core::error::CoreError;
use lwm2m_core::models::binding::BindingMode;
use lwm2m_core::models::ids::Ssid;

use crate::instance::{rid, ServerInstance};

/// 인스턴스 하나의 필수 리소스와 값 범위 확인
pub fn validate_instance(instance: &ServerInstance) -> Result<(), CoreError> {
    let fail = |resource, message: &str| {
        let path = instance.resource_path(resource);
        error!(path = %path, "{message}");
        Err(CoreError::validation(path, message))
    };

    if instance.ssid.is_none() {
        return fail(rid::SSID, "필수 리소스 Short Server ID 없음");
    }
    let Some(binding) = instance.binding.as_deref() else {
        return fail(rid::BINDING, "필수 리소스 Binding 없음");
    };
    let Some(lifetime) = instance.lifetime_s else {
        return fail(rid::LIFETIME, "필수 리소스 Lifetime 없음");
    };
    if instance.notification_storing.is_none() {
        return fail(rid::NOTIFICATION_STORING, "필수 리소스 Notification Storing 없음");
    }
    let Some(max_period) = instance.default_max_period else {
        return fail(rid::DEFAULT_MAX_PERIOD, "필수 리소스 Default Max Period 없음");
    };

    if lifetime <= 0 {
        return fail(rid::LIFETIME, "Lifetime 값이 0 이하");
    }
    if i32::try_from(lifetime).is_err() {
        return fail(rid::LIFETIME, "Lifetime 값이 범위 밖");
    }
    if max_period == 0 {
        return fail(rid::DEFAULT_MAX_PERIOD, "Default Max Period 값이 0");
    }
    if !BindingMode::is_valid(binding) {
        return fail(rid::BINDING, "잘못된 바인딩 모드");
    }
    Ok(())
}

/// 인스턴스 목록 전체 검증 (첫 위반에서 중단)
///
/// 인스턴스별 검증 후 SSID 목록을 정렬해 인접 중복을 찾는다.
pub fn validate_instances(instances: &[ServerInstance]) -> Result<(), CoreError> {
    let mut ssids: Vec<Ssid> = Vec::new();
    ssids
        .try_reserve_exact(instances.len())
        .map_err(|e| CoreError::Internal(format!("SSID 목록 할당 실패: {e}")))?;

    for instance in instances {
        validate_instance(instance)?;
        if let Some(ssid) = instance.ssid {
            ssids.push(ssid);
        }
    }

    ssids.sort_unstable();
    if let Some(pair) = ssids.windows(2).find(|pair| pair[0] == pair[1]) {
        error!(ssid = pair[0], "SSID 중복");
        return Err(CoreError::validation(
            "ssid",
            format!("중복된 SSID: {}", pair[0]),
        ));
    }
    Ok(())
}
