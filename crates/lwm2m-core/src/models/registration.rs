//! 등록 정보 모델.
//!
//! 서버별 Register/Update 결과로 유지되는 등록 메타데이터와
//! Register/Update 요청 본문을 정의한다.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::error::CoreError;
use crate::models::binding::BindingMode;
use crate::models::ids::{Iid, Oid};
use crate::models::query::QueryParams;

/// 서버에 광고하는 오브젝트 링크 (`</oid/iid>` 목록의 한 항목)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLink {
    /// 오브젝트 ID
    pub oid: Oid,
    /// 오브젝트 버전 (`ver=` 속성)
    #[serde(default)]
    pub version: Option<String>,
    /// 존재하는 인스턴스 ID (오름차순)
    #[serde(default)]
    pub instances: Vec<Iid>,
}

impl fmt::Display for ObjectLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instances.is_empty() {
            write!(f, "</{}>", self.oid)?;
            if let Some(version) = &self.version {
                write!(f, ";ver=\"{version}\"")?;
            }
            return Ok(());
        }
        for (i, iid) in self.instances.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "</{}/{}>", self.oid, iid)?;
        }
        Ok(())
    }
}

/// CoRE Link Format 본문 생성
pub fn format_object_links(objects: &[ObjectLink]) -> String {
    objects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// 마지막으로 서버에 보낸 갱신 파라미터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateParameters {
    /// 수명 (초, 항상 양수)
    pub lifetime_s: i64,
    /// 바인딩 모드
    pub binding_mode: BindingMode,
    /// 광고한 오브젝트 목록 스냅샷
    pub objects: Vec<ObjectLink>,
}

/// 서버별 등록 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    /// Register 성공 시 서버가 할당한 경로 (예: `["rd", "5a3f"]`)
    pub endpoint_path: Vec<String>,
    /// 마지막으로 보낸 갱신 파라미터
    pub last_update_params: Option<UpdateParameters>,
    /// 등록 만료 시각 (`None`이면 무효 → 재등록 필요)
    pub expire_time: Option<DateTime<Utc>>,
}

impl RegistrationInfo {
    /// 만료까지 남은 시간 (무효이면 0)
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        match self.expire_time {
            Some(expire) => expire - now,
            None => Duration::zero(),
        }
    }

    /// 등록 만료 여부
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.time_remaining(now) <= Duration::zero()
    }

    /// 서버 측 등록을 더 이상 신뢰할 수 없음을 표시
    pub fn invalidate(&mut self) {
        self.expire_time = None;
    }

    /// Register 성공 반영
    pub fn on_registered(
        &mut self,
        endpoint_path: Vec<String>,
        params: UpdateParameters,
        now: DateTime<Utc>,
    ) {
        self.endpoint_path = endpoint_path;
        self.on_updated(params, now);
    }

    /// Update 성공 반영 (`expire_time = now + lifetime`)
    ///
    /// 만료 시각을 표현할 수 없는 수명이면 등록을 무효로 둔다.
    pub fn on_updated(&mut self, params: UpdateParameters, now: DateTime<Utc>) {
        self.expire_time = Duration::try_seconds(params.lifetime_s)
            .and_then(|lifetime| now.checked_add_signed(lifetime));
        if self.expire_time.is_none() {
            warn!(lifetime_s = params.lifetime_s, "만료 시각 계산 범위 초과, 등록 무효화");
        }
        self.last_update_params = Some(params);
    }

    /// 마지막으로 보낸 수명 (초)
    pub fn lifetime_s(&self) -> Option<i64> {
        self.last_update_params.as_ref().map(|p| p.lifetime_s)
    }
}

/// 활성 서버의 등록 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationState {
    /// 재등록 필요 (연결 없음, 만료, Update 거부)
    #[default]
    NeedsRegistration,
    /// Update 교환 진행 중
    UpdatePending,
    /// 등록 유효
    Registered,
    /// Deregister 진행 중
    Deregistering,
}

/// `EnsureValidRegistration` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationResult {
    /// 등록 유효 (Update 또는 Register 성공)
    Success,
    /// 서버가 등록을 금지함 (재시도 안 함)
    Forbidden,
    /// 실패 (재시도 대상)
    Failed,
}

/// `RegistrationUpdate` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// Update 성공 또는 변경 없음
    Success,
    /// 재등록 필요 (호출자가 비활성화/재활성화 담당)
    NeedsRegistration,
    /// 실패 (재시도 대상)
    Failed,
}

/// Register 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    /// 쿼리 파라미터 (`lwm2m, ep, lt, b, sms`)
    pub query: QueryParams,
    /// 광고할 오브젝트 목록
    pub objects: Vec<ObjectLink>,
}

impl RegisterRequest {
    /// 엔드포인트 이름과 갱신 파라미터로부터 Register 요청 생성
    pub fn new(
        lwm2m_version: &str,
        endpoint_name: &str,
        params: &UpdateParameters,
        sms_msisdn: Option<&str>,
    ) -> Result<Self, CoreError> {
        let query = QueryParams {
            lwm2m_version: Some(lwm2m_version.to_string()),
            endpoint_name: Some(endpoint_name.to_string()),
            lifetime_s: Some(params.lifetime_s),
            binding: Some(params.binding_mode.clone()),
            sms_msisdn: sms_msisdn.map(str::to_string),
        };
        // 수명 검증을 여기서 끝낸다
        query.to_query_args()?;
        Ok(Self {
            query,
            objects: params.objects.clone(),
        })
    }

    /// 링크 포맷 본문
    pub fn payload(&self) -> String {
        format_object_links(&self.objects)
    }
}

/// Update 요청 (변경된 항목만 포함)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    /// 변경된 수명
    pub lifetime_s: Option<i64>,
    /// 변경된 바인딩 모드
    pub binding_mode: Option<BindingMode>,
    /// 변경된 오브젝트 목록
    pub objects: Option<Vec<ObjectLink>>,
}

impl UpdateRequest {
    /// 이전에 보낸 파라미터와 새 파라미터의 차이로 Update 요청 생성
    ///
    /// 이전 파라미터가 없으면 모든 항목을 포함한다.
    pub fn diff(previous: Option<&UpdateParameters>, next: &UpdateParameters) -> Self {
        match previous {
            None => Self {
                lifetime_s: Some(next.lifetime_s),
                binding_mode: Some(next.binding_mode.clone()),
                objects: Some(next.objects.clone()),
            },
            Some(prev) => Self {
                lifetime_s: (prev.lifetime_s != next.lifetime_s).then_some(next.lifetime_s),
                binding_mode: (prev.binding_mode != next.binding_mode)
                    .then(|| next.binding_mode.clone()),
                objects: (prev.objects != next.objects).then(|| next.objects.clone()),
            },
        }
    }

    /// 보낼 변경 사항이 없는지
    pub fn is_empty(&self) -> bool {
        self.lifetime_s.is_none() && self.binding_mode.is_none() && self.objects.is_none()
    }

    /// Update 쿼리 파라미터 (`lt`, `b`만 사용)
    pub fn query(&self) -> QueryParams {
        QueryParams {
            lifetime_s: self.lifetime_s,
            binding: self.binding_mode.clone(),
            ..Default::default()
        }
    }

    /// 링크 포맷 본문 (오브젝트 목록이 바뀌었을 때만)
    pub fn payload(&self) -> Option<String> {
        self.objects.as_deref().map(format_object_links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(lifetime_s: i64, binding: &str) -> UpdateParameters {
        UpdateParameters {
            lifetime_s,
            binding_mode: BindingMode::new(binding).unwrap(),
            objects: vec![
                ObjectLink {
                    oid: 1,
                    version: None,
                    instances: vec![0],
                },
                ObjectLink {
                    oid: 3,
                    version: Some("1.1".to_string()),
                    instances: vec![],
                },
            ],
        }
    }

    #[test]
    fn fresh_info_is_expired() {
        let info = RegistrationInfo::default();
        let now = Utc::now();
        assert!(info.is_expired(now));
        assert_eq!(info.time_remaining(now), Duration::zero());
    }

    #[test]
    fn expire_time_follows_lifetime() {
        let now = Utc::now();
        let mut info = RegistrationInfo::default();
        info.on_registered(vec!["rd".into(), "42".into()], params(60, "U"), now);

        assert_eq!(info.expire_time, Some(now + Duration::seconds(60)));
        assert!(!info.is_expired(now + Duration::seconds(59)));
        assert!(info.is_expired(now + Duration::seconds(60)));

        info.invalidate();
        assert!(info.is_expired(now));
        // 경로와 파라미터는 유지
        assert_eq!(info.endpoint_path, vec!["rd".to_string(), "42".to_string()]);
        assert_eq!(info.lifetime_s(), Some(60));
    }

    #[test]
    fn unrepresentable_lifetime_invalidates() {
        let now = Utc::now();
        let mut info = RegistrationInfo::default();
        info.on_registered(vec!["rd".into(), "1".into()], params(i64::MAX, "U"), now);
        assert_eq!(info.expire_time, None);
        assert!(info.is_expired(now));
        assert_eq!(info.lifetime_s(), Some(i64::MAX));

        // 직전 값이 유효해도 덮어쓴다
        info.on_updated(params(60, "U"), now);
        assert!(info.expire_time.is_some());
        info.on_updated(params(i64::MAX / 2, "U"), now);
        assert_eq!(info.expire_time, None);
    }

    #[test]
    fn update_diff_only_changed() {
        let prev = params(60, "U");
        assert!(UpdateRequest::diff(Some(&prev), &prev).is_empty());

        let next = params(120, "U");
        let diff = UpdateRequest::diff(Some(&prev), &next);
        assert_eq!(diff.lifetime_s, Some(120));
        assert!(diff.binding_mode.is_none());
        assert!(diff.objects.is_none());
        assert_eq!(diff.query().to_query_string().unwrap(), "lt=120");

        let mut next = params(60, "UQ");
        next.objects.pop();
        let diff = UpdateRequest::diff(Some(&prev), &next);
        assert_eq!(diff.query().to_query_string().unwrap(), "b=UQ");
        assert_eq!(diff.payload().unwrap(), "</1/0>");
    }

    #[test]
    fn register_request_payload() {
        let request =
            RegisterRequest::new("1.0", "dev-1", &params(86400, "US"), Some("4860")).unwrap();
        assert_eq!(
            request.query.to_query_string().unwrap(),
            "lwm2m=1.0&ep=dev-1&lt=86400&b=US&sms=4860"
        );
        assert_eq!(request.payload(), "</1/0>,</3>;ver=\"1.1\"");

        assert!(RegisterRequest::new("1.0", "dev-1", &params(0, "U"), None).is_err());
    }
}
