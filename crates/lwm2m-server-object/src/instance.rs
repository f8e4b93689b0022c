//! Server 오브젝트 인스턴스.
//!
//! 인스턴스 하나 = 관리 서버 하나의 설정. 리소스 쓰기는 타입과 범위만 확인하고,
//! 필수 리소스 누락이나 SSID 중복은 트랜잭션 검증 단계에서 잡는다.

use serde::{Deserialize, Serialize};

use lwm2m_core::error::CoreError;
use lwm2m_core::models::binding::BindingMode;
use lwm2m_core::models::ids::{Iid, Rid, Ssid, OID_SERVER, SSID_ANY, SSID_BOOTSTRAP};

/// Server 오브젝트 리소스 ID
pub mod rid {
    use lwm2m_core::models::ids::Rid;

    pub const SSID: Rid = 0;
    pub const LIFETIME: Rid = 1;
    pub const DEFAULT_MIN_PERIOD: Rid = 2;
    pub const DEFAULT_MAX_PERIOD: Rid = 3;
    pub const DISABLE_TIMEOUT: Rid = 5;
    pub const NOTIFICATION_STORING: Rid = 6;
    pub const BINDING: Rid = 7;
}

/// 지원 리소스 목록 (오름차순)
pub const SUPPORTED_RESOURCES: [Rid; 7] = [
    rid::SSID,
    rid::LIFETIME,
    rid::DEFAULT_MIN_PERIOD,
    rid::DEFAULT_MAX_PERIOD,
    rid::DISABLE_TIMEOUT,
    rid::NOTIFICATION_STORING,
    rid::BINDING,
];

/// Disable Timeout 미설정 시 기본값 (초)
pub const DEFAULT_DISABLE_TIMEOUT_S: i64 = 86400;

/// 리소스 값
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceValue {
    Int(i64),
    Bool(bool),
    String(String),
}

impl ResourceValue {
    fn as_int(&self, path: &str) -> Result<i64, CoreError> {
        match self {
            ResourceValue::Int(value) => Ok(*value),
            other => Err(CoreError::validation(path, format!("정수가 아님: {other:?}"))),
        }
    }

    fn as_bool(&self, path: &str) -> Result<bool, CoreError> {
        match self {
            ResourceValue::Bool(value) => Ok(*value),
            other => Err(CoreError::validation(path, format!("불리언이 아님: {other:?}"))),
        }
    }

    fn as_str(&self, path: &str) -> Result<&str, CoreError> {
        match self {
            ResourceValue::String(value) => Ok(value),
            other => Err(CoreError::validation(path, format!("문자열이 아님: {other:?}"))),
        }
    }
}

/// Server 오브젝트 인스턴스 (값이 없으면 `None`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInstance {
    /// 인스턴스 ID
    pub iid: Iid,
    /// Short Server ID
    #[serde(default)]
    pub ssid: Option<Ssid>,
    /// 등록 수명 (초)
    #[serde(default)]
    pub lifetime_s: Option<i64>,
    /// 기본 최소 관찰 주기 (초)
    #[serde(default)]
    pub default_min_period: Option<i64>,
    /// 기본 최대 관찰 주기 (초)
    #[serde(default)]
    pub default_max_period: Option<i64>,
    /// Disable 후 재활성화까지 대기 (초)
    #[serde(default)]
    pub disable_timeout_s: Option<i64>,
    /// 비활성/오프라인 중 알림 저장 여부
    #[serde(default)]
    pub notification_storing: Option<bool>,
    /// 바인딩 모드 문자열
    #[serde(default)]
    pub binding: Option<String>,
}

impl ServerInstance {
    /// 빈 인스턴스
    pub fn new(iid: Iid) -> Self {
        Self {
            iid,
            ..Default::default()
        }
    }

    /// 리소스 경로 (`/1/<iid>/<rid>`)
    pub fn resource_path(&self, rid: Rid) -> String {
        format!("/{OID_SERVER}/{}/{rid}", self.iid)
    }

    /// 값이 있는 리소스 목록
    pub fn present_resources(&self) -> Vec<Rid> {
        SUPPORTED_RESOURCES
            .into_iter()
            .filter(|rid| self.read(*rid).is_ok())
            .collect()
    }

    /// 리소스 읽기
    pub fn read(&self, rid: Rid) -> Result<ResourceValue, CoreError> {
        let value = match rid {
            rid::SSID => self.ssid.map(|ssid| ResourceValue::Int(i64::from(ssid))),
            rid::LIFETIME => self.lifetime_s.map(ResourceValue::Int),
            rid::DEFAULT_MIN_PERIOD => self.default_min_period.map(ResourceValue::Int),
            rid::DEFAULT_MAX_PERIOD => self.default_max_period.map(ResourceValue::Int),
            rid::DISABLE_TIMEOUT => Some(ResourceValue::Int(
                self.disable_timeout_s.unwrap_or(DEFAULT_DISABLE_TIMEOUT_S),
            )),
            rid::NOTIFICATION_STORING => self.notification_storing.map(ResourceValue::Bool),
            rid::BINDING => self.binding.clone().map(ResourceValue::String),
            _ => None,
        };
        value.ok_or_else(|| CoreError::NotFound {
            resource_type: "Resource".to_string(),
            id: self.resource_path(rid),
        })
    }

    /// 리소스 쓰기 (타입/범위 확인)
    pub fn write(&mut self, rid: Rid, value: &ResourceValue) -> Result<(), CoreError> {
        let path = self.resource_path(rid);
        match rid {
            rid::SSID => {
                let raw = value.as_int(&path)?;
                let ssid = Ssid::try_from(raw)
                    .ok()
                    .filter(|ssid| *ssid != SSID_ANY && *ssid != SSID_BOOTSTRAP)
                    .ok_or_else(|| {
                        CoreError::validation(&path, format!("SSID 범위 밖: {raw}"))
                    })?;
                self.ssid = Some(ssid);
            }
            rid::LIFETIME => {
                let lifetime = value.as_int(&path)?;
                if i32::try_from(lifetime).is_err() {
                    return Err(CoreError::validation(&path, format!("수명 범위 밖: {lifetime}")));
                }
                // 0 이하 값은 검증 단계에서 거부
                self.lifetime_s = Some(lifetime);
            }
            rid::DEFAULT_MIN_PERIOD => {
                self.default_min_period = Some(non_negative(&path, value.as_int(&path)?)?);
            }
            rid::DEFAULT_MAX_PERIOD => {
                self.default_max_period = Some(non_negative(&path, value.as_int(&path)?)?);
            }
            rid::DISABLE_TIMEOUT => {
                self.disable_timeout_s = Some(non_negative(&path, value.as_int(&path)?)?);
            }
            rid::NOTIFICATION_STORING => {
                self.notification_storing = Some(value.as_bool(&path)?);
            }
            rid::BINDING => {
                let binding = value.as_str(&path)?;
                if !BindingMode::is_valid(binding) {
                    return Err(CoreError::InvalidBinding(binding.to_string()));
                }
                self.binding = Some(binding.to_string());
            }
            _ => {
                return Err(CoreError::NotFound {
                    resource_type: "Resource".to_string(),
                    id: path,
                })
            }
        }
        Ok(())
    }

    /// 검증된 바인딩 모드
    pub fn binding_mode(&self) -> Option<BindingMode> {
        self.binding
            .as_deref()
            .and_then(|binding| BindingMode::new(binding).ok())
    }

    /// Disable Timeout (미설정 시 기본값)
    pub fn disable_timeout(&self) -> std::time::Duration {
        let secs = self.disable_timeout_s.unwrap_or(DEFAULT_DISABLE_TIMEOUT_S);
        std::time::Duration::from_secs(u64::try_from(secs).unwrap_or(0))
    }
}

fn non_negative(path: &str, value: i64) -> Result<i64, CoreError> {
    if value < 0 {
        return Err(CoreError::validation(path, format!("음수 값: {value}")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let mut inst = ServerInstance::new(3);
        inst.write(rid::SSID, &ResourceValue::Int(14)).unwrap();
        inst.write(rid::LIFETIME, &ResourceValue::Int(300)).unwrap();
        inst.write(rid::BINDING, &ResourceValue::String("UQ".into()))
            .unwrap();
        inst.write(rid::NOTIFICATION_STORING, &ResourceValue::Bool(true))
            .unwrap();

        assert_eq!(inst.read(rid::SSID).unwrap(), ResourceValue::Int(14));
        assert_eq!(inst.read(rid::LIFETIME).unwrap(), ResourceValue::Int(300));
        assert_eq!(
            inst.read(rid::BINDING).unwrap(),
            ResourceValue::String("UQ".into())
        );
        assert_eq!(inst.binding_mode().unwrap().as_str(), "UQ");
        assert_eq!(
            inst.present_resources(),
            vec![
                rid::SSID,
                rid::LIFETIME,
                rid::DISABLE_TIMEOUT,
                rid::NOTIFICATION_STORING,
                rid::BINDING
            ]
        );
    }

    #[test]
    fn absent_resource_is_not_found() {
        let inst = ServerInstance::new(0);
        let err = inst.read(rid::LIFETIME).unwrap_err();
        assert_eq!(err.coap_code(), 404);
        assert!(err.to_string().contains("/1/0/1"));
        // Disable Timeout은 기본값을 돌려준다
        assert_eq!(
            inst.read(rid::DISABLE_TIMEOUT).unwrap(),
            ResourceValue::Int(DEFAULT_DISABLE_TIMEOUT_S)
        );
        assert!(inst.read(4).is_err());
    }

    #[test]
    fn write_type_and_range_checked() {
        let mut inst = ServerInstance::new(0);
        assert!(inst
            .write(rid::LIFETIME, &ResourceValue::String("60".into()))
            .unwrap_err()
            .is_bad_request());
        assert!(inst
            .write(rid::SSID, &ResourceValue::Int(i64::from(SSID_BOOTSTRAP)))
            .is_err());
        assert!(inst.write(rid::SSID, &ResourceValue::Int(0)).is_err());
        assert!(inst
            .write(rid::DEFAULT_MAX_PERIOD, &ResourceValue::Int(-1))
            .is_err());
        assert!(matches!(
            inst.write(rid::BINDING, &ResourceValue::String("USQ".into())),
            Err(CoreError::InvalidBinding(_))
        ));
        assert!(inst
            .write(rid::LIFETIME, &ResourceValue::Int(i64::from(i32::MAX) + 1))
            .is_err());
        assert_eq!(inst, ServerInstance::new(0));
    }
}
