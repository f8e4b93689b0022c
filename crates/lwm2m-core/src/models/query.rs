//! Register/Update 쿼리 파라미터.
//!
//! `lwm2m=<version>&ep=<endpoint>&lt=<lifetime>&b=<binding>[&sms=<msisdn>]`
//! 형식만 다룬다. URL 인코딩과 CoAP 옵션 배치는 전송 계층의 몫이다.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::binding::BindingMode;

/// 쿼리 파라미터 집합 (해당 없는 필드는 생략)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    /// LwM2M 버전 (`lwm2m=`)
    pub lwm2m_version: Option<String>,
    /// 엔드포인트 이름 (`ep=`)
    pub endpoint_name: Option<String>,
    /// 수명, 초 (`lt=`)
    pub lifetime_s: Option<i64>,
    /// 바인딩 모드 (`b=`)
    pub binding: Option<BindingMode>,
    /// SMS MSISDN (`sms=`)
    pub sms_msisdn: Option<String>,
}

impl QueryParams {
    /// 쿼리 인자 목록 생성
    ///
    /// 순서는 `lwm2m, ep, lt, b, sms` 고정. 수명은 항상 양의 정수여야 한다.
    pub fn to_query_args(&self) -> Result<Vec<String>, CoreError> {
        let mut args = Vec::with_capacity(5);

        if let Some(version) = &self.lwm2m_version {
            args.push(format!("lwm2m={version}"));
        }
        if let Some(endpoint) = &self.endpoint_name {
            args.push(format!("ep={endpoint}"));
        }
        if let Some(lifetime) = self.lifetime_s {
            if lifetime <= 0 {
                return Err(CoreError::validation(
                    "lt",
                    format!("수명은 양수여야 함: {lifetime}"),
                ));
            }
            args.push(format!("lt={lifetime}"));
        }
        if let Some(binding) = &self.binding {
            args.push(format!("b={binding}"));
        }
        if let Some(msisdn) = &self.sms_msisdn {
            args.push(format!("sms={msisdn}"));
        }

        Ok(args)
    }

    /// `&`로 연결한 쿼리 문자열
    pub fn to_query_string(&self) -> Result<String, CoreError> {
        Ok(self.to_query_args()?.join("&"))
    }

    /// 포함된 파라미터가 없는지
    pub fn is_empty(&self) -> bool {
        self.lwm2m_version.is_none()
            && self.endpoint_name.is_none()
            && self.lifetime_s.is_none()
            && self.binding.is_none()
            && self.sms_msisdn.is_none()
    }
}
