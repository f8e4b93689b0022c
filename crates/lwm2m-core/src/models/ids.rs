//! 식별자 타입.

use serde::{Deserialize, Serialize};

/// Short Server ID
pub type Ssid = u16;

/// 오브젝트 ID
pub type Oid = u16;

/// 인스턴스 ID
pub type Iid = u16;

/// 리소스 ID
pub type Rid = u16;

/// "모든 서버"를 뜻하는 예약 SSID
pub const SSID_ANY: Ssid = 0;

/// Bootstrap 서버 예약 SSID
pub const SSID_BOOTSTRAP: Ssid = u16::MAX;

/// Server 오브젝트 ID
pub const OID_SERVER: Oid = 1;

/// 무효 인스턴스 ID
pub const IID_INVALID: Iid = u16::MAX;

/// 작업 대상 서버 선택자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SsidTarget {
    /// 활성화된 모든 서버
    All,
    /// 특정 SSID
    One(Ssid),
}

impl From<Ssid> for SsidTarget {
    fn from(ssid: Ssid) -> Self {
        if ssid == SSID_ANY {
            SsidTarget::All
        } else {
            SsidTarget::One(ssid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssid_any_selects_all() {
        assert_eq!(SsidTarget::from(SSID_ANY), SsidTarget::All);
        assert_eq!(SsidTarget::from(14), SsidTarget::One(14));
        assert_eq!(SsidTarget::from(SSID_BOOTSTRAP), SsidTarget::One(u16::MAX));
    }
}
