//! 데이터 모델 포트.
//!
//! 서버 관리 계층이 필요로 하는 데이터 모델 조회만 노출한다.
//! 구현: `lwm2m-server-object` crate (`ServerObjectModel`)

use crate::error::CoreError;
use crate::models::ids::Ssid;
use crate::models::registration::ObjectLink;
use crate::models::server::ServerDefinition;

/// 데이터 모델 조회 인터페이스
pub trait DataModel: Send + Sync {
    /// 설정된 모든 서버 정의 (Bootstrap 서버 포함)
    fn server_definitions(&self) -> Result<Vec<ServerDefinition>, CoreError>;

    /// 특정 SSID의 서버 정의
    fn server_definition(&self, ssid: Ssid) -> Result<Option<ServerDefinition>, CoreError> {
        Ok(self
            .server_definitions()?
            .into_iter()
            .find(|def| def.ssid == ssid))
    }

    /// Register/Update 시 서버에 광고할 오브젝트 목록
    fn registered_objects(&self) -> Vec<ObjectLink>;
}
