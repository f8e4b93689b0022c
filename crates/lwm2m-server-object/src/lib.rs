//! # lwm2m-server-object
//!
//! LwM2M Server 오브젝트(/1) 구현.
//!
//! - [`instance`]: 인스턴스 리소스 읽기/쓰기
//! - [`object`]: 인스턴스 목록 관리, `Transactional` 구현
//! - [`transaction`]: 범용 스냅샷 슬롯 (begin / commit / rollback)
//! - [`validate`]: 필수 리소스, 값 범위, SSID 중복 검증
//! - [`persistence`]: JSON 저장/복원
//! - [`model`]: `DataModel` 포트 어댑터

pub mod instance;
pub mod model;
pub mod object;
pub mod persistence;
pub mod transaction;
pub mod validate;

pub use instance::{ResourceValue, ServerInstance};
pub use model::{ServerEndpoint, ServerObjectModel};
pub use object::ServerObject;
