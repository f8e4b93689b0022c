//! # lwm2m-servers
//!
//! 관리 서버별 연결과 등록을 담당하는 계층.
//!
//! ## 구조
//!
//! - [`connection`]: 전송별 소켓 수명주기 (연결, 일시 중단, 큐 모드 종료)
//! - [`registry`]: 활성/비활성 서버 항목과 SSID 조회
//! - [`registration`]: Register / Update / Deregister 상태 머신과 Update 주기 계산
//! - [`manager`]: 작업 디스패치, 오프라인 모드, 설정 동기화, 실행 루프
//! - [`command`]: 실행 중인 루프에 외부 진입점을 전달하는 명령 채널
//!
//! 모든 상태 변경은 [`ServersManager`]의 `&mut self` 아래에서만 일어난다.
//! 시간 흐름은 `Scheduler` 포트가 결정하므로 테스트는 수동 시계로 재현한다.

mod activate;
pub mod command;
pub mod connection;
mod context;
pub mod manager;
pub mod registration;
pub mod registry;

#[cfg(test)]
mod testing;

pub use command::{ManagerHandle, ServerCommand};
pub use manager::{ServerSocketInfo, ServersManager};
