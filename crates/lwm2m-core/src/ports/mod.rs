//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! 전송(CoAP/DTLS), 데이터 모델 디스패치, 스케줄러 타이머 구현은 이 crate 밖에 있고,
//! 서버 관리 계층은 여기 정의된 trait만 바라본다.
//!
//! 네트워크 I/O가 있는 포트는 `async_trait` 매크로로 object safety를 보장한다.
//! 스케줄러와 시계는 단일 실행 컨텍스트에서만 쓰이므로 동기 trait이다.

pub mod bootstrap;
pub mod clock;
pub mod data_model;
pub mod scheduler;
pub mod transaction;
pub mod transport;
