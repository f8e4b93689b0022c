//! LwM2M 도메인 모델.
//!
//! 서버 연결/등록 계층과 설정 오브젝트가 공유하는 데이터 구조체를 정의한다.

pub mod binding;
pub mod ids;
pub mod query;
pub mod registration;
pub mod server;
