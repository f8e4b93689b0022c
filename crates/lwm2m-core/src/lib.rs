//! # lwm2m-core
//!
//! LwM2M 클라이언트 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 서버 연결/등록 계층과 설정 오브젝트 계층이 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 도메인 데이터 구조체 (SSID, 바인딩 모드, 등록 정보, 쿼리 파라미터)
//! - [`ports`]: Hexagonal Architecture 포트 인터페이스 (전송, 스케줄러, 데이터 모델, 시계)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 클라이언트 설정 구조체

pub mod config;
pub mod error;
pub mod models;
pub mod ports;
