//! 트랜잭션 포트.
//!
//! 데이터 모델 디스패치 계층이 여러 리소스에 걸친 쓰기를 원자적으로 적용할 때
//! 오브젝트에 대해 호출하는 경계. 호출 순서는
//! `begin → (쓰기…) → validate → commit`, 실패 시 `rollback`.

use crate::error::CoreError;

/// 트랜잭션을 지원하는 설정 오브젝트
pub trait Transactional {
    /// 현재 인스턴스 목록의 스냅샷 생성
    fn transaction_begin(&mut self) -> Result<(), CoreError>;

    /// 현재 인스턴스 목록 검증 (거부 시 Bad Request 에러)
    fn transaction_validate(&self) -> Result<(), CoreError>;

    /// 스냅샷 폐기, 현재 목록 확정
    fn transaction_commit(&mut self) -> Result<(), CoreError>;

    /// 스냅샷 복원
    fn transaction_rollback(&mut self) -> Result<(), CoreError>;
}
