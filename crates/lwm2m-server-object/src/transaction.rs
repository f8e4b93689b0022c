//! 트랜잭션 스냅샷.
//!
//! `begin`에서 현재 상태를 통째로 복제하고, `commit`이면 버리고,
//! `rollback`이면 현재 상태와 바꿔 끼운다. 내용은 모르는 범용 슬롯이라
//! 검증 규칙은 오브젝트 쪽이 따로 갖는다.

use tracing::warn;

use lwm2m_core::error::CoreError;

/// 할당 실패를 에러로 돌려주는 복제
pub trait TrySnapshot: Sized {
    /// 깊은 복사. 메모리가 부족하면 `Internal` 에러.
    fn try_snapshot(&self) -> Result<Self, CoreError>;
}

impl<T: Clone> TrySnapshot for Vec<T> {
    fn try_snapshot(&self) -> Result<Self, CoreError> {
        let mut copy = Vec::new();
        copy.try_reserve_exact(self.len()).map_err(|e| {
            CoreError::Internal(format!("스냅샷 할당 실패 ({}개): {e}", self.len()))
        })?;
        copy.extend(self.iter().cloned());
        Ok(copy)
    }
}

/// 오브젝트당 하나뿐인 스냅샷 슬롯 (중첩 트랜잭션 없음)
#[derive(Debug)]
pub struct TransactionSlot<T> {
    saved: Option<T>,
}

impl<T> Default for TransactionSlot<T> {
    fn default() -> Self {
        Self { saved: None }
    }
}

impl<T: TrySnapshot> TransactionSlot<T> {
    /// 진행 중인 트랜잭션이 있는지
    pub fn is_open(&self) -> bool {
        self.saved.is_some()
    }

    /// 현재 상태 저장
    pub fn begin(&mut self, live: &T) -> Result<(), CoreError> {
        if self.saved.is_some() {
            return Err(CoreError::Transaction(
                "이미 진행 중인 트랜잭션이 있음".to_string(),
            ));
        }
        self.saved = Some(live.try_snapshot()?);
        Ok(())
    }

    /// 스냅샷 폐기
    pub fn commit(&mut self) {
        self.saved = None;
    }

    /// 스냅샷을 현재 상태로 복원. 열린 트랜잭션이 없으면 아무것도 하지 않는다.
    pub fn rollback(&mut self, live: &mut T) {
        match self.saved.take() {
            Some(saved) => *live = saved,
            None => warn!("열린 트랜잭션 없이 rollback 호출됨, 무시"),
        }
    }
}
