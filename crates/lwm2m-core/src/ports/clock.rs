//! 시계 포트.
//!
//! 등록 만료 시각과 스케줄러 타임라인이 같은 시계를 공유해야 하므로
//! `Arc<dyn Clock>` 하나를 양쪽에 주입한다.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// 현재 시각 제공자
pub trait Clock: Send + Sync {
    /// 현재 시각 (UTC)
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동 시계 (결정적 시뮬레이션/테스트용)
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// 시작 시각 지정
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// 시각 설정
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// 시각 전진
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
