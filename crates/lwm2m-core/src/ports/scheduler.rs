//! 스케줄러 포트.
//!
//! "지연 D 후 이 작업 실행, 핸들로 취소 가능" 계약만 정의한다.
//! 작업은 클로저가 아닌 데이터(`Job`)이며, 레지스트리 소유자가 꺼내서 디스패치한다.
//! 구현: `lwm2m-sched` crate (`JobQueue`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::RetryConfig;
use crate::models::binding::ConnectionType;
use crate::models::ids::Ssid;

/// 예약 작업 핸들
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobHandle(pub u64);

/// 예약 작업 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Job {
    /// 주기적 Update (재시도 가능)
    SendUpdate { ssid: Ssid },
    /// 비활성 서버 활성화 (재시도 가능)
    ActivateServer { ssid: Ssid },
    /// 큐 모드 유휴 시간 경과 후 소켓 종료
    QueueModeClose { ssid: Ssid, conn_type: ConnectionType },
    /// 데이터 모델과 서버 목록 동기화
    ReloadServers,
}

impl Job {
    /// 작업 대상 SSID (전체 대상 작업이면 `None`)
    pub fn ssid(&self) -> Option<Ssid> {
        match self {
            Job::SendUpdate { ssid }
            | Job::ActivateServer { ssid }
            | Job::QueueModeClose { ssid, .. } => Some(*ssid),
            Job::ReloadServers => None,
        }
    }
}

/// 재시도 백오프 정책 (지수 증가, 상한 있음)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBackoff {
    /// 첫 재시도 지연
    pub initial: Duration,
    /// 최대 지연
    pub max: Duration,
}

impl From<&RetryConfig> for RetryBackoff {
    fn from(config: &RetryConfig) -> Self {
        Self {
            initial: Duration::from_secs(config.initial_delay_secs),
            max: Duration::from_secs(config.max_delay_secs),
        }
    }
}

/// 재시도 가능한 작업의 현재 백오프 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// 적용 중인 정책
    pub backoff: RetryBackoff,
    /// 다음 재시도 지연
    pub next_delay: Duration,
    /// 지금까지의 재시도 횟수
    pub attempts: u32,
}

impl RetryState {
    /// 첫 상태
    pub fn new(backoff: RetryBackoff) -> Self {
        Self {
            backoff,
            next_delay: backoff.initial,
            attempts: 0,
        }
    }

    /// 지연 하나를 소비하고 다음 지연을 두 배로 (상한 적용)
    pub fn advance(&mut self) -> Duration {
        let delay = self.next_delay;
        self.next_delay = (delay * 2).min(self.backoff.max);
        self.attempts += 1;
        delay
    }
}

/// 실행 시각이 된 작업
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredJob {
    /// 예약 시 발급된 핸들 (재시도 시 그대로 유지)
    pub handle: JobHandle,
    /// 작업
    pub job: Job,
    /// 재시도 상태 (재시도 불가 작업이면 `None`)
    pub retry: Option<RetryState>,
}

/// 스케줄러 인터페이스
///
/// 단일 타임라인. 실행 시각이 같은 작업은 예약 순서대로 나온다.
pub trait Scheduler: Send {
    /// 지연 후 1회 실행
    fn schedule(&mut self, delay: Duration, job: Job) -> JobHandle;

    /// 지연 후 실행, 실패 시 `retry`로 백오프 재예약 가능
    fn schedule_retryable(&mut self, delay: Duration, backoff: RetryBackoff, job: Job)
        -> JobHandle;

    /// 실행된 재시도 가능 작업을 백오프 지연 후 같은 핸들로 재예약
    ///
    /// 재시도 불가 작업이면 `None`.
    fn retry(&mut self, fired: FiredJob) -> Option<JobHandle>;

    /// 예약 취소 (대기 중이었으면 `true`)
    fn cancel(&mut self, handle: JobHandle) -> bool;

    /// 대기 중인 작업을 즉시 실행 대상으로 이동
    fn reschedule_now(&mut self, handle: JobHandle) -> bool;

    /// 대기 중인지
    fn is_pending(&self, handle: JobHandle) -> bool;

    /// 가장 이른 실행 시각
    fn next_due(&self) -> Option<DateTime<Utc>>;

    /// 실행 시각이 지난 작업 하나 꺼내기
    fn pop_due(&mut self) -> Option<FiredJob>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_max() {
        let mut state = RetryState::new(RetryBackoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(5),
        });
        let delays: Vec<u64> = (0..5).map(|_| state.advance().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
        assert_eq!(state.attempts, 5);
    }
}
