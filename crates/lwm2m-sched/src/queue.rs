//! 작업 큐.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use lwm2m_core::ports::clock::Clock;
use lwm2m_core::ports::scheduler::{
    FiredJob, Job, JobHandle, RetryBackoff, RetryState, Scheduler,
};

/// 정렬 키: 실행 시각, 같은 시각이면 예약 순번
type QueueKey = (DateTime<Utc>, u64);

#[derive(Debug)]
struct Entry {
    key: QueueKey,
    job: Job,
    retry: Option<RetryState>,
}

/// 시계 기반 작업 큐
pub struct JobQueue {
    clock: Arc<dyn Clock>,
    /// 실행 순서 인덱스
    order: BTreeMap<QueueKey, JobHandle>,
    /// 핸들별 작업
    entries: HashMap<JobHandle, Entry>,
    next_seq: u64,
    next_handle: u64,
}

impl JobQueue {
    /// 새 작업 큐 생성
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            order: BTreeMap::new(),
            entries: HashMap::new(),
            next_seq: 0,
            next_handle: 1,
        }
    }

    /// 대기 중인 작업 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 대기 중인 작업이 없는지
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 대기 중인 작업 조회
    pub fn pending_job(&self, handle: JobHandle) -> Option<Job> {
        self.entries.get(&handle).map(|entry| entry.job)
    }

    /// 특정 작업의 실행 예정 시각
    pub fn due_time(&self, handle: JobHandle) -> Option<DateTime<Utc>> {
        self.entries.get(&handle).map(|entry| entry.key.0)
    }

    fn due_after(&self, delay: Duration) -> DateTime<Utc> {
        // 표현 범위를 넘는 지연은 100년으로 자른다
        let delay = ChronoDuration::from_std(delay)
            .unwrap_or_else(|_| ChronoDuration::days(365 * 100));
        self.clock.now() + delay
    }

    fn next_key(&mut self, due: DateTime<Utc>) -> QueueKey {
        let seq = self.next_seq;
        self.next_seq += 1;
        (due, seq)
    }

    fn insert(&mut self, handle: JobHandle, due: DateTime<Utc>, job: Job, retry: Option<RetryState>) {
        let key = self.next_key(due);
        self.order.insert(key, handle);
        self.entries.insert(handle, Entry { key, job, retry });
    }

    fn allocate(&mut self) -> JobHandle {
        let handle = JobHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl Scheduler for JobQueue {
    fn schedule(&mut self, delay: Duration, job: Job) -> JobHandle {
        let handle = self.allocate();
        let due = self.due_after(delay);
        self.insert(handle, due, job, None);
        trace!(handle = handle.0, ?job, ?delay, "작업 예약");
        handle
    }

    fn schedule_retryable(
        &mut self,
        delay: Duration,
        backoff: RetryBackoff,
        job: Job,
    ) -> JobHandle {
        let handle = self.allocate();
        let due = self.due_after(delay);
        self.insert(handle, due, job, Some(RetryState::new(backoff)));
        trace!(handle = handle.0, ?job, ?delay, "재시도 가능 작업 예약");
        handle
    }

    fn retry(&mut self, fired: FiredJob) -> Option<JobHandle> {
        let mut state = fired.retry?;
        let delay = state.advance();
        let due = self.due_after(delay);
        self.insert(fired.handle, due, fired.job, Some(state));
        debug!(
            handle = fired.handle.0,
            job = ?fired.job,
            attempts = state.attempts,
            ?delay,
            "작업 재시도 예약"
        );
        Some(fired.handle)
    }

    fn cancel(&mut self, handle: JobHandle) -> bool {
        match self.entries.remove(&handle) {
            Some(entry) => {
                self.order.remove(&entry.key);
                trace!(handle = handle.0, job = ?entry.job, "작업 취소");
                true
            }
            None => false,
        }
    }

    fn reschedule_now(&mut self, handle: JobHandle) -> bool {
        let Some(old_key) = self.entries.get(&handle).map(|entry| entry.key) else {
            return false;
        };
        self.order.remove(&old_key);
        let now = self.clock.now();
        let key = self.next_key(now);
        self.order.insert(key, handle);
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.key = key;
        }
        true
    }

    fn is_pending(&self, handle: JobHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    fn next_due(&self) -> Option<DateTime<Utc>> {
        self.order.keys().next().map(|(due, _)| *due)
    }

    fn pop_due(&mut self) -> Option<FiredJob> {
        let now = self.clock.now();
        let (&key, &handle) = self.order.iter().next()?;
        if key.0 > now {
            return None;
        }
        self.order.remove(&key);
        let entry = self.entries.remove(&handle)?;
        Some(FiredJob {
            handle,
            job: entry.job,
            retry: entry.retry,
        })
    }
}
