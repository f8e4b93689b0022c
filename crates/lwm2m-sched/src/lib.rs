//! # lwm2m-sched
//!
//! [`Scheduler`](lwm2m_core::ports::scheduler::Scheduler) 포트의 메모리 구현.
//! 주입된 시계 기준으로 `(실행 시각, 예약 순번)` 순서를 유지하며,
//! 실행 루프는 [`JobQueue::pop_due`]로 작업을 하나씩 꺼낸다.

pub mod queue;

pub use queue::JobQueue;
