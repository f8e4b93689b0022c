//! Server 오브젝트 (/1).
//!
//! 인스턴스 목록은 IID 오름차순으로 유지한다.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use lwm2m_core::error::CoreError;
use lwm2m_core::models::ids::{Iid, Rid, Ssid, IID_INVALID};
use lwm2m_core::ports::transaction::Transactional;

use crate::instance::{ResourceValue, ServerInstance};
use crate::transaction::{TransactionSlot, TrySnapshot};
use crate::validate::validate_instances;

/// 트랜잭션으로 보호되는 오브젝트 상태
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ObjectState {
    pub instances: Vec<ServerInstance>,
    pub modified_since_persist: bool,
}

impl TrySnapshot for ObjectState {
    fn try_snapshot(&self) -> Result<Self, CoreError> {
        Ok(Self {
            instances: self.instances.try_snapshot()?,
            modified_since_persist: self.modified_since_persist,
        })
    }
}

/// Server 오브젝트
#[derive(Debug, Default)]
pub struct ServerObject {
    pub(crate) state: ObjectState,
    pub(crate) transaction: TransactionSlot<ObjectState>,
}

impl ServerObject {
    /// 빈 오브젝트
    pub fn new() -> Self {
        Self::default()
    }

    /// 검증된 인스턴스 목록으로 생성
    pub fn from_instances(mut instances: Vec<ServerInstance>) -> Result<Self, CoreError> {
        instances.sort_by_key(|inst| inst.iid);
        check_unique_iids(&instances)?;
        validate_instances(&instances)?;
        Ok(Self {
            state: ObjectState {
                instances,
                modified_since_persist: false,
            },
            transaction: TransactionSlot::default(),
        })
    }

    /// 인스턴스 목록 (IID 오름차순)
    pub fn instances(&self) -> &[ServerInstance] {
        &self.state.instances
    }

    /// 인스턴스 조회
    pub fn instance(&self, iid: Iid) -> Option<&ServerInstance> {
        self.position(iid).ok().map(|pos| &self.state.instances[pos])
    }

    /// SSID로 인스턴스 조회
    pub fn find_by_ssid(&self, ssid: Ssid) -> Option<&ServerInstance> {
        self.state
            .instances
            .iter()
            .find(|inst| inst.ssid == Some(ssid))
    }

    /// 마지막 영속화 이후 변경 여부
    pub fn modified_since_persist(&self) -> bool {
        self.state.modified_since_persist
    }

    /// 트랜잭션 진행 중인지
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_open()
    }

    /// 인스턴스 생성 (`None`이면 비어 있는 가장 작은 IID 사용)
    pub fn create_instance(&mut self, iid: Option<Iid>) -> Result<Iid, CoreError> {
        let iid = match iid {
            Some(iid) => iid,
            None => self.free_iid()?,
        };
        if iid == IID_INVALID {
            return Err(CoreError::validation("iid", "예약된 IID"));
        }
        let pos = match self.position(iid) {
            Ok(_) => {
                return Err(CoreError::validation(
                    "iid",
                    format!("이미 존재하는 인스턴스: {iid}"),
                ))
            }
            Err(pos) => pos,
        };
        self.state.instances.insert(pos, ServerInstance::new(iid));
        self.state.modified_since_persist = true;
        debug!(iid, "Server 인스턴스 생성");
        Ok(iid)
    }

    /// 인스턴스 삭제
    pub fn remove_instance(&mut self, iid: Iid) -> Result<ServerInstance, CoreError> {
        let pos = self.position(iid).map_err(|_| not_found(iid))?;
        let removed = self.state.instances.remove(pos);
        self.state.modified_since_persist = true;
        info!(iid, ssid = ?removed.ssid, "Server 인스턴스 삭제");
        Ok(removed)
    }

    /// 리소스 읽기
    pub fn read(&self, iid: Iid, rid: Rid) -> Result<ResourceValue, CoreError> {
        self.instance(iid).ok_or_else(|| not_found(iid))?.read(rid)
    }

    /// 리소스 쓰기
    pub fn write(&mut self, iid: Iid, rid: Rid, value: &ResourceValue) -> Result<(), CoreError> {
        let pos = self.position(iid).map_err(|_| not_found(iid))?;
        self.state.instances[pos].write(rid, value)?;
        self.state.modified_since_persist = true;
        Ok(())
    }

    fn position(&self, iid: Iid) -> Result<usize, usize> {
        self.state
            .instances
            .binary_search_by_key(&iid, |inst| inst.iid)
    }

    fn free_iid(&self) -> Result<Iid, CoreError> {
        let mut candidate: Iid = 0;
        for inst in &self.state.instances {
            if inst.iid != candidate {
                break;
            }
            candidate = candidate.checked_add(1).unwrap_or(IID_INVALID);
        }
        if candidate == IID_INVALID {
            return Err(CoreError::Internal("사용 가능한 IID 없음".to_string()));
        }
        Ok(candidate)
    }
}

impl Transactional for ServerObject {
    fn transaction_begin(&mut self) -> Result<(), CoreError> {
        self.transaction.begin(&self.state)
    }

    fn transaction_validate(&self) -> Result<(), CoreError> {
        validate_instances(&self.state.instances)
    }

    fn transaction_commit(&mut self) -> Result<(), CoreError> {
        self.transaction.commit();
        Ok(())
    }

    fn transaction_rollback(&mut self) -> Result<(), CoreError> {
        self.transaction.rollback(&mut self.state);
        Ok(())
    }
}

pub(crate) fn check_unique_iids(instances: &[ServerInstance]) -> Result<(), CoreError> {
    match instances.windows(2).find(|pair| pair[0].iid == pair[1].iid) {
        Some(pair) => Err(CoreError::validation(
            "iid",
            format!("중복된 인스턴스 ID: {}", pair[0].iid),
        )),
        None => Ok(()),
    }
}

fn not_found(iid: Iid) -> CoreError {
    CoreError::NotFound {
        resource_type: "Instance".to_string(),
        id: format!("/1/{iid}"),
    }
}
