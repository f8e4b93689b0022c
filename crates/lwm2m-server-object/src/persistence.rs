//! Server 오브젝트 영속화 (JSON).

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

use lwm2m_core::error::CoreError;

use crate::instance::ServerInstance;
use crate::object::{check_unique_iids, ServerObject};
use crate::validate::validate_instances;

/// 저장 형식 버전
pub const PERSISTENCE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedObject {
    version: u32,
    instances: Vec<ServerInstance>,
}

impl ServerObject {
    /// 인스턴스 목록 저장 후 변경 플래그 해제
    pub fn persist<W: Write>(&mut self, writer: W) -> Result<(), CoreError> {
        let persisted = PersistedObject {
            version: PERSISTENCE_VERSION,
            instances: self.state.instances.clone(),
        };
        serde_json::to_writer_pretty(writer, &persisted)?;
        self.state.modified_since_persist = false;
        debug!(count = persisted.instances.len(), "Server 오브젝트 저장");
        Ok(())
    }

    /// 저장된 인스턴스 목록 복원 (검증 통과 시에만 교체)
    pub fn restore<R: Read>(&mut self, reader: R) -> Result<(), CoreError> {
        if self.in_transaction() {
            return Err(CoreError::Transaction(
                "트랜잭션 중에는 복원할 수 없음".to_string(),
            ));
        }
        let persisted: PersistedObject = serde_json::from_reader(reader)?;
        if persisted.version != PERSISTENCE_VERSION {
            return Err(CoreError::Config(format!(
                "지원하지 않는 저장 형식 버전: {}",
                persisted.version
            )));
        }
        let mut instances = persisted.instances;
        instances.sort_by_key(|inst| inst.iid);
        check_unique_iids(&instances)?;
        validate_instances(&instances)?;

        info!(count = instances.len(), "Server 오브젝트 복원");
        self.state.instances = instances;
        self.state.modified_since_persist = false;
        Ok(())
    }

    /// 파일로 저장
    pub fn save_to_file(&mut self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.persist(std::io::BufWriter::new(file))
    }

    /// 파일에서 복원
    pub fn load_from_file(&mut self, path: &Path) -> Result<(), CoreError> {
        let file = std::fs::File::open(path)?;
        self.restore(std::io::BufReader::new(file))
    }
}
