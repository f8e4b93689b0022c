//! 데이터 모델 어댑터.
//!
//! Server 오브젝트 인스턴스와 서버 주소(Security 오브젝트 몫)를 합쳐
//! 서버 관리 계층이 읽는 `DataModel` 포트를 구현한다.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::warn;

use lwm2m_core::error::CoreError;
use lwm2m_core::models::binding::BindingMode;
use lwm2m_core::models::ids::{Ssid, OID_SERVER, SSID_BOOTSTRAP};
use lwm2m_core::models::registration::ObjectLink;
use lwm2m_core::models::server::ServerDefinition;
use lwm2m_core::ports::data_model::DataModel;
use lwm2m_core::ports::transaction::Transactional;

use crate::object::ServerObject;

/// 서버 접속 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    /// 서버 URI
    pub uri: String,
    /// SMS 번호
    pub sms_number: Option<String>,
}

/// Bootstrap 서버 정의에 쓰는 수명 (Register 하지 않으므로 연결 유지용)
const BOOTSTRAP_LIFETIME_S: i64 = 86400;

/// Server 오브젝트 기반 데이터 모델
#[derive(Debug, Default)]
pub struct ServerObjectModel {
    object: RwLock<ServerObject>,
    endpoints: RwLock<HashMap<Ssid, ServerEndpoint>>,
    other_objects: RwLock<Vec<ObjectLink>>,
}

impl ServerObjectModel {
    /// 오브젝트로 생성
    pub fn new(object: ServerObject) -> Self {
        Self {
            object: RwLock::new(object),
            ..Default::default()
        }
    }

    /// 서버 접속 정보 설정 (`SSID_BOOTSTRAP`이면 Bootstrap 서버)
    pub fn set_endpoint(&self, ssid: Ssid, endpoint: ServerEndpoint) {
        self.endpoints.write().insert(ssid, endpoint);
    }

    /// 서버 접속 정보 제거
    pub fn remove_endpoint(&self, ssid: Ssid) {
        self.endpoints.write().remove(&ssid);
    }

    /// Server 오브젝트 외에 광고할 오브젝트 목록 교체
    pub fn set_other_objects(&self, objects: Vec<ObjectLink>) {
        *self.other_objects.write() = objects;
    }

    /// 오브젝트 읽기 접근
    pub fn read<R>(&self, f: impl FnOnce(&ServerObject) -> R) -> R {
        f(&self.object.read())
    }

    /// 트랜잭션으로 여러 리소스를 원자적으로 수정
    ///
    /// `f` 또는 검증이 실패하면 전부 되돌린다.
    pub fn transaction<R>(
        &self,
        f: impl FnOnce(&mut ServerObject) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let mut object = self.object.write();
        object.transaction_begin()?;
        let result = f(&mut object).and_then(|value| {
            object.transaction_validate()?;
            Ok(value)
        });
        match result {
            Ok(value) => {
                object.transaction_commit()?;
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, "Server 오브젝트 트랜잭션 롤백");
                object.transaction_rollback()?;
                Err(e)
            }
        }
    }
}

impl DataModel for ServerObjectModel {
    fn server_definitions(&self) -> Result<Vec<ServerDefinition>, CoreError> {
        let object = self.object.read();
        let endpoints = self.endpoints.read();
        let mut definitions = Vec::with_capacity(object.instances().len() + 1);

        if let Some(endpoint) = endpoints.get(&SSID_BOOTSTRAP) {
            definitions.push(ServerDefinition {
                ssid: SSID_BOOTSTRAP,
                binding: BindingMode::new("U")?,
                lifetime_s: BOOTSTRAP_LIFETIME_S,
                uri: endpoint.uri.clone(),
                sms_number: endpoint.sms_number.clone(),
            });
        }

        for instance in object.instances() {
            let (Some(ssid), Some(lifetime_s), Some(binding)) =
                (instance.ssid, instance.lifetime_s, instance.binding_mode())
            else {
                warn!(iid = instance.iid, "불완전한 Server 인스턴스 건너뜀");
                continue;
            };
            let Some(endpoint) = endpoints.get(&ssid) else {
                warn!(ssid, "접속 정보 없는 서버 건너뜀");
                continue;
            };
            definitions.push(ServerDefinition {
                ssid,
                binding,
                lifetime_s,
                uri: endpoint.uri.clone(),
                sms_number: endpoint.sms_number.clone(),
            });
        }
        Ok(definitions)
    }

    fn registered_objects(&self) -> Vec<ObjectLink> {
        let server_link = ObjectLink {
            oid: OID_SERVER,
            version: None,
            instances: self
                .object
                .read()
                .instances()
                .iter()
                .map(|inst| inst.iid)
                .collect(),
        };
        let mut objects: Vec<ObjectLink> = self
            .other_objects
            .read()
            .iter()
            .filter(|link| link.oid != OID_SERVER)
            .cloned()
            .collect();
        objects.push(server_link);
        objects.sort_by_key(|link| link.oid);
        objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{rid, ResourceValue};

    fn configure(object: &mut ServerObject, iid: u16, ssid: i64, lifetime: i64) -> Result<(), CoreError> {
        object.create_instance(Some(iid))?;
        object.write(iid, rid::SSID, &ResourceValue::Int(ssid))?;
        object.write(iid, rid::LIFETIME, &ResourceValue::Int(lifetime))?;
        object.write(iid, rid::DEFAULT_MAX_PERIOD, &ResourceValue::Int(60))?;
        object.write(iid, rid::NOTIFICATION_STORING, &ResourceValue::Bool(true))?;
        object.write(iid, rid::BINDING, &ResourceValue::String("U".into()))
    }

    fn endpoint(host: &str) -> ServerEndpoint {
        ServerEndpoint {
            uri: format!("coaps://{host}:5684"),
            sms_number: None,
        }
    }

    #[test]
    fn definitions_join_instances_and_endpoints() {
        let model = ServerObjectModel::default();
        model
            .transaction(|object| {
                configure(object, 0, 1, 300)?;
                configure(object, 1, 2, 600)
            })
            .unwrap();
        model.set_endpoint(1, endpoint("a.example.com"));
        model.set_endpoint(SSID_BOOTSTRAP, endpoint("bs.example.com"));

        let defs = model.server_definitions().unwrap();
        let ssids: Vec<Ssid> = defs.iter().map(|d| d.ssid).collect();
        assert_eq!(ssids, vec![SSID_BOOTSTRAP, 1]);
        assert_eq!(defs[1].lifetime_s, 300);
        assert_eq!(defs[1].uri, "coaps://a.example.com:5684");
        assert!(model.server_definition(2).unwrap().is_none());
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let model = ServerObjectModel::default();
        model.transaction(|object| configure(object, 0, 1, 300)).unwrap();

        let err = model
            .transaction(|object| configure(object, 1, 1, 60))
            .unwrap_err();
        assert!(err.is_bad_request());
        assert_eq!(model.read(|object| object.instances().len()), 1);

        let err = model
            .transaction(|object| {
                object.write(0, rid::LIFETIME, &ResourceValue::Int(0))?;
                Ok(())
            })
            .unwrap_err();
        assert!(err.is_bad_request());
        assert_eq!(
            model.read(|object| object.instance(0).and_then(|inst| inst.lifetime_s)),
            Some(300)
        );
        assert!(!model.read(ServerObject::in_transaction));
    }

    #[test]
    fn registered_objects_include_server_instances() {
        let model = ServerObjectModel::default();
        model
            .transaction(|object| {
                configure(object, 0, 1, 300)?;
                configure(object, 4, 2, 300)
            })
            .unwrap();
        model.set_other_objects(vec![ObjectLink {
            oid: 3,
            version: None,
            instances: vec![0],
        }]);

        let objects = model.registered_objects();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].oid, OID_SERVER);
        assert_eq!(objects[0].instances, vec![0, 4]);
        assert_eq!(objects[1].oid, 3);
    }
}
