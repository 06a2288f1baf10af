//! Recording document manager used by unit tests

use crate::core::traits::{
    CapacitySettings, ConnectionFilePublishArgs, CreateDocumentArgs, DocumentManager,
    DocumentManagerFactory, LegacyPublishArgs, UnpublishArgs,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum ManagerCall {
    Initialize(String),
    CreateDocument {
        template_path: String,
        working_path: PathBuf,
        connection: String,
        dataset: String,
        enterprise: bool,
    },
    PublishV1 {
        name: String,
        working_path: PathBuf,
        capacity: CapacitySettings,
    },
    PublishV2 {
        name: String,
        connection_file: String,
        script_file: String,
    },
    Unpublish {
        name: String,
    },
    DeleteStorage(String),
    Release,
}

/// Canned answers; `error_on` names an operation that returns `Err`
#[derive(Debug, Clone)]
pub struct ScriptedResponses {
    pub initialize: bool,
    pub create: bool,
    pub publish_v1: String,
    pub publish_v2: String,
    pub unpublish: bool,
    pub delete_storage: String,
    pub error_on: Option<&'static str>,
}

impl Default for ScriptedResponses {
    fn default() -> Self {
        Self {
            initialize: true,
            create: true,
            publish_v1: "http://server/rest/services/x".to_string(),
            publish_v2: "http://server/rest/services/x/MapServer".to_string(),
            unpublish: true,
            delete_storage: String::new(),
            error_on: None,
        }
    }
}

pub struct RecordingManager {
    responses: ScriptedResponses,
    calls: Arc<Mutex<Vec<ManagerCall>>>,
    initialized: bool,
}

impl RecordingManager {
    fn record(&self, call: ManagerCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, operation: &str) -> anyhow::Result<()> {
        if self.responses.error_on == Some(operation) {
            anyhow::bail!("{} exploded", operation);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentManager for RecordingManager {
    fn name(&self) -> &str {
        "recording"
    }

    async fn initialize(&mut self, template_path: &str) -> anyhow::Result<bool> {
        self.record(ManagerCall::Initialize(template_path.to_string()));
        self.check("initialize")?;
        self.initialized = self.responses.initialize;
        Ok(self.initialized)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn create_document(&self, args: &CreateDocumentArgs<'_>) -> anyhow::Result<bool> {
        self.record(ManagerCall::CreateDocument {
            template_path: args.template_path.to_string(),
            working_path: args.working_path.to_path_buf(),
            connection: args.connection.to_string(),
            dataset: args.dataset.to_string(),
            enterprise: args.enterprise,
        });
        self.check("create_document")?;
        Ok(self.responses.create)
    }

    async fn publish_v1(&self, args: &LegacyPublishArgs<'_>) -> anyhow::Result<String> {
        self.record(ManagerCall::PublishV1 {
            name: args.name.to_string(),
            working_path: args.working_path.to_path_buf(),
            capacity: args.capacity,
        });
        self.check("publish_v1")?;
        Ok(self.responses.publish_v1.clone())
    }

    async fn publish_v2(&self, args: &ConnectionFilePublishArgs<'_>) -> anyhow::Result<String> {
        self.record(ManagerCall::PublishV2 {
            name: args.name.to_string(),
            connection_file: args.connection_file.to_string(),
            script_file: args.script_file.to_string(),
        });
        self.check("publish_v2")?;
        Ok(self.responses.publish_v2.clone())
    }

    async fn unpublish(&self, args: &UnpublishArgs<'_>) -> anyhow::Result<bool> {
        self.record(ManagerCall::Unpublish {
            name: args.name.to_string(),
        });
        self.check("unpublish")?;
        Ok(self.responses.unpublish)
    }

    async fn delete_storage(&self, connection: &str) -> anyhow::Result<String> {
        self.record(ManagerCall::DeleteStorage(connection.to_string()));
        self.check("delete_storage")?;
        Ok(self.responses.delete_storage.clone())
    }

    fn release(&mut self) {
        self.record(ManagerCall::Release);
    }
}

/// Factory handing out recording managers that share one call log
#[derive(Clone, Default)]
pub struct RecordingFactory {
    pub responses: ScriptedResponses,
    calls: Arc<Mutex<Vec<ManagerCall>>>,
}

impl RecordingFactory {
    pub fn new(responses: ScriptedResponses) -> Self {
        Self {
            responses,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<ManagerCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl DocumentManagerFactory for RecordingFactory {
    fn create(&self) -> Box<dyn DocumentManager> {
        Box::new(RecordingManager {
            responses: self.responses.clone(),
            calls: Arc::clone(&self.calls),
            initialized: false,
        })
    }
}
