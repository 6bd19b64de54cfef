use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::client::{ClientError, EntityClient};
use crate::config::Config;
use crate::model::{School, Student};
use crate::screen::ReportScreen;
use crate::session::{MemorySessionStore, SessionContext, SessionStore};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Configuration from the environment, before workspace overrides.
    pub base_config: Config,
    pub config: Config,
    pub client: EntityClient,
    pub session: SessionContext,
    pub memory_store: MemorySessionStore,
    pub school_report: Option<ReportScreen<School>>,
    pub student_report: Option<ReportScreen<Student>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let client = EntityClient::new(&config)?;
        Ok(Self {
            workspace: None,
            db: None,
            base_config: config.clone(),
            config,
            client,
            session: SessionContext::anonymous(),
            memory_store: MemorySessionStore::default(),
            school_report: None,
            student_report: None,
        })
    }

    /// The workspace database once one is selected, process memory before.
    pub fn session_store(&self) -> &dyn SessionStore {
        match &self.db {
            Some(conn) => conn,
            None => &self.memory_store,
        }
    }

    /// Moves to another workspace. The client for `config` is built before
    /// any field is replaced; on error the current workspace stays selected.
    pub fn switch_workspace(
        &mut self,
        path: PathBuf,
        conn: Connection,
        config: Config,
    ) -> Result<(), ClientError> {
        let client = if config == self.config {
            None
        } else {
            Some(EntityClient::new(&config)?)
        };
        self.workspace = Some(path);
        self.db = Some(conn);
        if let Some(client) = client {
            self.client = client;
        }
        self.config = config;
        Ok(())
    }

    /// Ends the session and unmounts everything that was fetched under it.
    pub fn end_session(&mut self) {
        let current = std::mem::take(&mut self.session);
        self.session = current.logout(self.session_store());
        self.school_report = None;
        self.student_report = None;
    }
}
