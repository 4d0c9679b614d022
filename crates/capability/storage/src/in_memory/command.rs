//! 命令日志内存实现
//!
//! 仅用于本地测试和占位。

use crate::error::StorageError;
use crate::models::{CommandLogRecord, CommandResponseRecord};
use crate::traits::CommandLogStore;
use domain::CommandStatus;
use std::sync::RwLock;
use uuid::Uuid;

/// 命令日志内存存储
pub struct InMemoryCommandLogStore {
    commands: RwLock<Vec<CommandLogRecord>>,
    responses: RwLock<Vec<CommandResponseRecord>>,
}

impl InMemoryCommandLogStore {
    /// 创建新的命令日志存储
    pub fn new() -> Self {
        Self {
            commands: RwLock::new(Vec::new()),
            responses: RwLock::new(Vec::new()),
        }
    }

    /// 查找命令日志（用于测试）
    pub fn find(&self, request_id: Uuid) -> Option<CommandLogRecord> {
        self.commands
            .read()
            .ok()
            .and_then(|commands| {
                commands
                    .iter()
                    .find(|item| item.request_id == request_id)
                    .cloned()
            })
    }

    /// 响应留档数量（用于测试）
    pub fn response_count(&self) -> usize {
        self.responses.read().map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for InMemoryCommandLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CommandLogStore for InMemoryCommandLogStore {
    async fn log_command(&self, record: CommandLogRecord) -> Result<(), StorageError> {
        let mut commands = self
            .commands
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if commands
            .iter()
            .any(|item| item.request_id == record.request_id)
        {
            return Err(StorageError::new("request id already logged"));
        }
        commands.push(record);
        Ok(())
    }

    async fn update_command_status(
        &self,
        request_id: Uuid,
        status: CommandStatus,
    ) -> Result<Option<CommandLogRecord>, StorageError> {
        let mut commands = self
            .commands
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        for command in commands.iter_mut() {
            if command.request_id == request_id {
                command.status = status;
                return Ok(Some(command.clone()));
            }
        }
        Ok(None)
    }

    async fn save_response(&self, record: CommandResponseRecord) -> Result<(), StorageError> {
        let mut responses = self
            .responses
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        responses.push(record);
        Ok(())
    }

    async fn list_commands(
        &self,
        device_id: i64,
        limit: i64,
    ) -> Result<Vec<CommandLogRecord>, StorageError> {
        let limit = limit.max(0) as usize;
        let commands = self
            .commands
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<CommandLogRecord> = commands
            .iter()
            .filter(|item| item.device_id == device_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.issued_at_ms.cmp(&a.issued_at_ms));
        if limit > 0 && items.len() > limit {
            items.truncate(limit);
        }
        Ok(items)
    }
}
