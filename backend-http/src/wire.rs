//! Wire types shared between the server handlers and the HTTP
//! [`crate::client_backend::HttpBackend`] — the concrete JSON shape of
//! the `Backend` RPC surface (spec.md §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetaDto {
    pub data_id: u64,
    pub is_collection: bool,
    pub size: u64,
    pub mode: i32,
    pub mtime: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDto {
    pub name: String,
    pub meta: ObjectMetaDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRequest {
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadQuery {
    #[serde(default)]
    pub offset: u64,
    pub len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteQuery {
    #[serde(default)]
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruncateQuery {
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChmodQuery {
    pub mode: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrittenResponse {
    pub written: usize,
}
