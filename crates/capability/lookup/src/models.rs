use serde::{Deserialize, Serialize};

/// 已知配置文件的元数据。
///
/// 同一租户下哈希唯一，标题不唯一（同名文件的不同版本）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFileMeta {
    pub id: String,
    pub title: String,
    pub hash: String,
}

/// 已知固件的元数据，按版本字符串查找。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareMeta {
    pub id: String,
    pub title: String,
    pub version: String,
}
