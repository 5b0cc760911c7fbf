use serde::{Deserialize, Serialize};

/// 设备配置生命周期状态。
///
/// New → Contacted → Pending → Updated → OutOfContact → PendingAnalysis；
/// 状态迁移由外部触发，本系统只读写该字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ConfigurationState {
    /// 已登记，尚未收到心跳
    #[default]
    New,
    /// 已收到过心跳
    Contacted,
    /// 有待下发的配置或固件
    Pending,
    /// 已完成配置或固件更新
    Updated,
    /// 长时间无心跳
    OutOfContact,
    PendingAnalysis,
}

impl ConfigurationState {
    pub const ALL: [ConfigurationState; 6] = [
        ConfigurationState::New,
        ConfigurationState::Contacted,
        ConfigurationState::Pending,
        ConfigurationState::Updated,
        ConfigurationState::OutOfContact,
        ConfigurationState::PendingAnalysis,
    ];

    /// 与序列化名一致的字符串形式。
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigurationState::New => "New",
            ConfigurationState::Contacted => "Contacted",
            ConfigurationState::Pending => "Pending",
            ConfigurationState::Updated => "Updated",
            ConfigurationState::OutOfContact => "OutOfContact",
            ConfigurationState::PendingAnalysis => "PendingAnalysis",
        }
    }
}
